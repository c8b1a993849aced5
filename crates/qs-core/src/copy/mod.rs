//! Graph copy engine and reconciling cloner.
//!
//! [`Copier`] copies members from a node in a source graph onto a node of
//! the same type in a destination graph, preserving sharing and absorbing
//! cycles. When a member needs a destination node that does not exist yet,
//! the copier resolves it: memo first, then a live match, then a clone.

mod engine;
pub mod factory;
mod resolve;
pub mod session;

use qs_common::TypeTag;
use serde::Serialize;

pub use engine::{CopyOutput, Copier};
pub use factory::{FactoryTable, NodeFactory, RenderIndexFactory, TimerFactory};
pub use resolve::FindOutcome;
pub use session::{CopySession, CopyStats};

use crate::graph::{AuxData, Graph, NodeKey};

/// Which part of a node a copy walks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyScope {
    /// Stop after fields declared by this ancestor type.
    pub upto: Option<TypeTag>,
    /// Copy simple members only.
    pub simple_only: bool,
    /// With `simple_only`, still copy a null source value onto other members.
    pub copy_nulls: bool,
    /// Respect the `shallow_restore` flag of the copied type.
    pub honor_shallow: bool,
}

impl CopyScope {
    pub fn full() -> Self {
        CopyScope {
            upto: None,
            simple_only: false,
            copy_nulls: false,
            honor_shallow: true,
        }
    }

    /// Simple members plus any member whose source value is null. Used to
    /// restore root state without re-linking its references.
    pub fn simple_and_null() -> Self {
        CopyScope {
            upto: None,
            simple_only: true,
            copy_nulls: true,
            honor_shallow: false,
        }
    }

    pub fn upto(ancestor: impl Into<TypeTag>) -> Self {
        CopyScope {
            upto: Some(ancestor.into()),
            ..CopyScope::full()
        }
    }

    pub fn ignore_shallow(mut self) -> Self {
        self.honor_shallow = false;
        self
    }
}

/// Which way a copy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Live graph into an empty snapshot graph. Nothing is looked up; every
    /// node is cloned.
    Capture,
    /// Snapshot graph onto the live graph, reusing live nodes when possible.
    Reconcile,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CopyError {
    #[error("cannot copy {source_type} onto {dest_type}")]
    TypeMismatch {
        dest_type: TypeTag,
        source_type: TypeTag,
    },

    #[error("type {0} is not registered")]
    UnknownType(TypeTag),

    #[error("{side} node missing from its graph")]
    MissingNode { side: &'static str },

    #[error(transparent)]
    Schema(crate::graph::SchemaError),
}

impl CopyError {
    /// Contract violations that abort the enclosing operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CopyError::TypeMismatch { .. } | CopyError::UnknownType(_))
    }
}

impl From<crate::graph::SchemaError> for CopyError {
    fn from(err: crate::graph::SchemaError) -> Self {
        match err {
            crate::graph::SchemaError::Unknown(tag) => CopyError::UnknownType(tag),
            other => CopyError::Schema(other),
        }
    }
}

impl From<CopyError> for qs_common::Error {
    fn from(err: CopyError) -> Self {
        match err {
            CopyError::TypeMismatch {
                dest_type,
                source_type,
            } => qs_common::Error::TypeMismatch {
                dest_type: dest_type.0,
                source_type: source_type.0,
            },
            CopyError::UnknownType(tag) => qs_common::Error::UnknownType(tag.0),
            CopyError::MissingNode { side: "root" } => qs_common::Error::MissingRoot,
            CopyError::MissingNode { side } => qs_common::Error::NodeNotFound(side.to_string()),
            CopyError::Schema(err) => err.into(),
        }
    }
}

/// Top-level nodes copied together, with their side-table data keyed by
/// position in the set.
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    pub nodes: Vec<NodeKey>,
    pub aux: Vec<(usize, AuxData)>,
}

impl RootSet {
    /// Collect `keys` and the non-empty aux entries they carry in `graph`.
    pub fn gather(graph: &Graph, keys: Vec<NodeKey>) -> Self {
        let aux = keys
            .iter()
            .enumerate()
            .filter_map(|(i, k)| {
                graph
                    .aux(*k)
                    .filter(|data| !data.is_empty())
                    .map(|data| (i, data.clone()))
            })
            .collect();
        RootSet { nodes: keys, aux }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeKind, Value};

    #[test]
    fn gather_keys_aux_by_position() {
        let mut graph = Graph::new();
        let a = graph.insert(Node::new("Spring", NodeKind::Entity));
        let b = graph.insert(Node::new("Spring", NodeKind::Entity));
        let mut data = AuxData::new();
        data.insert("bounce".to_string(), Value::int(2));
        graph.set_aux(b, data);
        graph.set_aux(a, AuxData::new());

        let set = RootSet::gather(&graph, vec![a, b]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.aux.len(), 1);
        assert_eq!(set.aux[0].0, 1);
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let err = CopyError::TypeMismatch {
            dest_type: "A".into(),
            source_type: "B".into(),
        };
        assert!(err.is_fatal());
        assert!(!CopyError::MissingNode { side: "source" }.is_fatal());
        let unified: qs_common::Error = err.into();
        assert!(unified.is_fatal());
    }
}

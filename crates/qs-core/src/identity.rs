//! Identity registry.
//!
//! Indexes live nodes by [`StableId`] so the reconciler can find "the same
//! conceptual object" in the live graph when it meets a snapshot node.
//! Collaborators may also seed overrides before an install: force a
//! particular live node for an id, or veto reuse and resolution for it.

use std::collections::{BTreeSet, HashMap};

use qs_common::{StableId, TypeTag};
use tracing::trace;

use crate::graph::{Graph, NodeKey, NodeKind};

/// Collaborator-provided decision for one stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Resolve to this live node.
    Reuse(NodeKey),
    /// Refuse to resolve this id at all.
    Veto,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    tracked: BTreeSet<TypeTag>,
    index: HashMap<StableId, NodeKey>,
    overrides: HashMap<StableId, Verdict>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index non-entity nodes of this type by stable id as well. Entities
    /// are always indexed.
    pub fn track_type(&mut self, tag: impl Into<TypeTag>) {
        self.tracked.insert(tag.into());
    }

    pub fn is_tracked(&self, tag: &TypeTag) -> bool {
        self.tracked.contains(tag)
    }

    pub fn register(&mut self, id: StableId, key: NodeKey) {
        self.index.insert(id, key);
    }

    pub fn unregister(&mut self, id: &StableId) -> Option<NodeKey> {
        self.index.remove(id)
    }

    pub fn lookup(&self, id: &StableId) -> Option<NodeKey> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn seed(&mut self, id: StableId, key: NodeKey) {
        self.overrides.insert(id, Verdict::Reuse(key));
    }

    pub fn veto(&mut self, id: StableId) {
        self.overrides.insert(id, Verdict::Veto);
    }

    pub fn override_for(&self, id: &StableId) -> Option<Verdict> {
        self.overrides.get(id).copied()
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    /// Whether a node of this kind and type is indexed.
    pub fn indexes(&self, kind: NodeKind, tag: &TypeTag) -> bool {
        kind == NodeKind::Entity || self.tracked.contains(tag)
    }

    /// Re-index every attached node of the graph that carries a stable id.
    pub fn rebuild(&mut self, graph: &Graph) {
        self.index.clear();
        for (key, node) in graph.iter() {
            let Some(id) = &node.stable_id else {
                continue;
            };
            if self.indexes(node.kind, &node.type_tag) && graph.is_attached(key) {
                self.index.insert(id.clone(), key);
            }
        }
        trace!(indexed = self.index.len(), "identity index rebuilt");
    }
}

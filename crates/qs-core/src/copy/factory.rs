//! Clone-path constructors keyed by type tag.
//!
//! Most types are cloned as a blank allocation and filled by the generic
//! copy. Types whose construction has side effects register a factory that
//! performs just those side effects.

use std::collections::HashMap;
use std::fmt;

use qs_common::TypeTag;

use crate::graph::{Graph, Node, NodeKey, TypeSchema, Value};

pub trait NodeFactory: Send + Sync {
    /// Allocate the new node. Members are populated afterwards by the copy.
    fn construct(&self, schema: &TypeSchema, _source: &Node) -> Node {
        Node::blank(schema)
    }

    /// Runs once the node's members have been copied.
    fn finish(&self, _key: NodeKey, _graph: &mut Graph) {}
}

/// Registers the node with the graph's timer list.
#[derive(Debug, Default)]
pub struct TimerFactory;

impl NodeFactory for TimerFactory {
    fn finish(&self, key: NodeKey, graph: &mut Graph) {
        graph.register_timer(key);
    }
}

/// Resets a render-layer index so the renderer assigns a fresh slot.
#[derive(Debug)]
pub struct RenderIndexFactory {
    pub field: String,
}

impl RenderIndexFactory {
    pub fn new(field: impl Into<String>) -> Self {
        RenderIndexFactory {
            field: field.into(),
        }
    }
}

impl NodeFactory for RenderIndexFactory {
    fn finish(&self, key: NodeKey, graph: &mut Graph) {
        graph.set_member(key, &self.field, Value::int(-1));
    }
}

#[derive(Default)]
pub struct FactoryTable {
    factories: HashMap<TypeTag, Box<dyn NodeFactory>>,
}

impl fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&str> = self.factories.keys().map(TypeTag::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("FactoryTable").field("types", &tags).finish()
    }
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: impl Into<TypeTag>, factory: impl NodeFactory + 'static) {
        self.factories.insert(tag.into(), Box::new(factory));
    }

    pub fn get(&self, tag: &TypeTag) -> Option<&dyn NodeFactory> {
        self.factories.get(tag).map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn builtin_factories_apply_side_effects() {
        let mut table = FactoryTable::new();
        table.register("Timer", TimerFactory);
        table.register("Light", RenderIndexFactory::new("index"));

        let mut graph = Graph::new();
        let timer = graph.insert(Node::new("Timer", NodeKind::Component));
        let light = graph.insert(Node::new("Light", NodeKind::Component).with("index", Value::int(4)));

        table.get(&"Timer".into()).unwrap().finish(timer, &mut graph);
        table.get(&"Light".into()).unwrap().finish(light, &mut graph);

        assert_eq!(graph.timers(), &[timer]);
        assert_eq!(graph.member(light, "index").as_int(), Some(-1));
        assert!(table.get(&"Spring".into()).is_none());
    }
}

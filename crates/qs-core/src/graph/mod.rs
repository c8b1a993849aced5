//! Arena-backed object graph.
//!
//! A [`Graph`] owns its nodes in a `SlotMap`; references between nodes are
//! `NodeKey`s into that same arena. Keys from one graph mean nothing in
//! another, which is why every copy between graphs goes through a session
//! memo that records the key mapping.

pub mod resource;
pub mod schema;
pub mod value;

use std::collections::BTreeMap;

use qs_common::{StableId, TypeTag};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

pub use resource::{AudioHandle, ResourceTable, Texture};
pub use schema::{FieldDecl, SchemaError, TypeFlags, TypeRegistry, TypeSchema};
pub use value::{
    Callback, ElemKind, Frame, MemberKind, ResourceKind, ResourceRef, RoutineStack, Scalar,
    SeqKind, Sequence, Value,
};

slotmap::new_key_type! {
    /// Handle to a node inside one particular [`Graph`].
    pub struct NodeKey;
}

/// Structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The world root (a level). At most one per graph.
    Root,
    /// Top-level node that lives in the root membership list.
    Entity,
    /// Node attached to an owning entity.
    Component,
    /// Free-standing data node reachable only through references.
    Plain,
}

/// Participation tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    /// Persists across installs untouched.
    pub global: bool,
    /// Never captured.
    pub ignore_save_load: bool,
    /// Captured after every other node.
    pub renderer: bool,
    /// The designated player.
    pub player: bool,
}

/// Per-node auxiliary state that is not expressed as ordinary members.
pub type AuxData = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub type_tag: TypeTag,
    pub kind: NodeKind,
    /// Assigned once at creation; never rewritten by a copy.
    pub stable_id: Option<StableId>,
    pub tags: Tags,
    pub owner: Option<NodeKey>,
    pub components: Vec<NodeKey>,
    pub members: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(type_tag: impl Into<TypeTag>, kind: NodeKind) -> Self {
        Node {
            type_tag: type_tag.into(),
            kind,
            stable_id: None,
            tags: Tags::default(),
            owner: None,
            components: Vec::new(),
            members: BTreeMap::new(),
        }
    }

    /// Allocation without initialization: right type, no member values.
    pub fn blank(schema: &TypeSchema) -> Self {
        Node::new(schema.tag.clone(), schema.kind)
    }

    pub fn with_id(mut self, id: StableId) -> Self {
        self.stable_id = Some(id);
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.members.insert(name.to_string(), value);
        self
    }

    /// Member value, `Null` when unset.
    pub fn member(&self, name: &str) -> &Value {
        self.members.get(name).unwrap_or(&NULL)
    }

    pub fn set_member(&mut self, name: &str, value: Value) {
        self.members.insert(name.to_string(), value);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: SlotMap<NodeKey, Node>,
    root: Option<NodeKey>,
    entities: Vec<NodeKey>,
    aux: SecondaryMap<NodeKey, AuxData>,
    pub resources: ResourceTable,
    timers: Vec<NodeKey>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeKey {
        self.nodes.insert(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Member of a node, `Null` when the node or member is missing.
    pub fn member(&self, key: NodeKey, name: &str) -> &Value {
        self.nodes.get(key).map_or(&NULL, |n| n.member(name))
    }

    pub fn set_member(&mut self, key: NodeKey, name: &str, value: Value) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.set_member(name, value);
                true
            }
            None => false,
        }
    }

    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    pub fn set_root(&mut self, key: NodeKey) {
        self.root = Some(key);
    }

    /// Root membership, in order.
    pub fn entities(&self) -> &[NodeKey] {
        &self.entities
    }

    /// Add to root membership; adding twice is a no-op.
    pub fn add_entity(&mut self, key: NodeKey) {
        if self.nodes.contains_key(key) && !self.entities.contains(&key) {
            self.entities.push(key);
        }
    }

    pub fn remove_entity(&mut self, key: NodeKey) -> bool {
        let before = self.entities.len();
        self.entities.retain(|k| *k != key);
        before != self.entities.len()
    }

    /// Whether the node is part of a live structure: the root itself, an
    /// entity in root membership, or a component with an owner.
    pub fn is_attached(&self, key: NodeKey) -> bool {
        let Some(node) = self.nodes.get(key) else {
            return false;
        };
        match node.kind {
            NodeKind::Root => self.root == Some(key),
            NodeKind::Entity => self.entities.contains(&key),
            NodeKind::Component => node.owner.is_some(),
            NodeKind::Plain => true,
        }
    }

    /// Attach a component to an entity, moving it off any previous owner.
    pub fn attach_component(&mut self, owner: NodeKey, component: NodeKey) -> bool {
        if !self.nodes.contains_key(owner) || !self.nodes.contains_key(component) {
            return false;
        }
        let previous = self.nodes[component].owner;
        if previous == Some(owner) && self.nodes[owner].components.contains(&component) {
            return true;
        }
        if let Some(prev) = previous {
            if let Some(prev_node) = self.nodes.get_mut(prev) {
                prev_node.components.retain(|c| *c != component);
            }
        }
        self.nodes[component].owner = Some(owner);
        let list = &mut self.nodes[owner].components;
        if !list.contains(&component) {
            list.push(component);
        }
        true
    }

    /// Reorder an entity's components to follow `order`. Components not
    /// listed keep their relative order after the listed ones.
    pub fn set_component_order(&mut self, owner: NodeKey, order: &[NodeKey]) {
        let Some(node) = self.nodes.get_mut(owner) else {
            return;
        };
        let mut reordered: Vec<NodeKey> = order
            .iter()
            .copied()
            .filter(|c| node.components.contains(c))
            .collect();
        for c in &node.components {
            if !reordered.contains(c) {
                reordered.push(*c);
            }
        }
        node.components = reordered;
    }

    /// Detach a node from whatever holds it: its owner's component list and
    /// the root membership. Returns whether anything changed.
    pub fn release(&mut self, key: NodeKey) -> bool {
        let mut changed = self.remove_entity(key);
        let owner = self.nodes.get_mut(key).and_then(|n| n.owner.take());
        if let Some(owner) = owner {
            if let Some(owner_node) = self.nodes.get_mut(owner) {
                owner_node.components.retain(|c| *c != key);
            }
            changed = true;
        }
        changed
    }

    /// Remove a node and its components from the arena.
    pub fn despawn(&mut self, key: NodeKey) -> Option<Node> {
        self.release(key);
        let node = self.nodes.remove(key)?;
        for component in &node.components {
            self.timers.retain(|t| t != component);
            self.aux.remove(*component);
            self.nodes.remove(*component);
        }
        self.timers.retain(|t| *t != key);
        self.aux.remove(key);
        if self.root == Some(key) {
            self.root = None;
        }
        Some(node)
    }

    /// The `ordinal`-th component of `owner` with the given type.
    pub fn find_component(&self, owner: NodeKey, tag: &TypeTag, ordinal: usize) -> Option<NodeKey> {
        self.nodes
            .get(owner)?
            .components
            .iter()
            .copied()
            .filter(|c| self.nodes.get(*c).is_some_and(|n| &n.type_tag == tag))
            .nth(ordinal)
    }

    /// Position of a component among its owner's components of the same type.
    pub fn component_ordinal(&self, component: NodeKey) -> Option<usize> {
        let node = self.nodes.get(component)?;
        let owner = self.nodes.get(node.owner?)?;
        owner
            .components
            .iter()
            .filter(|c| self.nodes.get(**c).is_some_and(|n| n.type_tag == node.type_tag))
            .position(|c| *c == component)
    }

    /// First node of the given type, preferring attached ones so a
    /// singleton unloaded for an install is still found.
    pub fn first_of_type(&self, tag: &TypeTag) -> Option<NodeKey> {
        let mut detached = None;
        for (key, node) in &self.nodes {
            if &node.type_tag != tag {
                continue;
            }
            if self.is_attached(key) {
                return Some(key);
            }
            detached.get_or_insert(key);
        }
        detached
    }

    /// The entity tagged as player, if attached.
    pub fn player(&self) -> Option<NodeKey> {
        self.entities
            .iter()
            .copied()
            .find(|k| self.nodes.get(*k).is_some_and(|n| n.tags.player))
    }

    pub fn aux(&self, key: NodeKey) -> Option<&AuxData> {
        self.aux.get(key)
    }

    pub fn set_aux(&mut self, key: NodeKey, data: AuxData) {
        if self.nodes.contains_key(key) {
            self.aux.insert(key, data);
        }
    }

    pub fn register_timer(&mut self, key: NodeKey) {
        if !self.timers.contains(&key) {
            self.timers.push(key);
        }
    }

    pub fn timers(&self) -> &[NodeKey] {
        &self.timers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(graph: &mut Graph, seq: u32) -> NodeKey {
        let key = graph.insert(Node::new("Spring", NodeKind::Entity).with_id(StableId::new("a-00", seq)));
        graph.add_entity(key);
        key
    }

    #[test]
    fn membership_is_idempotent() {
        let mut graph = Graph::new();
        let e = entity(&mut graph, 1);
        graph.add_entity(e);
        assert_eq!(graph.entities(), &[e]);
        assert!(graph.is_attached(e));
    }

    #[test]
    fn attach_moves_component_between_owners() {
        let mut graph = Graph::new();
        let a = entity(&mut graph, 1);
        let b = entity(&mut graph, 2);
        let c = graph.insert(Node::new("Light", NodeKind::Component));

        assert!(graph.attach_component(a, c));
        assert!(graph.attach_component(b, c));
        assert!(graph.node(a).unwrap().components.is_empty());
        assert_eq!(graph.node(b).unwrap().components, vec![c]);
        assert_eq!(graph.node(c).unwrap().owner, Some(b));
    }

    #[test]
    fn release_detaches_from_owner_and_membership() {
        let mut graph = Graph::new();
        let a = entity(&mut graph, 1);
        let c = graph.insert(Node::new("Light", NodeKind::Component));
        graph.attach_component(a, c);

        assert!(graph.release(c));
        assert!(!graph.is_attached(c));
        assert!(graph.node(a).unwrap().components.is_empty());
        assert!(!graph.release(c));

        assert!(graph.release(a));
        assert!(!graph.is_attached(a));
    }

    #[test]
    fn despawn_removes_components_and_timers() {
        let mut graph = Graph::new();
        let a = entity(&mut graph, 1);
        let t = graph.insert(Node::new("Timer", NodeKind::Component));
        graph.attach_component(a, t);
        graph.register_timer(t);

        assert!(graph.despawn(a).is_some());
        assert!(!graph.contains(t));
        assert!(graph.timers().is_empty());
        assert!(graph.entities().is_empty());
    }

    #[test]
    fn component_lookup_by_ordinal() {
        let mut graph = Graph::new();
        let a = entity(&mut graph, 1);
        let first = graph.insert(Node::new("Light", NodeKind::Component));
        let other = graph.insert(Node::new("Timer", NodeKind::Component));
        let second = graph.insert(Node::new("Light", NodeKind::Component));
        for c in [first, other, second] {
            graph.attach_component(a, c);
        }
        let light = TypeTag::from("Light");
        assert_eq!(graph.find_component(a, &light, 1), Some(second));
        assert_eq!(graph.component_ordinal(second), Some(1));
        assert_eq!(graph.component_ordinal(other), Some(0));
        assert_eq!(graph.find_component(a, &light, 2), None);
    }

    #[test]
    fn missing_member_reads_null() {
        let mut graph = Graph::new();
        let a = entity(&mut graph, 1);
        assert!(graph.member(a, "speed").is_null());
        graph.set_member(a, "speed", Value::float(2.0));
        assert_eq!(graph.member(a, "speed").as_float(), Some(2.0));
    }
}

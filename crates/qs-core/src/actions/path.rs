use std::collections::HashMap;

use qs_common::{StableId, TypeTag};

use super::entities_of;
use crate::graph::{Graph, NodeKey, Sequence, TypeRegistry, Value};
use crate::hooks::SaveLoadAction;
use crate::identity::IdentityRegistry;
use crate::lifecycle::Snapshot;
use crate::world::World;

/// Trims a node's waypoint path to what was still ahead of it at capture.
///
/// For entities that walk a list of waypoints with a cursor, the generic
/// copy restores the cursor but a reused node may have been re-pathed in the
/// meantime. The remaining waypoints are recorded by stable id at capture;
/// after an install the live path is replaced by them and the cursor reset.
#[derive(Debug)]
pub struct PendingPathAction {
    type_tag: TypeTag,
    path_field: String,
    index_field: String,
    saved: HashMap<StableId, Vec<Value>>,
}

impl PendingPathAction {
    pub fn new(type_tag: impl Into<TypeTag>, path_field: &str, index_field: &str) -> Self {
        PendingPathAction {
            type_tag: type_tag.into(),
            path_field: path_field.to_string(),
            index_field: index_field.to_string(),
            saved: HashMap::new(),
        }
    }

    fn remaining(&self, graph: &Graph, key: NodeKey) -> Option<Vec<Value>> {
        let path = graph.member(key, &self.path_field).as_seq()?;
        let index = graph
            .member(key, &self.index_field)
            .as_int()
            .unwrap_or(0)
            .clamp(0, path.len() as i64) as usize;
        Some(path.items[index..].to_vec())
    }
}

impl SaveLoadAction for PendingPathAction {
    fn name(&self) -> &str {
        "pending-path"
    }

    fn on_init(&mut self, _types: &TypeRegistry, identities: &mut IdentityRegistry) {
        identities.track_type(self.type_tag.clone());
    }

    fn on_capture(&mut self, world: &World, _snapshot: &Snapshot) {
        self.saved.clear();
        for (key, id) in entities_of(&world.graph, &self.type_tag) {
            if let Some(rest) = self.remaining(&world.graph, key) {
                self.saved.insert(id.clone(), rest);
            }
        }
    }

    fn on_installed(&mut self, world: &mut World, _snapshot: &Snapshot) {
        let targets: Vec<(NodeKey, Vec<Value>)> = entities_of(&world.graph, &self.type_tag)
            .filter_map(|(key, id)| self.saved.get(id).map(|rest| (key, rest.clone())))
            .collect();
        for (key, rest) in targets {
            world
                .graph
                .set_member(key, &self.path_field, Value::Seq(Sequence::list(rest)));
            world.graph.set_member(key, &self.index_field, Value::int(0));
        }
    }

    fn on_discard(&mut self) {
        self.saved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::FactoryTable;
    use crate::graph::{Node, NodeKind, Tags, TypeSchema};
    use crate::lifecycle::Orchestrator;
    use qs_config::Settings;

    #[test]
    fn live_path_trimmed_to_remaining_waypoints() {
        let mut types = TypeRegistry::new();
        types.register(TypeSchema::new("Level", NodeKind::Root)).unwrap();
        types.register(TypeSchema::new("Player", NodeKind::Entity)).unwrap();
        types
            .register(
                TypeSchema::new("Booster", NodeKind::Entity)
                    .list_of_simple("nodes")
                    .simple("node_index"),
            )
            .unwrap();

        let mut world = World::new(types, FactoryTable::new());
        world.set_root(Node::new("Level", NodeKind::Root));
        world.spawn(
            Node::new("Player", NodeKind::Entity)
                .with_id(StableId::new("a-00", 0))
                .with_tags(Tags {
                    player: true,
                    ..Tags::default()
                }),
        );
        let waypoints = Sequence::list(vec![
            Value::vec2(0.0, 0.0),
            Value::vec2(8.0, 0.0),
            Value::vec2(16.0, 8.0),
        ]);
        let booster = world.spawn(
            Node::new("Booster", NodeKind::Entity)
                .with_id(StableId::new("a-00", 3))
                .with("nodes", Value::Seq(waypoints))
                .with("node_index", Value::int(1)),
        );

        let mut orch = Orchestrator::new(Settings::default());
        orch.register_action(
            &mut world,
            Box::new(PendingPathAction::new("Booster", "nodes", "node_index")),
        );
        assert!(orch.capture(&mut world));

        let path = world.graph.member(booster, "nodes").as_seq().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.items[0], Value::vec2(8.0, 0.0));
        assert_eq!(world.graph.member(booster, "node_index").as_int(), Some(0));
    }
}

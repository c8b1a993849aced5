use std::collections::HashMap;

use qs_common::{StableId, TypeTag};
use tracing::debug;

use super::entities_of;
use crate::graph::{TypeRegistry, Value};
use crate::hooks::SaveLoadAction;
use crate::identity::IdentityRegistry;
use crate::lifecycle::Snapshot;
use crate::world::World;

/// Carries members the schema does not declare across an install.
///
/// At capture the named members of every live entity of the type are
/// recorded by stable id; after each install they are written back onto the
/// live entity with the same id.
#[derive(Debug)]
pub struct CarryFieldsAction {
    name: String,
    type_tag: TypeTag,
    fields: Vec<String>,
    saved: HashMap<StableId, Vec<(String, Value)>>,
}

impl CarryFieldsAction {
    pub fn new(type_tag: impl Into<TypeTag>, fields: &[&str]) -> Self {
        let type_tag = type_tag.into();
        CarryFieldsAction {
            name: format!("carry-fields:{type_tag}"),
            type_tag,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            saved: HashMap::new(),
        }
    }

    pub fn saved_len(&self) -> usize {
        self.saved.len()
    }
}

impl SaveLoadAction for CarryFieldsAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_init(&mut self, _types: &TypeRegistry, identities: &mut IdentityRegistry) {
        identities.track_type(self.type_tag.clone());
    }

    fn on_capture(&mut self, world: &World, _snapshot: &Snapshot) {
        self.saved.clear();
        for (key, id) in entities_of(&world.graph, &self.type_tag) {
            let values = self
                .fields
                .iter()
                .map(|f| (f.clone(), world.graph.member(key, f).clone()))
                .collect();
            self.saved.insert(id.clone(), values);
        }
        debug!(type_tag = %self.type_tag, entities = self.saved.len(), "carry fields recorded");
    }

    fn on_installed(&mut self, world: &mut World, _snapshot: &Snapshot) {
        let targets: Vec<_> = entities_of(&world.graph, &self.type_tag)
            .filter_map(|(key, id)| self.saved.get(id).map(|values| (key, values)))
            .collect();
        for (key, values) in targets {
            for (field, value) in values {
                world.graph.set_member(key, field, value.clone());
            }
        }
    }

    fn on_discard(&mut self) {
        self.saved.clear();
    }
}

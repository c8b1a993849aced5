//! Extension points.
//!
//! Collaborators implement [`SaveLoadAction`] for the domain types that need
//! handling the generic copy cannot provide. The orchestrator calls every
//! registered action, in registration order, at fixed points of the
//! lifecycle. Every method has a no-op default.

use tracing::debug;

use crate::graph::TypeRegistry;
use crate::identity::IdentityRegistry;
use crate::lifecycle::Snapshot;
use crate::world::World;

pub trait SaveLoadAction {
    /// Short name used in logs and rejection reasons.
    fn name(&self) -> &str;

    /// Called once, at registration.
    fn on_init(&mut self, _types: &TypeRegistry, _identities: &mut IdentityRegistry) {}

    /// Whether a capture may start now.
    fn allow_capture(&self, _world: &World) -> bool {
        true
    }

    /// Whether the action currently needs the scene to stay frozen, so a
    /// discard must not unfreeze it.
    fn holds_freeze(&self, _world: &World) -> bool {
        false
    }

    /// After the generic copy of a capture. Record whatever the copy cannot
    /// see.
    fn on_capture(&mut self, _world: &World, _snapshot: &Snapshot) {}

    /// Before reconciliation. May seed or veto identity matches through
    /// `world.identities`.
    fn on_install(&mut self, _world: &mut World, _snapshot: &Snapshot) {}

    /// After reconciliation and the ambient restore.
    fn on_installed(&mut self, _world: &mut World, _snapshot: &Snapshot) {}

    /// The snapshot is gone; drop anything tied to it.
    fn on_discard(&mut self) {}
}

#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn SaveLoadAction>>,
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.name().to_string()))
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        mut action: Box<dyn SaveLoadAction>,
        types: &TypeRegistry,
        identities: &mut IdentityRegistry,
    ) {
        action.on_init(types, identities);
        debug!(action = action.name(), "registered save/load action");
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Name of the first action refusing a capture.
    pub fn capture_refusal(&self, world: &World) -> Option<String> {
        self.actions
            .iter()
            .find(|a| !a.allow_capture(world))
            .map(|a| a.name().to_string())
    }

    pub fn holds_freeze(&self, world: &World) -> bool {
        self.actions.iter().any(|a| a.holds_freeze(world))
    }

    pub fn on_capture(&mut self, world: &World, snapshot: &Snapshot) {
        for action in &mut self.actions {
            action.on_capture(world, snapshot);
        }
    }

    pub fn on_install(&mut self, world: &mut World, snapshot: &Snapshot) {
        for action in &mut self.actions {
            action.on_install(world, snapshot);
        }
    }

    pub fn on_installed(&mut self, world: &mut World, snapshot: &Snapshot) {
        for action in &mut self.actions {
            action.on_installed(world, snapshot);
        }
    }

    pub fn on_discard(&mut self) {
        for action in &mut self.actions {
            action.on_discard();
        }
    }
}

//! The live simulation the orchestrator snapshots and restores.

use serde::{Deserialize, Serialize};

use crate::copy::FactoryTable;
use crate::graph::{Graph, Node, NodeKey, TypeRegistry, Value};
use crate::identity::IdentityRegistry;

/// Process-wide tunables captured alongside the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ambient {
    pub freeze_timer: f64,
    pub time_rate: f64,
    pub glitch: f64,
    pub anxiety: f64,
    pub game_rate: f64,
}

impl Default for Ambient {
    fn default() -> Self {
        Ambient {
            freeze_timer: 0.0,
            time_rate: 1.0,
            glitch: 0.0,
            anxiety: 0.0,
            game_rate: 1.0,
        }
    }
}

/// Scene flags that gate capture and install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneState {
    pub area: String,
    pub paused: bool,
    pub transitioning: bool,
    pub in_cutscene: bool,
    pub skipping_cutscene: bool,
    /// Simulation halted while an install settles.
    pub frozen: bool,
    pub timer_stopped: bool,
    pub pause_lock: bool,
}

/// Member on timer components counting down once per unfrozen tick.
pub const TIMER_REMAINING: &str = "remaining";

#[derive(Debug, Default)]
pub struct World {
    pub graph: Graph,
    pub types: TypeRegistry,
    pub identities: IdentityRegistry,
    pub factories: FactoryTable,
    pub ambient: Ambient,
    pub scene: SceneState,
    pub tick: u64,
}

impl World {
    pub fn new(types: TypeRegistry, factories: FactoryTable) -> Self {
        World {
            types,
            factories,
            ..World::default()
        }
    }

    pub fn set_root(&mut self, node: Node) -> NodeKey {
        let key = self.graph.insert(node);
        self.graph.set_root(key);
        key
    }

    pub fn root(&self) -> Option<NodeKey> {
        self.graph.root()
    }

    /// Insert an entity into root membership and index its stable id.
    pub fn spawn(&mut self, node: Node) -> NodeKey {
        let id = node.stable_id.clone();
        let key = self.graph.insert(node);
        self.graph.add_entity(key);
        if let Some(id) = id {
            self.identities.register(id, key);
        }
        key
    }

    pub fn spawn_component(&mut self, owner: NodeKey, node: Node) -> NodeKey {
        let key = self.graph.insert(node);
        self.graph.attach_component(owner, key);
        key
    }

    /// Remove an entity and drop its identity entry.
    pub fn despawn(&mut self, key: NodeKey) -> bool {
        match self.graph.despawn(key) {
            Some(node) => {
                if let Some(id) = node.stable_id {
                    if self.identities.lookup(&id) == Some(key) {
                        self.identities.unregister(&id);
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn player(&self) -> Option<NodeKey> {
        self.graph.player()
    }

    /// Advance one tick. Timers count down unless the scene is frozen.
    pub fn step(&mut self) {
        self.tick += 1;
        if self.scene.frozen || self.scene.paused {
            return;
        }
        let timers = self.graph.timers().to_vec();
        for timer in timers {
            if let Some(remaining) = self.graph.member(timer, TIMER_REMAINING).as_int() {
                if remaining > 0 {
                    self.graph
                        .set_member(timer, TIMER_REMAINING, Value::int(remaining - 1));
                }
            }
        }
    }
}

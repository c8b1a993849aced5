//! Lifecycle orchestrator.
//!
//! Holds at most one [`Snapshot`]. `capture` copies the live world into a new
//! snapshot and immediately installs it, so a capture that cannot be restored
//! is found out at once. `install` unloads the participating entities,
//! reconciles the snapshot onto the live world, restores the ambient scalars
//! and enters `Loading`; [`Orchestrator::update`] counts the transition down
//! and performs the closing fix-ups once it completes.
//!
//! Preconditions are checked before anything changes. A refused request
//! returns `false` and leaves the orchestrator and the world as they were.

mod policy;
mod snapshot;

use std::collections::HashSet;

use qs_common::SnapshotId;
use qs_config::{ConfigSnapshot, Settings};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::copy::{CopyError, CopyOutput, CopyScope, CopyStats, Copier};
use crate::graph::{NodeKey, ResourceRef};
use crate::hooks::{ActionRegistry, SaveLoadAction};
use crate::world::World;

pub use policy::{
    capture_set, check_capture, check_install, participates, Rejection, PLAYER_DEAD, PLAYER_MODE,
};
pub use snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// An install is settling; `remaining` update ticks until completion.
    Loading { remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Capture,
    Install,
}

/// Report of the last capture or install request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleOutcome {
    pub op: Operation,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<SnapshotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CopyStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LifecycleOutcome {
    fn accepted(op: Operation, snapshot_id: SnapshotId, stats: CopyStats) -> Self {
        LifecycleOutcome {
            op,
            accepted: true,
            rejection: None,
            snapshot_id: Some(snapshot_id),
            stats: Some(stats),
            error: None,
        }
    }

    fn rejected(op: Operation, rejection: Rejection) -> Self {
        LifecycleOutcome {
            op,
            accepted: false,
            rejection: Some(rejection),
            snapshot_id: None,
            stats: None,
            error: None,
        }
    }

    fn failed(op: Operation, err: &CopyError) -> Self {
        LifecycleOutcome {
            op,
            accepted: false,
            rejection: None,
            snapshot_id: None,
            stats: None,
            error: Some(err.to_string()),
        }
    }

    /// The unified error for a request that was not accepted.
    pub fn to_error(&self) -> Option<qs_common::Error> {
        if self.accepted {
            return None;
        }
        let err = match (&self.rejection, self.op) {
            (Some(Rejection::NothingSaved), _) => qs_common::Error::NothingSaved,
            (Some(r), Operation::Capture) => qs_common::Error::CaptureNotAllowed(r.to_string()),
            (Some(r), Operation::Install) => qs_common::Error::InstallNotAllowed(r.to_string()),
            (None, _) => qs_common::Error::Copy(self.error.clone().unwrap_or_default()),
        };
        Some(err)
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    settings: Settings,
    actions: ActionRegistry,
    snapshot: Option<Snapshot>,
    phase: Phase,
    last_outcome: Option<LifecycleOutcome>,
    /// Audio handles paused by the last install.
    resume_audio: Vec<ResourceRef>,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        Orchestrator {
            settings,
            actions: ActionRegistry::new(),
            snapshot: None,
            phase: Phase::Idle,
            last_outcome: None,
            resume_audio: Vec::new(),
        }
    }

    pub fn from_config(config: &ConfigSnapshot) -> Self {
        info!(
            source = %config.source,
            digest = config.short_digest(),
            "orchestrator configured"
        );
        Orchestrator::new(config.settings.clone())
    }

    /// Register an extension point; its `on_init` runs now.
    pub fn register_action(&mut self, world: &mut World, action: Box<dyn SaveLoadAction>) {
        self.actions
            .register(action, &world.types, &mut world.identities);
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_saved(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&LifecycleOutcome> {
        self.last_outcome.as_ref()
    }

    /// Take a new snapshot of the live world, replacing any previous one,
    /// and install it straight away. Returns whether both succeeded.
    pub fn capture(&mut self, world: &mut World) -> bool {
        if let Err(rejection) = self.capture_allowed(world) {
            return self.reject(Operation::Capture, rejection);
        }
        let Some(root) = world.root() else {
            return self.reject(Operation::Capture, Rejection::NoRoot);
        };

        // The previous snapshot survives a failed capture.
        let entities = capture_set(&world.graph, &self.settings);
        let snapshot = match Snapshot::take(world, root, entities) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(%err, "capture aborted");
                self.last_outcome = Some(LifecycleOutcome::failed(Operation::Capture, &err));
                return false;
            }
        };
        self.discard(world);
        self.actions.on_capture(world, &snapshot);
        info!(
            snapshot = %snapshot.id,
            area = %snapshot.area,
            nodes = snapshot.graph.len(),
            entities = snapshot.entities.len(),
            "state captured"
        );
        self.last_outcome = Some(LifecycleOutcome::accepted(
            Operation::Capture,
            snapshot.id.clone(),
            snapshot.stats,
        ));
        self.snapshot = Some(snapshot);

        self.install(world)
    }

    /// Restore the live world to the current snapshot. The snapshot is kept
    /// and may be installed again.
    pub fn install(&mut self, world: &mut World) -> bool {
        if let Err(rejection) = self.install_allowed(world) {
            return self.reject(Operation::Install, rejection);
        }
        let Some(snapshot) = self.snapshot.take() else {
            return self.reject(Operation::Install, Rejection::NothingSaved);
        };

        self.phase = Phase::Loading {
            remaining: self.settings.transition_ticks,
        };
        self.actions.on_install(world, &snapshot);

        let accepted = match reconcile(world, &snapshot, &self.settings) {
            Ok(out) => {
                world.ambient = snapshot.ambient.clone();
                self.actions.on_installed(world, &snapshot);
                world.scene.frozen = true;
                world.scene.timer_stopped = true;
                self.resume_audio = out.paused_audio;
                info!(
                    snapshot = %snapshot.id,
                    copied = out.stats.copied,
                    reused = out.stats.reused,
                    cloned = out.stats.cloned,
                    failed = out.stats.failed,
                    "state installed"
                );
                self.last_outcome = Some(LifecycleOutcome::accepted(
                    Operation::Install,
                    snapshot.id.clone(),
                    out.stats,
                ));
                true
            }
            Err(err) => {
                error!(snapshot = %snapshot.id, %err, "install aborted");
                self.phase = Phase::Idle;
                self.last_outcome = Some(LifecycleOutcome::failed(Operation::Install, &err));
                false
            }
        };
        self.snapshot = Some(snapshot);
        accepted
    }

    /// Advance the transition by one tick. Returns true on the tick that
    /// completes it.
    pub fn update(&mut self, world: &mut World) -> bool {
        let Phase::Loading { remaining } = self.phase else {
            return false;
        };
        if remaining > 1 {
            self.phase = Phase::Loading {
                remaining: remaining - 1,
            };
            return false;
        }
        self.complete(world);
        true
    }

    /// Drop the snapshot and undo anything an unfinished install left
    /// behind. Safe to call any number of times.
    pub fn discard(&mut self, world: &mut World) {
        let was_loading = matches!(self.phase, Phase::Loading { .. });
        if !self.actions.holds_freeze(world) {
            world.scene.frozen = false;
            world.scene.pause_lock = false;
            if was_loading {
                world.scene.timer_stopped = false;
            }
        }
        self.resume_paused_audio(world);
        if let Some(snapshot) = self.snapshot.take() {
            debug!(snapshot = %snapshot.id, "snapshot discarded");
        }
        self.actions.on_discard();
        self.phase = Phase::Idle;
    }

    /// The scene switched to `area`. Any transition in flight is abandoned;
    /// a snapshot of another area is discarded.
    pub fn on_scene_changed(&mut self, world: &mut World, area: &str) {
        if matches!(self.phase, Phase::Loading { .. }) {
            world.scene.frozen = false;
            world.scene.timer_stopped = false;
            self.resume_paused_audio(world);
            self.phase = Phase::Idle;
        }
        world.scene.area = area.to_string();

        let stale = self.snapshot.as_ref().is_some_and(|s| s.area != area);
        if stale {
            debug!(area, "scene changed; dropping snapshot of another area");
            self.discard(world);
        }
    }

    /// The player died. Installs the snapshot when auto-load is enabled.
    pub fn on_player_died(&mut self, world: &mut World) -> bool {
        if !self.settings.enabled || !self.settings.auto_load_after_death || !self.is_saved() {
            return false;
        }
        info!("player died; restoring saved state");
        self.install(world)
    }

    fn capture_allowed(&self, world: &World) -> Result<(), Rejection> {
        if self.phase != Phase::Idle {
            return Err(Rejection::Busy);
        }
        check_capture(world, &self.settings)?;
        match self.actions.capture_refusal(world) {
            Some(name) => Err(Rejection::ActionRefused(name)),
            None => Ok(()),
        }
    }

    fn install_allowed(&self, world: &World) -> Result<(), Rejection> {
        if self.phase != Phase::Idle {
            return Err(Rejection::Busy);
        }
        check_install(world, &self.settings)
    }

    fn reject(&mut self, op: Operation, rejection: Rejection) -> bool {
        debug!(?op, %rejection, "request rejected");
        self.last_outcome = Some(LifecycleOutcome::rejected(op, rejection));
        false
    }

    /// Transition completion: root state and ambient scalars are applied
    /// again, paused audio resumes and the scene unfreezes.
    fn complete(&mut self, world: &mut World) {
        if let (Some(snapshot), Some(live_root)) = (&self.snapshot, world.root()) {
            let World {
                graph,
                types,
                identities,
                factories,
                ambient,
                ..
            } = &mut *world;
            let mut copier = Copier::reconcile(types, factories, identities, &snapshot.graph, graph);
            if let Err(err) =
                copier.copy_into(live_root, snapshot.root, &CopyScope::simple_and_null())
            {
                warn!(%err, "root state not re-applied at transition end");
            }
            copier.finish();
            *ambient = snapshot.ambient.clone();
        }
        self.resume_paused_audio(world);
        world.scene.frozen = false;
        world.scene.timer_stopped = false;
        self.phase = Phase::Idle;
        debug!("transition complete");
    }

    fn resume_paused_audio(&mut self, world: &mut World) {
        for handle in self.resume_audio.drain(..) {
            if let Some(audio) = world.graph.resources.audio_mut(handle.id) {
                audio.paused = false;
            }
        }
    }
}

/// Structural part of an install: unload, copy, splice, re-index.
fn reconcile(
    world: &mut World,
    snapshot: &Snapshot,
    settings: &Settings,
) -> Result<CopyOutput, CopyError> {
    let live_root = world
        .root()
        .ok_or(CopyError::MissingNode { side: "destination" })?;

    // Unloaded entities stay in the arena so the identity index can hand
    // them back for reuse.
    let unloaded = capture_set(&world.graph, settings);
    for &key in &unloaded {
        world.graph.release(key);
    }
    debug!(unloaded = unloaded.len(), "participating entities unloaded");

    let copied = copy_snapshot(world, snapshot, live_root, settings.restore_audio);
    let (out, restored) = match copied {
        Ok(copied) => copied,
        Err(err) => {
            for &key in &unloaded {
                if world.graph.contains(key) {
                    world.graph.add_entity(key);
                }
            }
            world.identities.clear_overrides();
            return Err(err);
        }
    };

    for &key in &restored {
        world.graph.add_entity(key);
    }
    let kept: HashSet<NodeKey> = out.destinations.iter().copied().collect();
    let mut despawned = 0usize;
    for key in unloaded {
        if !kept.contains(&key) && world.graph.despawn(key).is_some() {
            despawned += 1;
        }
    }
    // Components detached by the copy and not standing for any snapshot node.
    for &key in &out.released {
        let orphaned = world.graph.node(key).is_some_and(|n| n.owner.is_none());
        if orphaned && !kept.contains(&key) && world.graph.despawn(key).is_some() {
            despawned += 1;
        }
    }
    world.identities.rebuild(&world.graph);
    world.identities.clear_overrides();
    debug!(
        restored = restored.len(),
        despawned, "snapshot entities spliced into root"
    );
    Ok(out)
}

fn copy_snapshot(
    world: &mut World,
    snapshot: &Snapshot,
    live_root: NodeKey,
    pause_audio: bool,
) -> Result<(CopyOutput, Vec<NodeKey>), CopyError> {
    let World {
        graph,
        types,
        identities,
        factories,
        ..
    } = &mut *world;
    let mut copier = Copier::reconcile(types, factories, identities, &snapshot.graph, graph)
        .pause_audio(pause_audio);
    copier.copy_into(live_root, snapshot.root, &CopyScope::simple_and_null())?;
    let restored: Vec<NodeKey> = copier
        .copy_roots(&snapshot.root_set())?
        .into_iter()
        .flatten()
        .collect();
    Ok((copier.finish(), restored))
}

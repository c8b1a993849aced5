//! Scripted demo session.
//!
//! Builds a small level, captures it, mutates the live world in ways an
//! install must undo, installs, ticks through the transition and reports
//! what was checked. Used by the `demo` subcommand and the integration
//! tests.

use qs_common::{SnapshotId, StableId};
use qs_config::Settings;
use serde::Serialize;
use tracing::{debug, info};

use crate::actions::{CarryFieldsAction, PendingPathAction};
use crate::copy::{CopyStats, FactoryTable, RenderIndexFactory, TimerFactory};
use crate::graph::{
    AudioHandle, Callback, Frame, MemberKind, Node, NodeKey, NodeKind, ResourceRef,
    RoutineStack, SchemaError, Sequence, Tags, TypeRegistry, TypeSchema, Value,
};
use crate::lifecycle::{LifecycleOutcome, Orchestrator, Phase, PLAYER_DEAD, PLAYER_MODE};
use crate::world::{World, TIMER_REMAINING};

pub const AREA: &str = "demo-00";

pub const LEVEL: &str = "Level";
pub const PLAYER: &str = "Player";
pub const SPRING: &str = "Spring";
pub const BOOSTER: &str = "Booster";
pub const FLOATY: &str = "FloatyBlock";
pub const TILES: &str = "SolidTiles";
pub const HUD: &str = "HudOverlay";
pub const GHOST: &str = "Net.Ghost";
pub const RENDERER: &str = "LightningRenderer";
pub const LIGHT: &str = "Light";
pub const TIMER: &str = "Timer";
pub const SOUND: &str = "Sound";

/// Upper bound on ticks spent waiting for a transition.
const SETTLE_LIMIT: u32 = 10_000;

/// Type registry of the demo level.
pub fn demo_types() -> Result<TypeRegistry, SchemaError> {
    let mut types = TypeRegistry::new();
    types.register(
        TypeSchema::new(LEVEL, NodeKind::Root)
            .simple("time")
            .simple("wind")
            .simple("flash"),
    )?;

    types.register(
        TypeSchema::new("Entity", NodeKind::Entity)
            .simple("x")
            .simple("y")
            .simple("active"),
    )?;
    types.register(
        TypeSchema::new(PLAYER, NodeKind::Entity)
            .parent("Entity")
            .simple(PLAYER_DEAD)
            .simple(PLAYER_MODE)
            .simple("speed")
            .reference("holding")
            .field("routine", MemberKind::Routine)
            .field("on_land", MemberKind::Callback),
    )?;
    types.register(
        TypeSchema::new(SPRING, NodeKind::Entity)
            .parent("Entity")
            .simple("power"),
    )?;
    types.register(
        TypeSchema::new(BOOSTER, NodeKind::Entity)
            .parent("Entity")
            .list_of_simple("nodes")
            .simple("node_index"),
    )?;
    types.register(
        TypeSchema::new(FLOATY, NodeKind::Entity)
            .parent("Entity")
            .simple("sink")
            .list_of_complex("group"),
    )?;
    types.register(
        TypeSchema::new(TILES, NodeKind::Entity)
            .parent("Entity")
            .list_of_simple("grid")
            .singleton(),
    )?;
    types.register(
        TypeSchema::new(HUD, NodeKind::Entity)
            .parent("Entity")
            .simple("score"),
    )?;
    types.register(TypeSchema::new(GHOST, NodeKind::Entity).parent("Entity"))?;
    types.register(
        TypeSchema::new(RENDERER, NodeKind::Entity)
            .parent("Entity")
            .reference("texture"),
    )?;

    types.register(TypeSchema::new("Component", NodeKind::Component).simple("active"))?;
    types.register(
        TypeSchema::new(LIGHT, NodeKind::Component)
            .parent("Component")
            .simple("alpha")
            .simple("radius")
            .simple("render_index")
            .shallow_restore(&["alpha"]),
    )?;
    types.register(
        TypeSchema::new(TIMER, NodeKind::Component)
            .parent("Component")
            .simple(TIMER_REMAINING)
            .field("on_done", MemberKind::Callback),
    )?;
    types.register(
        TypeSchema::new(SOUND, NodeKind::Component)
            .parent("Component")
            .reference("handle")
            .findable(),
    )?;
    Ok(types)
}

pub fn demo_factories() -> FactoryTable {
    let mut factories = FactoryTable::new();
    factories.register(LIGHT, RenderIndexFactory::new("render_index"));
    factories.register(TIMER, TimerFactory);
    factories
}

fn id(seq: u32) -> StableId {
    StableId::new(AREA, seq)
}

/// The demo world plus handles to the nodes the script pokes at.
#[derive(Debug)]
pub struct DemoWorld {
    pub world: World,
    pub player: NodeKey,
    pub spring: NodeKey,
    pub booster: NodeKey,
    pub floaty: (NodeKey, NodeKey),
    pub tiles: NodeKey,
    pub hud: NodeKey,
    pub ghost: NodeKey,
    pub renderer: NodeKey,
    pub audio: ResourceRef,
    pub texture: ResourceRef,
}

impl DemoWorld {
    pub fn build() -> Result<Self, SchemaError> {
        let mut world = World::new(demo_types()?, demo_factories());
        world.scene.area = AREA.to_string();
        world.set_root(
            Node::new(LEVEL, NodeKind::Root)
                .with("time", Value::int(100))
                .with("wind", Value::vec2(0.0, 0.0))
                .with("flash", Value::bool(false)),
        );

        let spring = world.spawn(
            Node::new(SPRING, NodeKind::Entity)
                .with_id(id(1))
                .with("x", Value::float(64.0))
                .with("y", Value::float(120.0))
                .with("power", Value::float(1.5)),
        );
        let timer = world.spawn_component(
            spring,
            Node::new(TIMER, NodeKind::Component)
                .with(TIMER_REMAINING, Value::int(30))
                .with("on_done", Value::Callback(Callback::unbound("spring_reset"))),
        );
        world.graph.register_timer(timer);
        world.spawn_component(
            spring,
            Node::new(LIGHT, NodeKind::Component)
                .with("alpha", Value::float(0.8))
                .with("radius", Value::float(32.0))
                .with("render_index", Value::int(3)),
        );

        let player = world.spawn(
            Node::new(PLAYER, NodeKind::Entity)
                .with_id(id(0))
                .with_tags(Tags {
                    player: true,
                    ..Tags::default()
                })
                .with("x", Value::float(4.0))
                .with("y", Value::float(160.0))
                .with(PLAYER_MODE, Value::int(0))
                .with("speed", Value::float(90.0))
                .with("holding", Value::Node(spring))
                .with(
                    "routine",
                    Value::Routine(RoutineStack::new(vec![
                        Frame::new("dash", 2).with_local(Value::Node(spring))
                    ])),
                )
                .with(
                    "on_land",
                    Value::Callback(Callback::bound("land_on_spring", spring)),
                ),
        );
        let audio = world
            .graph
            .resources
            .add_audio(AudioHandle::playing("event:/player/dash", 120));
        world.spawn_component(
            player,
            Node::new(SOUND, NodeKind::Component).with("handle", Value::Resource(audio)),
        );

        world.spawn(
            Node::new(SPRING, NodeKind::Entity)
                .with_id(id(2))
                .with("x", Value::float(200.0))
                .with("power", Value::float(1.0)),
        );
        let booster = world.spawn(
            Node::new(BOOSTER, NodeKind::Entity)
                .with_id(id(3))
                .with(
                    "nodes",
                    Value::Seq(Sequence::list(vec![
                        Value::vec2(0.0, 0.0),
                        Value::vec2(40.0, -16.0),
                        Value::vec2(80.0, -48.0),
                    ])),
                )
                .with("node_index", Value::int(1)),
        );

        let floaty_a = world.spawn(
            Node::new(FLOATY, NodeKind::Entity)
                .with_id(id(4))
                .with("sink", Value::float(0.0))
                .with("sink_offset", Value::float(0.5)),
        );
        let floaty_b = world.spawn(
            Node::new(FLOATY, NodeKind::Entity)
                .with_id(id(5))
                .with("sink", Value::float(0.0))
                .with("sink_offset", Value::float(0.5)),
        );
        let group = Value::Seq(Sequence::list(vec![
            Value::Node(floaty_a),
            Value::Node(floaty_b),
        ]));
        world.graph.set_member(floaty_a, "group", group.clone());
        world.graph.set_member(floaty_b, "group", group);

        let tiles = world.spawn(
            Node::new(TILES, NodeKind::Entity).with(
                "grid",
                Value::Seq(Sequence::array(vec![Value::int(1), Value::int(0)])),
            ),
        );
        let hud = world.spawn(
            Node::new(HUD, NodeKind::Entity)
                .with_id(id(6))
                .with_tags(Tags {
                    global: true,
                    ..Tags::default()
                })
                .with("score", Value::int(1)),
        );
        let ghost = world.spawn(
            Node::new(GHOST, NodeKind::Entity)
                .with_id(id(7))
                .with("x", Value::float(10.0)),
        );
        let texture = world.graph.resources.add_texture("textures/lightning.png");
        let renderer = world.spawn(
            Node::new(RENDERER, NodeKind::Entity)
                .with_id(id(8))
                .with_tags(Tags {
                    renderer: true,
                    ..Tags::default()
                })
                .with("texture", Value::Resource(texture)),
        );

        Ok(DemoWorld {
            world,
            player,
            spring,
            booster,
            floaty: (floaty_a, floaty_b),
            tiles,
            hud,
            ghost,
            renderer,
            audio,
            texture,
        })
    }

    /// Live entity carrying the given demo stable id.
    pub fn entity(&self, seq: u32) -> Option<NodeKey> {
        let wanted = id(seq);
        self.world.graph.entities().iter().copied().find(|k| {
            self.world
                .graph
                .node(*k)
                .is_some_and(|n| n.stable_id.as_ref() == Some(&wanted))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoCheck {
    pub name: &'static str,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub area: String,
    pub captured: bool,
    pub rejected_mid_transition: bool,
    pub installed: bool,
    pub snapshot_id: Option<SnapshotId>,
    pub capture_stats: Option<CopyStats>,
    pub install: Option<LifecycleOutcome>,
    pub settle_ticks: u32,
    pub entities_before: usize,
    pub entities_after: usize,
    pub discarded: bool,
    pub checks: Vec<DemoCheck>,
}

impl DemoReport {
    pub fn all_passed(&self) -> bool {
        self.captured
            && self.installed
            && self.rejected_mid_transition
            && self.discarded
            && self.checks.iter().all(|c| c.passed)
    }

    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name)
            .collect()
    }
}

/// Step the world until the orchestrator's transition completes.
pub fn settle(orch: &mut Orchestrator, world: &mut World) -> u32 {
    let mut ticks = 0;
    while matches!(orch.phase(), Phase::Loading { .. }) && ticks < SETTLE_LIMIT {
        world.step();
        ticks += 1;
        if orch.update(world) {
            break;
        }
    }
    ticks
}

pub fn run_demo(settings: Settings) -> Result<DemoReport, qs_common::Error> {
    let mut demo = DemoWorld::build()?;
    let mut orch = Orchestrator::new(settings);
    orch.register_action(
        &mut demo.world,
        Box::new(CarryFieldsAction::new(FLOATY, &["sink_offset"])),
    );
    orch.register_action(
        &mut demo.world,
        Box::new(PendingPathAction::new(BOOSTER, "nodes", "node_index")),
    );

    let entities_before = demo.world.graph.entities().len();
    let captured = orch.capture(&mut demo.world);
    if !captured {
        return Err(refusal(&orch));
    }
    let rejected_mid_transition = !orch.capture(&mut demo.world);
    settle(&mut orch, &mut demo.world);
    info!(captured, "demo state captured");

    mutate(&mut demo);

    let installed = orch.install(&mut demo.world);
    if !installed {
        return Err(refusal(&orch));
    }
    let install = orch.last_outcome().cloned();
    let settle_ticks = settle(&mut orch, &mut demo.world);
    let checks = verify(&demo);
    let entities_after = demo.world.graph.entities().len();

    let snapshot_id = orch.snapshot().map(|s| s.id.clone());
    let capture_stats = orch.snapshot().map(|s| s.stats);
    orch.discard(&mut demo.world);
    orch.discard(&mut demo.world);
    let discarded = !orch.is_saved() && orch.phase() == Phase::Idle && !demo.world.scene.frozen;

    Ok(DemoReport {
        area: AREA.to_string(),
        captured,
        rejected_mid_transition,
        installed,
        snapshot_id,
        capture_stats,
        install,
        settle_ticks,
        entities_before,
        entities_after,
        discarded,
        checks,
    })
}

fn refusal(orch: &Orchestrator) -> qs_common::Error {
    orch.last_outcome()
        .and_then(LifecycleOutcome::to_error)
        .unwrap_or_else(|| qs_common::Error::Copy("request refused without an outcome".to_string()))
}

/// Changes an install has to undo, plus some it must leave alone.
fn mutate(demo: &mut DemoWorld) {
    let world = &mut demo.world;
    if let Some(root) = world.root() {
        world.graph.set_member(root, "time", Value::int(500));
    }
    world.graph.set_member(demo.player, "x", Value::float(300.0));
    world.graph.set_member(demo.player, "holding", Value::Null);
    world.graph.set_member(demo.booster, "node_index", Value::int(2));
    world.graph.set_member(demo.floaty.0, "sink_offset", Value::float(3.0));
    world.graph.set_member(demo.ghost, "x", Value::float(55.0));
    world.graph.set_member(demo.hud, "score", Value::int(2));
    if let Some(handle) = world.graph.resources.audio_mut(demo.audio.id) {
        handle.position_ms = 900;
    }

    world.despawn(demo.spring);
    world.spawn(
        Node::new(SPRING, NodeKind::Entity)
            .with_id(id(9))
            .with("x", Value::float(1.0)),
    );
    debug!("demo world mutated");
}

fn verify(demo: &DemoWorld) -> Vec<DemoCheck> {
    let world = &demo.world;
    let graph = &world.graph;
    let restored_spring = demo.entity(1);
    let mut checks = Vec::new();
    let mut check = |name: &'static str, passed: bool| checks.push(DemoCheck { name, passed });

    let root_time = world.root().and_then(|r| graph.member(r, "time").as_int());
    check("root_state_restored", root_time == Some(100));
    check("player_reused", world.player() == Some(demo.player));
    check(
        "player_position_restored",
        graph.member(demo.player, "x").as_float() == Some(4.0),
    );
    check(
        "despawned_spring_recreated",
        restored_spring.is_some_and(|k| k != demo.spring),
    );
    check(
        "reference_follows_recreated_spring",
        restored_spring.is_some()
            && graph.member(demo.player, "holding").as_node() == restored_spring,
    );
    let routine_local = graph
        .member(demo.player, "routine")
        .as_routine()
        .and_then(|r| r.top())
        .and_then(|f| f.locals.first())
        .and_then(Value::as_node);
    check(
        "routine_local_shares_spring",
        restored_spring.is_some() && routine_local == restored_spring,
    );
    let callback_receiver = match graph.member(demo.player, "on_land") {
        Value::Callback(cb) => cb.receiver,
        _ => None,
    };
    check(
        "callback_rebound_to_spring",
        restored_spring.is_some() && callback_receiver == restored_spring,
    );

    let timer = restored_spring.and_then(|k| graph.find_component(k, &TIMER.into(), 0));
    check(
        "cloned_timer_registered",
        timer.is_some_and(|t| {
            graph.timers().contains(&t) && graph.member(t, TIMER_REMAINING).as_int() == Some(30)
        }),
    );
    check(
        "no_detached_timers",
        graph.timers().iter().all(|t| graph.is_attached(*t)),
    );
    let light = restored_spring.and_then(|k| graph.find_component(k, &LIGHT.into(), 0));
    check(
        "cloned_light_render_index_reset",
        light.is_some_and(|l| {
            graph.member(l, "render_index").as_int() == Some(-1)
                && graph.member(l, "alpha").as_float() == Some(0.8)
        }),
    );

    check("extra_entity_removed", demo.entity(9).is_none());
    check(
        "global_entity_untouched",
        graph.entities().contains(&demo.hud) && graph.member(demo.hud, "score").as_int() == Some(2),
    );
    check(
        "ignored_entity_untouched",
        graph.member(demo.ghost, "x").as_float() == Some(55.0),
    );

    let (a, b) = demo.floaty;
    let group = Value::Seq(Sequence::list(vec![Value::Node(a), Value::Node(b)]));
    check(
        "floaty_group_shared",
        graph.member(a, "group") == &group && graph.member(b, "group") == &group,
    );
    check(
        "carry_field_reapplied",
        graph.member(a, "sink_offset").as_float() == Some(0.5),
    );
    check(
        "booster_path_trimmed",
        graph.member(demo.booster, "nodes").as_seq().map(Sequence::len) == Some(2)
            && graph.member(demo.booster, "node_index").as_int() == Some(0),
    );
    check(
        "singleton_reused",
        graph.first_of_type(&TILES.into()) == Some(demo.tiles) && graph.is_attached(demo.tiles),
    );
    check(
        "audio_restored_and_resumed",
        graph
            .resources
            .audio(demo.audio.id)
            .is_some_and(|a| a.position_ms == 120 && a.is_audible()),
    );
    check(
        "texture_shared",
        graph.member(demo.renderer, "texture") == &Value::Resource(demo.texture)
            && graph.resources.texture(demo.texture.id).is_some(),
    );
    check(
        "renderer_last",
        graph
            .entities()
            .iter()
            .rev()
            .find(|k| graph.node(**k).is_some_and(|n| !n.tags.global && n.type_tag.as_str() != GHOST))
            == Some(&demo.renderer),
    );
    check("scene_unfrozen", !world.scene.frozen && !world.scene.timer_stopped);
    checks
}

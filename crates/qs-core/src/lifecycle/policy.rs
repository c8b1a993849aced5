//! Which live nodes take part in capture and install, and whether a capture
//! may start.

use qs_config::Settings;
use serde::Serialize;

use crate::graph::{Graph, Node, NodeKey};
use crate::world::World;

/// Player member holding the death flag.
pub const PLAYER_DEAD: &str = "dead";
/// Player member holding the current state-machine mode.
pub const PLAYER_MODE: &str = "state";

/// Why a capture or install was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Rejection {
    Disabled,
    Busy,
    NoRoot,
    Paused,
    Transitioning,
    InCutscene,
    NoPlayer,
    PlayerDead,
    DisallowedMode(i64),
    ActionRefused(String),
    NothingSaved,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Disabled => write!(f, "save/load disabled"),
            Rejection::Busy => write!(f, "an install is still settling"),
            Rejection::NoRoot => write!(f, "no live root"),
            Rejection::Paused => write!(f, "root is paused"),
            Rejection::Transitioning => write!(f, "root is mid-transition"),
            Rejection::InCutscene => write!(f, "cutscene in progress"),
            Rejection::NoPlayer => write!(f, "no player"),
            Rejection::PlayerDead => write!(f, "player is dead"),
            Rejection::DisallowedMode(mode) => write!(f, "player mode {mode} is disallowed"),
            Rejection::ActionRefused(name) => write!(f, "refused by action {name}"),
            Rejection::NothingSaved => write!(f, "nothing saved"),
        }
    }
}

/// Whether a live node is snapshotted and restored at all.
pub fn participates(node: &Node, settings: &Settings) -> bool {
    if node.tags.ignore_save_load || settings.is_ignored_type(node.type_tag.as_str()) {
        return false;
    }
    !node.tags.global || settings.is_global_exception(node.type_tag.as_str())
}

/// Participating entities in root membership: the player first, renderers
/// last, everything else in membership order.
pub fn capture_set(graph: &Graph, settings: &Settings) -> Vec<NodeKey> {
    let mut player = None;
    let mut body = Vec::new();
    let mut renderers = Vec::new();

    for &key in graph.entities() {
        let Some(node) = graph.node(key) else {
            continue;
        };
        if !participates(node, settings) {
            continue;
        }
        if node.tags.player && player.is_none() {
            player = Some(key);
        } else if node.tags.renderer {
            renderers.push(key);
        } else {
            body.push(key);
        }
    }

    player.into_iter().chain(body).chain(renderers).collect()
}

/// Scene and player conditions for a capture; the orchestrator checks its
/// own phase and the registered actions separately.
pub fn check_capture(world: &World, settings: &Settings) -> Result<(), Rejection> {
    if !settings.enabled {
        return Err(Rejection::Disabled);
    }
    if world.root().is_none() {
        return Err(Rejection::NoRoot);
    }
    let scene = &world.scene;
    if scene.paused {
        return Err(Rejection::Paused);
    }
    if scene.transitioning {
        return Err(Rejection::Transitioning);
    }
    if scene.in_cutscene || scene.skipping_cutscene {
        return Err(Rejection::InCutscene);
    }

    let player = world.player().ok_or(Rejection::NoPlayer)?;
    if world.graph.member(player, PLAYER_DEAD).as_bool() == Some(true) {
        return Err(Rejection::PlayerDead);
    }
    if let Some(mode) = world.graph.member(player, PLAYER_MODE).as_int() {
        if settings.is_disallowed_mode(mode) {
            return Err(Rejection::DisallowedMode(mode));
        }
    }
    Ok(())
}

/// Scene conditions for an install.
pub fn check_install(world: &World, settings: &Settings) -> Result<(), Rejection> {
    if !settings.enabled {
        return Err(Rejection::Disabled);
    }
    if world.root().is_none() {
        return Err(Rejection::NoRoot);
    }
    if world.scene.paused {
        return Err(Rejection::Paused);
    }
    if world.scene.transitioning {
        return Err(Rejection::Transitioning);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, Tags, Value};

    fn tagged(tag: &str, tags: Tags) -> Node {
        Node::new(tag, NodeKind::Entity).with_tags(tags)
    }

    #[test]
    fn capture_set_orders_player_first_renderers_last() {
        let settings = Settings::default();
        let mut graph = Graph::new();
        let renderer = graph.insert(tagged(
            "LightningRenderer",
            Tags {
                renderer: true,
                ..Tags::default()
            },
        ));
        let spring = graph.insert(tagged("Spring", Tags::default()));
        let player = graph.insert(tagged(
            "Player",
            Tags {
                player: true,
                ..Tags::default()
            },
        ));
        for key in [renderer, spring, player] {
            graph.add_entity(key);
        }
        assert_eq!(capture_set(&graph, &settings), vec![player, spring, renderer]);
    }

    #[test]
    fn global_ignored_and_prefixed_types_excluded() {
        let settings = Settings {
            global_exceptions: vec!["CassetteManager".to_string()],
            ..Settings::default()
        };
        let global = Tags {
            global: true,
            ..Tags::default()
        };
        let mut graph = Graph::new();
        let hud = graph.insert(tagged("Hud", global));
        let cassette = graph.insert(tagged("CassetteManager", global));
        let confetti = graph.insert(tagged(
            "Confetti",
            Tags {
                ignore_save_load: true,
                ..Tags::default()
            },
        ));
        let ghost = graph.insert(tagged("Net.Ghost", Tags::default()));
        for key in [hud, cassette, confetti, ghost] {
            graph.add_entity(key);
        }
        assert_eq!(capture_set(&graph, &settings), vec![cassette]);
    }

    #[test]
    fn capture_checks_player_state() {
        let settings = Settings {
            disallowed_modes: vec![11],
            ..Settings::default()
        };
        let mut world = World::default();
        world.set_root(Node::new("Level", NodeKind::Root));
        assert_eq!(check_capture(&world, &settings), Err(Rejection::NoPlayer));

        let player = world.spawn(tagged(
            "Player",
            Tags {
                player: true,
                ..Tags::default()
            },
        ));
        assert_eq!(check_capture(&world, &settings), Ok(()));

        world.graph.set_member(player, PLAYER_MODE, Value::int(11));
        assert_eq!(
            check_capture(&world, &settings),
            Err(Rejection::DisallowedMode(11))
        );

        world.graph.set_member(player, PLAYER_DEAD, Value::bool(true));
        assert_eq!(check_capture(&world, &settings), Err(Rejection::PlayerDead));

        world.scene.transitioning = true;
        assert_eq!(check_capture(&world, &settings), Err(Rejection::Transitioning));
        assert_eq!(check_install(&world, &settings), Err(Rejection::Transitioning));
    }
}

//! quicksave core: in-memory snapshot and restore of a live simulation graph.
//!
//! This crate provides:
//! - An arena-backed object graph with a closed type registry
//! - A graph copy engine that preserves sharing and absorbs cycles
//! - A reconciling cloner that reuses live nodes before cloning new ones
//! - A lifecycle orchestrator driving capture, install and discard
//! - Extension points for per-type fix-ups

pub mod actions;
pub mod config_cli;
pub mod copy;
pub mod demo;
pub mod exit_codes;
pub mod graph;
pub mod hooks;
pub mod identity;
pub mod lifecycle;
pub mod world;

pub use copy::{CopyError, CopyScope, CopyStats, Copier};
pub use graph::{Graph, Node, NodeKey, NodeKind, TypeRegistry, TypeSchema, Value};
pub use hooks::{ActionRegistry, SaveLoadAction};
pub use identity::{IdentityRegistry, Verdict};
pub use lifecycle::{Orchestrator, Phase, Rejection, Snapshot};
pub use world::World;

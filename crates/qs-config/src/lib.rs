//! quicksave settings loading and validation.
//!
//! This crate provides:
//! - Typed `Settings` for the snapshot orchestrator
//! - Settings resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//! - Config snapshots for log correlation

pub mod resolve;
pub mod settings;
pub mod snapshot;
pub mod validate;

pub use resolve::{load_settings, resolve_settings, ConfigError, ConfigSource, SETTINGS_ENV};
pub use settings::Settings;
pub use snapshot::ConfigSnapshot;
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for settings files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

//! Orchestrator settings.
//!
//! Every field has a default so that partial files are accepted; unknown
//! fields are rejected to surface typos early.

use serde::{Deserialize, Serialize};

/// Complete settings for the snapshot orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Master switch. When false, capture and install are refused.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Install the current snapshot automatically when the player dies.
    #[serde(default)]
    pub auto_load_after_death: bool,

    /// Length of the transition effect scheduled at the end of install,
    /// in update ticks.
    #[serde(default = "default_transition_ticks")]
    pub transition_ticks: u32,

    /// Player state-machine modes during which capture is refused
    /// (intro walks, cutscene flights, ...).
    #[serde(default)]
    pub disallowed_modes: Vec<i64>,

    /// Type tag prefixes never captured (third-party overlay entities).
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_type_prefixes: Vec<String>,

    /// Types tagged global that still take part in capture and install.
    #[serde(default)]
    pub global_exceptions: Vec<String>,

    /// Pause restored audio handles and resume them when the transition ends.
    #[serde(default = "default_true")]
    pub restore_audio: bool,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_transition_ticks() -> u32 {
    20
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["Net.".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            schema_version: default_schema_version(),
            enabled: true,
            auto_load_after_death: false,
            transition_ticks: default_transition_ticks(),
            disallowed_modes: Vec::new(),
            ignored_type_prefixes: default_ignored_prefixes(),
            global_exceptions: Vec::new(),
            restore_audio: true,
        }
    }
}

impl Settings {
    /// Whether the given type tag matches one of the ignored prefixes.
    pub fn is_ignored_type(&self, type_tag: &str) -> bool {
        self.ignored_type_prefixes
            .iter()
            .any(|prefix| type_tag.starts_with(prefix.as_str()))
    }

    /// Whether a global-tagged node of this type still participates.
    pub fn is_global_exception(&self, type_tag: &str) -> bool {
        self.global_exceptions.iter().any(|t| t == type_tag)
    }

    /// Whether the player mode forbids capture.
    pub fn is_disallowed_mode(&self, mode: i64) -> bool {
        self.disallowed_modes.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str("transition_ticks = 5\n").unwrap();
        assert_eq!(settings.transition_ticks, 5);
        assert!(settings.enabled);
        assert!(settings.restore_audio);
        assert_eq!(settings.ignored_type_prefixes, vec!["Net.".to_string()]);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = toml::from_str::<Settings>("transition_tick = 5\n");
        assert!(err.is_err());
    }

    #[test]
    fn prefix_and_exception_matching() {
        let settings = Settings {
            global_exceptions: vec!["CassetteManager".to_string()],
            disallowed_modes: vec![13, 14],
            ..Settings::default()
        };
        assert!(settings.is_ignored_type("Net.Ghost"));
        assert!(!settings.is_ignored_type("Spring"));
        assert!(settings.is_global_exception("CassetteManager"));
        assert!(settings.is_disallowed_mode(14));
        assert!(!settings.is_disallowed_mode(0));
    }
}

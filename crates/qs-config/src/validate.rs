//! Semantic validation of settings.
//!
//! Parsing already enforces types; these checks catch values that parse but
//! cannot work.

use serde::Serialize;

use crate::settings::Settings;

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported schema version {found} (expected major {expected})")]
    SchemaVersion { found: String, expected: String },

    #[error("transition_ticks must be at least 1")]
    ZeroTransition,

    #[error("ignored_type_prefixes[{index}] is empty and would ignore every type")]
    EmptyPrefix { index: usize },

    #[error("global_exceptions[{index}] is empty")]
    EmptyException { index: usize },

    #[error("disallowed mode {mode} listed more than once")]
    DuplicateMode { mode: i64 },
}

/// Outcome of validation: every problem found, not just the first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate settings semantically.
pub fn validate(settings: &Settings) -> ValidationResult {
    let mut errors = Vec::new();

    if !qs_common::schema::is_compatible(&settings.schema_version) {
        errors.push(ValidationError::SchemaVersion {
            found: settings.schema_version.clone(),
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
        });
    }

    if settings.transition_ticks == 0 {
        errors.push(ValidationError::ZeroTransition);
    }

    for (index, prefix) in settings.ignored_type_prefixes.iter().enumerate() {
        if prefix.trim().is_empty() {
            errors.push(ValidationError::EmptyPrefix { index });
        }
    }

    for (index, name) in settings.global_exceptions.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyException { index });
        }
    }

    let mut seen = std::collections::HashSet::new();
    for mode in &settings.disallowed_modes {
        if !seen.insert(*mode) {
            errors.push(ValidationError::DuplicateMode { mode: *mode });
        }
    }

    ValidationResult { errors }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(validate(&Settings::default()).is_valid());
    }

    #[test]
    fn collects_every_problem() {
        let settings = Settings {
            schema_version: "2.0.0".to_string(),
            transition_ticks: 0,
            ignored_type_prefixes: vec!["Net.".to_string(), " ".to_string()],
            global_exceptions: vec![String::new()],
            disallowed_modes: vec![4, 4],
            ..Settings::default()
        };
        let result = validate(&settings);
        assert_eq!(result.errors.len(), 5);
        assert!(result.errors.contains(&ValidationError::ZeroTransition));
        assert!(result
            .errors
            .contains(&ValidationError::EmptyPrefix { index: 1 }));
        assert!(result
            .errors
            .contains(&ValidationError::DuplicateMode { mode: 4 }));
    }
}

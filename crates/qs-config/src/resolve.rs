//! Settings resolution.
//!
//! Lookup order, first hit wins:
//! 1. Explicit path (CLI `--config`)
//! 2. `QS_CONFIG` environment variable
//! 3. `$XDG_CONFIG_HOME/quicksave/settings.toml`
//! 4. Built-in defaults
//!
//! An explicit path or env path that does not exist is an error; a missing
//! XDG file silently falls through to the defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::settings::Settings;
use crate::validate::{validate, ValidationError};

/// Environment variable naming a settings file.
pub const SETTINGS_ENV: &str = "QS_CONFIG";

/// Errors from loading or resolving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON parse error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported settings format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("settings failed validation: {}", format_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ConfigError> for qs_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(_) | ConfigError::Toml { .. } | ConfigError::Json { .. } => {
                qs_common::Error::InvalidSettings(err.to_string())
            }
            other => qs_common::Error::Config(other.to_string()),
        }
    }
}

/// Where the resolved settings came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ConfigSource {
    Cli(PathBuf),
    Env(PathBuf),
    Xdg(PathBuf),
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Cli(p) => write!(f, "cli:{}", p.display()),
            ConfigSource::Env(p) => write!(f, "env:{}", p.display()),
            ConfigSource::Xdg(p) => write!(f, "xdg:{}", p.display()),
            ConfigSource::Default => write!(f, "default"),
        }
    }
}

/// Load and validate a settings file. The format is chosen by extension
/// (`.toml` or `.json`).
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let settings: Settings = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?,
        Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    let result = validate(&settings);
    if !result.is_valid() {
        return Err(ConfigError::Invalid(result.errors));
    }
    Ok(settings)
}

/// Default XDG settings path, if a config directory exists on this platform.
pub fn xdg_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("quicksave").join("settings.toml"))
}

/// Resolve settings using the process environment.
pub fn resolve_settings(cli: Option<&Path>) -> Result<(Settings, ConfigSource), ConfigError> {
    let env = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
    resolve_settings_from(cli, env, xdg_settings_path())
}

/// Resolve settings from explicit inputs.
pub fn resolve_settings_from(
    cli: Option<&Path>,
    env: Option<PathBuf>,
    xdg: Option<PathBuf>,
) -> Result<(Settings, ConfigSource), ConfigError> {
    if let Some(path) = cli {
        return Ok((load_settings(path)?, ConfigSource::Cli(path.to_path_buf())));
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        let settings = load_settings(&path)?;
        return Ok((settings, ConfigSource::Env(path)));
    }
    if let Some(path) = xdg.filter(|p| p.exists()) {
        let settings = load_settings(&path)?;
        return Ok((settings, ConfigSource::Xdg(path)));
    }
    Ok((Settings::default(), ConfigSource::Default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_nothing_configured() {
        let (settings, source) = resolve_settings_from(None, None, None).unwrap();
        assert_eq!(source, ConfigSource::Default);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn cli_path_wins_over_env() {
        let temp = TempDir::new().unwrap();
        let cli = temp.path().join("cli.toml");
        let env = temp.path().join("env.toml");
        fs::write(&cli, "transition_ticks = 3\n").unwrap();
        fs::write(&env, "transition_ticks = 9\n").unwrap();

        let (settings, source) =
            resolve_settings_from(Some(cli.as_path()), Some(env), None).unwrap();
        assert_eq!(settings.transition_ticks, 3);
        assert_eq!(source, ConfigSource::Cli(cli));
    }

    #[test]
    fn env_path_used_before_xdg() {
        let temp = TempDir::new().unwrap();
        let env = temp.path().join("env.json");
        let xdg = temp.path().join("settings.toml");
        fs::write(&env, r#"{"transition_ticks": 7}"#).unwrap();
        fs::write(&xdg, "transition_ticks = 11\n").unwrap();

        let (settings, source) = resolve_settings_from(None, Some(env.clone()), Some(xdg)).unwrap();
        assert_eq!(settings.transition_ticks, 7);
        assert_eq!(source, ConfigSource::Env(env));
    }

    #[test]
    fn missing_xdg_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let xdg = temp.path().join("absent.toml");
        let (_, source) = resolve_settings_from(None, None, Some(xdg)).unwrap();
        assert_eq!(source, ConfigSource::Default);
    }

    #[test]
    fn missing_cli_path_is_error() {
        let temp = TempDir::new().unwrap();
        let cli = temp.path().join("absent.toml");
        let err = resolve_settings_from(Some(cli.as_path()), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn invalid_settings_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        fs::write(&path, "transition_ticks = 0\n").unwrap();
        let err = load_settings(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let unified: qs_common::Error = err.into();
        assert_eq!(unified.code(), 11);
    }

    #[test]
    fn unsupported_extension_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.yaml");
        fs::write(&path, "enabled: true\n").unwrap();
        assert!(matches!(
            load_settings(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}

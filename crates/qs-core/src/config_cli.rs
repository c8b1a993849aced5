//! CLI commands for settings inspection.
//!
//! `config show` prints the resolved settings with their provenance;
//! `config validate` checks a settings file and lists every problem found.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use qs_common::SCHEMA_VERSION;
use qs_config::{load_settings, resolve_settings, ConfigError, ConfigSnapshot};

use crate::exit_codes::ExitCode;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the resolved settings and where they came from
    Show,
    /// Validate a settings file (.toml or .json)
    Validate {
        /// Path to the settings file
        path: PathBuf,
    },
}

/// Run the config command dispatcher
pub fn run_config(config_path: Option<&Path>, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(config_path),
        ConfigCommands::Validate { path } => run_config_validate(path),
    }
}

fn run_config_show(config_path: Option<&Path>) -> ExitCode {
    let (settings, source) = match resolve_settings(config_path) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("config show: {}", e);
            return ExitCode::ConfigError;
        }
    };
    let snapshot = ConfigSnapshot::new(settings, source);
    let output = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "source": snapshot.source,
        "digest": snapshot.digest,
        "resolved_at": snapshot.resolved_at,
        "settings": snapshot.settings,
    });
    print_json(&output)
}

fn run_config_validate(path: &Path) -> ExitCode {
    let (valid, errors, code) = match load_settings(path) {
        Ok(_) => (true, Vec::new(), ExitCode::Clean),
        Err(ConfigError::Invalid(errors)) => {
            let messages = errors.iter().map(|e| e.to_string()).collect();
            (false, messages, ExitCode::ConfigError)
        }
        Err(e @ ConfigError::Io { .. }) => (false, vec![e.to_string()], ExitCode::IoError),
        Err(e) => (false, vec![e.to_string()], ExitCode::ConfigError),
    };
    let output = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "path": path.display().to_string(),
        "valid": valid,
        "errors": errors,
    });
    match print_json(&output) {
        ExitCode::Clean => code,
        other => other,
    }
}

fn print_json(value: &serde_json::Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("failed to render output: {}", e);
            ExitCode::InternalError
        }
    }
}

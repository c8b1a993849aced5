//! qs-core command-line entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use qs_config::resolve_settings;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use qs_core::config_cli::{run_config, ConfigArgs};
use qs_core::demo::{run_demo, DemoReport};
use qs_core::exit_codes::ExitCode;

/// Environment variable overriding the log filter.
const LOG_ENV: &str = "QS_LOG";

#[derive(Parser, Debug)]
#[command(name = "qs-core", version, about = "Snapshot and restore a live simulation graph")]
struct Cli {
    /// Settings file (.toml or .json); falls back to QS_CONFIG, then the XDG config dir
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level when QS_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scripted capture/mutate/install session and print a JSON report
    Demo {
        /// Override the transition length in ticks
        #[arg(long)]
        transition_ticks: Option<u32>,
    },
    /// Inspect or validate settings
    Config(ConfigArgs),
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn print_demo_report(report: &DemoReport) -> ExitCode {
    match serde_json::to_string_pretty(report) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("failed to render demo report: {}", e);
            ExitCode::InternalError
        }
    }
}

fn run_demo_command(cli: &Cli, transition_ticks: Option<u32>) -> ExitCode {
    let (mut settings, source) = match resolve_settings(cli.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!(error = %e, "settings could not be resolved");
            eprintln!("demo: {}", e);
            return ExitCode::ConfigError;
        }
    };
    debug!(%source, "settings resolved");
    if let Some(ticks) = transition_ticks {
        settings.transition_ticks = ticks.max(1);
    }

    match run_demo(settings) {
        Ok(report) => {
            let code = print_demo_report(&report);
            if code != ExitCode::Clean {
                return code;
            }
            if report.all_passed() {
                ExitCode::Clean
            } else {
                error!(failed = ?report.failed_checks(), "demo checks failed");
                ExitCode::InstallFailed
            }
        }
        Err(e) => {
            eprintln!("demo: {}", e);
            ExitCode::for_error(&e)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let code = match &cli.command {
        Commands::Demo { transition_ticks } => run_demo_command(&cli, *transition_ticks),
        Commands::Config(args) => run_config(cli.config.as_deref(), args),
    };
    std::process::exit(code.as_i32());
}

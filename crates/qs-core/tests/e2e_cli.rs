//! CLI E2E tests for the `demo` and `config` commands.
//!
//! Validates:
//! - `demo` runs the scripted session and reports every check passing
//! - Logs go to stderr in the selected format, leaving stdout parseable
//! - `config show` reports the resolved settings with their source
//! - `config validate` lists problems and exits with the config error code
//! - A `--config` file that fails validation stops `demo` before it runs
//! - A refused capture maps to its own exit code

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

// ============================================================================
// Helpers
// ============================================================================

/// Command for the qs-core binary, isolated from the caller's settings.
fn qs_core(xdg: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("qs-core");
    cmd.timeout(Duration::from_secs(60))
        .env_remove("QS_CONFIG")
        .env_remove("QS_LOG")
        .env("XDG_CONFIG_HOME", xdg);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("parse JSON")
}

// ============================================================================
// Demo Command
// ============================================================================

#[test]
fn test_demo_reports_all_checks() {
    let dir = tempdir().unwrap();
    let output = qs_core(dir.path())
        .args(["demo", "--transition-ticks", "3"])
        .assert()
        .success()
        .code(0)
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["captured"], true);
    assert_eq!(json["installed"], true);
    assert_eq!(json["settle_ticks"], 3);
    let checks = json["checks"].as_array().expect("checks array");
    assert!(!checks.is_empty());
    assert!(checks.iter().all(|c| c["passed"] == true));
}

#[test]
fn test_demo_json_logs_on_stderr() {
    let dir = tempdir().unwrap();
    let output = qs_core(dir.path())
        .args(["--log-level", "info", "--log-format", "json", "demo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("\"level\":\"INFO\""))
        .stderr(predicate::str::contains("state captured"))
        .get_output()
        .clone();

    // stdout stays a single JSON document
    let json = stdout_json(&output);
    assert_eq!(json["area"], "demo-00");
}

#[test]
fn test_demo_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "transition_ticks = 0\n").unwrap();

    qs_core(dir.path())
        .args(["--config", path.to_str().unwrap(), "demo"])
        .assert()
        .failure()
        .code(10)
        .stderr(predicate::str::contains("validation"));
}

#[test]
fn test_demo_disabled_capture_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("off.toml");
    fs::write(&path, "enabled = false\n").unwrap();

    qs_core(dir.path())
        .args(["--config", path.to_str().unwrap(), "demo"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("capture not allowed"))
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// Config Command
// ============================================================================

#[test]
fn test_config_show_defaults() {
    let dir = tempdir().unwrap();
    let output = qs_core(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["source"]["kind"], "default");
    assert_eq!(json["settings"]["transition_ticks"], 20);
    assert!(json["digest"].as_str().is_some_and(|d| !d.is_empty()));
}

#[test]
fn test_config_show_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(&path, "transition_ticks = 7\nauto_load_after_death = true\n").unwrap();

    let output = qs_core(dir.path())
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["source"]["kind"], "cli");
    assert_eq!(json["settings"]["transition_ticks"], 7);
    assert_eq!(json["settings"]["auto_load_after_death"], true);
}

#[test]
fn test_config_show_reads_env_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("env.json");
    fs::write(&path, r#"{"restore_audio": false}"#).unwrap();

    let output = qs_core(dir.path())
        .env("QS_CONFIG", &path)
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["source"]["kind"], "env");
    assert_eq!(json["settings"]["restore_audio"], false);
}

#[test]
fn test_config_validate_valid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ok.toml");
    fs::write(&path, "disallowed_modes = [11, 12]\n").unwrap();

    let output = qs_core(dir.path())
        .args(["config", "validate", path.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["valid"], true);
    assert_eq!(json["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_config_validate_invalid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "transition_ticks = 0\ndisallowed_modes = [3, 3]\n").unwrap();

    let output = qs_core(dir.path())
        .args(["config", "validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(10)
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["valid"], false);
    assert_eq!(json["errors"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_config_validate_unknown_field() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typo.toml");
    fs::write(&path, "transition_tick = 5\n").unwrap();

    let output = qs_core(dir.path())
        .args(["config", "validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(10)
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["valid"], false);
}

#[test]
fn test_config_validate_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.toml");

    let output = qs_core(dir.path())
        .args(["config", "validate", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(10)
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["valid"], false);
    assert!(json["errors"][0]
        .as_str()
        .is_some_and(|e| e.contains("not found")));
}

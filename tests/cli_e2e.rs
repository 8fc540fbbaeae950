//! End-to-end CLI tests for the avatar-downloader binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn command_in(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("avatar-downloader").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

/// Without a config file there is nothing to download, and the run succeeds.
#[test]
fn test_binary_without_config_returns_zero() {
    let temp_dir = TempDir::new().unwrap();
    command_in(&temp_dir).assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let temp_dir = TempDir::new().unwrap();
    command_in(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Download avatar renders"))
        .stdout(predicate::str::contains("roblox"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let temp_dir = TempDir::new().unwrap();
    command_in(&temp_dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("avatar-downloader"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp_dir = TempDir::new().unwrap();
    command_in(&temp_dir)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_subcommands_with_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    for service in ["mii", "roblox", "gta", "all"] {
        command_in(&temp_dir).args(["-q", service]).assert().success();
    }
}

#[test]
fn test_binary_rejects_malformed_config() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("broken.toml"), "[http\ntimeout_secs = ").unwrap();

    command_in(&temp_dir)
        .args(["--config", "broken.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.toml"));
}

#[test]
fn test_binary_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("avatar-downloader.toml"),
        "[roblox]\npending_poll_attempts = 0\n",
    )
    .unwrap();

    command_in(&temp_dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("roblox.pending_poll_attempts"));
}

/// Test that -v flag works (verbose mode).
#[test]
fn test_binary_verbose_flag_accepted() {
    let temp_dir = TempDir::new().unwrap();
    command_in(&temp_dir).arg("-v").assert().success();
}

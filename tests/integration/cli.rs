//! Command-line validation tests for the pull-all binary.
//!
//! These only exercise paths that fail or exit before any repository listing,
//! so they need neither network access nor GitHub credentials.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command instance for the pull-all binary
#[allow(deprecated)]
fn pull_all_cmd() -> Command {
    let mut cmd = Command::cargo_bin("pull-all").expect("Failed to find pull-all binary");
    cmd.env_remove("GITHUB_TOKEN");
    cmd
}

#[test]
fn test_help_lists_core_flags() {
    pull_all_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--org"))
        .stdout(predicate::str::contains("--threads"))
        .stdout(predicate::str::contains("--single-thread"))
        .stdout(predicate::str::contains("--no-live-updates"))
        .stdout(predicate::str::contains("--pull-from-default"));
}

#[test]
fn test_version_flag() {
    pull_all_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_owner_is_required() {
    pull_all_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--org").or(predicate::str::contains("--user")));
}

#[test]
fn test_org_and_user_conflict() {
    pull_all_cmd()
        .args(["--org", "acme", "--user", "octocat"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_zero_threads_rejected() {
    pull_all_cmd()
        .args(["--org", "acme", "--threads", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Thread count must be at least 1"));
}

#[test]
fn test_single_thread_conflicts_with_threads() {
    pull_all_cmd()
        .args(["--org", "acme", "--threads", "4", "--single-thread"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_missing_config_file_is_fatal() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    pull_all_cmd()
        .current_dir(temp_dir.path())
        .args(["--org", "acme", "--config", "absent.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_concurrency_in_config_file_is_fatal() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp_dir.path().join("pull-all.toml"), "concurrency = 0\n")
        .expect("Failed to write config");

    pull_all_cmd()
        .current_dir(temp_dir.path())
        .args(["--org", "acme"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency must be at least 1"));
}

#[test]
fn test_delete_can_be_cancelled() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    pull_all_cmd()
        .current_dir(temp_dir.path())
        .env("PULL_ALL_TOKEN", "unused")
        .args(["--org", "acme", "--delete"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Operation cancelled"));
}

//! End-to-end CLI tests for the paper-crawler binary.
//!
//! These only cover paths that exit before any network request is made.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn crawler() -> Command {
    let mut cmd = Command::cargo_bin("paper-crawler").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("UNPAYWALL_EMAIL")
        .env_remove("SEMANTIC_SCHOLAR_API_KEY");
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_binary_help_displays_usage() {
    crawler()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Crawl a conference year's papers"))
        .stdout(predicate::str::contains("--year"))
        .stdout(predicate::str::contains("--unpaywall-email"));
}

#[test]
fn test_binary_version_flag() {
    crawler()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_binary_missing_year_fails() {
    crawler()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--year"));
}

#[test]
fn test_binary_unknown_flag_fails() {
    crawler()
        .args(["--year", "2024", "--no-such-flag"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_binary_out_of_range_concurrency_fails() {
    crawler()
        .args(["--year", "2024", "-c", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_binary_invalid_config_key_fails_with_line_number() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "concurrency = 4\nretries = 9\n");

    crawler()
        .args(["--year", "2024", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"))
        .stderr(predicate::str::contains(
            "Unknown configuration key: 'retries' on line 2",
        ));
}

#[test]
fn test_binary_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();

    crawler()
        .args(["--year", "2024", "--config"])
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

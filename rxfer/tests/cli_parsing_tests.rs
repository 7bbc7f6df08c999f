//! CLI Argument Parsing Compatibility Tests for rxfer
//!
//! These tests verify that command-line arguments are parsed correctly and keep accepting
//! the formats documented in `--help`.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_runs() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("remaining-worker-<N>.json"));
}

#[test]
fn test_version_runs() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_missing_target_is_rejected() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("/media/card")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TARGET"));
}

// ============================================================================
// ProgressType Argument Parsing Tests
// ============================================================================

#[test]
fn test_progress_type_auto_lowercase() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--progress-type", "auto", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_auto_capitalized() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--progress-type", "Auto", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_progress_bar_pascal_case() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--progress-type", "ProgressBar", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_text_updates_kebab_case() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--progress-type", "text-updates", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_invalid_value() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--progress-type", "spinner", "/src", "/dst"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// ============================================================================
// Duration and Size Argument Parsing Tests
// ============================================================================

#[test]
fn test_timeout_human_readable() {
    for timeout in ["90s", "6min", "1h 30m", "250ms"] {
        Command::cargo_bin("rxfer")
            .unwrap()
            .args(["--timeout", timeout, "--help"])
            .assert()
            .success();
    }
}

#[test]
fn test_timeout_default_is_six_minutes() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: 6m]"));
}

#[test]
fn test_timeout_invalid_value() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--timeout", "soon", "/src", "/dst"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--timeout"));
}

#[test]
fn test_read_buffer_sizes() {
    for size in ["4KiB", "1MiB", "65536"] {
        Command::cargo_bin("rxfer")
            .unwrap()
            .args(["--read-buffer", size, "--help"])
            .assert()
            .success();
    }
}

#[test]
fn test_seed_must_be_a_number() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--seed", "abc", "/src", "/dst"])
        .assert()
        .failure();
}

#[test]
fn test_zero_workers_fails() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    Command::cargo_bin("rxfer")
        .unwrap()
        .args([
            "--workers",
            "0",
            src.path().to_str().unwrap(),
            dst.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("workers must be greater than 0"));
}

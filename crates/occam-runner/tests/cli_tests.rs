//! CLI integration tests for occam-runner
//!
//! Runs the binary end to end and checks its JSON summary.

use std::process::Command;

/// Helper to run the CLI with arguments
fn run_occam(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_occam"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn summary(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout is a JSON summary")
}

// ==================== Help & Version Tests ====================

#[test]
fn test_cli_help() {
    let output = run_occam(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("occam"));
    assert!(stdout.contains("--workers"));
    assert!(stdout.contains("--transactions"));
}

#[test]
fn test_cli_version() {
    let output = run_occam(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("occam"));
}

// ==================== Workload Tests ====================

#[test]
fn test_cli_workload_matches_sequential() {
    let output = run_occam(&[
        "--transactions",
        "200",
        "--accounts",
        "32",
        "--workers",
        "4",
        "--log-level",
        "warn",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json = summary(&output);
    assert_eq!(json["transactions"], 200);
    assert_eq!(json["matches_sequential"], true);
    assert_eq!(json["metrics"]["batches"], 1);
    assert!(json["rounds"].as_u64().unwrap() >= 1);
}

#[test]
fn test_cli_high_contention_workload() {
    let output = run_occam(&[
        "--transactions",
        "100",
        "--accounts",
        "2",
        "--no-retry-limit",
        "--log-level",
        "error",
    ]);
    assert!(output.status.success());
    assert_eq!(summary(&output)["matches_sequential"], true);
}

#[test]
fn test_cli_empty_workload() {
    let output = run_occam(&["--transactions", "0", "--log-level", "error"]);
    assert!(output.status.success());

    let json = summary(&output);
    assert_eq!(json["transactions"], 0);
    assert_eq!(json["rounds"], 0);
}

#[test]
fn test_cli_invalid_ceiling() {
    let output = run_occam(&["--max-incarnations", "0"]);
    assert!(!output.status.success());
}

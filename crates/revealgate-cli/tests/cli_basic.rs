//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with an isolated config directory.

use std::process::Command;

/// Run a CLI command against `config_dir` and return (code, stdout, stderr).
fn run_cli(config_dir: &std::path::Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_revealgate"))
        .env("REVEALGATE_CONFIG_DIR", config_dir)
        .env_remove("REVEALGATE_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

#[test]
fn test_simulate_reveals_and_clears() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["simulate", "--seed", "7"]);
    assert_eq!(code, 0, "simulate failed");

    let lines: Vec<&str> = stdout.lines().collect();
    assert!(lines[0].starts_with("Your code: "));
    assert!(lines.contains(&"15"));
    assert!(lines.contains(&"1"));
    assert!(!lines.contains(&"0"));
    let revealed = lines
        .iter()
        .position(|l| *l == "I may be slightly autistic")
        .expect("payload not revealed");
    let cleared = lines
        .iter()
        .position(|l| *l == "(message cleared)")
        .expect("message not cleared");
    assert!(revealed < cleared);
}

#[test]
fn test_simulate_json_events() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["simulate", "--json", "--seed", "7"]);
    assert_eq!(code, 0, "simulate --json failed");

    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("event line is not JSON"))
        .collect();
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();

    assert_eq!(kinds.first(), Some(&"code_issued"));
    assert_eq!(kinds.iter().filter(|k| **k == "revealed").count(), 1);
    assert!(kinds.contains(&"cleared"));

    let snapshot = events
        .iter()
        .find(|e| e["type"] == "state_snapshot")
        .expect("missing snapshot");
    assert_eq!(snapshot["state"], "cleared");
    assert_eq!(snapshot["message"], "");
}

#[test]
fn test_simulate_wrong_code_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(dir.path(), &["simulate", "--input", "abcd"]);
    assert_eq!(code, 1);
    assert!(stdout.contains("Error: Incorrect code"));
    assert!(stderr.contains("code rejected"));
    assert!(!stdout.contains("I may be slightly autistic"));
}

#[test]
fn test_config_set_get_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "unlock_delay_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "15");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "payload", "open sesame"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "payload"]);
    assert_eq!(stdout.trim(), "open sesame");

    let (code, stdout, _) = run_cli(dir.path(), &["simulate", "--seed", "1"]);
    assert_eq!(code, 0);
    assert!(stdout.lines().any(|l| l == "open sesame"));
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["config", "set", "code_digits", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("code_digits"));

    let (code, _, _) = run_cli(dir.path(), &["config", "get", "no_such_key"]);
    assert_eq!(code, 1);
}

#[test]
fn test_config_rejects_oversized_delay() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(
        dir.path(),
        &["config", "set", "message_clear_secs", "18446744073709551615"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("message_clear_secs"));

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "message_clear_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");

    let (code, stdout, _) = run_cli(dir.path(), &["simulate", "--seed", "1"]);
    assert_eq!(code, 0);
    assert!(stdout.lines().any(|l| l == "(message cleared)"));
}

#[test]
fn test_config_path_uses_override_dir() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
    assert!(stdout.trim().starts_with(dir.path().to_str().unwrap()));
}

#[test]
fn test_run_quits_on_closed_input() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_revealgate"))
        .env("REVEALGATE_CONFIG_DIR", dir.path())
        .args(["run", "--json", "--seed", "3"])
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let kinds: Vec<String> = stdout
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).expect("event line is not JSON"))
        .filter_map(|e| e["type"].as_str().map(str::to_string))
        .collect();
    assert_eq!(kinds, ["code_issued", "code_hidden", "session_disposed"]);
}

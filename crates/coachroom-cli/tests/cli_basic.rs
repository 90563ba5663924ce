//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

const EVENING: &str = "2026-01-12T18:30:00+01:00";

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_coachroom-cli"))
        .env("COACHROOM_DATA_DIR", data_dir)
        .env_remove("COACHROOM_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn write_metrics(dir: &Path) -> String {
    let path = dir.join("metrics.json");
    let metrics = serde_json::json!({
        "caloriesConsumed": 2300.0,
        "caloriesTarget": 2000.0,
        "proteinG": 50.0,
        "proteinTargetG": 100.0,
        "hydrationPercent": 30.0,
        "sleepHours": 5.0,
        "streakDays": 14,
        "lastMealAt": "2026-01-12T10:30:00Z",
        "plaisir": { "available": true, "maxPerMeal": 500, "remainingMeals": 1 }
    });
    std::fs::write(&path, metrics.to_string()).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_config_list_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("max_push_per_day"));

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "preferences.max_push_per_day"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "3");
}

#[test]
fn test_config_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "preferences.max_push_per_day", "5"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "preferences.max_push_per_day"]);
    assert_eq!(stdout.trim(), "5");
}

#[test]
fn test_config_get_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["config", "get", "nope.nothing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_generate_then_list_json() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = write_metrics(dir.path());

    let (code, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "message", "generate", "--metrics", &metrics]);
    assert_eq!(code, 0, "generate failed");
    assert!(stdout.contains("admitted 5"), "unexpected output: {stdout}");

    let (code, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "message", "list", "--json"]);
    assert_eq!(code, 0);
    let feed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(feed["unreadCount"], 5);
    assert_eq!(feed["featured"]["dedupKey"], "calories-over-2026-01-12");
}

#[test]
fn test_second_generation_is_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = write_metrics(dir.path());
    run_cli(dir.path(), &["--at", EVENING, "message", "generate", "--metrics", &metrics]);

    let (code, stdout, _) = run_cli(
        dir.path(),
        &["--at", "2026-01-12T21:00:00+01:00", "message", "generate", "--metrics", &metrics],
    );
    assert_eq!(code, 0);
    assert!(stdout.contains("admitted 0"), "unexpected output: {stdout}");
}

#[test]
fn test_dismiss_reports_grown_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = write_metrics(dir.path());
    run_cli(dir.path(), &["--at", EVENING, "message", "generate", "--metrics", &metrics]);

    let (_, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "message", "list", "--json"]);
    let feed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let hydration_id = feed["byType"]["action"][0]["id"].as_str().unwrap().to_string();

    let (code, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "message", "dismiss", &hydration_id]);
    assert_eq!(code, 0);
    assert!(stdout.contains("hydration cooldown now 3h"), "unexpected output: {stdout}");
}

#[test]
fn test_unknown_message_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["message", "read", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("message not found"));
}

#[test]
fn test_push_budget_flow() {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "push", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("allowed"));

    let (code, _, _) = run_cli(dir.path(), &["--at", EVENING, "push", "record", "sleep"]);
    assert_eq!(code, 0);

    let (_, stdout, _) = run_cli(dir.path(), &["--at", "2026-01-12T19:00:00+01:00", "push", "check"]);
    assert!(stdout.contains("too recent"), "unexpected output: {stdout}");
}

#[test]
fn test_lowered_push_preference_blocks_check() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "preferences.max_push_per_day", "1"]);
    assert_eq!(code, 0);

    run_cli(dir.path(), &["--at", EVENING, "push", "record", "sleep"]);
    let (code, stdout, _) = run_cli(dir.path(), &["--at", "2026-01-12T22:00:00+01:00", "push", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("daily budget of 1 exhausted"), "unexpected output: {stdout}");
}

#[test]
fn test_ledger_json_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["--at", EVENING, "open"]);
    run_cli(dir.path(), &["--at", EVENING, "push", "record", "hydration"]);

    let (code, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "ledger", "--json"]);
    assert_eq!(code, 0);
    let ledger: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ledger["pushCountToday"], 1);

    let (code, _, _) = run_cli(dir.path(), &["reset"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["--at", EVENING, "ledger", "--json"]);
    let ledger: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(ledger["pushCountToday"], 0);
}

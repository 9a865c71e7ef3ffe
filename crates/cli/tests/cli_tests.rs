//! CLI integration tests

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn pm_estimate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pm-estimate"))
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("PM_DB_PATH")
        .env_remove("PM_MODEL_PATH")
        .output()
        .expect("Failed to execute command")
}

fn json_output(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

/// Project database with `estimated` completed tasks and one open story
fn task_database(dir: &Path, estimated: usize) -> PathBuf {
    let path = dir.join("pm.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tasks (
            id TEXT PRIMARY KEY,
            project_id TEXT,
            parent_id TEXT,
            type TEXT,
            priority TEXT,
            status TEXT,
            title TEXT,
            description TEXT,
            estimate_points INTEGER
        );
        INSERT INTO tasks VALUES ('open', 'p1', NULL, 'story', 'medium', 'todo',
            'Checkout page', NULL, NULL);",
    )
    .unwrap();
    for i in 0..estimated {
        conn.execute(
            "INSERT INTO tasks VALUES (?1, 'p1', NULL, ?2, 'medium', 'done', ?3, NULL, ?4)",
            params![
                format!("done-{}", i),
                if i % 2 == 0 { "story" } else { "bug" },
                format!("Completed item {}", "z".repeat(i)),
                (i % 5 + 1) as i64,
            ],
        )
        .unwrap();
    }
    path
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = pm_estimate(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("story point estimation"), "Should show app name");
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("buffer"), "Should show buffer command");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("insights"), "Should show insights command");
    assert!(stdout.contains("score"), "Should show score command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = pm_estimate(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pm-estimate"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = pm_estimate(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    assert!(stdout.contains("--type"), "Should show type option");
    assert!(stdout.contains("--db"), "Should show global db option");
}

/// Test scoring an ad-hoc task as JSON
#[test]
fn test_score_json() {
    let output = pm_estimate(&[
        "--format", "json", "score", "--type", "bug", "--priority", "low", "--title", "fix",
    ]);
    assert!(output.status.success(), "Score should succeed");

    let json = json_output(&output);
    assert_eq!(json["predicted_points"], 2);
    assert_eq!(json["confidence"], 0.5);
    assert_eq!(json["method"], "rule-based");
    assert!(json["note"].is_string(), "Rule-based estimate should carry a note");
}

/// Test that an unknown type is rejected
#[test]
fn test_score_rejects_unknown_type() {
    let output = pm_estimate(&["score", "--type", "spike", "--title", "x"]);
    assert!(!output.status.success(), "Unknown type should fail");
}

/// Test table output for a score
#[test]
fn test_score_table() {
    let output = pm_estimate(&["score", "--type", "story", "--title", "api work"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Score should succeed");
    assert!(stdout.contains("Predicted points"), "Should show table rows");
    assert!(stdout.contains("5.5/10"), "Should show complexity");
}

/// Test prediction against a database before any training
#[test]
fn test_predict_rule_based() {
    let dir = TempDir::new().unwrap();
    let db = task_database(dir.path(), 3);
    let model = dir.path().join("model.bin");

    let output = pm_estimate(&[
        "--db",
        db.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "--format",
        "json",
        "predict",
        "open",
    ]);
    assert!(output.status.success(), "Predict should succeed");

    let json = json_output(&output);
    assert_eq!(json["task_id"], "open");
    assert_eq!(json["predicted_points"], 5);
    assert_eq!(json["method"], "rule-based");
}

/// Test that a missing task fails
#[test]
fn test_predict_missing_task() {
    let dir = TempDir::new().unwrap();
    let db = task_database(dir.path(), 0);
    let model = dir.path().join("model.bin");

    let output = pm_estimate(&[
        "--db",
        db.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "predict",
        "nope",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing task should fail");
    assert!(stderr.contains("Task not found: nope"), "Should explain the failure");
}

/// Test that training saves a model used by later predictions
#[test]
fn test_train_then_predict() {
    let dir = TempDir::new().unwrap();
    let db = task_database(dir.path(), 12);
    let model = dir.path().join("model.bin");
    let db_arg = db.to_str().unwrap();
    let model_arg = model.to_str().unwrap();

    let output = pm_estimate(&[
        "--db", db_arg, "--model", model_arg, "--format", "json", "train", "--project", "p1",
    ]);
    assert!(output.status.success(), "Train should succeed");
    assert_eq!(json_output(&output)["samples"], 12);
    assert!(model.exists(), "Model artifact should be written");

    let output = pm_estimate(&[
        "--db", db_arg, "--model", model_arg, "--format", "json", "predict", "open",
    ]);
    assert!(output.status.success(), "Predict should succeed");
    assert_eq!(json_output(&output)["method"], "ml");

    let output = pm_estimate(&[
        "--db", db_arg, "--model", model_arg, "--format", "json", "buffer", "open",
    ]);
    assert!(output.status.success(), "Buffer should succeed");
    let json = json_output(&output);
    assert!(json["buffer_points"].as_u64().unwrap() >= 1);
}

/// Test that training with too little data fails
#[test]
fn test_train_insufficient_data() {
    let dir = TempDir::new().unwrap();
    let db = task_database(dir.path(), 4);
    let model = dir.path().join("model.bin");

    let output = pm_estimate(&[
        "--db",
        db.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "train",
    ]);
    assert!(!output.status.success(), "Train should fail");
    assert!(!model.exists(), "No artifact should be written");
}

/// Test insights output as JSON
#[test]
fn test_insights_json() {
    let dir = TempDir::new().unwrap();
    let db = task_database(dir.path(), 4);
    let model = dir.path().join("model.bin");

    let output = pm_estimate(&[
        "--db",
        db.to_str().unwrap(),
        "--model",
        model.to_str().unwrap(),
        "--format",
        "json",
        "insights",
    ]);
    assert!(output.status.success(), "Insights should succeed");

    let json = json_output(&output);
    assert_eq!(json["completed_tasks"], 4);
    assert_eq!(json["type_distribution"][0]["task_type"], "story");
    assert!(json.get("training").is_none());
}

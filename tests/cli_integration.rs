//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;
use workdeck::state::{encode_line, Operation, WalEntry};

/// Get the binary to test.
fn workdeck() -> Command {
    let mut cmd = Command::cargo_bin("workdeck").unwrap();
    cmd.env_remove("WORKDECK_CONFIG").env_remove("RUST_LOG");
    cmd
}

const SHIP: &str = r#"{
    "id": "ship",
    "name": "Ship",
    "description": "Plan and build an issue",
    "steps": [
        {"id": "plan", "name": "plan", "prompt": "Plan {{issueId}}"},
        {"id": "build", "name": "build", "prompt": "Build {{issueId}} on {{branch}}",
         "model": "large", "dependsOn": ["plan"]},
        {"id": "docs", "name": "docs", "prompt": "Document {{issueId}}", "dependsOn": ["plan"]}
    ]
}"#;

const LOOP: &str = r#"
id: loop
name: Loop
steps:
  - {id: a, name: a, prompt: a, dependsOn: [b]}
  - {id: b, name: b, prompt: b, dependsOn: [a]}
"#;

fn workflow_dir() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("ship.json").write_str(SHIP).unwrap();
    temp.child("loop.yaml").write_str(LOOP).unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    workdeck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Operator dashboard"));
}

#[test]
fn test_version_flag() {
    workdeck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_subcommand_help() {
    workdeck()
        .args(["workflows", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_missing_config_file_fails() {
    workdeck()
        .args(["--config", "/definitely/not/here.toml", "workflows", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

// ============================================================================
// Workflow Command Tests
// ============================================================================

#[test]
fn test_workflows_list() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "list", "--dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflows (2)"))
        .stdout(predicate::str::contains("ship"))
        .stdout(predicate::str::contains("Plan and build an issue"));
}

#[test]
fn test_workflows_list_empty() {
    let temp = assert_fs::TempDir::new().unwrap();
    workdeck()
        .args(["workflows", "--dir"])
        .arg(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workflows found."));
}

#[test]
fn test_workflows_validate() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "validate", "ship", "--dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid: 3 steps in 2 waves"));
}

#[test]
fn test_workflows_validate_cycle() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "validate", "loop", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("circular dependency"));
}

#[test]
fn test_workflows_validate_unknown() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "validate", "nope", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workflow 'nope' not found"));
}

#[test]
fn test_workflows_plan() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "plan", "ship", "--dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wave 1: plan"))
        .stdout(predicate::str::contains("Wave 2: build, docs"));
}

#[test]
fn test_workflows_run_dry_run() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "run", "ship", "--dry-run", "--issue", "auth-142"])
        .args(["--var", "branch=feature/auth-142", "--cwd", "/work", "--dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains("1. Ship / plan [/work]"))
        .stdout(predicate::str::contains("prompt: Build AUTH-142 on feature/auth-142"))
        .stdout(predicate::str::contains("model: large"))
        .stdout(predicate::str::contains("Workflow completed"));
}

#[test]
fn test_workflows_run_requires_dry_run() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "run", "ship", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--dry-run"));
}

#[test]
fn test_workflows_run_rejects_bad_var() {
    let temp = workflow_dir();
    workdeck()
        .args(["workflows", "run", "ship", "--dry-run", "--var", "oops", "--dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected key=value"));
}

// ============================================================================
// Dashboard Command Tests
// ============================================================================

const SNAPSHOT: &str = r#"{
    "issues": [
        {
            "id": "i-1", "identifier": "AUTH-1", "title": "Login page",
            "state": {"id": "s", "name": "In Progress", "type": "started"},
            "url": "https://tracker.example/AUTH-1", "updated_at": "2024-05-01T12:00:00Z"
        },
        {
            "id": "i-2", "identifier": "ENG-2", "title": "Cleanup",
            "state": {"id": "b", "name": "Backlog", "type": "backlog"},
            "url": "https://tracker.example/ENG-2", "updated_at": "2024-05-01T12:00:00Z"
        }
    ],
    "sessions": [
        {
            "id": "s-1", "name": "auth", "cwd": "/wt/auth", "status": "approval",
            "started_at": "2024-05-01T12:00:00Z", "last_activity_at": "2024-05-01T12:00:00Z"
        }
    ],
    "prs": [
        {
            "number": 99, "title": "Fix typo", "author": "ada", "state": "open",
            "head_ref": "docs/typo", "url": "https://code.example/pr/99",
            "updated_at": "2024-05-01T12:00:00Z"
        }
    ],
    "worktrees": [{"path": "/wt/auth", "branch": "auth-1-login"}]
}"#;

#[test]
fn test_dashboard_text() {
    let temp = assert_fs::TempDir::new().unwrap();
    let snapshot = temp.child("snapshot.json");
    snapshot.write_str(SNAPSHOT).unwrap();

    workdeck()
        .arg("dashboard")
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ATTENTION (1)"))
        .stdout(predicate::str::contains("apprvl"))
        .stdout(predicate::str::contains("AUTH-1"))
        .stdout(predicate::str::contains("BACKLOG (1)"))
        .stdout(predicate::str::contains("UNLINKED (1)"))
        .stdout(predicate::str::contains("Fix typo"));
}

#[test]
fn test_dashboard_json() {
    let temp = assert_fs::TempDir::new().unwrap();
    let snapshot = temp.child("snapshot.json");
    snapshot.write_str(SNAPSHOT).unwrap();

    let output = workdeck()
        .args(["dashboard", "--format", "json"])
        .arg(snapshot.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["issues"][0]["issue"]["identifier"], "AUTH-1");
    assert_eq!(value["issues"][0]["section"], "attention");
    assert_eq!(value["issues"][1]["badge"], "--");
    assert_eq!(value["unlinked"][0]["kind"], "pull_request");
}

#[test]
fn test_dashboard_hides_unlinked_when_configured() {
    let temp = assert_fs::TempDir::new().unwrap();
    let snapshot = temp.child("snapshot.json");
    snapshot.write_str(SNAPSHOT).unwrap();
    let config = temp.child("config.toml");
    config.write_str("[dashboard]\nshow_unlinked = false\n").unwrap();

    workdeck()
        .arg("--config")
        .arg(config.path())
        .arg("dashboard")
        .arg(snapshot.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("UNLINKED").not());
}

#[test]
fn test_dashboard_rejects_malformed_snapshot() {
    let temp = assert_fs::TempDir::new().unwrap();
    let snapshot = temp.child("snapshot.json");
    snapshot.write_str("[1, 2, 3]").unwrap();

    workdeck()
        .arg("dashboard")
        .arg(snapshot.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid collection file"));
}

// ============================================================================
// State Command Tests
// ============================================================================

fn pending_entry() -> String {
    let entry = WalEntry {
        seq: 1,
        transaction: uuid::Uuid::new_v4(),
        timestamp: chrono::Utc::now(),
        operations: vec![Operation::set("workflows.ship", serde_json::json!("completed"))],
    };
    encode_line(&entry).unwrap()
}

#[test]
fn test_state_show_reports_pending_entries() {
    let temp = assert_fs::TempDir::new().unwrap();
    let state = temp.child("state.json");
    state.write_str(r#"{"workflows": {"ship": "running"}}"#).unwrap();
    temp.child("state.json.wal").write_str(&pending_entry()).unwrap();

    workdeck()
        .args(["state", "show"])
        .arg(state.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("running"))
        .stdout(predicate::str::contains("1 pending WAL entr(ies)"));
}

#[test]
fn test_state_recover_replays_log() {
    let temp = assert_fs::TempDir::new().unwrap();
    let state = temp.child("state.json");
    state.write_str(r#"{"workflows": {"ship": "running"}}"#).unwrap();
    let wal = temp.child("state.json.wal");
    wal.write_str(&pending_entry()).unwrap();

    workdeck()
        .args(["state", "recover"])
        .arg(state.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Replayed 1 WAL entr(ies)"))
        .stdout(predicate::str::contains("completed"));

    wal.assert(predicate::path::missing());
    state.assert(predicate::str::contains("completed"));
}

#[test]
fn test_state_show_missing_document() {
    let temp = assert_fs::TempDir::new().unwrap();
    workdeck()
        .args(["state", "show"])
        .arg(temp.child("absent.json").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

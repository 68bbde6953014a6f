//! Integration tests for the `braid` binary.
//!
//! None of these need a model server: they cover health reporting, setup
//! failures, caller errors (rejected before any network call) and the
//! service error path against an unreachable endpoint.

mod common;

use predicates::prelude::*;
use tempfile::TempDir;

use common::{braid_cmd, fixture_passages, unreachable_model_config, write_config};

// ============================================================================
// health
// ============================================================================

#[test]
fn test_health_reports_branch_counts() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .arg("--config")
        .arg(temp.path().join("missing.yaml"))
        .arg("--passages")
        .arg(fixture_passages())
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] Engine ready"))
        .stdout(predicate::str::contains("Total: 5"))
        .stdout(predicate::str::contains("branch_A"))
        .stdout(predicate::str::contains("40%"));
}

#[test]
fn test_health_json() {
    let temp = TempDir::new().expect("create temp dir");

    let output = braid_cmd()
        .arg("--config")
        .arg(temp.path().join("missing.yaml"))
        .arg("--passages")
        .arg(fixture_passages())
        .args(["health", "--json"])
        .output()
        .expect("run braid");
    assert!(output.status.success());

    let health: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("health output is JSON");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["passages"], 5);
    assert_eq!(health["embeddingDimension"], 3);
    assert_eq!(health["branchCounts"]["shared"], 2);
    assert_eq!(health["lexical"]["numDocuments"], 5);
}

#[test]
fn test_passages_from_env() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .env("BRAID_CONFIG", temp.path().join("missing.yaml"))
        .env("BRAID_PASSAGES", fixture_passages())
        .arg("health")
        .assert()
        .success();
}

// ============================================================================
// setup failures
// ============================================================================

#[test]
fn test_missing_passage_file_fails() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .arg("--config")
        .arg(temp.path().join("missing.yaml"))
        .arg("--passages")
        .arg(temp.path().join("nope.jsonl"))
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to initialize Braid engine"))
        .stderr(predicate::str::contains("--passages"));
}

#[test]
fn test_invalid_passage_file_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let passages = temp.path().join("passages.jsonl");
    std::fs::write(
        &passages,
        r#"{"id":"p1","text":"x","embedding":[1.0],"branch":"branch_C","locator":{"page":1}}"#,
    )
    .expect("write passages");

    braid_cmd()
        .arg("--config")
        .arg(temp.path().join("missing.yaml"))
        .arg("--passages")
        .arg(&passages)
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(&temp, "citation:\n  matchThreshold: 150\n");

    braid_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--passages")
        .arg(fixture_passages())
        .arg("health")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Check your config"));
}

// ============================================================================
// ask: caller errors
// ============================================================================

#[test]
fn test_unknown_branch_hint_is_caller_error() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .args(["ask", "What happens?", "--branch", "branch_C"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("branch_C"))
        .stderr(predicate::str::contains("--branch auto"));
}

#[test]
fn test_empty_question_is_caller_error() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .args(["ask", "   "])
        .assert()
        .code(2);
}

#[test]
fn test_json_flags_conflict() {
    braid_cmd()
        .args(["ask", "q", "--json", "--pretty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

// ============================================================================
// ask: service errors
// ============================================================================

#[test]
fn test_unreachable_model_server_is_service_error() {
    let temp = TempDir::new().expect("create temp dir");

    // Sparse retrieval still works; drafting cannot reach the server.
    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .args(["ask", "What does Agent-4 do in the race ending?"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Drafting provider"))
        .stderr(predicate::str::contains("Hint:"));
}

// ============================================================================
// eval
// ============================================================================

fn write_questions(dir: &TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("questions.yaml");
    std::fs::write(&path, yaml).expect("write questions");
    path
}

#[test]
fn test_eval_records_failed_questions_and_writes_report() {
    let temp = TempDir::new().expect("create temp dir");
    let questions = write_questions(
        &temp,
        r#"questions:
  - query: "What does Agent-4 do in the race ending?"
    expectedBranch: race
    expectedPage: 31
    keyFacts: ["Agent-4"]
"#,
    );
    let report_path = temp.path().join("eval_results.json");

    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .arg("eval")
        .arg(&questions)
        .arg("--output")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Branch accuracy: 0%"))
        .stdout(predicate::str::contains("error"))
        .stdout(predicate::str::contains("Report written to"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("read report"))
            .expect("report is JSON");
    assert_eq!(report["totalQuestions"], 1);
    assert_eq!(report["errors"], 1);
    assert!(report["results"][0]["error"]
        .as_str()
        .expect("error message")
        .contains("Drafting provider"));
}

#[test]
fn test_eval_unknown_expected_branch_is_caller_error() {
    let temp = TempDir::new().expect("create temp dir");
    let questions = write_questions(
        &temp,
        "questions:\n  - query: \"What happens?\"\n    expectedBranch: branch_C\n",
    );

    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .arg("eval")
        .arg(&questions)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("branch_C"));
}

#[test]
fn test_eval_missing_question_file_is_caller_error() {
    let temp = TempDir::new().expect("create temp dir");

    braid_cmd()
        .arg("--config")
        .arg(unreachable_model_config(&temp))
        .arg("--passages")
        .arg(fixture_passages())
        .arg("eval")
        .arg(temp.path().join("nope.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read question set"));
}

//! Integration tests for `reporag search` and `reporag ask`.

mod common;

use predicates::prelude::*;
use tempfile::TempDir;

use common::{reporag_cmd, write_index};

fn search_json(temp: &TempDir, extra: &[&str]) -> serde_json::Value {
    let index = write_index(temp.path());
    let output = reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "how does login create a token", "--json", "--index"])
        .arg(&index)
        .args(extra)
        .output()
        .expect("run reporag");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("search --json prints JSON")
}

fn candidate_paths(outcome: &serde_json::Value) -> Vec<String> {
    outcome["candidates"]
        .as_array()
        .expect("candidates array")
        .iter()
        .filter_map(|c| c["chunk"]["metadata"]["file_path"].as_str().map(String::from))
        .collect()
}

// ============================================================================
// search
// ============================================================================

#[test]
fn test_search_prints_ranked_results() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "how does login work", "--index"])
        .arg(&index)
        .assert()
        .success()
        .stdout(predicate::str::contains("RESULTS"))
        .stdout(predicate::str::contains("src/auth/login.py"))
        .stdout(predicate::str::contains("Intent: explanation"))
        .stdout(predicate::str::contains("FILTERING"))
        .stdout(predicate::str::contains("Pre-filter: not configured"));
}

#[test]
fn test_search_json_respects_top_k() {
    let temp = TempDir::new().expect("create temp dir");
    let outcome = search_json(&temp, &["--top-k", "2"]);

    assert_eq!(outcome["topK"], 2);
    assert_eq!(candidate_paths(&outcome).len(), 2);
    assert!(outcome["metrics"]["requested"].as_u64().unwrap() >= 2);
    assert!(outcome["confidence"]["level"].is_string());
}

#[test]
fn test_search_post_filter_keeps_matching_chunks() {
    let temp = TempDir::new().expect("create temp dir");
    let outcome = search_json(&temp, &["--post", "file_category=docs"]);

    assert_eq!(candidate_paths(&outcome), vec!["docs/auth.md".to_string()]);
    assert_eq!(outcome["metrics"]["usedPostFilter"], true);
}

#[test]
fn test_search_untranslatable_pre_filter_is_skipped() {
    let temp = TempDir::new().expect("create temp dir");
    let outcome = search_json(&temp, &["--pre", "language=,"]);

    assert_eq!(outcome["metrics"]["preFilter"]["decision"], "nothingTranslatable");
    assert_eq!(outcome["metrics"]["usedPreFilter"], false);
    assert!(!candidate_paths(&outcome).is_empty());
}

#[test]
fn test_search_reports_untranslatable_pre_filter() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "how does login work", "--pre", "language=,", "--index"])
        .arg(&index)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Pre-filter: skipped, no translatable keys (selectivity 1.00)",
        ));
}

#[test]
fn test_search_post_filter_can_empty_the_result() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "login", "--post", "language=rust", "--index"])
        .arg(&index)
        .assert()
        .success()
        .stdout(predicate::str::contains("No results"));
}

#[test]
fn test_search_rejects_malformed_filter_argument() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "login", "--pre", "language", "--index"])
        .arg(&index)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --pre filter"));
}

#[test]
fn test_search_missing_index_fails() {
    let temp = TempDir::new().expect("create temp dir");

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "login", "--index"])
        .arg(temp.path().join("missing.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read index"));
}

#[test]
fn test_search_index_from_environment() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .env("REPORAG_INDEX", &index)
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["search", "user password hash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RESULTS"));
}

// ============================================================================
// ask
// ============================================================================

#[test]
fn test_ask_greeting_needs_no_generator() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());

    reporag_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["ask", "hello!", "--index"])
        .arg(&index)
        .assert()
        .success()
        .stdout(predicate::str::contains("ANSWER"));
}

#[test]
fn test_ask_without_reachable_generator_reports_failure() {
    let temp = TempDir::new().expect("create temp dir");
    let index = write_index(temp.path());
    // Port 9 (discard) keeps an `ollama` build from reaching a real daemon.
    let config = common::write_config(
        temp.path(),
        "generator:\n  baseUrl: http://127.0.0.1:9\n  timeoutSecs: 1\n",
    );

    let output = reporag_cmd()
        .arg("--config")
        .arg(&config)
        .args(["ask", "how does login create a token", "--json", "--index"])
        .arg(&index)
        .output()
        .expect("run reporag");

    assert!(!output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).expect("ask --json prints JSON");
    assert_eq!(result["success"], false);
    assert_eq!(result["error"]["kind"], "generation_failure");
    assert!(result["queryId"].is_string());
}

//! End-to-end engine tests driving real `sh` subprocesses.

use std::sync::Arc;
use std::time::Duration;

use vibeguard_core::{
    parse_str, run_checks, CheckStatus, Config, JsonReport, RunOptions, RunResult,
    DEFAULT_ERROR_EXIT_CODE,
};

fn arc_config(yaml: &str) -> Arc<Config> {
    Arc::new(parse_str(yaml).expect("config should validate"))
}

fn options() -> RunOptions {
    RunOptions {
        parallel: 4,
        ..RunOptions::default()
    }
}

fn result_of<'a>(run: &'a RunResult, id: &str) -> &'a vibeguard_core::CheckResult {
    run.results
        .iter()
        .find(|r| r.check_id == id)
        .unwrap_or_else(|| panic!("no result for check {id:?}"))
}

/// Scenario 1: all-pass pipeline.
#[tokio::test]
async fn test_all_pass_pipeline() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: pass
    run: "true"
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");

    assert_eq!(run.exit_code, 0);
    assert!(run.violations.is_empty(), "no violations expected");
    assert_eq!(run.results[0].status, CheckStatus::Passed);
    assert_eq!(run.results[0].status.report_str(), "passed");
}

/// Scenario 2: linear dependency with failure.
#[tokio::test]
async fn test_linear_dependency_with_failure() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: fmt
    run: "true"
  - id: vet
    run: "false"
    requires: [fmt]
    severity: error
  - id: test
    run: "true"
    requires: [vet]
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");

    assert_eq!(result_of(&run, "fmt").status, CheckStatus::Passed);
    assert_eq!(result_of(&run, "vet").status, CheckStatus::Failed);
    assert_eq!(result_of(&run, "test").status, CheckStatus::CancelledByDep);
    assert_eq!(run.violations.len(), 1);
    assert_eq!(run.violations[0].check_id, "vet");
    assert_eq!(run.exit_code, DEFAULT_ERROR_EXIT_CODE);
}

/// Scenario 3: warning does not block dependents or the exit code.
#[tokio::test]
async fn test_warning_does_not_block() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: w
    run: "false"
    severity: warning
  - id: downstream
    run: "true"
    requires: [w]
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");

    assert_eq!(result_of(&run, "w").status, CheckStatus::Failed);
    assert_eq!(result_of(&run, "downstream").status, CheckStatus::Passed);
    assert_eq!(run.exit_code, 0);
    assert_eq!(run.violations.len(), 1, "warning still reports a violation");
}

/// Scenario 4: fail-fast cancels the independent branch.
#[tokio::test]
async fn test_fail_fast_cancels_independent_branch() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: a
    run: "false"
    severity: error
  - id: b
    run: "sleep 2"
"#,
    );
    let run = run_checks(
        config,
        RunOptions {
            parallel: 2,
            fail_fast: true,
            ..RunOptions::default()
        },
    )
    .await
    .expect("run failed");

    assert_eq!(result_of(&run, "a").status, CheckStatus::Failed);
    assert!(result_of(&run, "b").status.is_cancelled());
    assert!(run.fail_fast_triggered);
    // b never produces a violation
    assert_eq!(run.violations.len(), 1);
}

/// Scenario 5: coverage with grok + assert, both directions.
#[tokio::test]
async fn test_coverage_grok_assert() {
    let passing = arc_config(
        r#"
version: "1"
checks:
  - id: coverage
    run: "echo 'total: 82%'"
    grok: ["total: %{NUMBER:cov}%"]
    assert: "cov >= 80"
"#,
    );
    let run = run_checks(passing, options()).await.expect("run failed");
    assert_eq!(run.results[0].status, CheckStatus::Passed);
    assert_eq!(
        run.results[0].extracted.get("cov").map(String::as_str),
        Some("82")
    );

    let failing = arc_config(
        r#"
version: "1"
checks:
  - id: coverage
    run: "echo 'total: 72%'"
    grok: ["total: %{NUMBER:cov}%"]
    assert: "cov >= 80"
    suggestion: "coverage is {{.cov}}%, need 80%"
"#,
    );
    let run = run_checks(failing, options()).await.expect("run failed");
    assert_eq!(run.results[0].status, CheckStatus::Failed);
    let suggestion = run.violations[0].suggestion.as_deref().unwrap();
    assert!(
        suggestion.contains("72"),
        "rendered suggestion should contain the extracted value: {suggestion}"
    );
}

/// Scenario 6: timeout kills the check and flags it.
#[tokio::test]
async fn test_timeout() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: slow
    run: "sleep 5"
    timeout: 100ms
"#,
    );
    let start = std::time::Instant::now();
    let run = run_checks(config, options()).await.expect("run failed");

    let result = result_of(&run, "slow");
    assert_eq!(result.status, CheckStatus::Failed);
    let execution = result.execution.as_ref().unwrap();
    assert!(execution.timed_out);
    // 100ms timer plus the kill grace, nowhere near the 5s sleep
    assert!(start.elapsed() < Duration::from_secs(3));

    assert_eq!(run.violations.len(), 1);
    assert!(run.violations[0].timed_out);
    assert_eq!(run.exit_code, DEFAULT_ERROR_EXIT_CODE);
}

/// Every executed check observes its dependencies in the passed state first.
#[tokio::test]
async fn test_dependency_completes_before_dependent_starts() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");

    // The dependent fails unless the dependency's side effect is visible.
    let yaml = format!(
        r#"
version: "1"
checks:
  - id: setup
    run: "sleep 0.1 && touch {marker}"
  - id: consumer
    run: "test -f {marker}"
    requires: [setup]
"#,
        marker = marker.display()
    );
    let run = run_checks(arc_config(&yaml), options())
        .await
        .expect("run failed");

    assert_eq!(result_of(&run, "setup").status, CheckStatus::Passed);
    assert_eq!(result_of(&run, "consumer").status, CheckStatus::Passed);
}

/// The declared `file` feeds extraction instead of stdout.
#[tokio::test]
async fn test_file_input_feeds_assertion() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.txt");

    let yaml = format!(
        r#"
version: "1"
checks:
  - id: report
    run: "echo 'total: 91%' > {report} && echo 'stdout noise'"
    file: "{report}"
    grok: ["total: %{{NUMBER:cov}}%"]
    assert: "cov >= 90"
"#,
        report = report.display()
    );
    let run = run_checks(arc_config(&yaml), options())
        .await
        .expect("run failed");

    assert_eq!(run.results[0].status, CheckStatus::Passed);
}

/// A declared but missing `file` evaluates against empty input and flags it.
#[tokio::test]
async fn test_missing_file_flagged() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: report
    run: "true"
    file: "/nonexistent/report.txt"
    grok: ["total: %{NUMBER:cov}%"]
    assert: "cov >= 90"
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");

    let result = &run.results[0];
    assert_eq!(result.status, CheckStatus::Failed);
    assert!(result.execution.as_ref().unwrap().file_missing);
}

/// Per-check logs land in the log dir and violations carry the path.
#[tokio::test]
async fn test_log_dir_and_violation_log_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: noisy
    run: "echo loud; echo louder >&2; false"
"#,
    );
    let run = run_checks(
        config,
        RunOptions {
            log_dir: Some(dir.path().to_path_buf()),
            ..options()
        },
    )
    .await
    .expect("run failed");

    let log_path = run.violations[0].log_path.as_ref().unwrap();
    assert_eq!(log_path.file_name().unwrap(), "noisy.log");
    let contents = std::fs::read_to_string(log_path).unwrap();
    assert!(contents.contains("loud"));
    assert!(contents.contains("louder"));
}

/// Config vars flow into commands and assertions at load time.
#[tokio::test]
async fn test_var_interpolation_end_to_end() {
    let config = arc_config(
        r#"
version: "1"
vars:
  greeting: hello
  min_len: "3"
checks:
  - id: greet
    run: "echo {{.greeting}}"
    grok: ["%{WORD:word}"]
    assert: "word == '{{.greeting}}'"
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");
    assert_eq!(run.results[0].status, CheckStatus::Passed);
}

/// The stable JSON report schema end to end.
#[tokio::test]
async fn test_json_report_end_to_end() {
    let config = arc_config(
        r#"
version: "1"
prompts:
  coach: "Raise the threshold gradually."
checks:
  - id: good
    run: "true"
    tags: [fast]
  - id: bad
    run: "echo 'total: 10%'; exit 0"
    grok: ["total: %{NUMBER:cov}%"]
    assert: "cov >= 80"
    prompts: [coach]
"#,
    );
    let run = run_checks(Arc::clone(&config), options())
        .await
        .expect("run failed");
    let report = JsonReport::new(&config, &run);
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    let statuses: Vec<&str> = json["checks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["passed", "failed"]);
    assert_eq!(json["violations"][0]["id"], "bad");
    assert_eq!(json["violations"][0]["triggered_prompts"][0], "coach");
    assert_eq!(json["exit_code"], DEFAULT_ERROR_EXIT_CODE);
}

/// Spawn failures flow into violations instead of crashing the run.
#[tokio::test]
async fn test_command_not_found_is_a_violation() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: ghost
    run: "this-command-does-not-exist-anywhere"
"#,
    );
    let run = run_checks(config, options()).await.expect("run failed");

    let result = &run.results[0];
    assert_eq!(result.status, CheckStatus::Failed);
    assert_ne!(result.execution.as_ref().unwrap().exit_code, 0);
    assert_eq!(run.violations.len(), 1);
}

/// Deep graphs run level by level under a tight worker cap.
#[tokio::test]
async fn test_deep_graph_with_small_pool() {
    let config = arc_config(
        r#"
version: "1"
checks:
  - id: l1a
    run: "true"
  - id: l1b
    run: "true"
  - id: l1c
    run: "true"
  - id: l2
    run: "true"
    requires: [l1a, l1b, l1c]
  - id: l3
    run: "true"
    requires: [l2]
"#,
    );
    let run = run_checks(
        config,
        RunOptions {
            parallel: 2,
            ..RunOptions::default()
        },
    )
    .await
    .expect("run failed");

    assert_eq!(run.passed_count(), 5);
    assert_eq!(run.exit_code, 0);
}

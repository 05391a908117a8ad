//! Per-check outcome classification and run aggregation.
//!
//! Classification is a pure function from an execution plus the check's
//! declaration to pass/fail — the scheduler calls it from workers, the
//! aggregator only collects. Violations are emitted solely for checks that
//! actually ran and failed; cancelled checks are reported but never become
//! violations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::{merge_env, render, Check, Config, Severity};
use crate::grok;

/// Outcome of one subprocess execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    /// Process exit code; `-1` when killed by signal or never started.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Terminated by cancellation (fail-fast or timeout).
    pub cancelled: bool,
    /// Terminated by the per-check timeout specifically.
    pub timed_out: bool,
    /// Contents of the check's declared `file`, read after completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_contents: Option<String>,
    /// The declared `file` did not exist after the run.
    pub file_missing: bool,
}

/// Terminal state of a check within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckStatus {
    Passed,
    Failed,
    CancelledByDep,
    CancelledByFailFast,
    CancelledByFilter,
}

impl CheckStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            CheckStatus::CancelledByDep
                | CheckStatus::CancelledByFailFast
                | CheckStatus::CancelledByFilter
        )
    }

    /// Collapsed status used by the stable report schema.
    pub fn report_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            _ => "cancelled",
        }
    }
}

/// Result of one check, terminal in all cases.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub check_id: String,
    /// Declaration index, used to restore config order in the run result.
    pub index: usize,
    pub status: CheckStatus,
    /// Present only when the check actually executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    pub extracted: HashMap<String, String>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggered_prompts: Vec<String>,
    /// Human-readable reason for a cancelled status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl CheckResult {
    /// A result for a check that never executed.
    pub fn cancelled(
        check: &Check,
        index: usize,
        status: CheckStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            check_id: check.id.clone(),
            index,
            status,
            execution: None,
            extracted: HashMap::new(),
            passed: false,
            triggered_prompts: Vec::new(),
            cancel_reason: Some(reason.into()),
        }
    }
}

/// A failed check reported to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub check_id: String,
    pub severity: Severity,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    pub extracted: HashMap<String, String>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub triggered_prompts: Vec<String>,
}

/// Aggregated outcome of a whole run.
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Per-check results in config declaration order.
    pub results: Vec<CheckResult>,
    /// Violations in completion order.
    pub violations: Vec<Violation>,
    pub exit_code: i32,
    pub fail_fast_triggered: bool,
}

impl RunResult {
    pub fn passed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == CheckStatus::Passed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == CheckStatus::Failed)
            .count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status.is_cancelled())
            .count()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Classify an executed check and render its violation if it failed.
///
/// The assertion input is the declared `file` contents when present
/// (empty when missing), otherwise captured stdout.
pub fn classify(
    config: &Config,
    check: &Check,
    index: usize,
    execution: ExecutionResult,
    log_path: Option<PathBuf>,
) -> (CheckResult, Option<Violation>) {
    let assert_input = match &execution.file_contents {
        Some(contents) => contents.as_str(),
        None => execution.stdout.as_str(),
    };

    let extracted = grok::extract_all(&check.grok, assert_input);

    let mut env = merge_env(&config.vars, &extracted);
    env.insert("exit_code".to_string(), execution.exit_code.to_string());
    env.insert("stdout".to_string(), execution.stdout.clone());
    env.insert("stderr".to_string(), execution.stderr.clone());

    let passed = if execution.timed_out {
        false
    } else {
        match &check.assert {
            Some(program) => program.eval_bool(&env),
            None => execution.exit_code == 0,
        }
    };

    let status = if passed {
        CheckStatus::Passed
    } else {
        CheckStatus::Failed
    };

    let triggered_prompts = if passed {
        Vec::new()
    } else {
        check.prompts.clone()
    };

    let violation = if passed {
        None
    } else {
        Some(Violation {
            check_id: check.id.clone(),
            severity: check.severity,
            command: check.run.clone(),
            suggestion: check.suggestion.as_deref().map(|s| render(s, &env)),
            fix: check.fix.as_deref().map(|s| render(s, &env)),
            extracted: extracted.clone(),
            timed_out: execution.timed_out,
            log_path,
            triggered_prompts: triggered_prompts.clone(),
        })
    };

    let result = CheckResult {
        check_id: check.id.clone(),
        index,
        status,
        execution: Some(execution),
        extracted,
        passed,
        triggered_prompts,
        cancel_reason: None,
    };

    (result, violation)
}

/// Fold collected results into a [`RunResult`].
///
/// `results` arrive in completion order; they are re-ordered to declaration
/// order. Violations keep completion order — that is the order a developer
/// watching the run saw things break.
pub fn aggregate(
    mut results: Vec<CheckResult>,
    violations: Vec<Violation>,
    error_exit_code: i32,
    fail_fast_triggered: bool,
) -> RunResult {
    results.sort_by_key(|r| r.index);

    let any_error_violation = violations
        .iter()
        .any(|v| v.severity == Severity::Error);

    let exit_code = if any_error_violation { error_exit_code } else { 0 };

    RunResult {
        results,
        violations,
        exit_code,
        fail_fast_triggered,
    }
}

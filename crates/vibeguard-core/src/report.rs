//! Report artifacts for run results.
//!
//! Provides two output forms for CLI and CI consumers:
//! - [`JsonReport`] — the stable machine-readable schema (`--json`)
//! - [`render_text`] — human-readable output; quiet mode prints violations
//!   only, verbose mode prints every result with pass/fail markers

use serde::Serialize;

use crate::config::{Config, Severity};
use crate::outcome::{CheckStatus, RunResult};

/// Stable JSON schema for one run.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub checks: Vec<JsonCheck>,
    pub violations: Vec<JsonViolation>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_fast_triggered: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct JsonCheck {
    pub id: String,
    /// One of `passed`, `failed`, `cancelled`.
    pub status: &'static str,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct JsonViolation {
    pub id: String,
    pub severity: Severity,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<std::collections::BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_prompts: Option<Vec<String>>,
}

impl JsonReport {
    /// Build the report artifact from a run.
    pub fn new(config: &Config, run: &RunResult) -> Self {
        let checks = run
            .results
            .iter()
            .map(|result| {
                let tags = config
                    .check(&result.check_id)
                    .map(|c| c.tags.clone())
                    .filter(|t| !t.is_empty());
                JsonCheck {
                    id: result.check_id.clone(),
                    status: result.status.report_str(),
                    duration_ms: result
                        .execution
                        .as_ref()
                        .map(|e| e.duration.as_millis() as u64)
                        .unwrap_or(0),
                    tags,
                }
            })
            .collect();

        let violations = run
            .violations
            .iter()
            .map(|v| JsonViolation {
                id: v.check_id.clone(),
                severity: v.severity,
                command: v.command.clone(),
                suggestion: v.suggestion.clone(),
                fix: v.fix.clone(),
                extracted: if v.extracted.is_empty() {
                    None
                } else {
                    Some(v.extracted.iter().map(|(k, s)| (k.clone(), s.clone())).collect())
                },
                log_file: v.log_path.as_ref().map(|p| p.display().to_string()),
                triggered_prompts: if v.triggered_prompts.is_empty() {
                    None
                } else {
                    Some(v.triggered_prompts.clone())
                },
            })
            .collect();

        Self {
            checks,
            violations,
            exit_code: run.exit_code,
            fail_fast_triggered: run.fail_fast_triggered.then_some(true),
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Advisory line shown under a violation.
fn advisory(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "blocks commit",
        Severity::Warning => "does not block commit",
    }
}

/// Render the run as human-readable text.
///
/// Quiet mode (`verbose == false`) prints only violations; verbose mode
/// prints every result with its marker and duration.
pub fn render_text(run: &RunResult, verbose: bool) -> String {
    let mut out = String::new();

    if verbose {
        for result in &run.results {
            let duration = result
                .execution
                .as_ref()
                .map(|e| format!(" ({}ms)", e.duration.as_millis()))
                .unwrap_or_default();
            match result.status {
                CheckStatus::Passed => {
                    out.push_str(&format!("[PASS] {}{}\n", result.check_id, duration));
                }
                CheckStatus::Failed => {
                    out.push_str(&format!("[FAIL] {}{}\n", result.check_id, duration));
                }
                _ => {
                    let reason = result.cancel_reason.as_deref().unwrap_or("cancelled");
                    out.push_str(&format!("[SKIP] {} ({})\n", result.check_id, reason));
                }
            }
        }
        if !run.violations.is_empty() {
            out.push('\n');
        }
    }

    for violation in &run.violations {
        let timeout_note = if violation.timed_out { " [timed out]" } else { "" };
        out.push_str(&format!(
            "{}: {}{}\n",
            violation.severity, violation.check_id, timeout_note
        ));
        out.push_str(&format!("  command: {}\n", violation.command));
        if let Some(suggestion) = &violation.suggestion {
            out.push_str(&format!("  suggestion: {}\n", suggestion));
        }
        if let Some(fix) = &violation.fix {
            out.push_str(&format!("  fix: {}\n", fix));
        }
        if let Some(log) = &violation.log_path {
            out.push_str(&format!("  log: {}\n", log.display()));
        }
        out.push_str(&format!("  {}\n", advisory(violation.severity)));
    }

    out
}

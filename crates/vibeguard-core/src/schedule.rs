//! Dependency-aware parallel scheduler.
//!
//! Executes the check DAG leaves-first with bounded concurrency. Workers are
//! tokio tasks gated by a semaphore of `parallel` permits; every completion
//! flows back over a channel to the single scheduling loop, which owns all
//! ready-set and in-degree bookkeeping — workers never touch shared
//! scheduling state. An `error`-severity failure cancels its dependents
//! transitively; with fail-fast enabled it cancels everything still
//! unstarted and signals running subprocesses through a cancellation token.
//! The loop always drains in-flight workers before returning.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

use crate::config::{Config, Severity};
use crate::error::EngineError;
use crate::exec;
use crate::graph::CheckGraph;
use crate::outcome::{self, CheckResult, CheckStatus, RunResult, Violation};
use crate::telemetry;

/// Default exit code for runs with error-severity violations.
pub const DEFAULT_ERROR_EXIT_CODE: i32 = 1;

/// Scheduler options for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Parallelism cap; must be at least 1.
    pub parallel: usize,
    /// Cancel all remaining work on the first error-severity failure.
    pub fail_fast: bool,
    /// Restrict the run to these check ids (expanded to transitive requires).
    pub subset: Option<Vec<String>>,
    /// Only run checks carrying at least one of these tags (empty = all).
    pub tags: Vec<String>,
    /// Never run checks carrying any of these tags.
    pub exclude_tags: Vec<String>,
    /// Write per-check logs under this directory.
    pub log_dir: Option<PathBuf>,
    /// Exit code reported when an error-severity check fails.
    pub error_exit_code: i32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            fail_fast: false,
            subset: None,
            tags: Vec::new(),
            exclude_tags: Vec::new(),
            log_dir: None,
            error_exit_code: DEFAULT_ERROR_EXIT_CODE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Not part of this run.
    Unselected,
    /// Scheduled, waiting on dependencies or a worker slot decision.
    Pending,
    /// Handed to a worker task.
    Spawned,
    /// Terminal result recorded.
    Done,
}

/// Run all (or a subset of) checks and aggregate the result.
pub async fn run_checks(config: Arc<Config>, options: RunOptions) -> Result<RunResult, EngineError> {
    run_checks_with_cancel(config, options, CancellationToken::new()).await
}

/// [`run_checks`] with an externally owned cancellation token, so embedders
/// can abort a run (e.g. on SIGINT) and still receive a complete result.
pub async fn run_checks_with_cancel(
    config: Arc<Config>,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunResult, EngineError> {
    if options.parallel == 0 {
        return Err(EngineError::ZeroParallelism);
    }

    let graph = CheckGraph::new(&config);
    let n = config.checks.len();

    // Selection: explicit subset (plus transitive requires) or everything.
    let mut selected = match &options.subset {
        Some(ids) => graph.subset_closure(&config, ids)?,
        None => vec![true; n],
    };

    // Tag filters remove checks from the selection entirely.
    let mut filtered_out = vec![false; n];
    for (i, check) in config.checks.iter().enumerate() {
        if !selected[i] {
            continue;
        }
        let tag_match =
            options.tags.is_empty() || options.tags.iter().any(|t| check.has_tag(t));
        let excluded = options.exclude_tags.iter().any(|t| check.has_tag(t));
        if !tag_match || excluded {
            filtered_out[i] = true;
            selected[i] = false;
        }
    }

    // A retained check whose (transitive) dependency was filtered out cannot
    // run; it is reported as cancelled rather than silently dropped.
    let blocked = blocked_by_filter(&graph, &selected, &filtered_out);

    let mut state = vec![NodeState::Unselected; n];
    let mut indegree = vec![0usize; n];
    let mut completion_results: Vec<CheckResult> = Vec::new();

    for i in 0..n {
        if !selected[i] {
            continue;
        }
        if blocked[i] {
            state[i] = NodeState::Done;
            completion_results.push(CheckResult::cancelled(
                &config.checks[i],
                i,
                CheckStatus::CancelledByFilter,
                "dependency not in filtered set",
            ));
        } else {
            state[i] = NodeState::Pending;
            indegree[i] = graph.requires_of(i).len();
        }
    }

    let semaphore = Arc::new(Semaphore::new(options.parallel));
    let (tx, mut rx) = mpsc::unbounded_channel::<(CheckResult, Option<Violation>)>();
    let mut in_flight = 0usize;

    let spawn = |index: usize, in_flight: &mut usize, state: &mut [NodeState]| {
        state[index] = NodeState::Spawned;
        *in_flight += 1;
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let log_dir = options.log_dir.clone();
        let tx = tx.clone();
        // Every event under this worker carries the check id via the span.
        let span = telemetry::check_span(&config.checks[index].id);
        tokio::spawn(
            async move {
                let outcome = execute_one(config, index, semaphore, cancel, log_dir).await;
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );
    };

    debug!(
        scheduled = state.iter().filter(|s| **s == NodeState::Pending).count(),
        parallel = options.parallel,
        fail_fast = options.fail_fast,
        "starting run"
    );

    for i in 0..n {
        if state[i] == NodeState::Pending && indegree[i] == 0 {
            spawn(i, &mut in_flight, &mut state);
        }
    }

    let mut violations: Vec<Violation> = Vec::new();
    let mut fail_fast_triggered = false;

    while in_flight > 0 {
        let Some((result, violation)) = rx.recv().await else {
            break;
        };
        in_flight -= 1;

        let idx = result.index;
        let status = result.status;
        state[idx] = NodeState::Done;

        if let Some(v) = violation {
            violations.push(v);
        }
        completion_results.push(result);

        let severity = config.checks[idx].severity;
        let failed_error = status == CheckStatus::Failed && severity == Severity::Error;

        if failed_error && options.fail_fast && !fail_fast_triggered {
            fail_fast_triggered = true;
            info!(check = %config.checks[idx].id, "fail-fast: cancelling remaining checks");
            cancel.cancel();
            // Everything unstarted — independent branches included — is
            // cancelled. Spawned workers observe the token and report
            // their own cancelled results.
            for j in 0..n {
                if state[j] == NodeState::Pending {
                    state[j] = NodeState::Done;
                    completion_results.push(CheckResult::cancelled(
                        &config.checks[j],
                        j,
                        CheckStatus::CancelledByFailFast,
                        "cancelled by fail-fast",
                    ));
                }
            }
            continue;
        }

        if fail_fast_triggered {
            continue;
        }

        let unblocks_dependents = status == CheckStatus::Passed
            || (status == CheckStatus::Failed && severity == Severity::Warning);

        if unblocks_dependents {
            for &d in graph.dependents_of(idx) {
                if state[d] != NodeState::Pending {
                    continue;
                }
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    spawn(d, &mut in_flight, &mut state);
                }
            }
        } else {
            // Error-severity failure or a cancelled dependency: dependents
            // become cancelled-by-dep, transitively.
            let blocker = config.checks[idx].id.clone();
            let mut stack: Vec<usize> = graph.dependents_of(idx).to_vec();
            while let Some(d) = stack.pop() {
                if state[d] != NodeState::Pending {
                    continue;
                }
                state[d] = NodeState::Done;
                completion_results.push(CheckResult::cancelled(
                    &config.checks[d],
                    d,
                    CheckStatus::CancelledByDep,
                    format!("required check {blocker:?} did not pass"),
                ));
                stack.extend_from_slice(graph.dependents_of(d));
            }
        }
    }

    // External cancellation can leave never-started nodes behind; they are
    // still owed a terminal result.
    for j in 0..n {
        if state[j] == NodeState::Pending {
            state[j] = NodeState::Done;
            completion_results.push(CheckResult::cancelled(
                &config.checks[j],
                j,
                CheckStatus::CancelledByFailFast,
                "run cancelled",
            ));
        }
    }

    Ok(outcome::aggregate(
        completion_results,
        violations,
        options.error_exit_code,
        fail_fast_triggered,
    ))
}

/// Memoized mask of selected nodes with a filtered-out (transitive)
/// dependency.
fn blocked_by_filter(graph: &CheckGraph, selected: &[bool], filtered_out: &[bool]) -> Vec<bool> {
    fn visit(
        i: usize,
        graph: &CheckGraph,
        filtered_out: &[bool],
        memo: &mut [Option<bool>],
    ) -> bool {
        if let Some(known) = memo[i] {
            return known;
        }
        let blocked = graph
            .requires_of(i)
            .iter()
            .any(|&r| filtered_out[r] || visit(r, graph, filtered_out, memo));
        memo[i] = Some(blocked);
        blocked
    }

    let mut memo = vec![None; graph.len()];
    (0..graph.len())
        .map(|i| selected[i] && visit(i, graph, filtered_out, &mut memo))
        .collect()
}

/// Worker body: acquire a pool slot, execute, classify.
async fn execute_one(
    config: Arc<Config>,
    index: usize,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    log_dir: Option<PathBuf>,
) -> (CheckResult, Option<Violation>) {
    let check = &config.checks[index];

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return (
                CheckResult::cancelled(
                    check,
                    index,
                    CheckStatus::CancelledByFailFast,
                    "worker pool shut down",
                ),
                None,
            )
        }
    };

    // The token may have fired while this worker was queued on the pool.
    if cancel.is_cancelled() {
        return (
            CheckResult::cancelled(
                check,
                index,
                CheckStatus::CancelledByFailFast,
                "cancelled before start",
            ),
            None,
        );
    }

    // The check id is on the enclosing span; only the command is new here.
    debug!(command = %check.run, "executing");
    let mut execution = exec::run_shell(&check.run, check.timeout, &cancel).await;

    if execution.cancelled && !execution.timed_out {
        // Externally cancelled mid-run: terminal, but neither pass nor
        // violation.
        let result = CheckResult {
            check_id: check.id.clone(),
            index,
            status: CheckStatus::CancelledByFailFast,
            execution: Some(execution),
            extracted: Default::default(),
            passed: false,
            triggered_prompts: Vec::new(),
            cancel_reason: Some("cancelled while running".to_string()),
        };
        return (result, None);
    }

    if let Some(file) = &check.file {
        exec::read_declared_file(&mut execution, file).await;
    }

    let log_path = match &log_dir {
        Some(dir) => exec::write_log(dir, &check.id, &execution).await,
        None => None,
    };

    outcome::classify(&config, check, index, execution, log_path)
}

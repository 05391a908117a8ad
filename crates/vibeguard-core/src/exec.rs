//! Subprocess execution with timeout and cancellation.
//!
//! Commands run through `sh -c` in their own process group so that timeout
//! and cancellation can take down the whole subtree (shell plus whatever it
//! spawned). stdout and stderr are captured to independent buffers; a
//! per-check wall-clock timer starts at spawn. On timeout or cancellation
//! the group receives SIGTERM, a bounded grace period, then SIGKILL.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::outcome::ExecutionResult;

/// Exit-code sentinel for signal-killed or never-started processes.
pub const EXIT_CODE_KILLED: i32 = -1;

/// How long a terminated process group gets to die before SIGKILL.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Execute `command` through the shell, honoring `timeout` and `cancel`.
///
/// Never fails: spawn errors become an [`ExecutionResult`] with the sentinel
/// exit code and the error text on stderr, flowing into normal violation
/// reporting.
pub async fn run_shell(
    command: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ExecutionResult {
    let start = Instant::now();

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            return ExecutionResult {
                exit_code: EXIT_CODE_KILLED,
                stderr: format!("failed to spawn shell: {err}"),
                duration: start.elapsed(),
                ..Default::default()
            };
        }
    };

    let pid = child.id();
    let stdout_task = drain_pipe(child.stdout.take());
    let stderr_task = drain_pipe(child.stderr.take());

    enum Termination {
        Exited(Option<i32>),
        TimedOut,
        Cancelled,
    }

    let termination = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => Termination::Exited(status.code()),
            Err(_) => Termination::Exited(None),
        },
        _ = tokio::time::sleep(timeout) => Termination::TimedOut,
        _ = cancel.cancelled() => Termination::Cancelled,
    };

    let (exit_code, timed_out, cancelled) = match termination {
        Termination::Exited(code) => (code.unwrap_or(EXIT_CODE_KILLED), false, false),
        Termination::TimedOut => {
            debug!(pid, timeout = ?timeout, "check timed out, terminating process group");
            kill_group(&mut child, pid).await;
            (EXIT_CODE_KILLED, true, true)
        }
        Termination::Cancelled => {
            debug!(pid, "cancellation received, terminating process group");
            kill_group(&mut child, pid).await;
            (EXIT_CODE_KILLED, false, true)
        }
    };

    let stdout = stdout_task.await;
    let stderr = stderr_task.await;

    ExecutionResult {
        exit_code,
        stdout,
        stderr,
        duration: start.elapsed(),
        cancelled,
        timed_out,
        file_contents: None,
        file_missing: false,
    }
}

/// Read a declared `file` after the process has completed, regardless of
/// exit status. A missing file reads as empty with the flag set.
pub async fn read_declared_file(execution: &mut ExecutionResult, path: &Path) {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            execution.file_contents = Some(contents);
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "declared file not readable");
            execution.file_contents = Some(String::new());
            execution.file_missing = true;
        }
    }
}

/// Write the per-check log: stdout, a separator, then stderr.
///
/// Returns the log path, or `None` on failure — log I/O problems are
/// warnings and never affect pass/fail.
pub async fn write_log(
    log_dir: &Path,
    check_id: &str,
    execution: &ExecutionResult,
) -> Option<PathBuf> {
    let path = log_dir.join(format!("{check_id}.log"));
    let contents = format!(
        "--- stdout ---\n{}\n--- stderr ---\n{}",
        execution.stdout, execution.stderr
    );

    if let Err(err) = tokio::fs::create_dir_all(log_dir).await {
        warn!(dir = %log_dir.display(), %err, "cannot create log directory");
        return None;
    }
    if let Err(err) = tokio::fs::write(&path, contents).await {
        warn!(path = %path.display(), %err, "cannot write check log");
        return None;
    }

    Some(path)
}

/// SIGTERM the process group, wait out the grace period, then SIGKILL.
async fn kill_group(child: &mut Child, pid: Option<u32>) {
    signal_group(pid, false);

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            signal_group(pid, true);
            let _ = child.wait().await;
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, kill: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let signal = if kill { Signal::SIGKILL } else { Signal::SIGTERM };
    // The child is its own group leader (process_group(0) at spawn).
    if let Err(err) = killpg(Pid::from_raw(pid as i32), signal) {
        debug!(pid, ?signal, %err, "process group signal failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _kill: bool) {}

/// Drain one stdio pipe to a lossy UTF-8 string on a background task.
fn drain_pipe<R>(pipe: Option<R>) -> impl std::future::Future<Output = String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let handle = pipe.map(|mut reader| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    async move {
        match handle {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_stderr_separately() {
        let result = run_shell(
            "echo out; echo err >&2",
            Duration::from_secs(5),
            &token(),
        )
        .await;
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!result.timed_out);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_nonzero_exit_code() {
        let result = run_shell("exit 7", Duration::from_secs(5), &token()).await;
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn test_command_not_found_flows_through_shell() {
        let result = run_shell(
            "definitely-not-a-command-anywhere",
            Duration::from_secs(5),
            &token(),
        )
        .await;
        assert_eq!(result.exit_code, 127);
        assert!(!result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_kills_and_flags() {
        let start = Instant::now();
        let result = run_shell("sleep 5", Duration::from_millis(100), &token()).await;
        assert!(result.timed_out);
        assert!(result.cancelled);
        assert_eq!(result.exit_code, EXIT_CODE_KILLED);
        // 100ms timer plus the grace window, well under the sleep itself
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let cancel = token();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = run_shell("sleep 5", Duration::from_secs(10), &cancel).await;
        assert!(result.cancelled);
        assert!(!result.timed_out);
    }

    #[tokio::test]
    async fn test_declared_file_read_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let command = format!("echo result=ok > {}", path.display());

        let mut result = run_shell(&command, Duration::from_secs(5), &token()).await;
        read_declared_file(&mut result, &path).await;
        assert_eq!(result.file_contents.as_deref(), Some("result=ok\n"));
        assert!(!result.file_missing);
    }

    #[tokio::test]
    async fn test_missing_declared_file_reads_empty() {
        let mut result = run_shell("true", Duration::from_secs(5), &token()).await;
        read_declared_file(&mut result, Path::new("/nonexistent/out.txt")).await;
        assert_eq!(result.file_contents.as_deref(), Some(""));
        assert!(result.file_missing);
    }

    #[tokio::test]
    async fn test_log_layout() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_shell("echo hi; echo oops >&2", Duration::from_secs(5), &token()).await;

        let path = write_log(dir.path(), "mycheck", &result).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "mycheck.log");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("--- stdout ---\nhi\n"));
        assert!(contents.contains("--- stderr ---\noops\n"));
    }

    #[tokio::test]
    async fn test_log_dir_created_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        let result = run_shell("true", Duration::from_secs(5), &token()).await;
        let path = write_log(&nested, "c", &result).await.unwrap();
        assert!(path.exists());
    }
}

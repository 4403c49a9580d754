//! Bounded execution of external commands.
//!
//! Backend calls shell out to `lncli`. A call that hangs must not hang the
//! market, so every child runs against a deadline:
//!
//! - stdout and stderr are drained by helper threads with a byte cap, so a
//!   chatty child can neither fill the pipe and block nor exhaust memory
//! - the calling thread owns the `Child` and polls `try_wait()` until the
//!   deadline
//! - on timeout the child is killed and reaped, and the call reports
//!   [`BackendError::Timeout`]; the outcome of the operation is unknown

use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use issuemarket_types::{BackendError, BackendStep};

/// Cap on bytes read from each of stdout and stderr.
pub const MAX_OUTPUT_BYTES: u64 = 4 * 1024 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the drain threads once the child has exited.
/// A grandchild holding the pipe open must not stall us.
const DRAIN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Output of a child that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Best human-readable reason for a failed run.
    #[must_use]
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        let output = if stderr.is_empty() { stdout } else { stderr };
        format!("{}: {output}", self.status)
    }
}

/// Run `program args..` and wait at most `timeout` for it to exit.
///
/// A non-zero exit is returned as output, not as an error; callers decide
/// what it means.
///
/// # Errors
/// - `Failed` if the program cannot be spawned or waited on
/// - `Timeout` if it is still running at the deadline
pub fn run_bounded(
    step: BackendStep,
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, BackendError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackendError::Failed {
            step,
            detail: format!("cannot spawn {}: {e}", program.display()),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::Failed {
                    step,
                    detail: format!("cannot wait on {}: {e}", program.display()),
                });
            }
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(
                %step,
                program = %program.display(),
                timeout_secs = timeout.as_secs(),
                "backend command timed out; killed"
            );
            return Err(BackendError::Timeout {
                step,
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let join_deadline = Instant::now() + DRAIN_JOIN_TIMEOUT;
    Ok(CommandOutput {
        status,
        stdout: collect(stdout, join_deadline),
        stderr: collect(stderr, join_deadline),
    })
}

fn drain<R: Read + Send + 'static>(pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>, deadline: Instant) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            // Abandoned; it ends when the last writer closes the pipe.
            return String::new();
        }
        thread::sleep(POLL_INTERVAL);
    }
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn sh(script: &str, timeout: Duration) -> Result<CommandOutput, BackendError> {
        run_bounded(
            BackendStep::WalletBalance,
            &PathBuf::from("/bin/sh"),
            &["-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let out = sh("echo out; echo err >&2", Duration::from_secs(10)).unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn non_zero_exit_is_output_not_error() {
        let out = sh("echo nope >&2; exit 3", Duration::from_secs(10)).unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert!(out.failure_detail().contains("nope"));
    }

    #[test]
    fn hung_child_times_out() {
        let started = Instant::now();
        let err = sh("sleep 30", Duration::from_millis(200)).unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
        assert_eq!(err.step(), BackendStep::WalletBalance);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn missing_program_fails() {
        let err = run_bounded(
            BackendStep::GetIdentity,
            &PathBuf::from("/nonexistent/lncli"),
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::Failed { step: BackendStep::GetIdentity, .. }));
    }

    #[test]
    fn large_output_does_not_block() {
        let out = sh("head -c 300000 /dev/zero | tr '\\0' a", Duration::from_secs(10)).unwrap();
        assert_eq!(out.stdout.len(), 300_000);
    }
}

//! External solver process execution under a wall-clock budget.
//!
//! Two timeout sources are distinguished:
//! 1. the solver reports its own time limit (`TIME LIMIT EXCEEDED`), which
//!    counts as a timeout even when it exits 0
//! 2. the host failsafe, `ceil(timeout × 1.2)` seconds, after which the child
//!    is killed and its partial output returned with the error
//!
//! A run moves through [`ProcessState`]: `Running` until the child exits
//! (`Completed`), outlives the failsafe (`TimedOut`) or cannot be spawned or
//! waited on (`Failed`). [`classify`] turns the terminal state into the
//! caller-facing result.

use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use allot_core::{AllotError, AllotResult, TimeoutSource};

/// Message the solver prints when its own time limit fires.
pub const SOLVER_TIMEOUT_MARKER: &str = "TIME LIMIT EXCEEDED";

/// Default child polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Host failsafe in whole seconds: `ceil(timeout_secs × 1.2)`.
pub fn failsafe_secs(timeout_secs: u64) -> u64 {
    timeout_secs.saturating_add(timeout_secs.div_ceil(5))
}

/// Lifecycle of one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Completed {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        elapsed: Duration,
        stdout: String,
        stderr: String,
    },
    Failed {
        reason: String,
    },
}

/// Map a terminal process state to the solver's stdout or an error.
pub fn classify(program: &str, state: ProcessState) -> AllotResult<String> {
    match state {
        ProcessState::Running => Err(AllotError::Process {
            program: program.to_string(),
            code: None,
            output: "process is still running".to_string(),
        }),
        ProcessState::Completed { code, stdout, stderr } => {
            if stdout.contains(SOLVER_TIMEOUT_MARKER) || stderr.contains(SOLVER_TIMEOUT_MARKER) {
                return Err(AllotError::Timeout {
                    kind: TimeoutSource::Solver,
                    elapsed_ms: 0,
                    output: join_output(&stdout, &stderr),
                });
            }
            if code != Some(0) {
                return Err(AllotError::Process {
                    program: program.to_string(),
                    code,
                    output: join_output(&stdout, &stderr),
                });
            }
            Ok(stdout)
        }
        ProcessState::TimedOut { elapsed, stdout, stderr } => Err(AllotError::Timeout {
            kind: TimeoutSource::Failsafe,
            elapsed_ms: elapsed.as_millis() as u64,
            output: join_output(&stdout, &stderr),
        }),
        ProcessState::Failed { reason } => Err(AllotError::Process {
            program: program.to_string(),
            code: None,
            output: reason,
        }),
    }
}

fn join_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

/// Runs external programs with piped output and an enforced budget.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ProcessRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Run `program` with `args` and return its stdout.
    ///
    /// Fails with `Process` on spawn failure or non-zero exit and with
    /// `Timeout` when either timeout source fires.
    pub fn execute<S: AsRef<OsStr>>(
        &self,
        program: &Path,
        args: &[S],
        timeout_secs: u64,
    ) -> AllotResult<String> {
        let failsafe = Duration::from_secs(failsafe_secs(timeout_secs));
        let started = Instant::now();
        let state = self.run(program, args, failsafe);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let program_name = program.display().to_string();
        match classify(&program_name, state) {
            Err(AllotError::Timeout { kind: TimeoutSource::Solver, output, .. }) => {
                warn!(program = %program_name, elapsed_ms, "solver reported its time limit");
                Err(AllotError::Timeout {
                    kind: TimeoutSource::Solver,
                    elapsed_ms,
                    output,
                })
            }
            other => other,
        }
    }

    /// Drive the child to a terminal [`ProcessState`].
    pub fn run<S: AsRef<OsStr>>(&self, program: &Path, args: &[S], failsafe: Duration) -> ProcessState {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("Running: {:?}", cmd);

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessState::Failed {
                    reason: format!("failed to spawn {}: {e}", program.display()),
                };
            }
        };

        let mut stdout = PipeReader::spawn(child.stdout.take());
        let mut stderr = PipeReader::spawn(child.stderr.take());

        let mut state = ProcessState::Running;
        while state == ProcessState::Running {
            state = match child.try_wait() {
                Ok(Some(status)) => ProcessState::Completed {
                    code: status.code(),
                    stdout: stdout.finish(),
                    stderr: stderr.finish(),
                },
                Ok(None) if started.elapsed() >= failsafe => {
                    let elapsed = started.elapsed();
                    terminate(&mut child);
                    warn!(
                        program = %program.display(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        failsafe_secs = failsafe.as_secs(),
                        "process exceeded failsafe, killed"
                    );
                    ProcessState::TimedOut {
                        elapsed,
                        stdout: stdout.snapshot(),
                        stderr: stderr.snapshot(),
                    }
                }
                Ok(None) => {
                    thread::sleep(self.poll_interval);
                    ProcessState::Running
                }
                Err(e) => {
                    terminate(&mut child);
                    ProcessState::Failed {
                        reason: format!("failed to poll {}: {e}", program.display()),
                    }
                }
            };
        }

        state
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "kill failed, child already exited");
    }
    if let Err(e) = child.wait() {
        debug!(error = %e, "failed to reap killed child");
    }
}

/// Drains one pipe on a background thread into a shared buffer.
struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buffer
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, handle }
    }

    /// Whatever has been read so far. The reader thread is left detached,
    /// since a killed child's descendants may still hold the pipe open.
    fn snapshot(&self) -> String {
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Block until the pipe reaches EOF, then return everything read.
    fn finish(&mut self) -> String {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            debug!("pipe reader thread panicked");
        }
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout_secs: u64) -> AllotResult<String> {
        ProcessRunner::new(Duration::from_millis(20)).execute(Path::new("sh"), &["-c", script], timeout_secs)
    }

    #[test]
    fn test_failsafe_secs() {
        assert_eq!(failsafe_secs(1), 2);
        assert_eq!(failsafe_secs(5), 6);
        assert_eq!(failsafe_secs(10), 12);
        assert_eq!(failsafe_secs(60), 72);
        assert_eq!(failsafe_secs(61), 74);
        assert_eq!(failsafe_secs(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_returns_stdout() {
        let out = sh("echo hello", 5).unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn test_non_zero_exit_is_process_error() {
        let err = sh("echo oops >&2; exit 3", 5).unwrap_err();
        match err {
            AllotError::Process { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert!(output.contains("oops"));
            }
            other => panic!("expected Process error, got {other:?}"),
        }
    }

    #[test]
    fn test_solver_time_limit_message_is_timeout_even_on_success() {
        let err = sh("echo 'TIME LIMIT EXCEEDED; SEARCH TERMINATED'; exit 0", 5).unwrap_err();
        assert!(matches!(
            err,
            AllotError::Timeout { kind: TimeoutSource::Solver, .. }
        ));
    }

    #[test]
    fn test_failsafe_kills_runaway_process() {
        let started = Instant::now();
        let err = sh("echo partial; exec sleep 30", 1).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));

        match err {
            AllotError::Timeout { kind, elapsed_ms, output } => {
                assert_eq!(kind, TimeoutSource::Failsafe);
                assert!(elapsed_ms >= 2000, "elapsed {elapsed_ms} ms");
                assert!(output.contains("partial"));
            }
            other => panic!("expected failsafe timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_binary_is_process_error() {
        let runner = ProcessRunner::default();
        let err = runner
            .execute(Path::new("/nonexistent/glpsol"), &["--version"], 1)
            .unwrap_err();
        assert!(matches!(err, AllotError::Process { code: None, .. }));
    }

    #[test]
    fn test_classify_states() {
        let done = ProcessState::Completed {
            code: Some(0),
            stdout: "OPTIMAL SOLUTION FOUND".to_string(),
            stderr: String::new(),
        };
        assert_eq!(classify("glpsol", done).unwrap(), "OPTIMAL SOLUTION FOUND");

        let timed_out = ProcessState::TimedOut {
            elapsed: Duration::from_millis(2400),
            stdout: "Integer optimization begins".to_string(),
            stderr: String::new(),
        };
        match classify("glpsol", timed_out).unwrap_err() {
            AllotError::Timeout { kind, elapsed_ms, output } => {
                assert_eq!(kind, TimeoutSource::Failsafe);
                assert_eq!(elapsed_ms, 2400);
                assert_eq!(output, "Integer optimization begins");
            }
            other => panic!("unexpected {other:?}"),
        }

        let failed = ProcessState::Failed {
            reason: "failed to spawn".to_string(),
        };
        assert!(classify("glpsol", failed).unwrap_err().is_process_failure());
        assert!(classify("glpsol", ProcessState::Running).is_err());
    }

    #[test]
    fn test_classify_prefers_solver_timeout_over_exit_code() {
        let state = ProcessState::Completed {
            code: Some(1),
            stdout: String::new(),
            stderr: "TIME LIMIT EXCEEDED".to_string(),
        };
        assert!(classify("glpsol", state).unwrap_err().is_timeout());
    }
}

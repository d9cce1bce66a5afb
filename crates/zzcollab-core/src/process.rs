//! Subprocess invocation with an optional wall-clock timeout.
//!
//! Used for every external tool call (`docker build`, `docker manifest
//! inspect`, ...). Output readers run on dedicated threads so a chatty child
//! cannot deadlock on a full pipe. The timeout is enforced by polling
//! `try_wait` and killing the still-unreaped `Child` handle.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Captured output is capped to this many bytes (keeping the tail).
const MAX_OUTPUT: usize = 10 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where a streamed child's stdout goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StdoutSink {
    /// This process's stdout.
    #[default]
    Inherit,
    /// This process's stderr, leaving stdout for machine-readable output.
    Stderr,
}

impl StdoutSink {
    fn stdio(self) -> Stdio {
        match self {
            StdoutSink::Inherit => Stdio::inherit(),
            StdoutSink::Stderr => Stdio::from(std::io::stderr()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Exited { success: bool, code: Option<i32> },
    TimedOut(Duration),
}

impl Completion {
    pub fn success(&self) -> bool {
        matches!(self, Completion::Exited { success: true, .. })
    }

    fn from_status(status: ExitStatus) -> Self {
        Completion::Exited {
            success: status.success(),
            code: status.code(),
        }
    }

    /// Human-readable summary, e.g. `exited with status 1`.
    pub fn describe(&self) -> String {
        match self {
            Completion::Exited { success: true, .. } => "succeeded".to_string(),
            Completion::Exited {
                code: Some(code), ..
            } => format!("exited with status {code}"),
            Completion::Exited { code: None, .. } => "terminated by signal".to_string(),
            Completion::TimedOut(d) => format!("timed out after {}s", d.as_secs()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Captured {
    pub completion: Completion,
    pub stdout: String,
    pub stderr: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.completion.success()
    }

    /// stdout and stderr joined, trimmed, and capped to the last 10KB.
    pub fn combined(&self) -> String {
        let output = if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        };
        let trimmed = output.trim();
        if trimmed.len() > MAX_OUTPUT {
            let mut start = trimmed.len() - MAX_OUTPUT;
            while !trimmed.is_char_boundary(start) {
                start += 1;
            }
            trimmed[start..].to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Run `program args...`, capturing stdout and stderr.
///
/// `Err` only when the process cannot be spawned or waited on.
pub fn run_captured(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> std::io::Result<Captured> {
    debug!(program, args = ?args, "spawning");
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let mut child = cmd.spawn()?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || read_all(stdout_handle));
    let stderr_thread = std::thread::spawn(move || read_all(stderr_handle));

    let completion = wait(child, timeout)?;

    // A killed child closes its pipes, so the readers terminate on EOF.
    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(Captured {
        completion,
        stdout,
        stderr,
    })
}

/// Run `program args...` with stderr inherited and stdout sent to `sink`.
pub fn run_streaming(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
    sink: StdoutSink,
) -> std::io::Result<Completion> {
    debug!(program, args = ?args, ?sink, "spawning (streaming)");
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(sink.stdio())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let child = cmd.spawn()?;
    wait(child, timeout)
}

fn read_all<R: Read>(handle: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn wait(mut child: Child, timeout: Option<Duration>) -> std::io::Result<Completion> {
    let Some(timeout) = timeout else {
        return child.wait().map(Completion::from_status);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Completion::from_status(status));
        }
        if Instant::now() >= deadline {
            debug!(pid = child.id(), "timeout reached, killing child");
            // Not yet reaped, so the handle still refers to our child.
            let _ = child.kill();
            let _ = child.wait();
            return Ok(Completion::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_stdout_and_status() {
        let out = run_captured("sh", &sh("echo hello"), None, None).unwrap();
        assert!(out.success());
        assert_eq!(out.combined(), "hello");
    }

    #[test]
    fn captures_stderr_on_failure() {
        let out = run_captured("sh", &sh("echo oops >&2; exit 3"), None, None).unwrap();
        assert!(!out.success());
        assert_eq!(
            out.completion,
            Completion::Exited {
                success: false,
                code: Some(3)
            }
        );
        assert_eq!(out.combined(), "oops");
        assert_eq!(out.completion.describe(), "exited with status 3");
    }

    #[test]
    fn timeout_kills_child() {
        let out = run_captured(
            "sh",
            &sh("exec sleep 60"),
            None,
            Some(Duration::from_millis(150)),
        )
        .unwrap();
        assert!(matches!(out.completion, Completion::TimedOut(_)));
        assert!(!out.success());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let result = run_captured("zzcollab-definitely-not-a-binary", &[], None, None);
        assert!(result.is_err());
    }

    #[test]
    fn streaming_reports_exit_status() {
        let completion =
            run_streaming("sh", &sh("exit 0"), None, None, StdoutSink::Inherit).unwrap();
        assert!(completion.success());
        let completion =
            run_streaming("sh", &sh("exit 2"), None, None, StdoutSink::Stderr).unwrap();
        assert_eq!(completion.describe(), "exited with status 2");
    }

    #[test]
    fn streaming_timeout_kills_child() {
        let started = Instant::now();
        let completion = run_streaming(
            "sh",
            &sh("exec sleep 60"),
            None,
            Some(Duration::from_millis(150)),
            StdoutSink::Stderr,
        )
        .unwrap();
        assert!(matches!(completion, Completion::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn fast_child_finishes_before_timeout() {
        let timeout = Some(Duration::from_secs(10));
        let out = run_captured("sh", &sh("echo done"), None, timeout).unwrap();
        assert!(out.success());
        assert_eq!(out.combined(), "done");
    }

    #[test]
    fn combined_caps_output() {
        let captured = Captured {
            completion: Completion::Exited {
                success: true,
                code: Some(0),
            },
            stdout: "x".repeat(MAX_OUTPUT * 2),
            stderr: String::new(),
        };
        assert_eq!(captured.combined().len(), MAX_OUTPUT);
    }
}

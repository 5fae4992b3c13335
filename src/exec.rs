//! Process boundary for external tool invocations
//!
//! Every shell-out in Noxup goes through this module:
//! - Captures real exit code, stdout, stderr and duration
//! - Classifies the outcome instead of raising raw process errors
//! - Enforces an explicit timeout so one unresponsive tool cannot
//!   hang the session
//!
//! Results are returned without interpretation; callers decide what a
//! non-zero exit means for them.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Maximum output length to capture per stream
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Poll interval while waiting for a child process
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default timeout for quick probes (version checks, privilege checks)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for package-manager installations
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Classified outcome of a command invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdStatus {
    /// Command ran and exited zero
    Success,
    /// Command ran but exited non-zero
    NonZeroExit,
    /// Binary not found on this system
    NotFound,
    /// Spawn or execution denied
    PermissionDenied,
    /// Command exceeded its timeout and was killed
    TimedOut,
    /// Other OS-level failure
    OsError,
}

impl CmdStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonZeroExit => "non-zero exit",
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::TimedOut => "timed out",
            Self::OsError => "os error",
        }
    }
}

/// Captured result of one command invocation
#[derive(Debug, Clone)]
pub struct CmdOutcome {
    pub program: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub status: CmdStatus,
}

impl CmdOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == CmdStatus::Success
    }

    fn spawn_failure(program: &str, status: CmdStatus, message: String, start: Instant) -> Self {
        Self {
            program: program.to_string(),
            exit_code: -1,
            stdout: String::new(),
            stderr: message,
            duration_ms: start.elapsed().as_millis() as u64,
            status,
        }
    }
}

/// Run a command with arguments, capturing output, bounded by `timeout`.
///
/// Never panics and never returns a raw spawn error; all failure modes
/// are folded into the outcome's status.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> CmdOutcome {
    let start = Instant::now();

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            let status = match e.kind() {
                std::io::ErrorKind::NotFound => CmdStatus::NotFound,
                std::io::ErrorKind::PermissionDenied => CmdStatus::PermissionDenied,
                _ => CmdStatus::OsError,
            };
            return CmdOutcome::spawn_failure(program, status, e.to_string(), start);
        }
    };

    // Drain both pipes on background threads so a chatty child can
    // never deadlock against a full pipe buffer while we poll.
    let stdout_reader = child.stdout.take().map(spawn_pipe_reader);
    let stderr_reader = child.stderr.take().map(spawn_pipe_reader);

    let deadline = start + timeout;
    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    timed_out = true;
                    break None;
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        }
    };

    let stdout = join_pipe_reader(stdout_reader);
    let stderr = join_pipe_reader(stderr_reader);
    let duration_ms = start.elapsed().as_millis() as u64;

    let (exit_code, status) = match (exit_status, timed_out) {
        (Some(s), _) if s.success() => (0, CmdStatus::Success),
        (Some(s), _) => (s.code().unwrap_or(-1), CmdStatus::NonZeroExit),
        (None, true) => (-1, CmdStatus::TimedOut),
        (None, false) => (-1, CmdStatus::OsError),
    };

    tracing::debug!(
        program,
        exit_code,
        status = status.as_str(),
        duration_ms,
        "command finished"
    );

    CmdOutcome {
        program: program.to_string(),
        exit_code,
        stdout,
        stderr,
        duration_ms,
        status,
    }
}

fn spawn_pipe_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_pipe_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    truncate_output(&bytes)
}

/// Truncate output to the capture limit, converting lossily to a string
fn truncate_output(bytes: &[u8]) -> String {
    let slice = if bytes.len() > MAX_OUTPUT_BYTES {
        &bytes[..MAX_OUTPUT_BYTES]
    } else {
        bytes
    };
    String::from_utf8_lossy(slice).to_string()
}

/// Locate a binary on PATH, honoring PATHEXT on Windows.
pub fn which(tool: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&path_var) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(tool);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            for ext in ["exe", "cmd", "bat", "com"] {
                let with_ext = dir.join(format!("{tool}.{ext}"));
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_is_not_found() {
        let outcome = run_command("noxup-no-such-binary-xyz", &[], PROBE_TIMEOUT);
        assert_eq!(outcome.status, CmdStatus::NotFound);
        assert_eq!(outcome.exit_code, -1);
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_command_captures_stdout() {
        let outcome = run_command("sh", &["-c", "echo noxup-ok"], PROBE_TIMEOUT);
        assert_eq!(outcome.status, CmdStatus::Success);
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.stdout.contains("noxup-ok"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_classified() {
        let outcome = run_command("sh", &["-c", "exit 3"], PROBE_TIMEOUT);
        assert_eq!(outcome.status, CmdStatus::NonZeroExit);
        assert_eq!(outcome.exit_code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_hung_command() {
        let outcome = run_command("sh", &["-c", "sleep 30"], Duration::from_millis(200));
        assert_eq!(outcome.status, CmdStatus::TimedOut);
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_sh() {
        assert!(which("sh").is_some());
    }

    #[test]
    fn test_which_misses_unknown_tool() {
        assert!(which("noxup-no-such-binary-xyz").is_none());
    }

    #[test]
    fn test_truncate_output_limits_size() {
        let big = vec![b'a'; MAX_OUTPUT_BYTES + 100];
        let s = truncate_output(&big);
        assert_eq!(s.len(), MAX_OUTPUT_BYTES);
    }
}

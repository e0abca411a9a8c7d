// Standard library
use std::ffi::OsStr;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

// External crates
use crate::error::{MtError, Result};
use duct::cmd;
use tracing::{debug, info};
use which::which;

/// How often a running child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Output of a finished child process, captured in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }

    /// Standard output followed by standard error, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// Result of waiting on a child with a deadline.
#[derive(Debug)]
pub enum CommandOutcome {
    Finished(CapturedOutput),
    TimedOut,
}

fn full_command<A: AsRef<OsStr>>(command: &str, args: &[A]) -> String {
    let mut parts = vec![command.to_string()];
    parts.extend(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
    parts.join(" ")
}

fn expression<A: AsRef<OsStr>>(
    command: &str,
    args: &[A],
    cwd: Option<&Path>,
) -> duct::Expression {
    let mut expr = cmd(command, args).stdin_null();
    if let Some(dir) = cwd {
        expr = expr.dir(dir);
    }
    expr
}

/// Runs a command to completion, capturing stdout and stderr separately.
///
/// A non-zero exit status is not an error here; callers inspect
/// [`CapturedOutput::success`]. Launch failures are returned as
/// [`MtError::Command`]. A child still running at `timeout` is killed and
/// reported as [`CommandOutcome::TimedOut`].
pub fn run_captured_with_deadline<A: AsRef<OsStr>>(
    command: &str,
    args: &[A],
    cwd: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<CommandOutcome> {
    let full_command = full_command(command, args);
    debug!(command = %full_command, "spawning");

    let handle = expression(command, args, cwd)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .start()
        .map_err(|e| MtError::Command(format!("Failed to start '{}': {}", full_command, e)))?;

    let start = Instant::now();
    loop {
        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                let _ = handle.kill();
                return Ok(CommandOutcome::TimedOut);
            }
        }

        match handle.try_wait() {
            Ok(Some(output)) => {
                return Ok(CommandOutcome::Finished(CapturedOutput {
                    status_code: output.status.code(),
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                }));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                return Err(MtError::Command(format!(
                    "Error waiting for '{}': {}",
                    full_command, e
                )));
            }
        }
    }
}

/// Streams combined command output into the log line by line.
///
/// Used for long-running helpers (package installers, gettext tools) whose
/// output only matters to the person watching.
pub fn stream_command<A: AsRef<OsStr>>(
    command: &str,
    args: &[A],
    cwd: Option<&Path>,
) -> Result<()> {
    let full_command = full_command(command, args);
    let reader = expression(command, args, cwd)
        .stderr_to_stdout()
        .reader()
        .map_err(|e| MtError::Command(format!("Failed to start '{}': {}", full_command, e)))?;

    for line in BufReader::new(reader).lines() {
        match line {
            Ok(line) => info!("{}", line),
            // The reader surfaces a non-zero exit as an error once output ends.
            Err(e) => {
                return Err(MtError::Command(format!("{}: {}", full_command, e)));
            }
        }
    }
    Ok(())
}

/// Checks if a command-line tool is available in the system's PATH.
pub fn is_tool_installed(tool_name: &str) -> bool {
    which(tool_name).is_ok()
}

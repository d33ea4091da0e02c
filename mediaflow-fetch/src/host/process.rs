//! Subprocess execution for external media tools.
//!
//! Extractors such as `yt-dlp` run as child processes. Every run is bounded
//! by a timeout, and children are killed when their future is dropped, so a
//! cancelled or timed-out attempt never leaves a download running.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// Captured result of one child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output, ANSI escapes removed.
    pub stdout: String,
    /// Standard error, ANSI escapes removed.
    pub stderr: String,
    /// Exit code; -1 when the child was killed by a signal.
    pub exit_code: i32,
    /// Wall time of the run.
    pub duration: Duration,
}

impl ProcessOutput {
    /// True for exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The most informative stderr line: the last `ERROR` line, else the last line.
    pub fn stderr_summary(&self) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        lines
            .iter()
            .rev()
            .find(|l| l.starts_with("ERROR"))
            .or_else(|| lines.last())
            .map(|l| (*l).to_string())
            .unwrap_or_default()
    }
}

/// Runs external tools found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a runner.
    pub fn new() -> Self {
        Self
    }

    /// Runs `cmd` with `args`, killing it once `timeout` elapses.
    #[instrument(skip(self, args), fields(cmd = %cmd, timeout = ?timeout))]
    pub async fn run(&self, cmd: &str, args: &[&str], timeout: Duration) -> Result<ProcessOutput, ProcessError> {
        let path = self.which(cmd).ok_or_else(|| {
            warn!("Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;
        debug!(argc = args.len(), path = %path.display(), "Spawning");

        let start = Instant::now();
        let child = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let Ok(output) = tokio::time::timeout(timeout, child).await else {
            warn!("Command timed out, child killed");
            return Err(ProcessError::Timeout(timeout));
        };
        let output = output?;

        let result = ProcessOutput {
            stdout: strip_ansi_escapes::strip_str(String::from_utf8_lossy(&output.stdout)),
            stderr: strip_ansi_escapes::strip_str(String::from_utf8_lossy(&output.stderr)),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        };
        debug!(exit_code = result.exit_code, elapsed_ms = result.duration.as_millis(), "Command finished");
        Ok(result)
    }

    /// True if `cmd` resolves on `PATH` (or is an existing path).
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Resolves `cmd` to an executable path.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }
}

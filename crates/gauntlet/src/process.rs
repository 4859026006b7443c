//! External tool invocation.
//!
//! Every tool is an opaque process: only its exit status and the number of
//! error-looking output lines are interpreted.

use crate::GauntletError;
use common::config::CommandSpec;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Lines of stdout and stderr matching `pattern`.
    pub fn matching_lines(&self, pattern: &Regex) -> usize {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .filter(|line| pattern.is_match(line))
            .count()
    }

    /// Error count of a compile-style tool: 0 on success, otherwise the
    /// number of matching lines but at least 1.
    pub fn error_count(&self, pattern: &Regex) -> usize {
        if self.success {
            0
        } else {
            self.matching_lines(pattern).max(1)
        }
    }

    /// Last non-empty output line, for short failure messages.
    pub fn last_line(&self) -> Option<&str> {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
    }
}

/// Runs `spec` in `cwd`, killing it if it outlives `timeout`.
///
/// # Errors
/// - `GauntletError::Spawn` if the program cannot be started
/// - `GauntletError::Timeout` if it does not exit in time
pub async fn run_command(
    spec: &CommandSpec,
    cwd: &Path,
    timeout: Duration,
) -> Result<CommandOutput, GauntletError> {
    debug!(command = %spec, cwd = %cwd.display(), "spawning");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| GauntletError::Timeout {
            command: spec.to_string(),
            secs: timeout.as_secs(),
        })?
        .map_err(|source| GauntletError::Spawn {
            command: spec.to_string(),
            source,
        })?;

    debug!(command = %spec, code = ?output.status.code(), "finished");
    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

//! Subprocess execution behind an async trait seam.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use crate::command::ToolCommand;
use crate::error::ToolError;

/// Result of a finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout (empty when output was not captured).
    pub stdout: String,

    /// Captured stderr (empty when output was not captured).
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl ToolOutput {
    /// Whether the process exited with code 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Backend that launches tool processes.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run `command` to completion.
    ///
    /// When `capture` is true stdout/stderr are collected into the
    /// returned [`ToolOutput`]; otherwise they are inherited.
    async fn spawn(&self, command: &ToolCommand, capture: bool) -> Result<ToolOutput, ToolError>;
}

/// Runs tools as child processes of the current process.
///
/// Children are not killed if the awaiting task is dropped; an aborted
/// job leaves its tool running to completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl ToolExecutor for ProcessExecutor {
    async fn spawn(&self, command: &ToolCommand, capture: bool) -> Result<ToolOutput, ToolError> {
        if command.program.is_empty() {
            return Err(ToolError::EmptyCommand);
        }

        let start = Instant::now();
        let (stdout, stderr) = if capture {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::inherit(), Stdio::inherit())
        };

        debug!(program = %command.program, "spawning tool");
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

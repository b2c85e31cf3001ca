//! Idempotent tool runner.
//!
//! A command with an expected output is skipped when that output already
//! exists, unless the policy asks to redo the work. After running, the
//! expected output must exist or the run is an error.

use std::sync::Arc;
use tracing::{debug, info};

use crate::command::ToolCommand;
use crate::error::ToolError;
use crate::executor::{ToolExecutor, ToolOutput};

/// Longest stderr excerpt kept in a failure.
const STDERR_TAIL: usize = 2000;

/// How the runner treats existing outputs and tool chatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunPolicy {
    /// Run the tool even when its output already exists.
    pub redo: bool,

    /// Capture tool stdout/stderr instead of streaming it.
    pub suppress_output: bool,
}

/// Outcome of [`ToolRunner::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRun {
    /// The expected output already existed; nothing was spawned.
    Cached,

    /// The tool ran and produced its output.
    Executed(ToolOutput),
}

impl ToolRun {
    pub fn was_cached(&self) -> bool {
        matches!(self, ToolRun::Cached)
    }
}

/// Runs [`ToolCommand`]s through an executor with a fixed [`RunPolicy`].
#[derive(Clone)]
pub struct ToolRunner {
    executor: Arc<dyn ToolExecutor>,
    policy: RunPolicy,
}

impl ToolRunner {
    pub fn new(executor: Arc<dyn ToolExecutor>, policy: RunPolicy) -> Self {
        Self { executor, policy }
    }

    pub fn policy(&self) -> RunPolicy {
        self.policy
    }

    /// Run `command`, honoring the skip-if-output-exists policy.
    pub async fn run(&self, command: &ToolCommand) -> Result<ToolRun, ToolError> {
        if let Some(output) = &command.output {
            if output.exists() && !self.policy.redo {
                debug!(output = %output.display(), "output exists, skipping {}", command.program);
                return Ok(ToolRun::Cached);
            }
        }

        info!(command = %command, "running tool");
        let result = self
            .executor
            .spawn(command, self.policy.suppress_output)
            .await?;

        if !result.succeeded() {
            return Err(ToolError::Failed {
                program: command.program.clone(),
                exit_code: result.exit_code,
                stderr: tail(&result.stderr, STDERR_TAIL).to_string(),
            });
        }

        if let Some(output) = &command.output {
            if !output.exists() {
                return Err(ToolError::MissingOutput {
                    program: command.program.clone(),
                    path: output.clone(),
                });
            }
        }

        debug!(
            program = %command.program,
            duration_ms = result.duration_ms,
            "tool finished"
        );
        Ok(ToolRun::Executed(result))
    }
}

fn tail(s: &str, max: usize) -> &str {
    let s = s.trim_end();
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

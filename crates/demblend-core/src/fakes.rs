//! In-memory fakes for the tool and reporting seams (testing only)
//!
//! `FakeToolExecutor` writes the files the real blend and diff tools would
//! write, with configurable mean errors and forced failures.
//! `RecordingReporter` keeps every frame event for assertions.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use demblend_tools::command::{BLEND_TOOL, DIFF_TOOL};
use demblend_tools::{ToolCommand, ToolError, ToolExecutor, ToolOutput};

use crate::evaluator::CandidateArtifacts;
use crate::frame::Frame;
use crate::layout::{batch_folder_name, SURFACE_FILE};
use crate::reporter::{FrameEvent, FrameReporter};

/// Create `batch_<frame>_<end>_<bundle>/out-align-DEM.tif` under
/// `process_folder` and return the batch folder.
pub fn seed_batch_folder(process_folder: &Path, frame: Frame, bundle_length: u32) -> PathBuf {
    let end = frame
        .offset(i64::from(bundle_length.max(1)) - 1)
        .expect("batch end frame in range");
    let batch = process_folder.join(batch_folder_name(frame, end, bundle_length));
    std::fs::create_dir_all(&batch).expect("create batch folder");
    std::fs::write(batch.join(SURFACE_FILE), format!("surface {frame}")).expect("write surface");
    batch
}

// ---------------------------------------------------------------------------
// FakeToolExecutor
// ---------------------------------------------------------------------------

/// Tool executor that fabricates outputs instead of running processes.
#[derive(Debug)]
pub struct FakeToolExecutor {
    means: HashMap<PathBuf, f64>,
    default_mean: f64,
    write_mean: bool,
    failing_folders: HashSet<PathBuf>,
    delay: Option<Duration>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl Default for FakeToolExecutor {
    fn default() -> Self {
        Self {
            means: HashMap::new(),
            default_mean: 1.0,
            write_mean: true,
            failing_folders: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean error reported for candidate `index` in `batch_folder`.
    pub fn with_mean(mut self, batch_folder: &Path, index: usize, mean: f64) -> Self {
        let diff = CandidateArtifacts::new(batch_folder, index).diff;
        self.means.insert(diff, mean);
        self
    }

    /// Mean error for candidates without an explicit one.
    pub fn with_default_mean(mut self, mean: f64) -> Self {
        self.default_mean = mean;
        self
    }

    /// Write diff reports without a mean field.
    pub fn without_mean(mut self) -> Self {
        self.write_mean = false;
        self
    }

    /// Every tool writing into `batch_folder` exits with an error.
    pub fn failing_in(mut self, batch_folder: &Path) -> Self {
        self.failing_folders.insert(batch_folder.to_path_buf());
        self
    }

    /// Sleep before every tool run.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Commands spawned so far, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn fabricate(&self, command: &ToolCommand, prefix: &Path) -> std::io::Result<()> {
        let Some(output) = &command.output else {
            return Ok(());
        };
        match command.program.as_str() {
            BLEND_TOOL => {
                let inputs: Vec<&str> = command
                    .args
                    .iter()
                    .skip(1)
                    .take_while(|a| !a.starts_with('-'))
                    .map(String::as_str)
                    .collect();
                std::fs::write(output, inputs.join("\n"))?;
            }
            DIFF_TOOL => {
                let mut report = String::from("# Max difference: 9.5\n");
                if self.write_mean {
                    let mean = self.means.get(output).copied().unwrap_or(self.default_mean);
                    report.push_str(&format!("# Mean difference: {mean}\n"));
                }
                report.push_str("# Min difference: 0.01\n69.1, -49.6, 0.2\n");
                std::fs::write(output, report)?;
            }
            _ => std::fs::write(output, b"")?,
        }

        let log = format!("{}-log-{}-0001.txt", prefix.display(), command.program);
        std::fs::write(log, b"tool log\n")
    }
}

#[async_trait]
impl ToolExecutor for FakeToolExecutor {
    async fn spawn(&self, command: &ToolCommand, _capture: bool) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(command.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let prefix = PathBuf::from(command.arg_after("-o").unwrap_or_default());
        if self.failing_folders.iter().any(|f| prefix.starts_with(f)) {
            return Ok(ToolOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "forced failure".to_string(),
                duration_ms: 0,
            });
        }

        self.fabricate(command, &prefix)
            .map_err(|source| ToolError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(Frame, FrameEvent)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Frame, FrameEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// Events reported for `frame`, in order.
    pub fn events_for(&self, frame: Frame) -> Vec<FrameEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| *f == frame)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl FrameReporter for RecordingReporter {
    fn report(&self, frame: Frame, event: FrameEvent) {
        self.events.lock().unwrap().push((frame, event));
    }
}

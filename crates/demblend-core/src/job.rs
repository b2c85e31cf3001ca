//! One frame's unit of work.
//!
//! A [`FrameJob`] locates the frame's surface, evaluates every candidate
//! blend in index order, keeps the one with the lowest mean error and
//! commits it. Whatever goes wrong inside, including a panic, ends up as a
//! [`FrameStatus`]; nothing propagates to sibling jobs or the scheduler.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info_span, Instrument};

use demblend_tools::ToolRunner;

use crate::candidates::{CandidateBuilder, NEIGHBOR_OFFSETS};
use crate::committer::ResultCommitter;
use crate::error::{BlendError, Result};
use crate::evaluator::BlendEvaluator;
use crate::frame::Frame;
use crate::ground_truth::csv_format_for;
use crate::locator::{FrameLocator, Resolution};
use crate::reporter::{FrameEvent, FrameReporter};
use crate::selector::BestSelector;

/// Final state of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameStatus {
    /// Best candidate committed to the final names.
    Committed { index: usize, mean: f64 },

    /// Final outputs already existed.
    AlreadyDone,

    /// Inputs missing or ambiguous.
    Skipped { reason: String },

    Failed { reason: String },

    /// Not finished before the run was cancelled.
    Cancelled,
}

/// Status of one frame in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameOutcome {
    pub frame: Frame,
    #[serde(flatten)]
    pub status: FrameStatus,
}

impl FrameOutcome {
    pub fn new(frame: Frame, status: FrameStatus) -> Self {
        Self { frame, status }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.status, FrameStatus::Committed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, FrameStatus::Failed { .. })
    }
}

/// Shared settings from which per-frame jobs are built.
#[derive(Clone)]
pub struct FrameJobFactory {
    locator: Arc<dyn FrameLocator>,
    runner: ToolRunner,
    threads: usize,
    reporter: Arc<dyn FrameReporter>,
}

impl FrameJobFactory {
    pub fn new(
        locator: Arc<dyn FrameLocator>,
        runner: ToolRunner,
        threads: usize,
        reporter: Arc<dyn FrameReporter>,
    ) -> Self {
        Self {
            locator,
            runner,
            threads,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Arc<dyn FrameReporter> {
        &self.reporter
    }

    pub fn job(&self, frame: Frame, ground_truth: PathBuf) -> FrameJob {
        FrameJob {
            frame,
            ground_truth,
            locator: Arc::clone(&self.locator),
            runner: self.runner.clone(),
            threads: self.threads,
            reporter: Arc::clone(&self.reporter),
        }
    }
}

/// Blends a single frame.
pub struct FrameJob {
    frame: Frame,
    ground_truth: PathBuf,
    locator: Arc<dyn FrameLocator>,
    runner: ToolRunner,
    threads: usize,
    reporter: Arc<dyn FrameReporter>,
}

impl FrameJob {
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Run the job to completion. Never fails; errors become the status.
    pub async fn run(self) -> FrameOutcome {
        let frame = self.frame;
        let span = info_span!("frame", frame = %frame);

        let result = AssertUnwindSafe(self.execute())
            .catch_unwind()
            .instrument(span)
            .await;

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => self.failure_status(e),
            Err(payload) => self.failure_status(BlendError::Panicked(panic_message(&*payload))),
        };

        FrameOutcome::new(frame, status)
    }

    fn failure_status(&self, error: BlendError) -> FrameStatus {
        let reason = error.to_string();
        if error.is_missing_input() {
            self.reporter.report(
                self.frame,
                FrameEvent::Skipped {
                    reason: reason.clone(),
                },
            );
            FrameStatus::Skipped { reason }
        } else {
            self.reporter.report(
                self.frame,
                FrameEvent::Failed {
                    reason: reason.clone(),
                },
            );
            FrameStatus::Failed { reason }
        }
    }

    async fn execute(&self) -> Result<FrameStatus> {
        let frame = self.frame;
        let located = match self.locator.locate(frame) {
            Resolution::Found(located) => located,
            Resolution::Ambiguous(folders) => {
                let count = folders.len();
                self.reporter
                    .report(frame, FrameEvent::AmbiguousBatch { folders });
                return Err(BlendError::AmbiguousBatch { frame, count });
            }
            Resolution::NoBatchFolder | Resolution::NoSurface { .. } => {
                return Err(BlendError::SurfaceMissing { frame })
            }
        };

        let committer = ResultCommitter::new(&located.batch_folder);
        if committer.finals().exist() && !self.runner.policy().redo {
            self.reporter.report(frame, FrameEvent::AlreadyDone);
            return Ok(FrameStatus::AlreadyDone);
        }

        if !self.ground_truth.exists() {
            return Err(BlendError::GroundTruthMissing { frame });
        }

        let evaluator = BlendEvaluator::new(
            self.runner.clone(),
            located.batch_folder.clone(),
            self.ground_truth.clone(),
            csv_format_for(&self.ground_truth).to_string(),
            self.threads,
        );

        let mut selector = BestSelector::new();
        let mut produced = Vec::new();
        let mut next_index = 0;

        for candidate in CandidateBuilder::new(self.locator.as_ref(), frame) {
            self.report_skipped(next_index..candidate.index);
            next_index = candidate.index + 1;

            produced.push(evaluator.artifacts(candidate.index));
            let evaluation = evaluator.evaluate(candidate).await?;
            self.reporter.report(
                frame,
                FrameEvent::CandidateEvaluated {
                    index: evaluation.candidate.index,
                    mean: evaluation.mean(),
                    frames: evaluation.candidate.frames(),
                },
            );
            selector.offer_evaluation(evaluation);
        }
        self.report_skipped(next_index..NEIGHBOR_OFFSETS.len());

        let best = selector
            .into_best()
            .ok_or(BlendError::NoCandidate { frame })?;
        committer.commit(&best.artifacts, &produced)?;

        let (index, mean) = (best.candidate.index, best.mean());
        self.reporter
            .report(frame, FrameEvent::Committed { index, mean });
        Ok(FrameStatus::Committed { index, mean })
    }

    fn report_skipped(&self, indices: Range<usize>) {
        for index in indices {
            self.reporter.report(
                self.frame,
                FrameEvent::CandidateSkipped {
                    index,
                    offset: NEIGHBOR_OFFSETS[index],
                },
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

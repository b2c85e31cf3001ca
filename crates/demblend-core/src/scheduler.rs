//! Fan frame jobs out over a bounded worker pool.
//!
//! With a single worker, jobs run inline one after another (easier to
//! debug). With more, each frame becomes a task in a [`JoinSet`] and a
//! semaphore caps how many run at once. Frames are independent, so they
//! may finish in any order; the report is sorted by frame.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::frame::Frame;
use crate::ground_truth::GroundTruthCatalog;
use crate::index::FrameIndex;
use crate::job::{FrameJobFactory, FrameOutcome, FrameStatus};
use crate::reporter::FrameEvent;

/// Which frames to process and how wide to go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub start_frame: Frame,
    /// Excluded.
    pub stop_frame: Frame,
    /// Worker count; `<= 1` runs jobs inline.
    pub num_processes: usize,
    /// How often the wait loop logs progress.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            start_frame: Frame(0),
            stop_frame: Frame(0),
            num_processes: 1,
            poll_interval: Duration::from_secs(20),
        }
    }
}

/// Per-frame statuses of one run, sorted by frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<FrameOutcome>,
}

impl RunReport {
    fn from_outcomes(mut outcomes: Vec<FrameOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.frame);
        Self { outcomes }
    }

    pub fn get(&self, frame: Frame) -> Option<&FrameStatus> {
        self.outcomes
            .iter()
            .find(|o| o.frame == frame)
            .map(|o| &o.status)
    }

    pub fn committed(&self) -> usize {
        self.count(|s| matches!(s, FrameStatus::Committed { .. }))
    }

    pub fn already_done(&self) -> usize {
        self.count(|s| matches!(s, FrameStatus::AlreadyDone))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, FrameStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, FrameStatus::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| matches!(s, FrameStatus::Cancelled))
    }

    fn count(&self, pred: impl Fn(&FrameStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Enumerates frames, looks up their inputs and runs their jobs.
pub struct TaskScheduler {
    config: SchedulerConfig,
    jobs: FrameJobFactory,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig, jobs: FrameJobFactory) -> Self {
        Self { config, jobs }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Process every frame in `[start_frame, stop_frame)`.
    pub async fn run(
        &self,
        index: &FrameIndex,
        ground_truth: &GroundTruthCatalog,
        cancel: &CancelToken,
    ) -> RunReport {
        let mut outcomes = Vec::new();
        let mut dispatch = Vec::new();

        for frame in Frame::range(self.config.start_frame, self.config.stop_frame) {
            match self.lookup_inputs(frame, index, ground_truth) {
                Ok(lidar) => dispatch.push((frame, lidar)),
                Err(reason) => {
                    self.jobs.reporter().report(
                        frame,
                        FrameEvent::Skipped {
                            reason: reason.clone(),
                        },
                    );
                    outcomes.push(FrameOutcome::new(frame, FrameStatus::Skipped { reason }));
                }
            }
        }

        info!(
            frames = dispatch.len(),
            workers = self.config.num_processes,
            "dispatching frame jobs"
        );

        if self.config.num_processes > 1 {
            outcomes.extend(self.run_pool(dispatch, cancel).await);
        } else {
            outcomes.extend(self.run_inline(dispatch, cancel).await);
        }

        let report = RunReport::from_outcomes(outcomes);
        info!(
            committed = report.committed(),
            already_done = report.already_done(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "run finished"
        );
        report
    }

    fn lookup_inputs(
        &self,
        frame: Frame,
        index: &FrameIndex,
        ground_truth: &GroundTruthCatalog,
    ) -> Result<PathBuf, String> {
        let image = index
            .image_for(frame)
            .ok_or_else(|| format!("missing ortho file for frame {frame}"))?;
        ground_truth
            .match_image(image)
            .map(|p| p.to_path_buf())
            .map_err(|e| e.to_string())
    }

    async fn run_inline(
        &self,
        dispatch: Vec<(Frame, PathBuf)>,
        cancel: &CancelToken,
    ) -> Vec<FrameOutcome> {
        let mut outcomes = Vec::with_capacity(dispatch.len());
        for (frame, lidar) in dispatch {
            if cancel.is_cancelled() {
                outcomes.push(FrameOutcome::new(frame, FrameStatus::Cancelled));
                continue;
            }
            outcomes.push(self.jobs.job(frame, lidar).run().await);
        }
        outcomes
    }

    async fn run_pool(
        &self,
        dispatch: Vec<(Frame, PathBuf)>,
        cancel: &CancelToken,
    ) -> Vec<FrameOutcome> {
        if cancel.is_cancelled() {
            return dispatch
                .into_iter()
                .map(|(frame, _)| FrameOutcome::new(frame, FrameStatus::Cancelled))
                .collect();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.num_processes));
        let mut join_set = JoinSet::new();
        let mut pending = BTreeSet::new();

        for (frame, lidar) in dispatch {
            let job = self.jobs.job(frame, lidar);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                // queued behind the permit while the run was cancelled
                if cancel.is_cancelled() {
                    return FrameOutcome::new(frame, FrameStatus::Cancelled);
                }
                job.run().await
            });
            pending.insert(frame);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        let poll = self.config.poll_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(poll);
        ticker.tick().await;

        let cancelled = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                joined = join_set.join_next() => match joined {
                    None => break false,
                    Some(joined) => collect(joined, &mut pending, &mut outcomes),
                },
                _ = ticker.tick() => {
                    info!(remaining = join_set.len(), "waiting for frame jobs");
                }
            }
        };

        if cancelled {
            warn!(
                remaining = pending.len(),
                "cancelled; no longer waiting for frame jobs"
            );
            // running tools are left to finish on their own
            join_set.abort_all();
            while let Some(joined) = join_set.join_next().await {
                collect(joined, &mut pending, &mut outcomes);
            }
        }

        let status = if cancelled {
            FrameStatus::Cancelled
        } else {
            FrameStatus::Failed {
                reason: "frame task ended without a result".to_string(),
            }
        };
        outcomes.extend(
            pending
                .into_iter()
                .map(|frame| FrameOutcome::new(frame, status.clone())),
        );
        outcomes
    }
}

/// Record a finished frame task. Aborted tasks stay pending.
fn collect(
    joined: Result<FrameOutcome, JoinError>,
    pending: &mut BTreeSet<Frame>,
    outcomes: &mut Vec<FrameOutcome>,
) {
    match joined {
        Ok(outcome) => {
            pending.remove(&outcome.frame);
            outcomes.push(outcome);
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "frame task ended abnormally"),
    }
}

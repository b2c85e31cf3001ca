//! Per-frame reporting context injected into each job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::frame::Frame;

/// Milestones of a frame job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FrameEvent {
    /// Final outputs already exist; nothing was done.
    AlreadyDone,

    /// No candidate for `index` because the neighbor at `offset` is missing.
    CandidateSkipped { index: usize, offset: i64 },

    CandidateEvaluated {
        index: usize,
        mean: f64,
        frames: Vec<Frame>,
    },

    Committed { index: usize, mean: f64 },

    /// More than one batch folder starts at the frame.
    AmbiguousBatch { folders: Vec<PathBuf> },

    /// Input missing or ambiguous; the frame was not processed.
    Skipped { reason: String },

    Failed { reason: String },
}

/// Sink for [`FrameEvent`]s.
pub trait FrameReporter: Send + Sync {
    fn report(&self, frame: Frame, event: FrameEvent);
}

/// Emits frame events as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FrameReporter for TracingReporter {
    fn report(&self, frame: Frame, event: FrameEvent) {
        match event {
            FrameEvent::AlreadyDone => {
                info!(frame = %frame, "final blend files exist, skipping")
            }
            FrameEvent::CandidateSkipped { index, offset } => {
                info!(frame = %frame, index, offset, "no surface for neighbor, candidate skipped")
            }
            FrameEvent::CandidateEvaluated {
                index,
                mean,
                frames,
            } => {
                let frames: Vec<String> = frames.iter().map(Frame::to_string).collect();
                info!(frame = %frame, index, mean, blended = %frames.join(" "), "candidate evaluated")
            }
            FrameEvent::Committed { index, mean } => {
                info!(frame = %frame, index, mean, "best mean error to lidar")
            }
            FrameEvent::AmbiguousBatch { folders } => {
                error!(frame = %frame, count = folders.len(), ?folders, "found more than one batch folder for frame")
            }
            FrameEvent::Skipped { reason } => warn!(frame = %frame, %reason, "frame skipped"),
            FrameEvent::Failed { reason } => error!(frame = %frame, %reason, "blending failed"),
        }
    }
}

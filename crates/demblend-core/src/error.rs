//! Error taxonomy for frame processing, lookups and run configuration.

use std::path::PathBuf;

use demblend_tools::{ReportError, ToolError};

use crate::frame::Frame;

/// Errors raised while processing a single frame.
///
/// None of these escape a [`FrameJob`](crate::job::FrameJob); they are
/// converted into a per-frame status at the job boundary.
#[derive(Debug, thiserror::Error)]
pub enum BlendError {
    #[error("no surface found for frame {frame}")]
    SurfaceMissing { frame: Frame },

    #[error("found {count} batch folders for frame {frame}, expected one")]
    AmbiguousBatch { frame: Frame, count: usize },

    #[error("no ground truth file for frame {frame}")]
    GroundTruthMissing { frame: Frame },

    #[error("no candidate blend could be evaluated for frame {frame}")]
    NoCandidate { frame: Frame },

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Commit {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl BlendError {
    /// Input problems skip the frame; everything else fails it.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            BlendError::SurfaceMissing { .. } | BlendError::AmbiguousBatch { .. }
        )
    }
}

/// Errors raised by the index-file and ground-truth lookups.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("missing index file: {}", path.display())]
    IndexMissing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed line {line} in {}: {content:?}", path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("no ground truth file matches image {}", image.display())]
    NoGroundTruth { image: PathBuf },
}

/// Errors raised while validating the run configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("the yyyymmdd field must have length 8 or 9, got {0:?}")]
    DateLength(String),

    #[error("not a valid date: {0:?}")]
    InvalidDate(String),

    #[error("site must not be empty")]
    EmptySite,

    #[error("start frame {start} is after stop frame {stop}")]
    InvalidRange { start: Frame, stop: Frame },

    #[error("bundle length must be at least 1")]
    ZeroBundleLength,

    #[error("number of processes must be at least 1")]
    ZeroProcesses,
}

/// Result type for frame processing.
pub type Result<T> = std::result::Result<T, BlendError>;

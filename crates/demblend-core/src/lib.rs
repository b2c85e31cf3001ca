//! demblend Core Library
//!
//! Per-frame neighbor blending of elevation surfaces. For every frame the
//! surface is blended with a growing set of neighbors (self, +1, -1, +2, -2),
//! each blend is scored against lidar ground truth, and the blend with the
//! lowest mean error is kept as the frame's final result.

pub mod candidates;
pub mod cancel;
pub mod committer;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fakes;
pub mod frame;
pub mod ground_truth;
pub mod index;
pub mod job;
pub mod layout;
pub mod locator;
pub mod reporter;
pub mod scheduler;
pub mod selector;
pub mod telemetry;

pub use candidates::{Candidate, CandidateBuilder, NEIGHBOR_OFFSETS};
pub use cancel::CancelToken;
pub use committer::{CommitSummary, ResultCommitter};
pub use config::{default_output_folder, validate_date, RunConfig};
pub use error::{BlendError, ConfigError, LookupError, Result};
pub use evaluator::{BlendEvaluator, CandidateArtifacts, Evaluation};
pub use frame::Frame;
pub use ground_truth::{csv_format_for, GroundTruthCatalog};
pub use index::FrameIndex;
pub use job::{FrameJob, FrameJobFactory, FrameOutcome, FrameStatus};
pub use layout::{FinalArtifacts, RunLayout};
pub use locator::{FrameLocator, GlobFrameLocator, LocatedSurface, Resolution};
pub use reporter::{FrameEvent, FrameReporter, TracingReporter};
pub use scheduler::{RunReport, SchedulerConfig, TaskScheduler};
pub use selector::BestSelector;
pub use telemetry::init_tracing;

pub use demblend_tools::{ErrorRecord, RunPolicy, ToolCommand, ToolRunner};

/// demblend version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

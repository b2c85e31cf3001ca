//! demblend tools - external surface tool invocation
//!
//! Provides the plumbing between the blending driver and the external
//! surface tools:
//! - Typed command descriptors (`dem_mosaic`, `geodiff`, ad hoc commands)
//! - A subprocess executor behind an async trait seam
//! - An idempotent runner that skips commands whose output already exists
//! - Parsing of the diff tool's CSV report into an [`ErrorRecord`]

pub mod command;
pub mod error;
pub mod executor;
pub mod report;
pub mod runner;

// Re-export key types
pub use command::ToolCommand;
pub use error::{ReportError, ToolError};
pub use executor::{ProcessExecutor, ToolExecutor, ToolOutput};
pub use report::{parse_diff_report, ErrorRecord};
pub use runner::{RunPolicy, ToolRun, ToolRunner};

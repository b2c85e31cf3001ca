//! Validated run configuration.

use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

use demblend_tools::RunPolicy;

use crate::error::ConfigError;
use crate::frame::Frame;
use crate::layout::RunLayout;
use crate::scheduler::SchedulerConfig;

/// Everything a blending run needs, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Acquisition date, `YYYYMMDD` plus an optional flight letter.
    pub yyyymmdd: String,
    pub site: String,
    pub output_folder: PathBuf,
    pub processing_subfolder: Option<String>,
    pub bundle_length: u32,
    pub start_frame: Frame,
    /// Excluded.
    pub stop_frame: Frame,
    pub num_processes: usize,
    /// Threads per blend process; 0 leaves it to the tool.
    pub num_threads: usize,
    pub redo: bool,
    pub suppress_output: bool,
    pub poll_interval: Duration,
}

impl RunConfig {
    /// Check the configuration before any frame work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_date(&self.yyyymmdd)?;
        if self.site.trim().is_empty() {
            return Err(ConfigError::EmptySite);
        }
        if self.start_frame > self.stop_frame {
            return Err(ConfigError::InvalidRange {
                start: self.start_frame,
                stop: self.stop_frame,
            });
        }
        if self.bundle_length == 0 {
            return Err(ConfigError::ZeroBundleLength);
        }
        if self.num_processes == 0 {
            return Err(ConfigError::ZeroProcesses);
        }
        Ok(())
    }

    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.output_folder, self.processing_subfolder.as_deref())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            start_frame: self.start_frame,
            stop_frame: self.stop_frame,
            num_processes: self.num_processes,
            poll_interval: self.poll_interval,
        }
    }

    pub fn run_policy(&self) -> RunPolicy {
        RunPolicy {
            redo: self.redo,
            suppress_output: self.suppress_output,
        }
    }
}

/// Parse an acquisition date. Nine characters are allowed for dates with a
/// trailing flight letter, e.g. `20100422a`.
pub fn validate_date(yyyymmdd: &str) -> Result<NaiveDate, ConfigError> {
    let len = yyyymmdd.len();
    if !yyyymmdd.is_ascii() || (len != 8 && len != 9) {
        return Err(ConfigError::DateLength(yyyymmdd.to_string()));
    }
    if len == 9 && !yyyymmdd.as_bytes()[8].is_ascii_alphabetic() {
        return Err(ConfigError::InvalidDate(yyyymmdd.to_string()));
    }
    NaiveDate::parse_from_str(&yyyymmdd[..8], "%Y%m%d")
        .map_err(|_| ConfigError::InvalidDate(yyyymmdd.to_string()))
}

/// Output folder used when none is given, e.g. `GR_20120315`.
pub fn default_output_folder(site: &str, yyyymmdd: &str) -> PathBuf {
    PathBuf::from(format!("{}_{}", site, yyyymmdd))
}

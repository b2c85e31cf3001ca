//! Parsing of the diff tool's CSV report.
//!
//! The report starts with a block of `#` comment lines carrying summary
//! statistics, followed by per-point rows:
//!
//! ```text
//! # Max difference:       4.12
//! # Min difference:       0.0003
//! # Mean difference:      0.87
//! # StdDev of difference: 0.51
//! # Median difference:    0.79
//! 69.1, -49.6, 0.21
//! ```
//!
//! Only the header is read.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ReportError;

/// Summary statistics of a surface compared to ground truth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    /// Mean absolute difference; the selection criterion.
    pub mean: f64,

    #[serde(default)]
    pub max: Option<f64>,

    #[serde(default)]
    pub min: Option<f64>,

    #[serde(default)]
    pub std_dev: Option<f64>,

    #[serde(default)]
    pub median: Option<f64>,
}

impl ErrorRecord {
    /// Record with only a mean.
    pub fn with_mean(mean: f64) -> Self {
        Self {
            mean,
            max: None,
            min: None,
            std_dev: None,
            median: None,
        }
    }

    /// Parse the header of a report's text. `path` is used for errors only.
    pub fn from_report_text(text: &str, path: &Path) -> Result<Self, ReportError> {
        let mut mean = None;
        let mut max = None;
        let mut min = None;
        let mut std_dev = None;
        let mut median = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix('#') else {
                // past the header
                break;
            };
            let Some((label, value)) = comment.split_once(':') else {
                continue;
            };

            let slot = match label.split_whitespace().next() {
                Some("Max") => &mut max,
                Some("Min") => &mut min,
                Some("Mean") => &mut mean,
                Some("StdDev") => &mut std_dev,
                Some("Median") => &mut median,
                _ => continue,
            };

            let value = value.trim();
            let parsed = value
                .parse::<f64>()
                .map_err(|_| ReportError::MalformedValue {
                    path: path.to_path_buf(),
                    field: label.trim().to_string(),
                    value: value.to_string(),
                })?;
            *slot = Some(parsed);
        }

        let mean = mean.ok_or_else(|| ReportError::MissingMean {
            path: path.to_path_buf(),
        })?;

        Ok(Self {
            mean,
            max,
            min,
            std_dev,
            median,
        })
    }
}

/// Read and parse the report at `path`.
pub fn parse_diff_report(path: &Path) -> Result<ErrorRecord, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ErrorRecord::from_report_text(&text, path)
}

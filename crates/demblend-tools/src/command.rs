//! Typed descriptors for external tool invocations.
//!
//! Commands are an explicit program plus argument vector, never a shell
//! string, so paths with spaces or quotes pass through untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Program that mosaics (blends) a list of surfaces into one raster.
pub const BLEND_TOOL: &str = "dem_mosaic";

/// Program that compares a raster against a ground-truth point cloud.
pub const DIFF_TOOL: &str = "geodiff";

/// Suffix the blend tool appends to its output prefix.
pub const BLEND_OUTPUT_SUFFIX: &str = "-tile-0.tif";

/// Suffix the diff tool appends to its output prefix.
pub const DIFF_OUTPUT_SUFFIX: &str = "-diff.csv";

/// A single external tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,

    /// Arguments passed verbatim to the program.
    pub args: Vec<String>,

    /// File the command is expected to produce, if any.
    ///
    /// When set, the runner treats an existing file as a cache hit and
    /// requires the file to exist after the command runs.
    pub output: Option<PathBuf>,
}

impl ToolCommand {
    /// Create an ad hoc command with no expected output.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output: None,
        }
    }

    /// Blend `surfaces` using the first one as the reference datum.
    ///
    /// `threads == 0` leaves the thread count to the tool.
    pub fn dem_mosaic(surfaces: &[PathBuf], threads: usize, output_prefix: &Path) -> Self {
        let mut args = vec!["--first-dem-as-reference".to_string()];
        args.extend(surfaces.iter().map(|p| p.to_string_lossy().into_owned()));
        if threads > 0 {
            args.push("--threads".to_string());
            args.push(threads.to_string());
        }
        args.push("-o".to_string());
        args.push(output_prefix.to_string_lossy().into_owned());

        Self {
            program: BLEND_TOOL.to_string(),
            args,
            output: Some(blend_output_path(output_prefix)),
        }
    }

    /// Compare `blended` against `ground_truth` and write an absolute
    /// difference report.
    pub fn geodiff(
        blended: &Path,
        ground_truth: &Path,
        csv_format: &str,
        output_prefix: &Path,
    ) -> Self {
        let args = vec![
            "--absolute".to_string(),
            "--csv-format".to_string(),
            csv_format.to_string(),
            blended.to_string_lossy().into_owned(),
            ground_truth.to_string_lossy().into_owned(),
            "-o".to_string(),
            output_prefix.to_string_lossy().into_owned(),
        ];

        Self {
            program: DIFF_TOOL.to_string(),
            args,
            output: Some(diff_output_path(output_prefix)),
        }
    }

    /// Set the expected output path.
    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = Some(output);
        self
    }

    /// Value of the argument following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Raster written by the blend tool for `output_prefix`.
pub fn blend_output_path(output_prefix: &Path) -> PathBuf {
    with_suffix(output_prefix, BLEND_OUTPUT_SUFFIX)
}

/// Report written by the diff tool for `output_prefix`.
pub fn diff_output_path(output_prefix: &Path) -> PathBuf {
    with_suffix(output_prefix, DIFF_OUTPUT_SUFFIX)
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = prefix.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

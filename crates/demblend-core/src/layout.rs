//! On-disk layout and naming conventions.
//!
//! ```text
//! <output>/
//!   ortho/ortho_index.csv
//!   lidar/<ground truth files>
//!   processed/[<subfolder>/]batch_<frame>_<end>_<bundle>/
//!     out-align-DEM.tif          input surface
//!     out-blend-<i>-tile-0.tif   candidate blend
//!     out-blend-<i>-diff.csv     candidate diff report
//!     out-blend-DEM.tif          final blend
//!     out-blend-DEM-diff.csv     final diff report
//! ```

use std::path::{Path, PathBuf};

use crate::frame::Frame;

/// Upstream-produced aligned surface inside a batch folder.
pub const SURFACE_FILE: &str = "out-align-DEM.tif";

/// Prefix of the two final outputs.
pub const FINAL_PREFIX: &str = "out-blend-DEM";

/// Prefix of per-candidate outputs, followed by the candidate index.
pub const CANDIDATE_PREFIX: &str = "out-blend-";

pub const ORTHO_INDEX_FILE: &str = "ortho_index.csv";

/// Name of the batch folder starting at `frame`.
pub fn batch_folder_name(frame: Frame, end_frame: Frame, bundle_length: u32) -> String {
    format!("batch_{}_{}_{}", frame, end_frame, bundle_length)
}

/// Glob matching every batch folder that starts at `frame`.
pub fn batch_folder_pattern(process_folder: &Path, frame: Frame, bundle_length: u32) -> String {
    let root = glob::Pattern::escape(&process_folder.to_string_lossy());
    format!("{}/batch_{}_*_{}", root, frame, bundle_length)
}

/// Output prefix of candidate `index` inside `batch_folder`.
pub fn candidate_prefix(batch_folder: &Path, index: usize) -> PathBuf {
    batch_folder.join(format!("{}{}", CANDIDATE_PREFIX, index))
}

/// The committed result pair of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifacts {
    pub blend: PathBuf,
    pub diff: PathBuf,
}

impl FinalArtifacts {
    pub fn for_batch(batch_folder: &Path) -> Self {
        Self {
            blend: batch_folder.join(format!("{}.tif", FINAL_PREFIX)),
            diff: demblend_tools::command::diff_output_path(&batch_folder.join(FINAL_PREFIX)),
        }
    }

    /// Both final files are present.
    pub fn exist(&self) -> bool {
        self.blend.exists() && self.diff.exists()
    }
}

/// Folder structure of one run, derived from the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub output_folder: PathBuf,
    pub process_folder: PathBuf,
    pub ortho_folder: PathBuf,
    pub lidar_folder: PathBuf,
}

impl RunLayout {
    pub fn new(output_folder: impl Into<PathBuf>, processing_subfolder: Option<&str>) -> Self {
        let output_folder = output_folder.into();
        let mut process_folder = output_folder.join("processed");
        if let Some(sub) = processing_subfolder {
            process_folder = process_folder.join(sub);
        }

        Self {
            ortho_folder: output_folder.join("ortho"),
            lidar_folder: output_folder.join("lidar"),
            process_folder,
            output_folder,
        }
    }

    pub fn ortho_index_path(&self) -> PathBuf {
        self.ortho_folder.join(ORTHO_INDEX_FILE)
    }
}

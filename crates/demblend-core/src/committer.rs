//! Promote the winning candidate and wipe the rest.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{BlendError, Result};
use crate::evaluator::CandidateArtifacts;
use crate::layout::FinalArtifacts;

/// What a commit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub finals: FinalArtifacts,
    /// Intermediate files that were deleted.
    pub wiped: Vec<PathBuf>,
}

/// Moves a frame's best candidate to the final names.
pub struct ResultCommitter {
    finals: FinalArtifacts,
}

impl ResultCommitter {
    pub fn new(batch_folder: &Path) -> Self {
        Self {
            finals: FinalArtifacts::for_batch(batch_folder),
        }
    }

    pub fn finals(&self) -> &FinalArtifacts {
        &self.finals
    }

    /// Rename `best` to the final names, then delete every file in
    /// `produced` plus the tools' log files.
    ///
    /// The final diff is written last, so a frame only looks committed once
    /// both files are in place.
    pub fn commit(
        &self,
        best: &CandidateArtifacts,
        produced: &[CandidateArtifacts],
    ) -> Result<CommitSummary> {
        remove_if_present(&self.finals.diff);
        rename(&best.blend, &self.finals.blend)?;
        rename(&best.diff, &self.finals.diff)?;
        info!(
            blend = %self.finals.blend.display(),
            diff = %self.finals.diff.display(),
            "committed best blend"
        );

        let mut wiped = Vec::new();
        for artifacts in produced {
            for path in [&artifacts.blend, &artifacts.diff] {
                if remove_if_present(path) {
                    wiped.push(path.clone());
                }
            }
            for log in log_files(artifacts) {
                if remove_if_present(&log) {
                    wiped.push(log);
                }
            }
        }

        Ok(CommitSummary {
            finals: self.finals.clone(),
            wiped,
        })
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).map_err(|source| BlendError::Commit {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

/// Best-effort delete. Returns true if a file was removed.
fn remove_if_present(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "wiped");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not wipe file");
            false
        }
    }
}

fn log_files(artifacts: &CandidateArtifacts) -> Vec<PathBuf> {
    match glob::glob(&artifacts.log_pattern()) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            warn!(error = %e, "invalid log file pattern");
            Vec::new()
        }
    }
}

//! Frame to surface resolution.
//!
//! A frame's surface lives in the single batch folder named
//! `batch_<frame>_*_<bundle>` under the processing folder. No match means
//! the frame is not available; several matches is an ambiguous setup that
//! is never auto-resolved.

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::frame::Frame;
use crate::layout::{batch_folder_pattern, SURFACE_FILE};

/// A frame's existing surface and the batch folder holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSurface {
    pub frame: Frame,
    pub surface: PathBuf,
    pub batch_folder: PathBuf,
}

/// Detailed outcome of locating a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(LocatedSurface),

    /// No batch folder starts at this frame.
    NoBatchFolder,

    /// More than one batch folder starts at this frame.
    Ambiguous(Vec<PathBuf>),

    /// The batch folder exists but holds no surface.
    NoSurface { batch_folder: PathBuf },
}

/// Resolves frames to surfaces.
pub trait FrameLocator: Send + Sync {
    /// Locate `frame`, reporting why it could not be resolved.
    fn locate(&self, frame: Frame) -> Resolution;

    /// Locate `frame`, collapsing every failure to `None`.
    ///
    /// Ambiguous matches are logged as errors.
    fn resolve(&self, frame: Frame) -> Option<LocatedSurface> {
        match self.locate(frame) {
            Resolution::Found(located) => Some(located),
            Resolution::Ambiguous(matches) => {
                error!(
                    frame = %frame,
                    count = matches.len(),
                    "found more than one batch folder for frame"
                );
                None
            }
            Resolution::NoBatchFolder | Resolution::NoSurface { .. } => None,
        }
    }
}

/// Locates batch folders by glob under a processing folder.
#[derive(Debug, Clone)]
pub struct GlobFrameLocator {
    process_folder: PathBuf,
    bundle_length: u32,
}

impl GlobFrameLocator {
    pub fn new(process_folder: impl Into<PathBuf>, bundle_length: u32) -> Self {
        Self {
            process_folder: process_folder.into(),
            bundle_length,
        }
    }

    pub fn process_folder(&self) -> &Path {
        &self.process_folder
    }

    fn batch_folders(&self, frame: Frame) -> Vec<PathBuf> {
        let pattern = batch_folder_pattern(&self.process_folder, frame, self.bundle_length);
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                error!(pattern = %pattern, error = %e, "invalid batch folder pattern");
                return Vec::new();
            }
        };

        paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    debug!(error = %e, "unreadable entry while matching batch folders");
                    None
                }
            })
            .filter(|path| path.is_dir())
            .collect()
    }
}

impl FrameLocator for GlobFrameLocator {
    fn locate(&self, frame: Frame) -> Resolution {
        let mut folders = self.batch_folders(frame);

        match folders.len() {
            0 => Resolution::NoBatchFolder,
            1 => {
                let batch_folder = folders.remove(0);
                let surface = batch_folder.join(SURFACE_FILE);
                if surface.exists() {
                    Resolution::Found(LocatedSurface {
                        frame,
                        surface,
                        batch_folder,
                    })
                } else {
                    Resolution::NoSurface { batch_folder }
                }
            }
            _ => {
                folders.sort();
                Resolution::Ambiguous(folders)
            }
        }
    }
}

//! Frame index file: which frames have imagery.
//!
//! One record per line, `<frame>, <image file>[, <url>]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::LookupError;
use crate::frame::Frame;

/// Frame to source image mapping, read once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameIndex {
    entries: BTreeMap<Frame, PathBuf>,
}

impl FrameIndex {
    /// Read the index at `path`. Relative image names resolve against the
    /// index's folder.
    pub fn read(path: &Path) -> Result<Self, LookupError> {
        if !path.exists() {
            return Err(LookupError::IndexMissing {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| LookupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base, path)
    }

    fn parse(text: &str, base: &Path, path: &Path) -> Result<Self, LookupError> {
        let mut entries = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 2 || parts[1].is_empty() {
                continue;
            }
            let frame: i64 = parts[0].parse().map_err(|_| LookupError::MalformedLine {
                path: path.to_path_buf(),
                line: i + 1,
                content: line.to_string(),
            })?;
            entries.insert(Frame(frame), base.join(parts[1]));
        }
        Ok(Self { entries })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (Frame, PathBuf)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Source image recorded for `frame`.
    pub fn image_for(&self, frame: Frame) -> Option<&Path> {
        self.entries.get(&frame).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

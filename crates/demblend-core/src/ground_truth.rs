//! Ground-truth (lidar) file matching.
//!
//! Images and lidar files both carry an acquisition timestamp
//! `YYYYMMDD_HHMMSS` in their names. An image is scored against the lidar
//! file that started most recently before (or at) the image time.

use chrono::NaiveDateTime;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::LookupError;

/// Column layout of LVIS text files.
pub const LVIS_CSV_FORMAT: &str = "5:lat 4:lon 6:height_above_datum";

/// Column layout of ATM csv files.
pub const ATM_CSV_FORMAT: &str = "1:lat 2:lon 3:height_above_datum";

const GROUND_TRUTH_EXTENSIONS: [&str; 2] = ["csv", "txt"];

fn timestamp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{8})_(\d{6})").expect("valid timestamp regex"))
}

/// First valid `YYYYMMDD_HHMMSS` timestamp in the file name of `path`.
pub fn parse_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_string_lossy();
    timestamp_regex().captures_iter(&name).find_map(|caps| {
        let stamp = format!("{}{}", &caps[1], &caps[2]);
        NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M%S").ok()
    })
}

/// Format descriptor the diff tool needs to read `ground_truth`.
pub fn csv_format_for(ground_truth: &Path) -> &'static str {
    let is_lvis = ground_truth
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);
    if is_lvis {
        LVIS_CSV_FORMAT
    } else {
        ATM_CSV_FORMAT
    }
}

/// Timestamped ground-truth files of a run.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthCatalog {
    /// Sorted by timestamp.
    files: Vec<(NaiveDateTime, PathBuf)>,
}

impl GroundTruthCatalog {
    /// List the ground-truth files in `folder`. A missing folder is empty.
    pub fn scan(folder: &Path) -> Result<Self, LookupError> {
        let entries = match std::fs::read_dir(folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(folder = %folder.display(), "no ground truth folder");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(LookupError::Read {
                    path: folder.to_path_buf(),
                    source,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LookupError::Read {
                path: folder.to_path_buf(),
                source,
            })?;
            files.push(entry.path());
        }
        Ok(Self::from_files(files))
    }

    /// Build a catalog from candidate paths, keeping timestamped
    /// `.csv`/`.txt` files only.
    pub fn from_files(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut files: Vec<_> = paths
            .into_iter()
            .filter(|p| has_ground_truth_extension(p))
            .filter_map(|p| parse_timestamp(&p).map(|ts| (ts, p)))
            .collect();
        files.sort();
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The latest ground-truth file not newer than `image`.
    pub fn match_image(&self, image: &Path) -> Result<&Path, LookupError> {
        let no_match = || LookupError::NoGroundTruth {
            image: image.to_path_buf(),
        };
        let image_time = parse_timestamp(image).ok_or_else(no_match)?;

        self.files
            .iter()
            .rev()
            .find(|(ts, _)| *ts <= image_time)
            .map(|(_, path)| path.as_path())
            .ok_or_else(no_match)
    }
}

fn has_ground_truth_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            GROUND_TRUTH_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp(Path::new("lidar/ILATM1B_20111012_145555.ATM4BT4.csv")).unwrap();
        assert_eq!(ts.to_string(), "2011-10-12 14:55:55");
    }

    #[test]
    fn test_parse_timestamp_among_other_digits() {
        // camera id and sequence number precede the stamp
        let ts = parse_timestamp(Path::new("DMS_1000109_03939_20111012_14431829.tif")).unwrap();
        assert_eq!(ts.to_string(), "2011-10-12 14:43:18");
        assert!(parse_timestamp(Path::new("image_2490.tif")).is_none());
    }

    #[test]
    fn test_csv_format() {
        assert_eq!(csv_format_for(Path::new("ILVIS2_20120315_142200.TXT")), LVIS_CSV_FORMAT);
        assert_eq!(csv_format_for(Path::new("ILATM1B_20120315_142200.csv")), ATM_CSV_FORMAT);
    }

    #[test]
    fn test_match_latest_not_after_image() {
        let catalog = GroundTruthCatalog::from_files(vec![
            PathBuf::from("ILATM1B_20111012_150000.csv"),
            PathBuf::from("ILATM1B_20111012_140000.csv"),
            PathBuf::from("ILATM1B_20111012_143000.csv"),
            PathBuf::from("ILATM1B_20111012_143000.h5"),
        ]);
        assert_eq!(catalog.len(), 3);

        let found = catalog
            .match_image(Path::new("DMS_20111012_144500_00156.tif"))
            .unwrap();
        assert_eq!(found, Path::new("ILATM1B_20111012_143000.csv"));
    }

    #[test]
    fn test_no_match_before_first_file() {
        let catalog =
            GroundTruthCatalog::from_files(vec![PathBuf::from("ILATM1B_20111012_150000.csv")]);
        let err = catalog
            .match_image(Path::new("DMS_20111012_144500_00156.tif"))
            .unwrap_err();
        assert!(matches!(err, LookupError::NoGroundTruth { .. }));
    }

    #[test]
    fn test_scan_folder() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ILATM1B_20111012_140000.csv"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let catalog = GroundTruthCatalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_scan_missing_folder_is_empty() {
        let catalog = GroundTruthCatalog::scan(Path::new("/nonexistent/lidar")).unwrap();
        assert!(catalog.is_empty());
    }
}

//! Frame identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A frame number within a contiguous acquisition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frame(pub i64);

impl Frame {
    /// The frame `delta` positions away from this one, or `None` past the
    /// ends of the number range.
    pub fn offset(self, delta: i64) -> Option<Frame> {
        self.0.checked_add(delta).map(Frame)
    }

    pub fn number(self) -> i64 {
        self.0
    }

    /// Frames in the half-open range `[start, stop)`.
    pub fn range(start: Frame, stop: Frame) -> impl Iterator<Item = Frame> {
        (start.0..stop.0).map(Frame)
    }
}

impl From<i64> for Frame {
    fn from(n: i64) -> Self {
        Frame(n)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset() {
        assert_eq!(Frame(2490).offset(1), Some(Frame(2491)));
        assert_eq!(Frame(2490).offset(-2), Some(Frame(2488)));
    }

    #[test]
    fn test_offset_past_range_is_none() {
        assert_eq!(Frame(i64::MAX).offset(1), None);
        assert_eq!(Frame(i64::MIN + 1).offset(-2), None);
        assert_eq!(Frame(i64::MAX - 1).offset(1), Some(Frame(i64::MAX)));
    }

    #[test]
    fn test_range_excludes_stop() {
        let frames: Vec<_> = Frame::range(Frame(2489), Frame(2491)).collect();
        assert_eq!(frames, vec![Frame(2489), Frame(2490)]);
    }

    #[test]
    fn test_empty_range() {
        assert_eq!(Frame::range(Frame(5), Frame(5)).count(), 0);
        assert_eq!(Frame::range(Frame(6), Frame(5)).count(), 0);
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Frame(42)).unwrap();
        assert_eq!(json, "42");
    }
}

//! Candidate neighbor sets.
//!
//! Candidate `i` blends the surfaces of the target frame shifted by
//! `NEIGHBOR_OFFSETS[0..=i]`. Offsets that do not resolve are left out.
//! When the newest offset `NEIGHBOR_OFFSETS[i]` does not resolve, candidate
//! `i` would repeat candidate `i - 1`, so no candidate is produced for it.

use std::path::PathBuf;
use tracing::debug;

use crate::frame::Frame;
use crate::locator::{FrameLocator, LocatedSurface};

/// Neighbor offsets in the order they are added to a blend.
pub const NEIGHBOR_OFFSETS: [i64; 5] = [0, 1, -1, 2, -2];

/// One trial blend: the surfaces resolved for offsets `0..=index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Position in [`NEIGHBOR_OFFSETS`] of the newest neighbor.
    pub index: usize,

    /// Resolved members in offset order. The first one is the target frame.
    pub members: Vec<LocatedSurface>,
}

impl Candidate {
    /// Surface paths in blend order.
    pub fn surfaces(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.surface.clone()).collect()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.members.iter().map(|m| m.frame).collect()
    }
}

/// Lazily yields the candidates of one frame in index order.
///
/// Each offset is resolved once; later candidates reuse earlier results.
pub struct CandidateBuilder<'a> {
    locator: &'a dyn FrameLocator,
    frame: Frame,
    resolved: Vec<Option<LocatedSurface>>,
}

impl<'a> CandidateBuilder<'a> {
    pub fn new(locator: &'a dyn FrameLocator, frame: Frame) -> Self {
        Self {
            locator,
            frame,
            resolved: Vec::with_capacity(NEIGHBOR_OFFSETS.len()),
        }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }
}

impl Iterator for CandidateBuilder<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while self.resolved.len() < NEIGHBOR_OFFSETS.len() {
            let index = self.resolved.len();
            let offset = NEIGHBOR_OFFSETS[index];
            let newest = self
                .frame
                .offset(offset)
                .and_then(|neighbor| self.locator.resolve(neighbor));
            let newest_found = newest.is_some();
            self.resolved.push(newest);

            if !newest_found {
                debug!(
                    frame = %self.frame,
                    index,
                    offset,
                    "neighbor not available, skipping candidate"
                );
                continue;
            }

            let members = self.resolved.iter().flatten().cloned().collect();
            return Some(Candidate { index, members });
        }
        None
    }
}

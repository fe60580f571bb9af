//! Resolved arrangements

use crate::engine::TransitionTiming;
use crate::types::{ArrangementTag, SegmentClip};

/// An arrangement with its clips resolved
///
/// `beats` and `bars` are in arrangement-local seconds, ascending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arrangement {
    pub name: String,
    pub tag: ArrangementTag,
    pub segments: Vec<SegmentClip>,
    pub beats: Vec<f64>,
    pub bars: Vec<f64>,
}

impl Arrangement {
    /// Sum of segment durations in seconds
    pub fn length(&self) -> f64 {
        self.segments.iter().map(SegmentClip::duration).sum()
    }

    /// Mark array a timing mode aligns to; `Now` needs none
    pub fn timing_marks(&self, timing: TransitionTiming) -> Option<&[f64]> {
        match timing {
            TransitionTiming::Now => None,
            TransitionTiming::NextBeat => Some(self.beats.as_slice()),
            TransitionTiming::NextBar => Some(self.bars.as_slice()),
        }
    }
}

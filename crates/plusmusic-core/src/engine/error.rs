//! Engine error types

use thiserror::Error;

use super::transition::TransitionTiming;
use crate::types::ArrangementTag;

/// Errors returned by transition and playback requests
///
/// A failed request leaves playback untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The loaded track declares no arrangement for this tag
    #[error("No arrangement for tag {0}")]
    MissingArrangement(ArrangementTag),

    /// Beat/bar aligned timing requested but the playing arrangement has no marks
    #[error("No timing marks available for {timing:?}")]
    MissingTimingData { timing: TransitionTiming },

    /// A request that needs a track arrived before one was loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// The arrangement exists but produced no playable audio
    #[error("Arrangement {0} has no audio")]
    EmptyArrangement(ArrangementTag),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

//! Arrangement reconstruction
//!
//! Turns the continuous source stems of a track into per-arrangement
//! buffers:
//!
//! ```text
//! TrackStems (decoded, continuous)
//!     │
//!     ├─► reconstruct(layer)      ← one stem, segments spliced + crossfaded
//!     │       └─► filter pass     ← only for tracks with has_filter
//!     └─► reconstruct_all()       ← all stems in parallel
//!             └─► FullMix         ← summed from the stems, or rebuilt directly
//! ```

mod reconstructor;
mod stems;

pub use reconstructor::{
    splice_gains, ArrangementReconstructor, ReconstructionReport, DEFAULT_GUARD_FRAMES,
    DEFAULT_OVERLAP_SECONDS,
};
pub use stems::{ArrangementAudio, TrackStems};

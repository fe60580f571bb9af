//! Track and project loading
//!
//! Loading runs a fixed chain of stages on a background thread:
//!
//! ```text
//! project metadata → track metadata → track image → track audio → auto-play
//! ```
//!
//! - Every stage reads the stem cache first and stores what it fetched; a
//!   fetched container is also split into one cache entry per stem
//! - A failed stage counts towards `abort_threshold`; past it the rest of the
//!   request is aborted
//! - Requests run one at a time in FIFO order and can be cancelled through
//!   their [`LoadHandle`] between stages
//!
//! The network is reached only through the [`Fetcher`] trait.

mod error;
mod fetch;
mod stage;
mod track;
mod track_loader;

pub use error::{LoadError, LoadResult};
pub use fetch::{CancelToken, Fetcher, MemoryFetcher};
pub use stage::{
    LoadOutcome, LoadPipeline, LoadRequest, LoadStage, ProjectRef, SharedStemCache, StageReport,
    StageStatus,
};
pub use track::LoadedTrack;
pub use track_loader::{LoadHandle, LoaderEvent, TrackLoader};

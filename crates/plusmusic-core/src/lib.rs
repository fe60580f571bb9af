//! PlusMusic Core - adaptive music playback
//!
//! Tracks ship as AAI containers of continuous stems plus metadata that
//! describes arrangements as lists of timed segments. The core parses the
//! container, rebuilds each arrangement from the stems with short splice
//! crossfades, and moves playback between arrangements with timed,
//! curve-shaped volume blends.
//!
//! ```text
//! loader ──► container ──► audio ──► arrangement ──► engine ──► sink
//!   │                                     │
//!   └──────────── cache                  mix
//! ```

pub mod arrangement;
pub mod audio;
pub mod cache;
pub mod config;
pub mod container;
pub mod engine;
pub mod loader;
pub mod metadata;
pub mod mix;
pub mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use types::*;

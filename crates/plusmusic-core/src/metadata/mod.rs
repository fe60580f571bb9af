//! Project and track metadata
//!
//! Parses the JSON the backend serves for projects and tracks and resolves
//! a track's arrangements (ordered lists of segment ids) into playable
//! [`Arrangement`]s.

mod arrangement;
mod error;
mod track;

pub use arrangement::Arrangement;
pub use error::{MetadataError, MetadataResult};
pub use track::{ArrangementInfo, ProjectInfo, SegmentInfo, TrackInfo};

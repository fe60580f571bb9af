use thiserror::Error;

use super::stage::LoadStage;
use crate::audio::DecodeError;
use crate::container::ContainerError;
use crate::metadata::MetadataError;
use crate::types::ArrangementTag;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("track {0} has no audio url")]
    MissingAudioUrl(String),

    #[error("no playable audio in track {0}")]
    NoAudio(String),

    #[error("track has no {0} arrangement")]
    MissingArrangement(ArrangementTag),

    #[error("{0} stage aborted")]
    Aborted(LoadStage),

    #[error("request {0} cancelled")]
    Cancelled(u64),

    #[error("loader thread is gone")]
    Disconnected,

    #[error("failed to spawn loader thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl LoadError {
    pub fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
        LoadError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

//! A fully loaded track, ready for the engine

use super::error::{LoadError, LoadResult};
use crate::arrangement::TrackStems;
use crate::container::{parse_container, ParsedContainer, RawChunk, RawKind};
use crate::metadata::{ProjectInfo, TrackInfo};
use crate::mix::FilterImpulse;

/// Everything the engine needs to play a track
#[derive(Debug, Clone)]
pub struct LoadedTrack {
    pub info: TrackInfo,
    pub project: Option<ProjectInfo>,
    pub stems: TrackStems,
    /// Impulse from the container, if it carried one
    pub filter: Option<FilterImpulse>,
    pub image: Option<Vec<u8>>,
}

impl LoadedTrack {
    pub fn new(info: TrackInfo, stems: TrackStems) -> Self {
        Self {
            info,
            project: None,
            stems,
            filter: None,
            image: None,
        }
    }

    /// Build from an AAI container
    pub fn from_container(info: TrackInfo, bytes: &[u8]) -> LoadResult<Self> {
        let (stems, filter) = decode_container(&info.id, bytes)?;
        Ok(Self {
            filter,
            ..Self::new(info, stems)
        })
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Filter pass applies to this track
    pub fn uses_filter(&self) -> bool {
        self.info.has_filter && self.filter.is_some()
    }
}

/// Decode stems and the filter impulse out of container bytes
pub(crate) fn decode_container(
    track_id: &str,
    bytes: &[u8],
) -> LoadResult<(TrackStems, Option<FilterImpulse>)> {
    let parsed = parse_container(bytes)?;
    decode_parsed(track_id, &parsed)
}

/// Decode stems and the filter impulse out of an already parsed container
pub(crate) fn decode_parsed(
    track_id: &str,
    parsed: &ParsedContainer,
) -> LoadResult<(TrackStems, Option<FilterImpulse>)> {
    if !parsed.complete {
        log::warn!("[LOADER] Container for {} is damaged, using the chunks before the damage", track_id);
    }

    let stems = TrackStems::from_container(parsed);
    if stems.is_empty() {
        return Err(LoadError::NoAudio(track_id.to_string()));
    }

    let filter = parsed
        .raw_of(RawKind::FilterImpulse)
        .and_then(|raw| decode_filter(track_id, raw));

    Ok((stems, filter))
}

pub(crate) fn decode_filter(track_id: &str, raw: &RawChunk) -> Option<FilterImpulse> {
    match FilterImpulse::from_raw_chunk(raw) {
        Ok(filter) => Some(filter),
        Err(e) => {
            log::warn!("[LOADER] Ignoring undecodable filter impulse in {}: {}", track_id, e);
            None
        }
    }
}

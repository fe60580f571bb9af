//! Project and track metadata as served by the backend
//!
//! Segment times and beat/bar marks are in the source stem's timeline.
//! Arrangements reference segments by id and are resolved into
//! [`Arrangement`]s whose marks are in arrangement-local time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::arrangement::Arrangement;
use super::error::{MetadataError, MetadataResult};
use crate::types::{ArrangementTag, SegmentClip};

/// A project groups the tracks a game can play
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<String>,
    /// Track loaded when the project is opened
    #[serde(default)]
    pub default_track: Option<String>,
}

impl ProjectInfo {
    pub fn from_json(json: &str) -> MetadataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One timed clip of the source stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub beats: Vec<f64>,
    #[serde(default)]
    pub bars: Vec<f64>,
}

impl SegmentInfo {
    pub fn clip(&self) -> SegmentClip {
        SegmentClip::new(self.start_time, self.end_time)
    }
}

/// Named, tagged list of segment ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementInfo {
    #[serde(default)]
    pub name: String,
    #[serde(
        rename = "type_id",
        serialize_with = "serialize_tag",
        deserialize_with = "deserialize_tag"
    )]
    pub tag: ArrangementTag,
    /// Ordered segment ids
    #[serde(default)]
    pub parts: Vec<String>,
}

/// Track metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Every layer of this track gets the filter pass
    #[serde(default)]
    pub has_filter: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub bpm: Option<f64>,
    #[serde(default)]
    pub segments: Vec<SegmentInfo>,
    #[serde(default)]
    pub arrangements: Vec<ArrangementInfo>,
}

impl TrackInfo {
    /// Parse and validate track metadata
    pub fn from_json(json: &str) -> MetadataResult<Self> {
        let info: TrackInfo = serde_json::from_str(json)?;
        for segment in &info.segments {
            if segment.end_time < segment.start_time {
                return Err(MetadataError::InvalidSegment {
                    id: segment.id.clone(),
                    start_time: segment.start_time,
                    end_time: segment.end_time,
                });
            }
        }
        Ok(info)
    }

    pub fn to_json(&self) -> MetadataResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn segment(&self, id: &str) -> Option<&SegmentInfo> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    /// First arrangement declared for a tag
    pub fn arrangement_info(&self, tag: ArrangementTag) -> Option<&ArrangementInfo> {
        self.arrangements.iter().find(|info| info.tag == tag)
    }

    /// Resolve the arrangement for a tag, if the track declares one
    pub fn arrangement(&self, tag: ArrangementTag) -> Option<Arrangement> {
        self.arrangement_info(tag).map(|info| self.resolve_arrangement(info))
    }

    /// Resolve segment ids into clips and shift beat/bar marks into
    /// arrangement-local time
    ///
    /// Ids with no matching segment are skipped with a warning; the
    /// remaining parts still form a usable arrangement.
    pub fn resolve_arrangement(&self, info: &ArrangementInfo) -> Arrangement {
        let mut segments = Vec::with_capacity(info.parts.len());
        let mut beats = Vec::new();
        let mut bars = Vec::new();
        let mut cursor = 0.0;

        for part in &info.parts {
            let Some(segment) = self.segment(part) else {
                log::warn!(
                    "Arrangement {:?} ({}) references missing segment {:?}, skipping",
                    info.name,
                    info.tag,
                    part
                );
                continue;
            };

            let clip = segment.clip();
            let shift = |marks: &[f64], out: &mut Vec<f64>| {
                out.extend(
                    marks
                        .iter()
                        .filter(|&&t| t >= clip.start_time && t < clip.end_time)
                        .map(|&t| cursor + (t - clip.start_time)),
                );
            };
            shift(&segment.beats, &mut beats);
            shift(&segment.bars, &mut bars);

            cursor += clip.duration();
            segments.push(clip);
        }

        Arrangement {
            name: info.name.clone(),
            tag: info.tag,
            segments,
            beats,
            bars,
        }
    }
}

fn serialize_tag<S: Serializer>(tag: &ArrangementTag, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(tag.id())
}

/// Accepts either the numeric `type_id` or the snake_case tag name
fn deserialize_tag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ArrangementTag, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagRepr {
        Id(u16),
        Name(String),
    }

    match TagRepr::deserialize(deserializer)? {
        TagRepr::Id(id) => ArrangementTag::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown arrangement type_id {}", id))),
        TagRepr::Name(name) => name.parse().map_err(serde::de::Error::custom),
    }
}

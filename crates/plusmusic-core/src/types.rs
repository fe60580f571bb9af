//! Common types for PlusMusic
//!
//! This module contains the fundamental types shared by the container reader,
//! the arrangement reconstructor and the transition engine: layer and
//! arrangement identifiers, segment clips and the interleaved audio buffer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of playback layers per track (FullMix + 4 stems)
pub const NUM_LAYERS: usize = 5;

/// Number of discrete stems (every layer except FullMix)
pub const NUM_STEMS: usize = 4;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Playback layer identifiers
///
/// Index 0 is reserved for the FullMix layer, which is either supplied
/// directly by a single-track song or synthesized from the four stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Layer {
    FullMix = 0,
    Bass = 1,
    Drums = 2,
    TopMix = 3,
    Vocals = 4,
}

impl Layer {
    /// All layers in index order
    pub const ALL: [Layer; NUM_LAYERS] = [
        Layer::FullMix,
        Layer::Bass,
        Layer::Drums,
        Layer::TopMix,
        Layer::Vocals,
    ];

    /// The four discrete stems (everything but FullMix)
    pub const STEMS: [Layer; NUM_STEMS] = [Layer::Bass, Layer::Drums, Layer::TopMix, Layer::Vocals];

    /// Convert from index (0-4) to Layer
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Layer::FullMix),
            1 => Some(Layer::Bass),
            2 => Some(Layer::Drums),
            3 => Some(Layer::TopMix),
            4 => Some(Layer::Vocals),
            _ => None,
        }
    }

    /// Index into per-layer arrays
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Lowercase name, used as the layer fragment of cache file names
    pub fn name(self) -> &'static str {
        match self {
            Layer::FullMix => "fullmix",
            Layer::Bass => "bass",
            Layer::Drums => "drums",
            Layer::TopMix => "topmix",
            Layer::Vocals => "vocals",
        }
    }
}

/// Arrangement tags a track can provide
///
/// The numeric ids match the `type_id` stored in track metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrangementTag {
    #[default]
    None,
    HighBacking,
    LowBacking,
    BackingTrack,
    Preview,
    Victory,
    Failure,
    Highlight,
    Lowlight,
    FullSong,
}

impl ArrangementTag {
    pub const ALL: [ArrangementTag; 10] = [
        ArrangementTag::None,
        ArrangementTag::HighBacking,
        ArrangementTag::LowBacking,
        ArrangementTag::BackingTrack,
        ArrangementTag::Preview,
        ArrangementTag::Victory,
        ArrangementTag::Failure,
        ArrangementTag::Highlight,
        ArrangementTag::Lowlight,
        ArrangementTag::FullSong,
    ];

    /// Convert from the metadata `type_id`
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Metadata `type_id` of this tag
    pub fn id(self) -> u16 {
        self as u16
    }

    /// snake_case name, identical to the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            ArrangementTag::None => "none",
            ArrangementTag::HighBacking => "high_backing",
            ArrangementTag::LowBacking => "low_backing",
            ArrangementTag::BackingTrack => "backing_track",
            ArrangementTag::Preview => "preview",
            ArrangementTag::Victory => "victory",
            ArrangementTag::Failure => "failure",
            ArrangementTag::Highlight => "highlight",
            ArrangementTag::Lowlight => "lowlight",
            ArrangementTag::FullSong => "full_song",
        }
    }
}

impl fmt::Display for ArrangementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArrangementTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("Unknown arrangement tag: {}", s))
    }
}

/// A timed clip in the original, continuous stem timeline (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentClip {
    pub start_time: f64,
    pub end_time: f64,
}

impl SegmentClip {
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self { start_time, end_time }
    }

    /// Clip duration in seconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// Per-stem volumes carried by a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerVolumes {
    pub bass: f32,
    pub drums: f32,
    pub top_mix: f32,
    pub vocals: f32,
}

impl LayerVolumes {
    /// All four stems at the same volume
    pub fn uniform(volume: f32) -> Self {
        Self {
            bass: volume,
            drums: volume,
            top_mix: volume,
            vocals: volume,
        }
    }

    /// Volume for a stem layer. FullMix has no entry here and returns `None`.
    pub fn get(&self, layer: Layer) -> Option<f32> {
        match layer {
            Layer::FullMix => None,
            Layer::Bass => Some(self.bass),
            Layer::Drums => Some(self.drums),
            Layer::TopMix => Some(self.top_mix),
            Layer::Vocals => Some(self.vocals),
        }
    }
}

impl Default for LayerVolumes {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

/// Interleaved multi-channel audio buffer
///
/// Samples are stored frame by frame: `[c0, c1, .., c0, c1, ..]`. All
/// offsets used by the reconstructor are sample offsets into this vector,
/// aligned to a multiple of `channels`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    pub samples: Vec<Sample>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap existing interleaved samples
    pub fn new(samples: Vec<Sample>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Create a buffer of `frames` silent frames
    pub fn silence(frames: usize, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: vec![0.0; frames * channels.max(1) as usize],
            channels,
            sample_rate,
        }
    }

    /// Number of sample frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the buffer's sample rate
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.abs()).fold(0.0, Sample::max)
    }

    /// Mono downmix of this buffer
    pub fn to_mono(&self) -> AudioBuffer {
        AudioBuffer {
            samples: crate::mix::to_mono(&self.samples, self.channels),
            channels: 1,
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_enumeration() {
        assert_eq!(Layer::ALL.len(), NUM_LAYERS);
        assert_eq!(Layer::FullMix.index(), 0);
        assert_eq!(Layer::Vocals.index(), 4);
        assert_eq!(Layer::from_index(3), Some(Layer::TopMix));
        assert_eq!(Layer::from_index(5), None);
        assert!(!Layer::STEMS.contains(&Layer::FullMix));
    }

    #[test]
    fn test_arrangement_tag_ids() {
        for tag in ArrangementTag::ALL {
            assert_eq!(ArrangementTag::from_id(tag.id()), Some(tag));
            assert_eq!(tag.as_str().parse::<ArrangementTag>(), Ok(tag));
        }
        assert_eq!(ArrangementTag::from_id(10), None);
        assert_eq!(ArrangementTag::BackingTrack.to_string(), "backing_track");
    }

    #[test]
    fn test_arrangement_tag_serde_matches_display() {
        let json = serde_json::to_string(&ArrangementTag::FullSong).unwrap();
        assert_eq!(json, "\"full_song\"");
    }

    #[test]
    fn test_audio_buffer_frames() {
        let buffer = AudioBuffer::silence(100, 2, 44100);
        assert_eq!(buffer.samples.len(), 200);
        assert_eq!(buffer.frames(), 100);
        assert!((buffer.duration_seconds() - 100.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_segment_duration_never_negative() {
        assert_eq!(SegmentClip::new(2.0, 1.0).duration(), 0.0);
        assert_eq!(SegmentClip::new(1.0, 3.5).duration(), 2.5);
    }
}

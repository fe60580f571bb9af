//! Source stems of a track and the per-arrangement result

use std::sync::Arc;

use crate::audio::decode_stem;
use crate::container::ParsedContainer;
use crate::metadata::Arrangement;
use crate::types::{AudioBuffer, Layer, NUM_LAYERS};

/// Decoded, continuous source stems of one track
#[derive(Debug, Clone, Default)]
pub struct TrackStems {
    layers: [Option<Arc<AudioBuffer>>; NUM_LAYERS],
}

impl TrackStems {
    /// Decode every audio chunk of a container
    ///
    /// A chunk that fails to decode, or names no known layer, is logged and
    /// left out; the remaining layers are still usable. The first chunk for
    /// a layer wins.
    pub fn from_container(container: &ParsedContainer) -> Self {
        let mut stems = Self::default();
        for chunk in &container.audio {
            let Some(layer) = chunk.layer() else {
                log::warn!("Audio chunk {} has unknown layer {}", chunk.header.id, chunk.header.kind);
                continue;
            };
            if stems.get(layer).is_some() {
                log::warn!("Duplicate {} stem in container, ignoring chunk {}", layer.name(), chunk.header.id);
                continue;
            }
            match decode_stem(chunk) {
                Ok(buffer) => stems.insert(layer, buffer),
                Err(e) => log::error!("Failed to decode {} stem: {}", layer.name(), e),
            }
        }
        stems
    }

    pub fn insert(&mut self, layer: Layer, buffer: AudioBuffer) {
        self.layers[layer.index()] = Some(Arc::new(buffer));
    }

    pub fn get(&self, layer: Layer) -> Option<&Arc<AudioBuffer>> {
        self.layers[layer.index()].as_ref()
    }

    /// True when all four discrete stems are present
    pub fn has_stems(&self) -> bool {
        Layer::STEMS.iter().all(|&layer| self.get(layer).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Option::is_none)
    }

    /// Longest source duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.layers
            .iter()
            .flatten()
            .map(|buffer| buffer.duration_seconds())
            .fold(0.0, f64::max)
    }
}

/// Reconstructed layers of one arrangement
///
/// Read-only once built. Buffers are shared by `Arc` with the playback
/// channels, so they live as long as anything still plays them.
#[derive(Debug, Clone)]
pub struct ArrangementAudio {
    arrangement: Arrangement,
    layers: [Option<Arc<AudioBuffer>>; NUM_LAYERS],
}

impl ArrangementAudio {
    pub fn new(arrangement: Arrangement, layers: [Option<Arc<AudioBuffer>>; NUM_LAYERS]) -> Self {
        Self {
            arrangement,
            layers,
        }
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    pub fn layer(&self, layer: Layer) -> Option<&Arc<AudioBuffer>> {
        self.layers[layer.index()].as_ref()
    }

    pub fn layers(&self) -> &[Option<Arc<AudioBuffer>>; NUM_LAYERS] {
        &self.layers
    }

    /// True when the discrete stems were reconstructed
    pub fn has_stems(&self) -> bool {
        Layer::STEMS.iter().all(|&layer| self.layer(layer).is_some())
    }

    /// Playback length in seconds
    pub fn length(&self) -> f64 {
        self.arrangement.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{parse_container, AaiWriter, AudioChunkHeader, AAI_VERSION};

    fn pcm_chunk(kind: u16, value: f32, frames: usize) -> (AudioChunkHeader, Vec<u8>) {
        let data: Vec<u8> = std::iter::repeat(value)
            .take(frames * 2)
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let header = AudioChunkHeader {
            kind,
            format: 0,
            block_size: 8,
            channels: 2,
            frequency: 44100,
            id: kind as u64,
            data_size: 0,
        };
        (header, data)
    }

    #[test]
    fn test_from_container_decodes_each_layer() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        for kind in 1..=4u16 {
            let (header, data) = pcm_chunk(kind, 0.1 * kind as f32, 100);
            writer.write_audio(header, &data);
        }
        // Unknown layer index and an undecodable format
        let (header, data) = pcm_chunk(9, 0.0, 10);
        writer.write_audio(header, &data);
        let (mut header, data) = pcm_chunk(0, 0.0, 10);
        header.format = 77;
        writer.write_audio(header, &data);

        let parsed = parse_container(&writer.finish()).unwrap();
        let stems = TrackStems::from_container(&parsed);

        assert!(stems.has_stems());
        assert!(stems.get(Layer::FullMix).is_none());
        assert_eq!(stems.get(Layer::Drums).unwrap().frames(), 100);
        assert!((stems.duration_seconds() - 100.0 / 44100.0).abs() < 1e-9);
    }
}

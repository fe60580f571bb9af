//! Gated filter overlay
//!
//! The filter is not a convolution. The mono impulse is added to every
//! channel, scaled by the filter volume, for one full pass of its length;
//! the next pass of the same length adds nothing; then it repeats. Every
//! sample is clamped afterwards, including those in silent passes.

use crate::audio::{decode_filter_impulse, DecodeResult};
use crate::container::RawChunk;
use crate::types::{AudioBuffer, Sample};

/// Single-channel filter signal, loaded once per engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterImpulse {
    samples: Vec<Sample>,
}

impl FilterImpulse {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Decode from the container's filter chunk
    pub fn from_raw_chunk(chunk: &RawChunk) -> DecodeResult<Self> {
        let samples = decode_filter_impulse(chunk)?;
        log::info!("Loaded filter impulse: {} samples", samples.len());
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn apply(&self, buffer: &mut AudioBuffer, volume: Sample, limit: Sample) {
        apply_filter(buffer, &self.samples, volume, limit);
    }
}

/// Overlay `impulse * volume` on alternating full-length passes
pub fn apply_filter(buffer: &mut AudioBuffer, impulse: &[Sample], volume: Sample, limit: Sample) {
    if impulse.is_empty() {
        log::warn!("Filter impulse is empty, skipping filter pass");
        return;
    }

    let channels = buffer.channels.max(1) as usize;
    let mut filter_pos = 0;
    let mut step = true;

    for frame in buffer.samples.chunks_mut(channels) {
        let add = if step { impulse[filter_pos] * volume } else { 0.0 };
        for s in frame.iter_mut() {
            *s = (*s + add).clamp(-limit, limit);
        }

        filter_pos += 1;
        if filter_pos >= impulse.len() {
            filter_pos = 0;
            step = !step;
        }
    }
}

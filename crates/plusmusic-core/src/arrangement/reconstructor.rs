//! Segment splicing with boundary crossfades
//!
//! An arrangement is rebuilt from the continuous source stem by copying
//! each segment clip back to back into a fresh buffer. Where two
//! consecutive clips are not contiguous in the source, the splice is
//! smoothed with a short Hermite crossfade that walks outward from the
//! boundary in both directions at once.

use std::sync::Arc;

use rayon::prelude::*;

use super::stems::{ArrangementAudio, TrackStems};
use crate::metadata::Arrangement;
use crate::mix::{synthesize_full_mix, FilterImpulse, DEFAULT_CLAMP_LIMIT, DEFAULT_FILTER_VOLUME};
use crate::types::{AudioBuffer, Layer, Sample, NUM_LAYERS};

/// Default crossfade window around a splice, in seconds
pub const DEFAULT_OVERLAP_SECONDS: f64 = 0.005;

/// Extra frames appended to absorb rounding of segment boundaries
pub const DEFAULT_GUARD_FRAMES: usize = 2;

/// What happened while rebuilding one layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructionReport {
    pub segments_copied: usize,
    pub crossfades: usize,
    /// Copies trimmed because they would overrun the destination
    pub overflow_trims: usize,
    /// Copies trimmed because the source stem ended early
    pub source_trims: usize,
    pub frames: usize,
}

/// Rebuilds arrangement buffers from continuous source stems
#[derive(Debug, Clone)]
pub struct ArrangementReconstructor {
    overlap_seconds: f64,
    guard_frames: usize,
    filter: Option<Arc<FilterImpulse>>,
    filter_volume: Sample,
    clamp_limit: Sample,
}

impl Default for ArrangementReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP_SECONDS, DEFAULT_GUARD_FRAMES)
    }
}

impl ArrangementReconstructor {
    pub fn new(overlap_seconds: f64, guard_frames: usize) -> Self {
        Self {
            overlap_seconds: overlap_seconds.max(0.0),
            guard_frames,
            filter: None,
            filter_volume: DEFAULT_FILTER_VOLUME,
            clamp_limit: DEFAULT_CLAMP_LIMIT,
        }
    }

    /// Attach the filter used for tracks that declare one
    pub fn with_filter(mut self, filter: Arc<FilterImpulse>, volume: Sample) -> Self {
        self.filter = Some(filter);
        self.filter_volume = volume;
        self
    }

    pub fn with_filter_volume(mut self, volume: Sample) -> Self {
        self.filter_volume = volume;
        self
    }

    pub fn with_clamp_limit(mut self, limit: Sample) -> Self {
        self.clamp_limit = limit;
        self
    }

    pub fn set_filter(&mut self, filter: Option<Arc<FilterImpulse>>) {
        self.filter = filter;
    }

    pub fn filter(&self) -> Option<&Arc<FilterImpulse>> {
        self.filter.as_ref()
    }

    /// Crossfade half-window in frames for a sample rate
    fn half_window(&self, sample_rate: u32) -> usize {
        let overlap_samples = (self.overlap_seconds * sample_rate as f64).round() as usize;
        overlap_samples / 2
    }

    /// Rebuild one layer of an arrangement
    ///
    /// The result holds `round(length * rate) + guard_frames` frames. Each
    /// segment clip is copied back to back from `full`; disjoint splices get
    /// the Hermite crossfade and the filter pass runs last.
    ///
    /// # Arguments
    /// * `layer` - Layer being rebuilt, used for logging only
    /// * `arrangement` - Ordered segment clips in source time
    /// * `full` - Interleaved source stem covering the whole track
    /// * `channels` - Interleave width of `full`
    /// * `sample_rate` - Rate of `full` in Hz
    /// * `has_filter` - Apply the gated filter overlay to the result
    ///
    /// # Example
    ///
    /// ```ignore
    /// let bass = stems.get(Layer::Bass)?;
    /// let buffer = reconstructor.reconstruct(
    ///     Layer::Bass, &arrangement, &bass.samples, bass.channels, bass.sample_rate, false,
    /// );
    /// ```
    pub fn reconstruct(
        &self,
        layer: Layer,
        arrangement: &Arrangement,
        full: &[Sample],
        channels: u16,
        sample_rate: u32,
        has_filter: bool,
    ) -> AudioBuffer {
        self.reconstruct_with_report(layer, arrangement, full, channels, sample_rate, has_filter)
            .0
    }

    /// [`reconstruct`](Self::reconstruct), also returning what was trimmed
    /// and blended
    pub fn reconstruct_with_report(
        &self,
        layer: Layer,
        arrangement: &Arrangement,
        full: &[Sample],
        channels: u16,
        sample_rate: u32,
        has_filter: bool,
    ) -> (AudioBuffer, ReconstructionReport) {
        let mut report = ReconstructionReport::default();

        if arrangement.segments.is_empty() {
            log::warn!(
                "Arrangement {} has no segments, {} layer is empty",
                arrangement.tag,
                layer.name()
            );
            return (AudioBuffer::new(Vec::new(), channels, sample_rate), report);
        }

        let ch = channels.max(1) as usize;
        let rate = sample_rate as f64;
        let total_frames = (arrangement.length() * rate).round() as usize + self.guard_frames;
        let mut dest = vec![0.0; total_frames * ch];

        let to_offset = |time: f64| -> usize {
            let offset = (time * rate).round().max(0.0) as usize * ch;
            offset - offset % ch
        };

        let half = self.half_window(sample_rate);
        let mut cursor = 0;
        let mut prev_end: Option<usize> = None;

        for clip in &arrangement.segments {
            let start = to_offset(clip.start_time);
            let end = to_offset(clip.end_time);

            let mut count = end.saturating_sub(start);
            let room = dest.len() - cursor;
            if count > room {
                log::warn!(
                    "{} layer of {}: segment {:.3}-{:.3}s overflows buffer by {} samples, trimming",
                    layer.name(),
                    arrangement.tag,
                    clip.start_time,
                    clip.end_time,
                    count - room
                );
                report.overflow_trims += 1;
                count = room;
            }
            let source_left = full.len().saturating_sub(start);
            if count > source_left {
                log::warn!(
                    "{} layer of {}: source ends {} samples into segment {:.3}-{:.3}s",
                    layer.name(),
                    arrangement.tag,
                    source_left,
                    clip.start_time,
                    clip.end_time
                );
                report.source_trims += 1;
                count = source_left;
            }

            if count > 0 {
                dest[cursor..cursor + count].copy_from_slice(&full[start..start + count]);
            }

            if let Some(prev_end) = prev_end {
                if start != prev_end && half > 0 {
                    let splice = Splice {
                        boundary: cursor,
                        copied_end: cursor + count,
                        outgoing_from: prev_end,
                        incoming_from: start,
                    };
                    crossfade_splice(&mut dest, full, &splice, half, ch);
                    report.crossfades += 1;
                }
            }

            prev_end = Some(end);
            cursor += count;
            report.segments_copied += 1;
        }

        let mut buffer = AudioBuffer::new(dest, channels, sample_rate);
        report.frames = buffer.frames();

        if has_filter {
            self.filter_pass(&mut buffer);
        }

        log::debug!(
            "Reconstructed {} layer of {}: {} frames, {} segments, {} crossfades",
            layer.name(),
            arrangement.tag,
            report.frames,
            report.segments_copied,
            report.crossfades
        );

        (buffer, report)
    }

    /// Rebuild every available layer of an arrangement
    ///
    /// Stem layers are rebuilt dry and in parallel. With all four stems
    /// present the FullMix layer is summed from those dry stems; otherwise
    /// a FullMix source is rebuilt directly. When `has_filter` is set every
    /// layer then gets exactly one filter pass, so the mix carries the
    /// filter once rather than once per stem.
    pub fn reconstruct_all(
        &self,
        arrangement: &Arrangement,
        stems: &TrackStems,
        has_filter: bool,
    ) -> ArrangementAudio {
        let sources: Vec<(Layer, Arc<AudioBuffer>)> = Layer::STEMS
            .iter()
            .filter_map(|&layer| stems.get(layer).map(|buf| (layer, Arc::clone(buf))))
            .collect();

        let rebuilt: Vec<(Layer, AudioBuffer)> = sources
            .par_iter()
            .map(|(layer, source)| {
                let buffer = self.reconstruct(
                    *layer,
                    arrangement,
                    &source.samples,
                    source.channels,
                    source.sample_rate,
                    false,
                );
                (*layer, buffer)
            })
            .collect();

        let mut layers: [Option<AudioBuffer>; NUM_LAYERS] = Default::default();
        for (layer, buffer) in rebuilt {
            layers[layer.index()] = Some(buffer);
        }

        let full_mix = match (&layers[1], &layers[2], &layers[3], &layers[4]) {
            (Some(bass), Some(drums), Some(top_mix), Some(vocals)) => {
                Some(synthesize_full_mix(bass, drums, top_mix, vocals, self.clamp_limit))
            }
            _ => stems.get(Layer::FullMix).map(|source| {
                self.reconstruct(
                    Layer::FullMix,
                    arrangement,
                    &source.samples,
                    source.channels,
                    source.sample_rate,
                    false,
                )
            }),
        };
        if full_mix.is_none() {
            log::warn!("Arrangement {} has no FullMix layer", arrangement.tag);
        }
        layers[Layer::FullMix.index()] = full_mix;

        if has_filter {
            layers
                .par_iter_mut()
                .filter_map(Option::as_mut)
                .for_each(|buffer| self.filter_pass(buffer));
        }

        ArrangementAudio::new(arrangement.clone(), layers.map(|layer| layer.map(Arc::new)))
    }

    fn filter_pass(&self, buffer: &mut AudioBuffer) {
        match &self.filter {
            Some(filter) => filter.apply(buffer, self.filter_volume, self.clamp_limit),
            None => log::warn!("Track has a filter but no impulse is loaded"),
        }
    }
}

/// Sample offsets describing one splice
struct Splice {
    /// Destination offset where the incoming segment begins
    boundary: usize,
    /// End of the incoming segment's copied samples
    copied_end: usize,
    /// Source offset where the outgoing segment stopped
    outgoing_from: usize,
    /// Source offset where the incoming segment started
    incoming_from: usize,
}

/// Hermite gain pair for step `s` of a half-window of `half` frames
#[inline]
pub fn splice_gains(s: usize, half: usize) -> (Sample, Sample) {
    let t = s as f64 / (half * 2) as f64;
    let gain2 = t * t * (3.0 - 2.0 * t);
    let gain1 = 1.0 - gain2;
    (gain1 as Sample, gain2 as Sample)
}

/// Blend both sides of a splice with one shared gain pair per step
///
/// Forward of the boundary the incoming segment keeps `gain1` and the
/// outgoing segment's continuation in the source is mixed in at `gain2`.
/// Backward of it the roles swap: the outgoing tail keeps `gain1` and the
/// incoming segment's pre-roll comes in at `gain2`. Source positions that
/// do not exist leave the destination sample as it is.
fn crossfade_splice(dest: &mut [Sample], source: &[Sample], splice: &Splice, half: usize, ch: usize) {
    for s in 0..half {
        let (gain1, gain2) = splice_gains(s, half);
        let step = s * ch;

        let fwd = splice.boundary + step;
        if fwd + ch <= splice.copied_end {
            for c in 0..ch {
                let incoming = dest[fwd + c];
                let outgoing = source
                    .get(splice.outgoing_from + step + c)
                    .copied()
                    .unwrap_or(incoming);
                dest[fwd + c] = incoming * gain1 + outgoing * gain2;
            }
        }

        let back_step = step + ch;
        if back_step <= splice.boundary {
            let bwd = splice.boundary - back_step;
            for c in 0..ch {
                let outgoing = dest[bwd + c];
                let incoming = splice
                    .incoming_from
                    .checked_sub(back_step)
                    .and_then(|i| source.get(i + c))
                    .copied()
                    .unwrap_or(outgoing);
                dest[bwd + c] = outgoing * gain1 + incoming * gain2;
            }
        }
    }
}

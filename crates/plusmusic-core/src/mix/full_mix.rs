//! Full-mix synthesis from the four stems

use crate::types::{AudioBuffer, Sample};

/// Sum four stems at unity gain and hard-clamp to `[-limit, limit]`
///
/// The output takes its shape from the longest stem; a shorter stem
/// contributes silence past its end. Channel count and rate come from the
/// first non-empty stem.
pub fn synthesize_full_mix(
    bass: &AudioBuffer,
    drums: &AudioBuffer,
    top_mix: &AudioBuffer,
    vocals: &AudioBuffer,
    limit: Sample,
) -> AudioBuffer {
    let stems = [bass, drums, top_mix, vocals];

    let Some(reference) = stems.iter().find(|stem| !stem.is_empty()) else {
        return AudioBuffer::new(Vec::new(), bass.channels, bass.sample_rate);
    };
    if stems
        .iter()
        .any(|stem| !stem.is_empty() && stem.channels != reference.channels)
    {
        log::warn!("Full mix: stems disagree on channel count, summing by sample index");
    }

    let len = stems.iter().map(|stem| stem.samples.len()).max().unwrap_or(0);
    let mut samples = vec![0.0; len];
    for stem in stems {
        for (out, &s) in samples.iter_mut().zip(stem.samples.iter()) {
            *out += s;
        }
    }
    for s in samples.iter_mut() {
        *s = s.clamp(-limit, limit);
    }

    AudioBuffer::new(samples, reference.channels, reference.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(samples: Vec<Sample>) -> AudioBuffer {
        AudioBuffer::new(samples, 2, 44100)
    }

    #[test]
    fn test_unity_sum() {
        let mix = synthesize_full_mix(
            &buf(vec![0.1, 0.1]),
            &buf(vec![0.2, -0.2]),
            &buf(vec![0.0, 0.0]),
            &buf(vec![0.3, 0.0]),
            0.99,
        );
        assert!((mix.samples[0] - 0.6).abs() < 1e-6);
        assert!((mix.samples[1] + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_output_clamped() {
        let loud = buf(vec![0.9, -0.9, 0.5, -0.5]);
        let mix = synthesize_full_mix(&loud, &loud, &loud, &loud, 0.99);
        assert!(mix.samples.iter().all(|s| (-0.99..=0.99).contains(s)));
        assert_eq!(mix.samples[0], 0.99);
        assert_eq!(mix.samples[1], -0.99);
    }

    #[test]
    fn test_short_stem_is_silent_past_its_end() {
        let mix = synthesize_full_mix(
            &buf(vec![0.1; 8]),
            &buf(vec![0.1; 2]),
            &AudioBuffer::default(),
            &buf(vec![]),
            0.99,
        );
        assert_eq!(mix.samples.len(), 8);
        assert!((mix.samples[0] - 0.2).abs() < 1e-6);
        assert!((mix.samples[7] - 0.1).abs() < 1e-6);
        assert_eq!(mix.channels, 2);
    }
}

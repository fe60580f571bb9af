//! Channel downmix

use crate::types::Sample;

/// Mono downmix of interleaved samples
///
/// Each output frame is the arithmetic mean of that frame's channels. A
/// trailing partial frame is dropped.
pub fn to_mono(samples: &[Sample], channels: u16) -> Vec<Sample> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<Sample>() / n as Sample)
                .collect()
        }
    }
}

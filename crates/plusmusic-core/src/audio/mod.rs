//! Stem payload decoding
//!
//! Audio chunks carry encoded stems; this module turns them into
//! interleaved [`AudioBuffer`](crate::types::AudioBuffer)s. The format code
//! in the chunk header selects the decoder:
//!
//! | code | payload                |
//! |------|------------------------|
//! | 0    | PCM f32 little-endian  |
//! | 1    | PCM i16 little-endian  |
//! | 2    | WAV (hound)            |
//! | 3    | Ogg Vorbis (symphonia) |
//! | 4    | FLAC (symphonia)       |
//! | 5    | MP3 (symphonia)        |

mod decode;
mod error;

pub use decode::{decode_filter_impulse, decode_payload, decode_stem, StemFormat};
pub use error::{DecodeError, DecodeResult};

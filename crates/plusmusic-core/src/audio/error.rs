//! Stem decoding error types

use thiserror::Error;

/// Errors that can occur while decoding an audio or filter payload
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The chunk `format` code is not one we can decode
    #[error("Unsupported stem format code: {0}")]
    UnsupportedFormat(u16),

    /// Raw PCM payload length is not a whole number of frames
    #[error("PCM payload of {len} bytes is not a multiple of the {frame} byte frame")]
    MisalignedPcm { len: usize, frame: usize },

    /// Header declares zero channels or a zero sample rate
    #[error("Invalid stream parameters: {channels} channels at {sample_rate} Hz")]
    InvalidParameters { channels: u16, sample_rate: u32 },

    /// WAV payload could not be read
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),

    /// Compressed payload could not be probed or decoded
    #[error("Compressed decode failed: {0}")]
    Codec(String),
}

/// Result type for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

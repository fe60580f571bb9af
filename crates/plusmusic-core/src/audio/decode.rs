//! Stem and filter payload decoding
//!
//! Raw PCM is converted directly. WAV goes through hound, compressed formats
//! through symphonia, both reading from the in-memory payload.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{DecodeError, DecodeResult};
use crate::container::{AudioChunk, RawChunk};
use crate::types::{AudioBuffer, Sample};

/// Payload encoding, from the audio chunk `format` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemFormat {
    /// Interleaved little-endian f32
    PcmF32,
    /// Interleaved little-endian i16
    PcmI16,
    Wav,
    OggVorbis,
    Flac,
    Mp3,
}

impl StemFormat {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(StemFormat::PcmF32),
            1 => Some(StemFormat::PcmI16),
            2 => Some(StemFormat::Wav),
            3 => Some(StemFormat::OggVorbis),
            4 => Some(StemFormat::Flac),
            5 => Some(StemFormat::Mp3),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            StemFormat::PcmF32 => 0,
            StemFormat::PcmI16 => 1,
            StemFormat::Wav => 2,
            StemFormat::OggVorbis => 3,
            StemFormat::Flac => 4,
            StemFormat::Mp3 => 5,
        }
    }

    /// Guess the format of a standalone audio file from its extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Some(StemFormat::Wav),
            "ogg" | "oga" => Some(StemFormat::OggVorbis),
            "flac" => Some(StemFormat::Flac),
            "mp3" => Some(StemFormat::Mp3),
            _ => None,
        }
    }

    /// File extension hint for the symphonia probe
    fn extension(self) -> Option<&'static str> {
        match self {
            StemFormat::OggVorbis => Some("ogg"),
            StemFormat::Flac => Some("flac"),
            StemFormat::Mp3 => Some("mp3"),
            _ => None,
        }
    }
}

/// Decode an audio chunk into an interleaved buffer
///
/// For raw PCM the chunk header's `channels` and `frequency` describe the
/// stream; WAV and compressed payloads carry their own parameters.
pub fn decode_stem(chunk: &AudioChunk) -> DecodeResult<AudioBuffer> {
    let format = StemFormat::from_code(chunk.header.format)
        .ok_or(DecodeError::UnsupportedFormat(chunk.header.format))?;
    decode_payload(
        format,
        &chunk.data,
        chunk.header.channels,
        chunk.header.frequency,
    )
}

/// Decode a payload of a known format
pub fn decode_payload(
    format: StemFormat,
    data: &[u8],
    channels: u16,
    sample_rate: u32,
) -> DecodeResult<AudioBuffer> {
    let buffer = match format {
        StemFormat::PcmF32 => {
            check_parameters(channels, sample_rate)?;
            AudioBuffer::new(pcm_f32(data, channels)?, channels, sample_rate)
        }
        StemFormat::PcmI16 => {
            check_parameters(channels, sample_rate)?;
            AudioBuffer::new(pcm_i16(data, channels)?, channels, sample_rate)
        }
        StemFormat::Wav => decode_wav(data)?,
        StemFormat::OggVorbis | StemFormat::Flac | StemFormat::Mp3 => {
            decode_compressed(data, format.extension())?
        }
    };

    log::debug!(
        "Decoded {:?} stem: {} frames, {} ch @ {} Hz",
        format,
        buffer.frames(),
        buffer.channels,
        buffer.sample_rate
    );
    Ok(buffer)
}

/// Decode the filter impulse from its raw chunk
///
/// The impulse is a single-channel signal. Format 0 is PCM f32 and format 2
/// is WAV; a multi-channel WAV impulse is downmixed.
pub fn decode_filter_impulse(chunk: &RawChunk) -> DecodeResult<Vec<Sample>> {
    match StemFormat::from_code(chunk.header.format) {
        Some(StemFormat::PcmF32) => pcm_f32(&chunk.data, 1),
        Some(StemFormat::Wav) => {
            let buffer = decode_wav(&chunk.data)?;
            if buffer.channels == 1 {
                Ok(buffer.samples)
            } else {
                Ok(buffer.to_mono().samples)
            }
        }
        _ => Err(DecodeError::UnsupportedFormat(chunk.header.format)),
    }
}

fn check_parameters(channels: u16, sample_rate: u32) -> DecodeResult<()> {
    if channels == 0 || sample_rate == 0 {
        return Err(DecodeError::InvalidParameters {
            channels,
            sample_rate,
        });
    }
    Ok(())
}

fn pcm_f32(data: &[u8], channels: u16) -> DecodeResult<Vec<Sample>> {
    let frame = 4 * channels as usize;
    if data.len() % frame != 0 {
        return Err(DecodeError::MisalignedPcm {
            len: data.len(),
            frame,
        });
    }
    Ok(data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn pcm_i16(data: &[u8], channels: u16) -> DecodeResult<Vec<Sample>> {
    let frame = 2 * channels as usize;
    if data.len() % frame != 0 {
        return Err(DecodeError::MisalignedPcm {
            len: data.len(),
            frame,
        });
    }
    Ok(data
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
        .collect())
}

fn decode_wav(data: &[u8]) -> DecodeResult<AudioBuffer> {
    let reader = hound::WavReader::new(Cursor::new(data))?;
    let spec = reader.spec();

    let samples: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
    };

    Ok(AudioBuffer::new(samples, spec.channels, spec.sample_rate))
}

fn decode_compressed(data: &[u8], extension: Option<&str>) -> DecodeResult<AudioBuffer> {
    let source = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Codec("No audio track found".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Codec("Unknown sample rate".to_string()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut samples: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let needs_alloc = sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < capacity as usize * spec.channels.count());
        if needs_alloc {
            sample_buf = Some(SampleBuffer::new(capacity, spec));
        }
        channels = spec.channels.count() as u16;

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok(AudioBuffer::new(samples, channels, sample_rate))
}

//! Typed chunk records produced by the reader

use super::header::{AudioChunkHeader, ChunkKind, RawChunkHeader};
use crate::types::Layer;

/// What a raw chunk carries, from its `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    /// Single-channel reverb impulse used by the filter pass
    FilterImpulse,
    /// Track artwork
    Art,
    /// Track metadata JSON
    Metadata,
    /// Anything else, kept opaque
    Other(u16),
}

impl RawKind {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => RawKind::FilterImpulse,
            1 => RawKind::Art,
            2 => RawKind::Metadata,
            other => RawKind::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            RawKind::FilterImpulse => 0,
            RawKind::Art => 1,
            RawKind::Metadata => 2,
            RawKind::Other(code) => code,
        }
    }
}

/// An audio stem chunk with its encoded payload
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub header: AudioChunkHeader,
    pub data: Vec<u8>,
}

impl AudioChunk {
    /// Layer this stem belongs to, if the type field names one
    pub fn layer(&self) -> Option<Layer> {
        Layer::from_index(self.header.kind as usize)
    }
}

/// A raw chunk whose payload has already been de-obfuscated
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub header: RawChunkHeader,
    pub data: Vec<u8>,
}

impl RawChunk {
    pub fn raw_kind(&self) -> RawKind {
        RawKind::from_code(self.header.kind)
    }
}

/// A chunk of a known kind
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Audio(AudioChunk),
    Raw(RawChunk),
}

impl Chunk {
    pub fn kind(&self) -> ChunkKind {
        match self {
            Chunk::Audio(_) => ChunkKind::Audio,
            Chunk::Raw(_) => ChunkKind::Raw,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Chunk::Audio(chunk) => chunk.header.id,
            Chunk::Raw(chunk) => chunk.header.id,
        }
    }

    pub fn payload_len(&self) -> usize {
        match self {
            Chunk::Audio(chunk) => chunk.data.len(),
            Chunk::Raw(chunk) => chunk.data.len(),
        }
    }
}

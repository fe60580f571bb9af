//! Fixed-layout AAI headers
//!
//! Every struct here has a hand-written little-endian encoder and decoder
//! with a fixed field order. Nothing relies on in-memory struct layout.
//!
//! ```text
//! File header (28 bytes)
//!   [0..4]   signature  "AAI "
//!   [4..6]   size       u16 (28)
//!   [6..8]   version    u16
//!   [8..12]  chunk_count u32
//!   [12..20] toc_offset u64
//!   [20..28] data_size  u64
//!
//! Chunk sub-header (6 bytes, shared by every chunk)
//!   [0..4]   signature  "LOUD" | "RAW " | anything else
//!   [4..6]   size       u16, full kind-specific header length
//!
//! Audio chunk header (34 bytes)
//!   sub-header, type u16, format u16, block_size u16, channels u16,
//!   frequency u32, id u64, data_size u64
//!
//! Raw chunk header (26 bytes)
//!   sub-header, type u16, format u16, id u64, data_size u64
//! ```
//!
//! The last field of every chunk header is `data_size`, which is what lets
//! the reader skip chunks it does not understand.

use super::error::{ContainerError, ContainerResult};

/// File signature
pub const AAI_SIGNATURE: [u8; 4] = *b"AAI ";

/// Current container version written by [`super::AaiWriter`]
pub const AAI_VERSION: u16 = 1;

/// Size of the fixed file header in bytes
pub const FILE_HEADER_SIZE: usize = 28;

/// Size of the sub-header shared by all chunks
pub const SUBHEADER_SIZE: usize = 6;

/// Size of the trailing `data_size` field of every chunk header
pub const DATA_SIZE_FIELD: usize = 8;

/// Size of an audio ("LOUD") chunk header
pub const AUDIO_CHUNK_HEADER_SIZE: usize = 34;

/// Size of a raw ("RAW ") chunk header
pub const RAW_CHUNK_HEADER_SIZE: usize = 26;

/// Audio stem chunk signature
pub const LOUD_SIGNATURE: [u8; 4] = *b"LOUD";

/// Raw payload chunk signature
pub const RAW_SIGNATURE: [u8; 4] = *b"RAW ";

/// Chunk kinds the reader knows how to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Audio,
    Raw,
}

impl ChunkKind {
    /// Match a sub-header signature against the known kinds
    pub fn from_signature(signature: &[u8; 4]) -> Option<Self> {
        match *signature {
            LOUD_SIGNATURE => Some(ChunkKind::Audio),
            RAW_SIGNATURE => Some(ChunkKind::Raw),
            _ => None,
        }
    }

    pub fn signature(self) -> [u8; 4] {
        match self {
            ChunkKind::Audio => LOUD_SIGNATURE,
            ChunkKind::Raw => RAW_SIGNATURE,
        }
    }

    /// Declared header length for this kind
    pub fn header_size(self) -> usize {
        match self {
            ChunkKind::Audio => AUDIO_CHUNK_HEADER_SIZE,
            ChunkKind::Raw => RAW_CHUNK_HEADER_SIZE,
        }
    }
}

#[inline]
pub(crate) fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[inline]
pub(crate) fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
pub(crate) fn u64_at(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

#[inline]
fn signature_at(bytes: &[u8], offset: usize) -> [u8; 4] {
    [bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]
}

/// Leading file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub signature: [u8; 4],
    pub size: u16,
    pub version: u16,
    pub chunk_count: u32,
    pub toc_offset: u64,
    pub data_size: u64,
}

impl FileHeader {
    pub fn new(version: u16) -> Self {
        Self {
            signature: AAI_SIGNATURE,
            size: FILE_HEADER_SIZE as u16,
            version,
            chunk_count: 0,
            toc_offset: 0,
            data_size: 0,
        }
    }

    /// Decode from the first bytes of a container
    ///
    /// Fails with `CorruptContainer` when fewer than the fixed header size
    /// is available, the declared size is smaller than the fixed layout, or
    /// the signature does not match.
    pub fn decode(bytes: &[u8]) -> ContainerResult<Self> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(ContainerError::CorruptContainer(format!(
                "file header is {} bytes, expected {}",
                bytes.len(),
                FILE_HEADER_SIZE
            )));
        }

        let header = Self {
            signature: signature_at(bytes, 0),
            size: u16_at(bytes, 4),
            version: u16_at(bytes, 6),
            chunk_count: u32_at(bytes, 8),
            toc_offset: u64_at(bytes, 12),
            data_size: u64_at(bytes, 20),
        };

        if header.signature != AAI_SIGNATURE {
            return Err(ContainerError::CorruptContainer(format!(
                "bad signature {:?}",
                String::from_utf8_lossy(&header.signature)
            )));
        }
        if (header.size as usize) < FILE_HEADER_SIZE {
            return Err(ContainerError::CorruptContainer(format!(
                "declared header size {} is below the fixed size {}",
                header.size, FILE_HEADER_SIZE
            )));
        }

        Ok(header)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.chunk_count.to_le_bytes());
        out.extend_from_slice(&self.toc_offset.to_le_bytes());
        out.extend_from_slice(&self.data_size.to_le_bytes());
    }
}

/// Common 6-byte chunk sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubHeader {
    pub signature: [u8; 4],
    pub size: u16,
}

impl SubHeader {
    pub fn decode(bytes: &[u8; SUBHEADER_SIZE]) -> Self {
        Self {
            signature: signature_at(bytes, 0),
            size: u16_at(bytes, 4),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.size.to_le_bytes());
    }

    /// Bytes between the end of the sub-header and the trailing `data_size`
    pub fn header_skip(&self) -> ContainerResult<usize> {
        (self.size as usize)
            .checked_sub(SUBHEADER_SIZE + DATA_SIZE_FIELD)
            .ok_or_else(|| {
                ContainerError::CorruptContainer(format!(
                    "chunk {:?} declares header size {}, minimum is {}",
                    String::from_utf8_lossy(&self.signature),
                    self.size,
                    SUBHEADER_SIZE + DATA_SIZE_FIELD
                ))
            })
    }
}

/// Header of an audio stem chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioChunkHeader {
    /// Layer index the stem belongs to
    pub kind: u16,
    /// Payload encoding (see [`crate::audio::StemFormat`])
    pub format: u16,
    pub block_size: u16,
    pub channels: u16,
    pub frequency: u32,
    pub id: u64,
    pub data_size: u64,
}

impl AudioChunkHeader {
    /// Decode from a complete header (sub-header included)
    ///
    /// Longer headers are accepted: the known fields are read from the
    /// front and `data_size` from the last 8 bytes.
    pub fn decode(bytes: &[u8]) -> ContainerResult<Self> {
        if bytes.len() < AUDIO_CHUNK_HEADER_SIZE {
            return Err(ContainerError::CorruptContainer(format!(
                "audio chunk header is {} bytes, expected {}",
                bytes.len(),
                AUDIO_CHUNK_HEADER_SIZE
            )));
        }
        Ok(Self {
            kind: u16_at(bytes, 6),
            format: u16_at(bytes, 8),
            block_size: u16_at(bytes, 10),
            channels: u16_at(bytes, 12),
            frequency: u32_at(bytes, 14),
            id: u64_at(bytes, 18),
            data_size: u64_at(bytes, bytes.len() - DATA_SIZE_FIELD),
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        SubHeader {
            signature: LOUD_SIGNATURE,
            size: AUDIO_CHUNK_HEADER_SIZE as u16,
        }
        .encode(out);
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.format.to_le_bytes());
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.frequency.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.data_size.to_le_bytes());
    }
}

/// Header of a raw (filter/art/metadata) chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunkHeader {
    pub kind: u16,
    pub format: u16,
    pub id: u64,
    pub data_size: u64,
}

impl RawChunkHeader {
    pub fn decode(bytes: &[u8]) -> ContainerResult<Self> {
        if bytes.len() < RAW_CHUNK_HEADER_SIZE {
            return Err(ContainerError::CorruptContainer(format!(
                "raw chunk header is {} bytes, expected {}",
                bytes.len(),
                RAW_CHUNK_HEADER_SIZE
            )));
        }
        Ok(Self {
            kind: u16_at(bytes, 6),
            format: u16_at(bytes, 8),
            id: u64_at(bytes, 10),
            data_size: u64_at(bytes, bytes.len() - DATA_SIZE_FIELD),
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        SubHeader {
            signature: RAW_SIGNATURE,
            size: RAW_CHUNK_HEADER_SIZE as u16,
        }
        .encode(out);
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.format.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.data_size.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_header_layout() {
        let mut header = FileHeader::new(AAI_VERSION);
        header.chunk_count = 3;
        header.data_size = 0x0102_0304;

        let mut bytes = Vec::new();
        header.encode(&mut bytes);
        assert_eq!(bytes.len(), FILE_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"AAI ");
        assert_eq!(u16_at(&bytes, 4), 28);
        assert_eq!(u32_at(&bytes, 8), 3);
        assert_eq!(bytes[20], 0x04);

        assert_eq!(FileHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_short_file_header_is_corrupt() {
        let mut bytes = Vec::new();
        FileHeader::new(AAI_VERSION).encode(&mut bytes);
        bytes.truncate(20);
        assert!(matches!(
            FileHeader::decode(&bytes),
            Err(ContainerError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_declared_size_below_fixed_size_is_corrupt() {
        let mut header = FileHeader::new(AAI_VERSION);
        header.size = 12;
        let mut bytes = Vec::new();
        header.encode(&mut bytes);
        assert!(matches!(
            FileHeader::decode(&bytes),
            Err(ContainerError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_audio_header_field_offsets() {
        let header = AudioChunkHeader {
            kind: 2,
            format: 1,
            block_size: 4,
            channels: 2,
            frequency: 44100,
            id: 77,
            data_size: 1234,
        };
        let mut bytes = Vec::new();
        header.encode(&mut bytes);
        assert_eq!(bytes.len(), AUDIO_CHUNK_HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"LOUD");
        assert_eq!(u16_at(&bytes, 4) as usize, AUDIO_CHUNK_HEADER_SIZE);
        assert_eq!(u32_at(&bytes, 14), 44100);
        assert_eq!(AudioChunkHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_skip_reaches_data_size() {
        let sub = SubHeader {
            signature: *b"JUNK",
            size: 30,
        };
        assert_eq!(sub.header_skip().unwrap(), 16);

        let too_small = SubHeader {
            signature: *b"JUNK",
            size: 10,
        };
        assert!(too_small.header_skip().is_err());
    }
}

//! AAI container format
//!
//! An AAI file bundles the audio stems of one track together with a filter
//! impulse, artwork and metadata. The layout is a fixed 28-byte file header
//! followed by a flat sequence of self-describing chunks:
//!
//! - **LOUD**: an encoded audio stem for one layer
//! - **RAW**: an obfuscated blob (filter impulse, art, metadata JSON)
//! - anything else: skipped using its declared header size and data size
//!
//! All integers are little-endian.
//!
//! # Example Usage
//!
//! ```ignore
//! use plusmusic_core::container::{parse_container, AaiReader, ChunkKind};
//!
//! // Whole-file parse
//! let parsed = parse_container(&bytes)?;
//! let bass = parsed.stem(Layer::Bass);
//!
//! // Streaming, stop at the first stem
//! let mut reader = AaiReader::open("track.aai")?;
//! let first = reader.find_next(ChunkKind::Audio)?;
//! ```

mod chunk;
mod error;
pub(crate) mod header;
mod obfuscation;
mod reader;
mod writer;

pub use chunk::{AudioChunk, Chunk, RawChunk, RawKind};
pub use error::{ContainerError, ContainerResult};
pub use header::{
    AudioChunkHeader, ChunkKind, FileHeader, RawChunkHeader, SubHeader, AAI_SIGNATURE,
    AAI_VERSION, AUDIO_CHUNK_HEADER_SIZE, FILE_HEADER_SIZE, RAW_CHUNK_HEADER_SIZE, SUBHEADER_SIZE,
};
pub use obfuscation::{deobfuscate, obfuscate, XOR_KEY_START};
pub use reader::{parse_container, AaiReader, ParsedContainer};
pub use writer::AaiWriter;

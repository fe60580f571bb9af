//! In-memory AAI writer
//!
//! Used by the inspector's re-pack path and by tests to build containers.
//! The table-of-contents offset is always written as zero; readers never
//! consult it.

use super::header::{
    AudioChunkHeader, FileHeader, RawChunkHeader, SubHeader, DATA_SIZE_FIELD, FILE_HEADER_SIZE,
    SUBHEADER_SIZE,
};
use super::obfuscation::obfuscate;

/// Builds a container in a byte buffer
pub struct AaiWriter {
    header: FileHeader,
    body: Vec<u8>,
}

impl AaiWriter {
    pub fn new(version: u16) -> Self {
        Self {
            header: FileHeader::new(version),
            body: Vec::new(),
        }
    }

    /// Append an audio stem chunk. `data_size` in the header is overwritten
    /// with the payload length.
    pub fn write_audio(&mut self, mut header: AudioChunkHeader, data: &[u8]) {
        header.data_size = data.len() as u64;
        header.encode(&mut self.body);
        self.body.extend_from_slice(data);
        self.header.chunk_count += 1;
    }

    /// Append a raw chunk, obfuscating the payload
    pub fn write_raw(&mut self, kind: u16, format: u16, id: u64, data: &[u8]) {
        let header = RawChunkHeader {
            kind,
            format,
            id,
            data_size: data.len() as u64,
        };
        header.encode(&mut self.body);

        let start = self.body.len();
        self.body.extend_from_slice(data);
        obfuscate(&mut self.body[start..]);
        self.header.chunk_count += 1;
    }

    /// Append a chunk of an arbitrary kind
    ///
    /// `extra_header` sits between the sub-header and the trailing
    /// `data_size`, so a reader can only get past it via the declared size.
    pub fn write_opaque(&mut self, signature: [u8; 4], extra_header: &[u8], data: &[u8]) {
        let size = SUBHEADER_SIZE + extra_header.len() + DATA_SIZE_FIELD;
        SubHeader {
            signature,
            size: size as u16,
        }
        .encode(&mut self.body);
        self.body.extend_from_slice(extra_header);
        self.body.extend_from_slice(&(data.len() as u64).to_le_bytes());
        self.body.extend_from_slice(data);
        self.header.chunk_count += 1;
    }

    /// Number of chunks written so far
    pub fn chunk_count(&self) -> u32 {
        self.header.chunk_count
    }

    /// Patch the file header and return the finished container
    pub fn finish(mut self) -> Vec<u8> {
        self.header.data_size = self.body.len() as u64;
        let mut out = Vec::with_capacity(FILE_HEADER_SIZE + self.body.len());
        self.header.encode(&mut out);
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::header::{u32_at, u64_at, AAI_VERSION, AUDIO_CHUNK_HEADER_SIZE};

    #[test]
    fn test_finish_patches_counts() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_raw(2, 0, 1, b"{}");
        writer.write_opaque(*b"ZZZZ", &[], &[]);
        assert_eq!(writer.chunk_count(), 2);

        let bytes = writer.finish();
        assert_eq!(u32_at(&bytes, 8), 2);
        assert_eq!(u64_at(&bytes, 12), 0);
        assert_eq!(u64_at(&bytes, 20) as usize, bytes.len() - FILE_HEADER_SIZE);
    }

    #[test]
    fn test_audio_data_size_follows_payload() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        let header = AudioChunkHeader {
            kind: 0,
            format: 1,
            block_size: 4,
            channels: 2,
            frequency: 48000,
            id: 3,
            data_size: 999,
        };
        writer.write_audio(header, &[0; 12]);
        let bytes = writer.finish();
        let chunk_header = &bytes[FILE_HEADER_SIZE..FILE_HEADER_SIZE + AUDIO_CHUNK_HEADER_SIZE];
        assert_eq!(AudioChunkHeader::decode(chunk_header).unwrap().data_size, 12);
    }
}

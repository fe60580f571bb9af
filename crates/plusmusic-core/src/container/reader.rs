//! Streaming AAI reader
//!
//! The reader walks the chunk sequence one chunk at a time. For each
//! position it reads the 6-byte sub-header; a chunk of the wanted kind is
//! re-read in full (seek back 6 bytes, read the kind-specific header, then
//! the payload), anything else is skipped without parsing its body:
//! `size - 14` bytes to reach the trailing `data_size`, then `data_size`
//! bytes of payload.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use super::chunk::{AudioChunk, Chunk, RawChunk, RawKind};
use super::error::{ContainerError, ContainerResult};
use super::header::{
    u64_at, AudioChunkHeader, ChunkKind, FileHeader, RawChunkHeader, SubHeader, DATA_SIZE_FIELD,
    FILE_HEADER_SIZE, SUBHEADER_SIZE,
};
use super::obfuscation::deobfuscate;
use crate::types::Layer;

/// Chunk reader over any seekable byte source
///
/// Reading from the cache or from a network download is identical: both
/// end up as bytes behind a `Read + Seek`.
pub struct AaiReader<R> {
    reader: R,
    header: FileHeader,
    stream_len: u64,
    chunks_read: u32,
    /// Set once the iterator has hit the end or a hard error
    fused: bool,
}

impl<'a> AaiReader<Cursor<&'a [u8]>> {
    /// Read a container held in memory
    pub fn from_bytes(bytes: &'a [u8]) -> ContainerResult<Self> {
        Self::new(Cursor::new(bytes))
    }
}

impl AaiReader<BufReader<File>> {
    /// Open a container file
    pub fn open<P: AsRef<Path>>(path: P) -> ContainerResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> AaiReader<R> {
    /// Read and validate the file header, leaving the reader on the first chunk
    ///
    /// Reading starts at the stream's current position, so a container
    /// embedded in a larger file works once the caller has seeked to it.
    ///
    /// # Arguments
    /// * `reader` - Any seekable byte source (file, cursor over a download)
    ///
    /// # Errors
    /// `CorruptContainer` when fewer than 28 bytes are left, the declared
    /// header size is below 28, or the signature is not `AAI `.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut reader = AaiReader::new(Cursor::new(bytes))?;
    /// while let Some(chunk) = reader.next() {
    ///     println!("{:?}", chunk?.kind());
    /// }
    /// ```
    pub fn new(mut reader: R) -> ContainerResult<Self> {
        let start = reader.stream_position()?;
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let available = stream_len.saturating_sub(start) as usize;
        let mut fixed = vec![0u8; FILE_HEADER_SIZE.min(available)];
        reader.read_exact(&mut fixed)?;
        let header = FileHeader::decode(&fixed)?;

        // Newer writers may extend the header; skip what we don't know
        let extra = header.size as usize - FILE_HEADER_SIZE;
        if extra > 0 {
            reader.seek(SeekFrom::Current(extra as i64))?;
        }

        log::debug!(
            "[AAI] Header v{}: {} chunks, {} data bytes",
            header.version,
            header.chunk_count,
            header.data_size
        );

        Ok(Self {
            reader,
            header,
            stream_len,
            chunks_read: 0,
            fused: false,
        })
    }

    /// The validated file header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Number of known-kind chunks returned so far
    pub fn chunks_read(&self) -> u32 {
        self.chunks_read
    }

    /// Read the next chunk of any known kind, skipping unknown chunks
    pub fn read_next(&mut self) -> ContainerResult<Chunk> {
        loop {
            let sub = self.read_subheader()?;
            match ChunkKind::from_signature(&sub.signature) {
                Some(kind) => return self.read_chunk(kind, &sub),
                None => self.skip_chunk(&sub)?,
            }
        }
    }

    /// Read the next chunk of `kind`, skipping every other chunk (including
    /// the other known kind) exactly like an unknown one
    pub fn find_next(&mut self, kind: ChunkKind) -> ContainerResult<Chunk> {
        loop {
            let sub = self.read_subheader()?;
            if sub.signature == kind.signature() {
                return self.read_chunk(kind, &sub);
            }
            self.skip_chunk(&sub)?;
        }
    }

    fn remaining(&mut self) -> ContainerResult<u64> {
        let pos = self.reader.stream_position()?;
        Ok(self.stream_len.saturating_sub(pos))
    }

    fn read_bytes(&mut self, needed: usize) -> ContainerResult<Vec<u8>> {
        let available = self.remaining()?;
        if available < needed as u64 {
            return Err(ContainerError::TruncatedStream {
                needed,
                available: available as usize,
            });
        }
        let mut buf = vec![0u8; needed];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn skip(&mut self, count: u64) -> ContainerResult<()> {
        let available = self.remaining()?;
        if available < count {
            return Err(ContainerError::TruncatedStream {
                needed: usize::try_from(count).unwrap_or(usize::MAX),
                available: available as usize,
            });
        }
        // Bounded by the stream length, which always fits an i64 offset
        self.reader.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    fn read_subheader(&mut self) -> ContainerResult<SubHeader> {
        let bytes = self.read_bytes(SUBHEADER_SIZE)?;
        let mut raw = [0u8; SUBHEADER_SIZE];
        raw.copy_from_slice(&bytes);
        Ok(SubHeader::decode(&raw))
    }

    fn skip_chunk(&mut self, sub: &SubHeader) -> ContainerResult<()> {
        let header_skip = sub.header_skip()?;
        self.skip(header_skip as u64)?;
        let size_bytes = self.read_bytes(DATA_SIZE_FIELD)?;
        let data_size = u64_at(&size_bytes, 0);
        log::debug!(
            "[AAI] Skipping chunk {:?} ({} payload bytes)",
            String::from_utf8_lossy(&sub.signature),
            data_size
        );
        self.skip(data_size)
    }

    fn read_payload(&mut self, data_size: u64) -> ContainerResult<Vec<u8>> {
        let len = usize::try_from(data_size).map_err(|_| {
            ContainerError::CorruptContainer(format!("payload size {} does not fit in memory", data_size))
        })?;
        self.read_bytes(len)
    }

    fn read_chunk(&mut self, kind: ChunkKind, sub: &SubHeader) -> ContainerResult<Chunk> {
        if (sub.size as usize) < kind.header_size() {
            return Err(ContainerError::CorruptContainer(format!(
                "{:?} chunk declares header size {}, expected at least {}",
                kind,
                sub.size,
                kind.header_size()
            )));
        }

        self.reader.seek(SeekFrom::Current(-(SUBHEADER_SIZE as i64)))?;
        let header_bytes = self.read_bytes(sub.size as usize)?;

        let chunk = match kind {
            ChunkKind::Audio => {
                let header = AudioChunkHeader::decode(&header_bytes)?;
                let data = self.read_payload(header.data_size)?;
                Chunk::Audio(AudioChunk { header, data })
            }
            ChunkKind::Raw => {
                let header = RawChunkHeader::decode(&header_bytes)?;
                let mut data = self.read_payload(header.data_size)?;
                deobfuscate(&mut data);
                Chunk::Raw(RawChunk { header, data })
            }
        };

        self.chunks_read += 1;
        Ok(chunk)
    }
}

impl<R: Read + Seek> Iterator for AaiReader<R> {
    type Item = ContainerResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        match self.read_next() {
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) if e.is_truncated() => {
                if !e.is_clean_end() {
                    log::warn!("[AAI] Stream ended inside a chunk: {}", e);
                }
                self.fused = true;
                None
            }
            Err(e) => {
                self.fused = true;
                Some(Err(e))
            }
        }
    }
}

/// Every known chunk of a container, split by kind
#[derive(Debug, Clone)]
pub struct ParsedContainer {
    pub header: FileHeader,
    pub audio: Vec<AudioChunk>,
    pub raw: Vec<RawChunk>,
    /// False when parsing stopped early on a corrupt chunk
    pub complete: bool,
}

impl ParsedContainer {
    /// First stem chunk for a layer
    pub fn stem(&self, layer: Layer) -> Option<&AudioChunk> {
        self.audio.iter().find(|chunk| chunk.layer() == Some(layer))
    }

    /// First raw chunk of a kind
    pub fn raw_of(&self, kind: RawKind) -> Option<&RawChunk> {
        self.raw.iter().find(|chunk| chunk.raw_kind() == kind)
    }
}

/// Parse a whole container held in memory
///
/// A corrupt file header fails the parse. A corrupt chunk later on stops
/// parsing, is logged, and returns what was read so far.
pub fn parse_container(bytes: &[u8]) -> ContainerResult<ParsedContainer> {
    let mut reader = AaiReader::from_bytes(bytes)?;
    let header = reader.header().clone();

    let mut audio = Vec::new();
    let mut raw = Vec::new();
    let mut complete = true;

    for chunk in reader.by_ref() {
        match chunk {
            Ok(Chunk::Audio(chunk)) => audio.push(chunk),
            Ok(Chunk::Raw(chunk)) => raw.push(chunk),
            Err(e) => {
                log::error!("[AAI] Aborting parse after {} chunks: {}", audio.len() + raw.len(), e);
                complete = false;
            }
        }
    }

    log::info!(
        "[AAI] Parsed {} audio and {} raw chunks (header declares {})",
        audio.len(),
        raw.len(),
        header.chunk_count
    );

    Ok(ParsedContainer {
        header,
        audio,
        raw,
        complete,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::header::AAI_VERSION;
    use crate::container::AaiWriter;

    fn audio_header(kind: u16, id: u64) -> AudioChunkHeader {
        AudioChunkHeader {
            kind,
            format: 0,
            block_size: 8,
            channels: 2,
            frequency: 44100,
            id,
            data_size: 0,
        }
    }

    #[test]
    fn test_reads_known_chunks_in_order_skipping_unknown() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_opaque(*b"JUNK", &[1, 2, 3, 4, 5], &[9; 17]);
        writer.write_audio(audio_header(1, 10), &[1, 1, 1, 1]);
        writer.write_opaque(*b"TOC ", &[], &[0xFF; 3]);
        writer.write_raw(RawKind::FilterImpulse.code(), 0, 11, b"impulse");
        writer.write_opaque(*b"PAD ", &[0; 40], &[]);
        writer.write_audio(audio_header(2, 12), &[2, 2]);
        let bytes = writer.finish();

        let chunks: Vec<Chunk> = AaiReader::from_bytes(&bytes)
            .unwrap()
            .collect::<ContainerResult<_>>()
            .unwrap();

        let ids: Vec<u64> = chunks.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![10, 11, 12]);

        match &chunks[1] {
            Chunk::Raw(raw) => assert_eq!(raw.data, b"impulse"),
            other => panic!("expected raw chunk, got {:?}", other.kind()),
        }
        match &chunks[2] {
            Chunk::Audio(audio) => {
                assert_eq!(audio.layer(), Some(Layer::Drums));
                assert_eq!(audio.data, vec![2, 2]);
            }
            other => panic!("expected audio chunk, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_find_next_skips_other_known_kind_to_canary() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_raw(0, 0, 1, &[7; 33]);
        writer.write_opaque(*b"XXXX", &[0xEE; 9], &[0xDD; 101]);
        writer.write_raw(1, 0, 2, &[8; 5]);
        writer.write_audio(audio_header(0, 0xCA_4A27), &[0xC0, 0xDE]);
        let bytes = writer.finish();

        let mut reader = AaiReader::from_bytes(&bytes).unwrap();
        match reader.find_next(ChunkKind::Audio).unwrap() {
            Chunk::Audio(canary) => {
                assert_eq!(canary.header.id, 0xCA_4A27);
                assert_eq!(canary.data, vec![0xC0, 0xDE]);
            }
            Chunk::Raw(_) => panic!("find_next returned the wrong kind"),
        }
        assert!(reader.find_next(ChunkKind::Audio).unwrap_err().is_clean_end());
    }

    #[test]
    fn test_end_of_stream_is_truncated_not_corrupt() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_audio(audio_header(1, 1), &[0; 16]);
        let bytes = writer.finish();

        let mut reader = AaiReader::from_bytes(&bytes).unwrap();
        assert!(reader.read_next().is_ok());
        let err = reader.read_next().unwrap_err();
        assert!(err.is_truncated());
        assert!(err.is_clean_end());
    }

    #[test]
    fn test_payload_cut_short_ends_iteration() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_audio(audio_header(1, 1), &[0; 16]);
        writer.write_audio(audio_header(2, 2), &[0; 64]);
        let mut bytes = writer.finish();
        bytes.truncate(bytes.len() - 10);

        let chunks: Vec<_> = AaiReader::from_bytes(&bytes).unwrap().collect();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_ok());
    }

    #[test]
    fn test_short_header_is_corrupt() {
        let bytes = b"AAI \x1c\x00\x01\x00".to_vec();
        assert!(matches!(
            AaiReader::from_bytes(&bytes),
            Err(ContainerError::CorruptContainer(_))
        ));
    }

    #[test]
    fn test_parse_container_keeps_partial_result_on_corrupt_chunk() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_audio(audio_header(1, 1), &[1; 8]);
        let mut bytes = writer.finish();
        // A LOUD chunk whose declared header is too short to hold its fields
        bytes.extend_from_slice(b"LOUD");
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&[0; 40]);

        let parsed = parse_container(&bytes).unwrap();
        assert!(!parsed.complete);
        assert_eq!(parsed.audio.len(), 1);
        assert!(parsed.stem(Layer::Bass).is_some());
    }

    #[test]
    fn test_raw_payload_is_deobfuscated_on_read() {
        let mut writer = AaiWriter::new(AAI_VERSION);
        writer.write_raw(RawKind::Metadata.code(), 0, 5, br#"{"id":"t1"}"#);
        let bytes = writer.finish();

        // The payload on disk is not plain text
        assert!(!bytes.windows(4).any(|w| w == b"\"id\""));

        let parsed = parse_container(&bytes).unwrap();
        let meta = parsed.raw_of(RawKind::Metadata).unwrap();
        assert_eq!(meta.data, br#"{"id":"t1"}"#);
    }
}

//! Typed access to cached track and project blobs

use std::path::Path;

use super::error::{CacheError, CacheResult};
use super::key::{CacheKey, CacheScope};
use super::store::BlobStore;
use crate::container::{
    AudioChunk, AudioChunkHeader, RawChunk, RawChunkHeader, AUDIO_CHUNK_HEADER_SIZE,
    RAW_CHUNK_HEADER_SIZE,
};
use crate::types::Layer;

/// Stem and metadata cache over any [`BlobStore`]
///
/// Stems are stored as a full audio chunk (header + payload), so a cached
/// stem decodes exactly like one read from a container.
pub struct StemCache<S> {
    store: S,
}

impl<S: BlobStore> StemCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = key.path();
        match self.store.get(&path) {
            Ok(Some(bytes)) => {
                log::debug!("[CACHE] Hit {}", key);
                Some(bytes)
            }
            Ok(None) => {
                log::debug!("[CACHE] Miss {}", key);
                None
            }
            Err(e) => {
                log::warn!("[CACHE] Read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let path = key.path();
        self.store.put(&path, bytes)?;
        log::debug!("[CACHE] Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    pub fn put_layer(&self, track_id: &str, layer: Layer, chunk: &AudioChunk) -> CacheResult<()> {
        let mut bytes = Vec::with_capacity(AUDIO_CHUNK_HEADER_SIZE + chunk.data.len());
        let mut header = chunk.header;
        header.data_size = chunk.data.len() as u64;
        header.encode(&mut bytes);
        bytes.extend_from_slice(&chunk.data);
        self.write(&CacheKey::layer(track_id, layer)?, &bytes)
    }

    pub fn get_layer(&self, track_id: &str, layer: Layer) -> Option<AudioChunk> {
        let key = CacheKey::layer(track_id, layer).ok()?;
        let bytes = self.read(&key)?;
        match decode_layer_blob(&key.path(), bytes) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                log::warn!("[CACHE] Ignoring {}: {}", key, e);
                None
            }
        }
    }

    /// True when every stem of a track is cached
    pub fn has_all_stems(&self, track_id: &str) -> bool {
        Layer::STEMS.iter().all(|&layer| {
            CacheKey::layer(track_id, layer)
                .map(|key| self.store.exists(&key.path()))
                .unwrap_or(false)
        })
    }

    /// Store a de-obfuscated filter chunk (header + payload)
    pub fn put_filter(&self, track_id: &str, chunk: &RawChunk) -> CacheResult<()> {
        let mut bytes = Vec::with_capacity(RAW_CHUNK_HEADER_SIZE + chunk.data.len());
        let mut header = chunk.header;
        header.data_size = chunk.data.len() as u64;
        header.encode(&mut bytes);
        bytes.extend_from_slice(&chunk.data);
        self.write(&CacheKey::filter(track_id)?, &bytes)
    }

    pub fn get_filter(&self, track_id: &str) -> Option<RawChunk> {
        let key = CacheKey::filter(track_id).ok()?;
        let bytes = self.read(&key)?;
        match decode_filter_blob(&key.path(), bytes) {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                log::warn!("[CACHE] Ignoring {}: {}", key, e);
                None
            }
        }
    }

    pub fn put_container(&self, track_id: &str, bytes: &[u8]) -> CacheResult<()> {
        self.write(&CacheKey::container(track_id)?, bytes)
    }

    pub fn get_container(&self, track_id: &str) -> Option<Vec<u8>> {
        self.read(&CacheKey::container(track_id).ok()?)
    }

    pub fn put_track_metadata(&self, track_id: &str, json: &str) -> CacheResult<()> {
        self.write(&CacheKey::track_metadata(track_id)?, json.as_bytes())
    }

    pub fn get_track_metadata(&self, track_id: &str) -> Option<String> {
        let bytes = self.read(&CacheKey::track_metadata(track_id).ok()?)?;
        String::from_utf8(bytes).ok()
    }

    pub fn put_project_metadata(&self, project_id: &str, json: &str) -> CacheResult<()> {
        self.write(&CacheKey::project_metadata(project_id)?, json.as_bytes())
    }

    pub fn get_project_metadata(&self, project_id: &str) -> Option<String> {
        let bytes = self.read(&CacheKey::project_metadata(project_id).ok()?)?;
        String::from_utf8(bytes).ok()
    }

    pub fn put_image(&self, track_id: &str, bytes: &[u8]) -> CacheResult<()> {
        self.write(&CacheKey::image(track_id)?, bytes)
    }

    pub fn get_image(&self, track_id: &str) -> Option<Vec<u8>> {
        self.read(&CacheKey::image(track_id).ok()?)
    }

    /// Remove every cached blob of a track
    pub fn delete_track(&self, track_id: &str) -> CacheResult<()> {
        let dir = CacheKey::directory(CacheScope::Tracks, track_id)?;
        log::info!("[CACHE] Deleting track {}", track_id);
        self.store.delete(&dir)
    }

    /// Remove the cached metadata of a project
    pub fn delete_project(&self, project_id: &str) -> CacheResult<()> {
        let dir = CacheKey::directory(CacheScope::Projects, project_id)?;
        log::info!("[CACHE] Deleting project {}", project_id);
        self.store.delete(&dir)
    }
}

fn decode_layer_blob(path: &Path, mut bytes: Vec<u8>) -> CacheResult<AudioChunk> {
    let corrupt = |reason: String| CacheError::CorruptEntry {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < AUDIO_CHUNK_HEADER_SIZE {
        return Err(corrupt(format!("{} bytes is shorter than a chunk header", bytes.len())));
    }
    let header = AudioChunkHeader::decode(&bytes[..AUDIO_CHUNK_HEADER_SIZE])
        .map_err(|e| corrupt(e.to_string()))?;
    let data = bytes.split_off(AUDIO_CHUNK_HEADER_SIZE);
    if data.len() as u64 != header.data_size {
        return Err(corrupt(format!(
            "payload is {} bytes, header declares {}",
            data.len(),
            header.data_size
        )));
    }
    Ok(AudioChunk { header, data })
}

fn decode_filter_blob(path: &Path, mut bytes: Vec<u8>) -> CacheResult<RawChunk> {
    let corrupt = |reason: String| CacheError::CorruptEntry {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < RAW_CHUNK_HEADER_SIZE {
        return Err(corrupt(format!("{} bytes is shorter than a chunk header", bytes.len())));
    }
    let header = RawChunkHeader::decode(&bytes[..RAW_CHUNK_HEADER_SIZE])
        .map_err(|e| corrupt(e.to_string()))?;
    let data = bytes.split_off(RAW_CHUNK_HEADER_SIZE);
    if data.len() as u64 != header.data_size {
        return Err(corrupt(format!(
            "payload is {} bytes, header declares {}",
            data.len(),
            header.data_size
        )));
    }
    Ok(RawChunk { header, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FsBlobStore, MemoryBlobStore};

    fn stem(kind: u16) -> AudioChunk {
        AudioChunk {
            header: AudioChunkHeader {
                kind,
                format: 1,
                block_size: 4,
                channels: 2,
                frequency: 44100,
                id: 5,
                data_size: 0,
            },
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
        }
    }

    #[test]
    fn test_layer_roundtrip_and_miss() {
        let cache = StemCache::new(MemoryBlobStore::new());
        assert!(cache.get_layer("t1", Layer::Bass).is_none());

        cache.put_layer("t1", Layer::Bass, &stem(1)).unwrap();
        let restored = cache.get_layer("t1", Layer::Bass).unwrap();
        assert_eq!(restored.data, stem(1).data);
        assert_eq!(restored.header.data_size, 8);
        assert_eq!(restored.header.frequency, 44100);
        assert!(!cache.has_all_stems("t1"));
    }

    #[test]
    fn test_delete_track_keeps_other_tracks() {
        let cache = StemCache::new(MemoryBlobStore::new());
        cache.put_track_metadata("t1", "{}").unwrap();
        cache.put_track_metadata("t2", "{}").unwrap();
        cache.put_image("t1", &[0xFF, 0xD8]).unwrap();

        cache.delete_track("t1").unwrap();
        assert!(cache.get_track_metadata("t1").is_none());
        assert!(cache.get_image("t1").is_none());
        assert_eq!(cache.get_track_metadata("t2").as_deref(), Some("{}"));
    }

    #[test]
    fn test_fs_cache_layout() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StemCache::new(FsBlobStore::new(dir.path()));
        cache.put_project_metadata("p1", r#"{"id":"p1"}"#).unwrap();
        assert!(dir.path().join("projects/p1/p1_meta.json").is_file());

        for layer in Layer::STEMS {
            cache.put_layer("t7", layer, &stem(layer.index() as u16)).unwrap();
        }
        assert!(cache.has_all_stems("t7"));
        assert!(dir.path().join("tracks/t7/t7_vocals.loud").is_file());

        cache.delete_project("p1").unwrap();
        assert!(cache.get_project_metadata("p1").is_none());
    }

    #[test]
    fn test_filter_blob_keeps_plain_payload() {
        let cache = StemCache::new(MemoryBlobStore::new());
        assert!(cache.get_filter("t1").is_none());

        let chunk = RawChunk {
            header: RawChunkHeader {
                kind: 0,
                format: 0,
                id: 9,
                data_size: 0,
            },
            data: vec![0xAA, 0x00, 0x10, 0xFF],
        };
        cache.put_filter("t1", &chunk).unwrap();
        let restored = cache.get_filter("t1").unwrap();
        assert_eq!(restored.data, chunk.data);
        assert_eq!(restored.header.id, 9);
        assert_eq!(restored.header.data_size, 4);
    }

    #[test]
    fn test_truncated_layer_blob_is_a_miss() {
        let store = MemoryBlobStore::new();
        let key = CacheKey::layer("t1", Layer::Drums).unwrap();
        store.put(&key.path(), &[0; 10]).unwrap();
        let cache = StemCache::new(store);
        assert!(cache.get_layer("t1", Layer::Drums).is_none());
    }
}

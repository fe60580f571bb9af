//! Key to blob storage backends

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::{CacheError, CacheResult};

/// Key to blob storage
///
/// Paths are relative to the store's root. Implementations must make a
/// `put` visible to a later `get` on the same thread; nothing stronger is
/// required.
pub trait BlobStore: Send + Sync {
    /// Read a blob, `None` when nothing is stored at `path`
    fn get(&self, path: &Path) -> CacheResult<Option<Vec<u8>>>;

    /// Store a blob, creating parent directories as needed
    fn put(&self, path: &Path, bytes: &[u8]) -> CacheResult<()>;

    /// Remove a blob, or everything below a directory. Missing paths are fine.
    fn delete(&self, path: &Path) -> CacheResult<()>;

    fn exists(&self, path: &Path) -> bool;

    fn ensure_dir(&self, path: &Path) -> CacheResult<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn get(&self, path: &Path) -> CacheResult<Option<Vec<u8>>> {
        (**self).get(path)
    }

    fn put(&self, path: &Path, bytes: &[u8]) -> CacheResult<()> {
        (**self).put(path, bytes)
    }

    fn delete(&self, path: &Path) -> CacheResult<()> {
        (**self).delete(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn ensure_dir(&self, path: &Path) -> CacheResult<()> {
        (**self).ensure_dir(path)
    }
}

/// Filesystem-backed store rooted at a cache directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, path: &Path) -> CacheResult<Option<Vec<u8>>> {
        let full = self.full_path(path);
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&full, e)),
        }
    }

    fn put(&self, path: &Path, bytes: &[u8]) -> CacheResult<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
        }
        std::fs::write(&full, bytes).map_err(|e| CacheError::io(&full, e))
    }

    fn delete(&self, path: &Path) -> CacheResult<()> {
        let full = self.full_path(path);
        let result = if full.is_dir() {
            std::fs::remove_dir_all(&full)
        } else {
            std::fs::remove_file(&full)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&full, e)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.full_path(path).exists()
    }

    fn ensure_dir(&self, path: &Path) -> CacheResult<()> {
        let full = self.full_path(path);
        std::fs::create_dir_all(&full).map_err(|e| CacheError::io(&full, e))
    }
}

/// In-memory store, used when caching to disk is disabled and in tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Writes are single map operations, so a poisoned map is still consistent
    fn read(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.blobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, path: &Path) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.read().get(path).cloned())
    }

    fn put(&self, path: &Path, bytes: &[u8]) -> CacheResult<()> {
        self.write().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, path: &Path) -> CacheResult<()> {
        self.write().retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.read().keys().any(|key| key.starts_with(path))
    }

    fn ensure_dir(&self, _path: &Path) -> CacheResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn BlobStore) {
        let path = Path::new("tracks/t1/t1_bass.loud");
        assert_eq!(store.get(path).unwrap(), None);
        assert!(!store.exists(path));

        store.put(path, b"abc").unwrap();
        assert!(store.exists(path));
        assert_eq!(store.get(path).unwrap(), Some(b"abc".to_vec()));

        store.put(path, b"xyz").unwrap();
        assert_eq!(store.get(path).unwrap(), Some(b"xyz".to_vec()));

        store.delete(Path::new("tracks/t1")).unwrap();
        assert_eq!(store.get(path).unwrap(), None);

        // Deleting again is not an error
        store.delete(Path::new("tracks/t1")).unwrap();
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryBlobStore::new());
    }

    #[test]
    fn test_memory_store_survives_poisoned_lock() {
        let store = Arc::new(MemoryBlobStore::new());
        let holder = Arc::clone(&store);
        let result = std::thread::spawn(move || {
            let _guard = holder.blobs.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(store.blobs.is_poisoned());

        let path = Path::new("tracks/t1/t1_meta.json");
        store.put(path, b"{}").unwrap();
        assert_eq!(store.get(path).unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fs_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        exercise(&store);

        store.ensure_dir(Path::new("projects/p1")).unwrap();
        assert!(dir.path().join("projects/p1").is_dir());
    }
}

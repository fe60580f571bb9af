//! Stem cache error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the stem cache
///
/// A plain miss is not an error: lookups return `None` and the caller falls
/// through to the network.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure on a cache path
    #[error("Cache IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Identifier that cannot be used as a path component
    #[error("Invalid cache id: {0:?}")]
    InvalidId(String),

    /// Stored blob exists but does not decode
    #[error("Corrupt cache entry at {path:?}: {reason}")]
    CorruptEntry { path: PathBuf, reason: String },
}

impl CacheError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

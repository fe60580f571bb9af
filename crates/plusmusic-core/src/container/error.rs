//! AAI container error types

use thiserror::Error;

/// Errors that can occur while reading or writing an AAI container
#[derive(Error, Debug)]
pub enum ContainerError {
    /// Fewer bytes remain than the next header or payload needs.
    ///
    /// At a chunk boundary with nothing left this is the natural end of the
    /// stream; the chunk iterator treats it as termination, not failure.
    #[error("Truncated stream: needed {needed} bytes, {available} available")]
    TruncatedStream { needed: usize, available: usize },

    /// The file header or a chunk header is inconsistent with the layout
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// Underlying reader/seek failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// True when the error only signals that the stream ran out of bytes
    pub fn is_truncated(&self) -> bool {
        matches!(self, ContainerError::TruncatedStream { .. })
    }

    /// True when the stream ended exactly on a chunk boundary
    pub fn is_clean_end(&self) -> bool {
        matches!(self, ContainerError::TruncatedStream { available: 0, .. })
    }
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

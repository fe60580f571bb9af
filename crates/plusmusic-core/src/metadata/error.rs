//! Metadata error types

use thiserror::Error;

/// Errors that can occur while parsing project or track metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    /// JSON did not match the expected shape
    #[error("Metadata JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Segment ends before it starts
    #[error("Segment {id} has end {end_time} before start {start_time}")]
    InvalidSegment {
        id: String,
        start_time: f64,
        end_time: f64,
    },
}

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, MetadataError>;

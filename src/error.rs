//! Error types for shadow filtering and segment ordering

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    /// Whole-table row id does not fit the segment's row-id space.
    /// Segment bounds and offsets are inconsistent; never truncated.
    #[error("Row id {row_id} overflows segment row-id space (offset {offset})")]
    RowIdOverflow { row_id: u64, offset: u64 },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Query deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },
}

impl IndexError {
    /// Stable error code for callers that surface query failures.
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::Io(_) => "IO_ERROR",
            IndexError::Json(_) => "JSON_ERROR",
            IndexError::InvalidFormat(_) => "INVALID_FORMAT",
            IndexError::InvalidSegment(_) => "INVALID_SEGMENT",
            IndexError::RowIdOverflow { .. } => "ROW_ID_OVERFLOW",
            IndexError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            IndexError::Cancelled => "QUERY_CANCELLED",
            IndexError::DeadlineExceeded { .. } => "QUERY_TIMEOUT",
        }
    }

    /// True for errors raised by the query's own abort signal rather
    /// than by the storage layer.
    pub fn is_abort(&self) -> bool {
        matches!(self, IndexError::Cancelled | IndexError::DeadlineExceeded { .. })
    }
}

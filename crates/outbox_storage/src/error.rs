//! Error types for log backends.

use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a log backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Truncation target lies beyond the current length.
    #[error("cannot truncate to {requested} bytes, log holds {size}")]
    TruncatePastEnd {
        /// The requested new length.
        requested: u64,
        /// The current length.
        size: u64,
    },
}

//! Error types for the local store.

use crate::collection::Collection;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for local store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] outbox_storage::StorageError),

    /// I/O error outside the backend (directory, lock file, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store has not been initialized or has been closed.
    #[error("local store is not initialized")]
    NotInitialized,

    /// Another process holds the store directory.
    #[error("store locked: another process has exclusive access to {path:?}")]
    Locked {
        /// The locked store directory.
        path: PathBuf,
    },

    /// An append would grow the log past its configured limit.
    #[error("storage quota exceeded: log would grow to {requested} bytes, limit is {limit}")]
    QuotaExceeded {
        /// Log size after the rejected append.
        requested: u64,
        /// Configured limit.
        limit: u64,
    },

    /// `add` was called with a key that already exists.
    #[error("duplicate key {id:?} in collection {collection}")]
    DuplicateKey {
        /// Collection written to.
        collection: Collection,
        /// The existing key.
        id: String,
    },

    /// A log entry could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The log contains an invalid frame followed by more data.
    #[error("store log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A resource name outside the supported set.
    #[error("unknown resource: {0:?}")]
    UnknownResource(String),

    /// A collection name outside the fixed set.
    #[error("unknown collection: {0:?}")]
    UnknownCollection(String),

    /// A record value is missing something the operation requires.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the error means the store engine itself is unusable
    /// (not initialized, locked, out of quota, or failing I/O).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::NotInitialized
                | StoreError::Locked { .. }
                | StoreError::QuotaExceeded { .. }
                | StoreError::Storage(_)
                | StoreError::Io(_)
        )
    }
}

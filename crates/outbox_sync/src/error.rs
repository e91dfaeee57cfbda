//! Error types for queueing and replay.

use outbox_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while queueing or replaying actions.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote API answered with a non-success status.
    #[error("remote returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The transport has no usable connection.
    #[error("not connected to server")]
    NotConnected,

    /// A manual sync was requested while connectivity is down.
    #[error("cannot sync while offline")]
    Offline,

    /// The action type string is not CREATE, UPDATE or DELETE.
    #[error("unknown action type {0:?}")]
    UnknownActionType(String),

    /// A payload does not have the shape the operation needs.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            SyncError::Timeout | SyncError::NotConnected => true,
            _ => false,
        }
    }

    /// Returns true if the remote rejected the action in a way a resend
    /// will not fix: a 4xx other than 408 and 429, or a fatal transport
    /// error.
    pub fn is_permanent(&self) -> bool {
        match self {
            SyncError::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            }
            SyncError::Transport { retryable, .. } => !*retryable,
            _ => false,
        }
    }
}

//! In-memory log backend.

use crate::backend::LogBackend;
use crate::error::{StorageError, StorageResult};

/// A log held in a `Vec<u8>`.
///
/// Nothing survives the process. Backs in-memory stores and tests that
/// replay hand-built logs.
///
/// # Example
///
/// ```rust
/// use outbox_storage::{InMemoryBackend, LogBackend};
///
/// let mut log = InMemoryBackend::new();
/// assert_eq!(log.append(b"abc").unwrap(), 0);
/// assert_eq!(log.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    bytes: Vec<u8>,
}

impl InMemoryBackend {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log preloaded with `bytes`, e.g. one captured from
    /// another backend.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrows the raw log.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl LogBackend for InMemoryBackend {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn append(&mut self, frame: &[u8]) -> StorageResult<u64> {
        let offset = self.len();
        self.bytes.extend_from_slice(frame);
        Ok(offset)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        if len > self.len() {
            return Err(StorageError::TruncatePastEnd {
                requested: len,
                size: self.len(),
            });
        }
        self.bytes.truncate(len as usize);
        Ok(())
    }

    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.bytes = bytes.to_vec();
        Ok(())
    }
}

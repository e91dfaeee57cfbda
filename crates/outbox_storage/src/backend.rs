//! The log backend trait.

use crate::error::StorageResult;

/// An append-only byte log.
///
/// Backends never look inside what they hold. Writers append whole frames
/// and readers always load the log from the start, so there is no random
/// access.
///
/// # Invariants
///
/// - `append` returns the offset of the first appended byte
/// - `read_all` returns every byte appended since the last `replace`
/// - after `sync` returns, appended bytes survive a crash
/// - `truncate` only ever shrinks the log
pub trait LogBackend: Send + Sync {
    /// Current length of the log in bytes.
    fn len(&self) -> u64;

    /// Returns true if nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads the whole log.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends `frame` and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. The log may then end in a
    /// partial frame, which readers treat as a torn tail.
    fn append(&mut self, frame: &[u8]) -> StorageResult<u64>;

    /// Makes every appended byte durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or fsync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the log back to `len` bytes, dropping a torn tail.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TruncatePastEnd`](crate::StorageError::TruncatePastEnd)
    /// if `len` is beyond the current length.
    fn truncate(&mut self, len: u64) -> StorageResult<()>;

    /// Swaps the whole log for `bytes`.
    ///
    /// Readers see either the old log or the new one, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the new log cannot be written. The old log is
    /// left untouched in that case.
    fn replace(&mut self, bytes: &[u8]) -> StorageResult<()>;
}

//! Local store configuration.

use std::path::PathBuf;

/// Where a store keeps its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Nothing is persisted; the log lives in memory.
    Memory,
    /// A store directory holding `store.log` and `LOCK`.
    Directory(PathBuf),
}

/// Configuration for opening a local store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Where the log lives.
    pub location: StoreLocation,

    /// Maximum log size in bytes. `None` means unbounded.
    pub max_log_bytes: Option<u64>,

    /// Whether to flush and sync the log after every append.
    pub sync_on_write: bool,
}

impl StoreConfig {
    /// Creates a configuration for a store directory.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::Directory(path.into()),
            ..Self::in_memory()
        }
    }

    /// Creates a configuration for an in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            max_log_bytes: None,
            sync_on_write: true,
        }
    }

    /// Sets the log size limit.
    #[must_use]
    pub const fn max_log_bytes(mut self, limit: u64) -> Self {
        self.max_log_bytes = Some(limit);
        self
    }

    /// Sets whether to sync after every append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_memory() {
        let config = StoreConfig::default();
        assert_eq!(config.location, StoreLocation::Memory);
        assert_eq!(config.max_log_bytes, None);
        assert!(config.sync_on_write);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::directory("/var/lib/outbox")
            .max_log_bytes(1024)
            .sync_on_write(false);

        assert_eq!(
            config.location,
            StoreLocation::Directory(PathBuf::from("/var/lib/outbox"))
        );
        assert_eq!(config.max_log_bytes, Some(1024));
        assert!(!config.sync_on_write);
    }
}

//! CLI command implementations.

pub mod cached;
pub mod compact;
pub mod queue;
pub mod stats;

use clap::ValueEnum;
use outbox_store::{LocalStore, StoreConfig};
use outbox_sync::{EventBus, QueueStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Result type for command implementations.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Opens an existing store directory. Refuses to create a new one.
pub fn open_store(path: &Path) -> CliResult<Arc<LocalStore>> {
    if !path.join("store.log").exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Arc::new(LocalStore::open(StoreConfig::directory(path))?))
}

/// Opens the action queue of an existing store.
pub fn open_queue(path: &Path, max_retries: u32) -> CliResult<QueueStore> {
    Ok(QueueStore::new(open_store(path)?, EventBus::default(), max_retries))
}

/// Prints a value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_store_is_an_error() {
        let dir = tempdir().unwrap();
        let err = open_store(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().starts_with("No store found"));
    }

    #[test]
    fn opens_seeded_store() {
        let dir = tempdir().unwrap();
        testing::seed(dir.path(), 2);
        assert_eq!(open_queue(dir.path(), 3).unwrap().len(), 2);
    }
}

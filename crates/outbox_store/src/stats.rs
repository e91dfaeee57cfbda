//! Store statistics.

use crate::collection::Collection;
use serde::Serialize;

/// Record count for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionCount {
    /// The collection.
    pub collection: Collection,
    /// Live records in it.
    pub records: usize,
}

/// Snapshot of store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Record counts for every collection.
    pub collections: Vec<CollectionCount>,
    /// Approximate serialized size of all live records, in bytes.
    pub total_size: u64,
    /// Current size of the log, in bytes.
    pub log_bytes: u64,
}

impl StoreStats {
    /// Record count for one collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map_or(0, |c| c.records)
    }
}

/// Result of [`LocalStore::compact`](crate::LocalStore::compact).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
    /// Records rewritten.
    pub records: usize,
}

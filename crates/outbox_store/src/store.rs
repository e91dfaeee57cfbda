//! The local store facade.

use crate::collection::Collection;
use crate::config::{StoreConfig, StoreLocation};
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::index::CollectionData;
use crate::log::{self, LogEntry};
use crate::record::{resource_id, Record};
use crate::resource::ResourceKind;
use crate::stats::{CollectionCount, CompactionReport, StoreStats};
use outbox_storage::{FileBackend, InMemoryBackend, LogBackend};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Durable keyed collections.
///
/// `LocalStore` is created uninitialized by [`LocalStore::new`] and becomes
/// usable after [`LocalStore::init`], which is idempotent. Reads against an
/// uninitialized store log a warning and return empty results; writes fail
/// with [`StoreError::NotInitialized`].
///
/// Each write is durable on its own. There are no cross-collection
/// transactions.
///
/// # Example
///
/// ```rust
/// use outbox_store::{Collection, LocalStore, Record, StoreConfig};
/// use serde_json::json;
///
/// let store = LocalStore::new(StoreConfig::in_memory());
/// assert!(store.get_all(Collection::Settings).is_empty());
///
/// store.init().unwrap();
/// store.put(Collection::Settings, Record::new("theme", json!("dark"))).unwrap();
/// assert_eq!(store.get_setting("theme"), Some(json!("dark")));
/// ```
pub struct LocalStore {
    config: StoreConfig,
    inner: RwLock<Option<OpenStore>>,
}

struct OpenStore {
    /// Keeps the directory lock for as long as the store is open.
    _dir: Option<StoreDir>,
    backend: Box<dyn LogBackend>,
    collections: HashMap<Collection, CollectionData>,
}

impl OpenStore {
    fn open(config: &StoreConfig) -> StoreResult<Self> {
        let (dir, mut backend): (Option<StoreDir>, Box<dyn LogBackend>) =
            match &config.location {
                StoreLocation::Memory => (None, Box::new(InMemoryBackend::new())),
                StoreLocation::Directory(path) => {
                    let dir = StoreDir::open(path)?;
                    let backend = FileBackend::open(&dir.log_path())?;
                    (Some(dir), Box::new(backend))
                }
            };

        let bytes = backend.read_all()?;
        let replay = log::decode_frames(&bytes)?;
        if replay.valid_len < bytes.len() as u64 {
            warn!(
                valid_len = replay.valid_len,
                size = bytes.len(),
                "truncating torn tail of store log"
            );
            backend.truncate(replay.valid_len)?;
        }

        let mut open = Self {
            _dir: dir,
            backend,
            collections: HashMap::new(),
        };
        for entry in replay.entries {
            open.apply(entry);
        }
        Ok(open)
    }

    fn collection(&self, collection: Collection) -> Option<&CollectionData> {
        self.collections.get(&collection)
    }

    fn apply(&mut self, entry: LogEntry) {
        match entry {
            LogEntry::Put { collection, record } => {
                self.collections.entry(collection).or_default().insert(record);
            }
            LogEntry::Delete { collection, id } => {
                if let Some(data) = self.collections.get_mut(&collection) {
                    data.remove(&id);
                }
            }
            LogEntry::Clear { collection } => {
                if let Some(data) = self.collections.get_mut(&collection) {
                    data.clear();
                }
            }
        }
    }

    /// Appends the entry to the log, then applies it in memory.
    fn commit(&mut self, entry: LogEntry, config: &StoreConfig) -> StoreResult<()> {
        let frame = entry.encode_frame()?;

        if let Some(limit) = config.max_log_bytes {
            let requested = self.backend.len() + frame.len() as u64;
            if requested > limit {
                return Err(StoreError::QuotaExceeded { requested, limit });
            }
        }

        self.backend.append(&frame)?;
        if config.sync_on_write {
            self.backend.sync()?;
        }

        self.apply(entry);
        Ok(())
    }

    fn record_count(&self) -> usize {
        self.collections.values().map(CollectionData::len).sum()
    }
}

impl LocalStore {
    /// Creates an uninitialized store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(None),
        }
    }

    /// Creates and initializes a store.
    ///
    /// # Errors
    ///
    /// See [`LocalStore::init`].
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let store = Self::new(config);
        store.init()?;
        Ok(store)
    }

    /// Opens the underlying log and replays it. Calling it again on an
    /// initialized store does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is locked by another process, the
    /// log cannot be read, or the log is corrupted.
    pub fn init(&self) -> StoreResult<()> {
        let mut guard = self.inner.write();
        if guard.is_some() {
            return Ok(());
        }

        let open = OpenStore::open(&self.config).inspect_err(|e| {
            error!(error = %e, "failed to initialize local store");
        })?;

        info!(
            location = ?self.config.location,
            records = open.record_count(),
            "local store initialized"
        );
        *guard = Some(open);
        Ok(())
    }

    /// Returns true once [`LocalStore::init`] has succeeded and the store
    /// has not been closed.
    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Closes the store, releasing its directory lock. Reads degrade to
    /// empty results until the store is initialized again.
    pub fn close(&self) {
        if self.inner.write().take().is_some() {
            info!("local store closed");
        }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn read_with<R>(
        &self,
        op: &'static str,
        scope: &str,
        f: impl FnOnce(&OpenStore) -> R,
    ) -> Option<R> {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some(open) => Some(f(open)),
            None => {
                warn!(op, scope, "local store unavailable, returning empty result");
                None
            }
        }
    }

    fn write_with<R>(
        &self,
        op: &'static str,
        scope: &str,
        f: impl FnOnce(&mut OpenStore, &StoreConfig) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mut guard = self.inner.write();
        let result = match guard.as_mut() {
            Some(open) => f(open, &self.config),
            None => Err(StoreError::NotInitialized),
        };
        if let Err(e) = &result {
            error!(op, scope, error = %e, "local store write failed");
        }
        result
    }

    /// Inserts a record, failing if its key already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] for an existing key, or any
    /// storage error.
    pub fn add(&self, collection: Collection, record: Record) -> StoreResult<()> {
        self.write_with("add", collection.name(), move |open, config| {
            if open
                .collection(collection)
                .is_some_and(|data| data.contains(&record.id))
            {
                return Err(StoreError::DuplicateKey {
                    collection,
                    id: record.id,
                });
            }
            debug!(%collection, id = %record.id, "adding record");
            open.commit(LogEntry::Put { collection, record }, config)
        })
    }

    /// Inserts or replaces a record.
    ///
    /// Replacing a key never moves its timestamp backwards: the stored
    /// timestamp is at least one past the previous one.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn put(&self, collection: Collection, mut record: Record) -> StoreResult<()> {
        self.write_with("put", collection.name(), move |open, config| {
            if let Some(previous) = open
                .collection(collection)
                .and_then(|data| data.get(&record.id))
            {
                record.timestamp = record.timestamp.max(previous.timestamp.saturating_add(1));
            }
            debug!(%collection, id = %record.id, "putting record");
            open.commit(LogEntry::Put { collection, record }, config)
        })
    }

    /// Looks up one record.
    pub fn get(&self, collection: Collection, id: &str) -> Option<Record> {
        self.read_with("get", collection.name(), |open| {
            open.collection(collection)
                .and_then(|data| data.get(id))
                .cloned()
        })
        .flatten()
    }

    /// Returns every record in key order.
    pub fn get_all(&self, collection: Collection) -> Vec<Record> {
        self.read_with("get_all", collection.name(), |open| {
            open.collection(collection)
                .map(|data| data.values().cloned().collect())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Returns every record in ascending timestamp order.
    pub fn iter_by_timestamp(&self, collection: Collection) -> Vec<Record> {
        self.read_with("iter_by_timestamp", collection.name(), |open| {
            open.collection(collection)
                .map(|data| data.iter_by_timestamp().cloned().collect())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Returns the records whose flag equals `flag`, in ascending timestamp
    /// order.
    pub fn iter_by_flag(&self, collection: Collection, flag: bool) -> Vec<Record> {
        self.read_with("iter_by_flag", collection.name(), |open| {
            open.collection(collection)
                .map(|data| data.iter_by_flag(flag).cloned().collect())
                .unwrap_or_default()
        })
        .unwrap_or_default()
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.read_with("count", collection.name(), |open| {
            open.collection(collection).map_or(0, CollectionData::len)
        })
        .unwrap_or(0)
    }

    /// Deletes a record. Returns whether it existed; deleting a missing key
    /// writes nothing.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.write_with("delete", collection.name(), |open, config| {
            if !open
                .collection(collection)
                .is_some_and(|data| data.contains(id))
            {
                return Ok(false);
            }
            let entry = LogEntry::Delete {
                collection,
                id: id.to_string(),
            };
            open.commit(entry, config)?;
            debug!(%collection, id, "deleted record");
            Ok(true)
        })
    }

    /// Removes every record in a collection, returning how many there were.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn clear(&self, collection: Collection) -> StoreResult<usize> {
        self.write_with("clear", collection.name(), |open, config| {
            let count = open.collection(collection).map_or(0, CollectionData::len);
            if count > 0 {
                open.commit(LogEntry::Clear { collection }, config)?;
            }
            info!(%collection, count, "cleared collection");
            Ok(count)
        })
    }

    /// Clears every collection.
    ///
    /// # Errors
    ///
    /// Stops at the first collection that fails to clear.
    pub fn clear_all(&self) -> StoreResult<()> {
        for collection in Collection::ALL {
            self.clear(collection)?;
        }
        info!("all collections cleared");
        Ok(())
    }

    /// Caches a remote representation, flagged as synced.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn cache_api_response(&self, kind: ResourceKind, id: &str, data: Value) -> StoreResult<()> {
        self.put(kind.collection(), Record::new(id, data).with_flag(true))
    }

    /// Caches a locally made change that the remote side has not seen yet.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn cache_local_change(&self, kind: ResourceKind, id: &str, data: Value) -> StoreResult<()> {
        self.put(kind.collection(), Record::new(id, data))
    }

    /// Returns the cached representation of one resource.
    pub fn get_cached_api_response(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.get(kind.collection(), id).map(|record| record.data)
    }

    /// Returns every cached representation of a resource kind, in key order.
    pub fn get_all_cached_for_resource(&self, kind: ResourceKind) -> Vec<Value> {
        self.get_all(kind.collection())
            .into_iter()
            .map(|record| record.data)
            .collect()
    }

    /// Returns cached records of a kind that carry unsynced local changes.
    pub fn get_unsynced(&self, kind: ResourceKind) -> Vec<Record> {
        self.iter_by_flag(kind.collection(), false)
    }

    /// Drops one cached resource.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn evict_cached(&self, kind: ResourceKind, id: &str) -> StoreResult<bool> {
        self.delete(kind.collection(), id)
    }

    /// Stores a setting.
    ///
    /// # Errors
    ///
    /// Returns any storage error.
    pub fn save_setting(&self, key: &str, value: Value) -> StoreResult<()> {
        self.put(Collection::Settings, Record::new(key, value))
    }

    /// Reads a setting.
    pub fn get_setting(&self, key: &str) -> Option<Value> {
        self.get(Collection::Settings, key).map(|record| record.data)
    }

    /// Replaces the current user snapshot. The snapshot must carry an `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRecord`] when `user` has no id, or any
    /// storage error.
    pub fn save_user(&self, user: Value) -> StoreResult<()> {
        let id = resource_id(&user)
            .ok_or_else(|| StoreError::InvalidRecord("user snapshot has no id".into()))?;

        for stale in self.get_all(Collection::User) {
            if stale.id != id {
                self.delete(Collection::User, &stale.id)?;
            }
        }
        self.put(Collection::User, Record::new(id, user))
    }

    /// Returns the current user snapshot.
    pub fn get_user(&self) -> Option<Value> {
        self.get_all(Collection::User)
            .into_iter()
            .next()
            .map(|record| record.data)
    }

    /// Counts records per collection and estimates their size.
    pub fn stats(&self) -> StoreStats {
        self.read_with("stats", "*", |open| {
            let collections = Collection::ALL
                .into_iter()
                .map(|collection| CollectionCount {
                    collection,
                    records: open.collection(collection).map_or(0, CollectionData::len),
                })
                .collect();
            let total_size = open
                .collections
                .values()
                .flat_map(|data| data.values())
                .map(Record::approximate_size)
                .sum();
            StoreStats {
                collections,
                total_size,
                log_bytes: open.backend.len(),
            }
        })
        .unwrap_or_default()
    }

    /// Rewrites the log so it holds only live records.
    ///
    /// A directory store writes the new log beside the old one, syncs it,
    /// and renames it into place.
    ///
    /// # Errors
    ///
    /// Returns any storage or codec error. The old log stays in place if the
    /// rename has not happened yet.
    pub fn compact(&self) -> StoreResult<CompactionReport> {
        self.write_with("compact", "*", |open, _config| {
            let bytes_before = open.backend.len();

            let mut frames = Vec::new();
            let mut records = 0;
            for collection in Collection::ALL {
                let Some(data) = open.collection(collection) else {
                    continue;
                };
                for record in data.values() {
                    let entry = LogEntry::Put {
                        collection,
                        record: record.clone(),
                    };
                    frames.extend(entry.encode_frame()?);
                    records += 1;
                }
            }
            open.backend.replace(&frames)?;

            let report = CompactionReport {
                bytes_before,
                bytes_after: open.backend.len(),
                records,
            };
            info!(
                bytes_before = report.bytes_before,
                bytes_after = report.bytes_after,
                records,
                "store log compacted"
            );
            Ok(report)
        })
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("location", &self.config.location)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_memory() -> LocalStore {
        LocalStore::open(StoreConfig::in_memory()).unwrap()
    }

    #[test]
    fn init_is_idempotent() {
        let store = LocalStore::new(StoreConfig::in_memory());
        assert!(!store.is_initialized());
        store.init().unwrap();
        store
            .put(Collection::Properties, Record::new("p1", json!({})))
            .unwrap();
        store.init().unwrap();
        assert!(store.is_initialized());
        assert_eq!(store.count(Collection::Properties), 1);
    }

    #[test]
    fn uninitialized_reads_are_empty_and_writes_fail() {
        let store = LocalStore::new(StoreConfig::in_memory());

        assert!(store.get(Collection::Properties, "p1").is_none());
        assert!(store.get_all(Collection::Properties).is_empty());
        assert!(store.iter_by_flag(Collection::Properties, true).is_empty());
        assert_eq!(store.count(Collection::Properties), 0);
        assert_eq!(store.stats(), StoreStats::default());

        let result = store.put(Collection::Properties, Record::new("p1", json!({})));
        assert!(matches!(result, Err(StoreError::NotInitialized)));
        assert!(matches!(
            store.delete(Collection::Properties, "p1"),
            Err(StoreError::NotInitialized)
        ));
    }

    #[test]
    fn add_rejects_existing_key() {
        let store = open_memory();
        store
            .add(Collection::Contracts, Record::new("c1", json!({"v": 1})))
            .unwrap();

        let err = store
            .add(Collection::Contracts, Record::new("c1", json!({"v": 2})))
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(
            store.get(Collection::Contracts, "c1").unwrap().data,
            json!({"v": 1})
        );
    }

    #[test]
    fn put_never_moves_timestamp_backwards() {
        let store = open_memory();
        store
            .put(
                Collection::Payments,
                Record::new("pay1", json!(1)).with_timestamp(100),
            )
            .unwrap();
        store
            .put(
                Collection::Payments,
                Record::new("pay1", json!(2)).with_timestamp(50),
            )
            .unwrap();

        let record = store.get(Collection::Payments, "pay1").unwrap();
        assert_eq!(record.data, json!(2));
        assert_eq!(record.timestamp, 101);
    }

    #[test]
    fn put_over_max_timestamp_saturates() {
        let store = open_memory();
        for value in [1, 2] {
            store
                .put(
                    Collection::Payments,
                    Record::new("pay1", json!(value)).with_timestamp(u64::MAX),
                )
                .unwrap();
        }

        let record = store.get(Collection::Payments, "pay1").unwrap();
        assert_eq!(record.data, json!(2));
        assert_eq!(record.timestamp, u64::MAX);
    }

    #[test]
    fn delete_and_clear() {
        let store = open_memory();
        for id in ["a", "b", "c"] {
            store
                .put(Collection::Maintenance, Record::new(id, json!({})))
                .unwrap();
        }

        assert!(store.delete(Collection::Maintenance, "a").unwrap());
        assert!(!store.delete(Collection::Maintenance, "a").unwrap());
        assert_eq!(store.clear(Collection::Maintenance).unwrap(), 2);
        assert_eq!(store.count(Collection::Maintenance), 0);
    }

    #[test]
    fn collections_are_isolated() {
        let store = open_memory();
        store
            .put(Collection::Properties, Record::new("x", json!("property")))
            .unwrap();
        store
            .put(Collection::Contracts, Record::new("x", json!("contract")))
            .unwrap();

        store.clear(Collection::Properties).unwrap();
        assert_eq!(
            store.get(Collection::Contracts, "x").unwrap().data,
            json!("contract")
        );
    }

    #[test]
    fn cache_round_trip_and_unsynced_index() {
        let store = open_memory();
        store
            .cache_api_response(ResourceKind::Property, "p1", json!({"id": "p1"}))
            .unwrap();
        store
            .cache_local_change(ResourceKind::Property, "temp-1", json!({"id": "temp-1"}))
            .unwrap();

        assert_eq!(
            store.get_cached_api_response(ResourceKind::Property, "p1"),
            Some(json!({"id": "p1"}))
        );
        assert_eq!(
            store.get_all_cached_for_resource(ResourceKind::Property).len(),
            2
        );

        let unsynced = store.get_unsynced(ResourceKind::Property);
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, "temp-1");

        assert!(store.evict_cached(ResourceKind::Property, "p1").unwrap());
        assert!(store
            .get_cached_api_response(ResourceKind::Property, "p1")
            .is_none());
    }

    #[test]
    fn settings_and_user_snapshot() {
        let store = open_memory();
        store.save_setting("locale", json!("es-CL")).unwrap();
        assert_eq!(store.get_setting("locale"), Some(json!("es-CL")));
        assert_eq!(store.get_setting("missing"), None);

        store.save_user(json!({"id": "u1", "name": "Ana"})).unwrap();
        store.save_user(json!({"id": "u2", "name": "Luis"})).unwrap();
        assert_eq!(store.count(Collection::User), 1);
        assert_eq!(store.get_user().unwrap()["name"], "Luis");

        let err = store.save_user(json!({"name": "anonymous"})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn quota_rejects_writes_but_keeps_reads() {
        let store = LocalStore::open(StoreConfig::in_memory().max_log_bytes(200)).unwrap();
        store
            .put(Collection::Settings, Record::new("k", json!("small")))
            .unwrap();

        let big = json!("x".repeat(500));
        let err = store
            .put(Collection::Settings, Record::new("big", big))
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { limit: 200, .. }));
        assert!(store.get(Collection::Settings, "big").is_none());
        assert_eq!(store.get_setting("k"), Some(json!("small")));
    }

    #[test]
    fn stats_count_every_collection() {
        let store = open_memory();
        store
            .cache_api_response(ResourceKind::Contract, "c1", json!({"id": "c1"}))
            .unwrap();
        store
            .cache_api_response(ResourceKind::Contract, "c2", json!({"id": "c2"}))
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.collections.len(), Collection::ALL.len());
        assert_eq!(stats.count(Collection::Contracts), 2);
        assert_eq!(stats.count(Collection::Properties), 0);
        assert!(stats.total_size > 0);
        assert!(stats.log_bytes > 0);
    }

    #[test]
    fn compaction_in_memory_keeps_live_records() {
        let store = open_memory();
        for i in 0..10 {
            store
                .put(Collection::Properties, Record::new("p", json!(i)))
                .unwrap();
        }

        let report = store.compact().unwrap();
        assert_eq!(report.records, 1);
        assert!(report.bytes_after < report.bytes_before);
        assert_eq!(store.get(Collection::Properties, "p").unwrap().data, json!(9));
    }

    #[test]
    fn close_releases_and_degrades() {
        let store = open_memory();
        store.save_setting("k", json!(1)).unwrap();
        store.close();
        assert!(!store.is_initialized());
        assert!(store.get_setting("k").is_none());
        assert!(store.save_setting("k", json!(2)).is_err());
    }
}

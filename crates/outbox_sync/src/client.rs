//! The single entry point an application talks to.

use crate::action::{NewAction, QueueItem, QueueStats};
use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::engine::{DrainReport, SyncEngine};
use crate::error::{SyncError, SyncResult};
use crate::events::SyncEvent;
use crate::monitor::{ConnectivityMonitor, MonitorHandle};
use crate::queue::{generate_id, QueueStore};
use crate::transport::Transport;
use outbox_store::{now_millis, resource_id, LocalStore, ResourceKind, StoreConfig};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Marker set on cache entries written locally and not yet confirmed.
pub const OFFLINE_MARKER: &str = "_isOffline";

/// Marker set on cache entries deleted locally and not yet confirmed.
pub const DELETED_MARKER: &str = "_deleted";

/// Queue, cache and sync engine wired over one store.
///
/// # Example
///
/// ```rust
/// use outbox_store::{ResourceKind, StoreConfig};
/// use outbox_sync::{Connectivity, MockTransport, OfflineClient, SyncConfig};
/// use serde_json::json;
///
/// let client = OfflineClient::open(
///     StoreConfig::in_memory(),
///     MockTransport::new(),
///     SyncConfig::new(),
///     Connectivity::offline(),
/// )
/// .unwrap();
///
/// let id = client
///     .create_offline(ResourceKind::Property, "/api/properties", json!({"title": "Casa"}))
///     .unwrap();
/// assert!(id.starts_with("temp-"));
/// assert_eq!(client.get_stats().pending, 1);
/// ```
pub struct OfflineClient<T: Transport> {
    engine: Arc<SyncEngine<T>>,
}

impl<T: Transport + 'static> OfflineClient<T> {
    /// Wires a client over an already opened store.
    pub fn new(store: Arc<LocalStore>, transport: T, config: SyncConfig, connectivity: Connectivity) -> Self {
        Self {
            engine: Arc::new(SyncEngine::new(config, transport, store, connectivity)),
        }
    }

    /// Opens a store and wires a client over it.
    pub fn open(
        store_config: StoreConfig,
        transport: T,
        config: SyncConfig,
        connectivity: Connectivity,
    ) -> SyncResult<Self> {
        let store = Arc::new(LocalStore::open(store_config)?);
        Ok(Self::new(store, transport, config, connectivity))
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        self.engine.queue().store()
    }

    /// The action queue.
    pub fn queue(&self) -> &QueueStore {
        self.engine.queue()
    }

    /// The sync engine.
    pub fn engine(&self) -> &Arc<SyncEngine<T>> {
        &self.engine
    }

    /// The connectivity flag.
    pub fn connectivity(&self) -> &Connectivity {
        self.engine.connectivity()
    }

    /// Subscribes to queue and sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.engine.events().subscribe()
    }

    /// Queues an action. Never touches the network.
    pub fn enqueue(&self, action: NewAction) -> SyncResult<String> {
        self.queue().enqueue(action)
    }

    /// Every queued action, oldest first.
    pub fn get_queue(&self) -> Vec<QueueItem> {
        self.queue().get_queue()
    }

    /// Queue counts.
    pub fn get_stats(&self) -> QueueStats {
        self.queue().get_stats()
    }

    /// Removes one queued action.
    pub fn remove_action(&self, id: &str) -> SyncResult<bool> {
        self.queue().remove_action(id)
    }

    /// Removes every parked action.
    pub fn clear_failed_actions(&self) -> SyncResult<usize> {
        self.queue().clear_failed_actions()
    }

    /// Removes every queued action.
    pub fn clear_queue(&self) -> SyncResult<usize> {
        self.queue().clear_queue()
    }

    /// Caches a server representation.
    pub fn cache_api_response(&self, kind: ResourceKind, id: &str, data: Value) -> SyncResult<()> {
        Ok(self.store().cache_api_response(kind, id, data)?)
    }

    /// Reads a cached representation.
    pub fn get_cached_api_response(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.store().get_cached_api_response(kind, id)
    }

    /// Reads every cached representation of a resource.
    pub fn get_all_cached_for_resource(&self, kind: ResourceKind) -> Vec<Value> {
        self.store().get_all_cached_for_resource(kind)
    }

    /// Drains the queue now if online. Offline or already draining yields
    /// an empty report.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        self.engine.drain().await
    }

    /// Like [`drain`](Self::drain), but refuses to run while offline.
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        if !self.connectivity().is_online() {
            return Err(SyncError::Offline);
        }
        self.engine.drain().await
    }

    /// Starts a monitor using the configured poll interval.
    pub fn start_monitor(&self) -> MonitorHandle {
        ConnectivityMonitor::spawn(Arc::clone(&self.engine), self.engine.config().poll_interval)
    }

    /// Records a locally created entity and queues its creation.
    ///
    /// The entity is cached at once, marked unsynced and offline, under its
    /// own `id` or a provisional `temp-` id. Returns that id.
    pub fn create_offline(&self, kind: ResourceKind, endpoint: &str, data: Value) -> SyncResult<String> {
        let provided = resource_id(&data);
        let mut fields = into_object(data)?;
        let id = match provided {
            Some(id) => id,
            None => {
                let id = generate_id("temp", now_millis());
                fields.insert("id".into(), Value::String(id.clone()));
                id
            }
        };

        let payload = Value::Object(fields.clone());
        fields.insert(OFFLINE_MARKER.into(), Value::Bool(true));
        self.store().cache_local_change(kind, &id, Value::Object(fields))?;
        self.enqueue(NewAction::create(kind, endpoint, payload))?;

        info!(%id, resource = %kind, "entity created offline");
        Ok(id)
    }

    /// Records a local edit of an entity and queues the update.
    ///
    /// `data` must carry the entity's `id`. Cached fields not present in
    /// `data` are kept.
    pub fn update_offline(&self, kind: ResourceKind, endpoint: &str, data: Value) -> SyncResult<String> {
        let id = resource_id(&data)
            .ok_or_else(|| SyncError::InvalidPayload("update needs an id".into()))?;
        let changes = into_object(data)?;

        let mut cached = self
            .store()
            .get_cached_api_response(kind, &id)
            .and_then(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        cached.extend(changes.clone());
        cached.insert(OFFLINE_MARKER.into(), Value::Bool(true));
        self.store().cache_local_change(kind, &id, Value::Object(cached))?;

        self.enqueue(NewAction::update(kind, endpoint, Value::Object(changes)))
    }

    /// Marks a cached entity deleted and queues the deletion.
    pub fn delete_offline(&self, kind: ResourceKind, endpoint: &str, id: &str) -> SyncResult<String> {
        if let Some(Value::Object(mut cached)) = self.store().get_cached_api_response(kind, id) {
            cached.insert(DELETED_MARKER.into(), Value::Bool(true));
            cached.insert(OFFLINE_MARKER.into(), Value::Bool(true));
            self.store().cache_local_change(kind, id, Value::Object(cached))?;
        }
        self.enqueue(NewAction::delete(kind, endpoint, json!({ "id": id })))
    }
}

fn into_object(data: Value) -> SyncResult<Map<String, Value>> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::InvalidPayload(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

impl<T: Transport> std::fmt::Debug for OfflineClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineClient")
            .field("engine", &self.engine)
            .finish()
    }
}

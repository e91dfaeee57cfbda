//! The persistent FIFO of pending actions.

use crate::action::{NewAction, QueueItem, QueueStats};
use crate::error::SyncResult;
use crate::events::{EventBus, SyncEvent};
use outbox_store::{now_millis, Collection, LocalStore};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates `<prefix>-<millis>-<9 base36 chars>`.
pub(crate) fn generate_id(prefix: &str, millis: u64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}-{millis}-{suffix}")
}

/// The queue of actions awaiting delivery, stored in the `offline-queue`
/// collection.
///
/// Enqueueing only persists and announces the item. Delivery is the sync
/// engine's job; nothing here touches the network.
#[derive(Clone)]
pub struct QueueStore {
    store: Arc<LocalStore>,
    events: EventBus,
    max_retries: u32,
    last_enqueued_at: Arc<Mutex<Option<u64>>>,
}

impl QueueStore {
    /// Creates a queue over `store`. `max_retries` decides which items
    /// count as failed.
    ///
    /// A [`SyncEngine`](crate::SyncEngine) builds its own queue from its
    /// retry config; this is for inspecting a store without an engine.
    pub fn new(store: Arc<LocalStore>, events: EventBus, max_retries: u32) -> Self {
        Self {
            store,
            events,
            max_retries,
            last_enqueued_at: Arc::new(Mutex::new(None)),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// The bus queue changes are published on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Attempts after which an item is parked.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Persists `action` and returns the new item's id.
    pub fn enqueue(&self, action: NewAction) -> SyncResult<String> {
        let enqueued_at = self.next_enqueued_at();
        let item = QueueItem {
            id: generate_id("queue", enqueued_at),
            action_type: action.action_type,
            resource: action.resource,
            endpoint: action.endpoint,
            payload: action.payload,
            enqueued_at,
            retry_count: 0,
            last_error: None,
        };

        self.store.add(Collection::OfflineQueue, item.to_record()?)?;
        info!(
            id = %item.id,
            action = %item.action_type,
            resource = %item.resource,
            "action queued"
        );

        self.events.publish(SyncEvent::Enqueued {
            id: item.id.clone(),
            action_type: item.action_type,
            resource: item.resource,
        });
        Ok(item.id)
    }

    /// Every item, oldest first. Items that fail to decode are skipped.
    pub fn get_queue(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self
            .store
            .get_all(Collection::OfflineQueue)
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                QueueItem::from_record(record)
                    .inspect_err(|e| warn!(%id, error = %e, "skipping undecodable queue item"))
                    .ok()
            })
            .collect();
        items.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    /// Looks up one item.
    pub fn get(&self, id: &str) -> Option<QueueItem> {
        let record = self.store.get(Collection::OfflineQueue, id)?;
        QueueItem::from_record(record)
            .inspect_err(|e| warn!(%id, error = %e, "undecodable queue item"))
            .ok()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.store.count(Collection::OfflineQueue)
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending, retrying and failed counts.
    pub fn get_stats(&self) -> QueueStats {
        QueueStats::from_items(&self.get_queue(), self.max_retries)
    }

    /// Removes one item without delivering it. Returns false if it was
    /// not queued.
    pub fn remove_action(&self, id: &str) -> SyncResult<bool> {
        let removed = self.store.delete(Collection::OfflineQueue, id)?;
        if removed {
            info!(%id, "queued action removed");
            self.events.publish(SyncEvent::ActionRemoved { id: id.to_string() });
        }
        Ok(removed)
    }

    /// Removes every item that exhausted its retries.
    pub fn clear_failed_actions(&self) -> SyncResult<usize> {
        let mut removed = 0;
        for item in self.get_queue() {
            if item.retry_count >= self.max_retries && self.remove_action(&item.id)? {
                removed += 1;
            }
        }
        info!(removed, "failed actions purged");
        Ok(removed)
    }

    /// Removes every item.
    pub fn clear_queue(&self) -> SyncResult<usize> {
        let count = self.store.clear(Collection::OfflineQueue)?;
        info!(count, "queue cleared");
        self.events.publish(SyncEvent::QueueCleared { count });
        Ok(count)
    }

    /// Rewrites an item after a failed attempt. An item removed while its
    /// delivery was in flight stays removed.
    pub(crate) fn update(&self, item: &QueueItem) -> SyncResult<bool> {
        if self.store.get(Collection::OfflineQueue, &item.id).is_none() {
            debug!(id = %item.id, "item left the queue during delivery, not updating");
            return Ok(false);
        }
        self.store.put(Collection::OfflineQueue, item.to_record()?)?;
        Ok(true)
    }

    /// Removes a delivered item without announcing a removal.
    pub(crate) fn acknowledge(&self, id: &str) -> SyncResult<bool> {
        Ok(self.store.delete(Collection::OfflineQueue, id)?)
    }

    fn next_enqueued_at(&self) -> u64 {
        let mut last = self.last_enqueued_at.lock();
        let floor = match *last {
            Some(at) => at,
            None => self
                .get_queue()
                .last()
                .map(|item| item.enqueued_at)
                .unwrap_or(0),
        };
        let at = now_millis().max(floor + 1);
        *last = Some(at);
        at
    }
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("max_retries", &self.max_retries)
            .field("last_enqueued_at", &*self.last_enqueued_at.lock())
            .finish_non_exhaustive()
    }
}

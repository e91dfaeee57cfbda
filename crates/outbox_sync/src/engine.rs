//! Replay of queued actions against the remote API.

use crate::action::{ActionType, QueueItem};
use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::queue::QueueStore;
use crate::transport::{ReplayRequest, ReplayResponse, Transport};
use outbox_store::{now_millis, resource_id, LocalStore};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No drain is running.
    Idle,
    /// A drain is delivering its snapshot.
    Draining,
}

/// One failed delivery in a drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainError {
    /// Queue item id.
    pub id: String,
    /// Failure message.
    pub error: String,
}

/// Outcome of a drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Items delivered and removed.
    pub success: usize,
    /// Items that failed or were skipped as parked.
    pub failed: usize,
    /// One entry per failed item.
    pub errors: Vec<DrainError>,
}

impl DrainReport {
    /// Returns true if nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.success == 0 && self.failed == 0
    }

    fn record_failure(&mut self, id: &str, error: impl Into<String>) {
        self.failed += 1;
        self.errors.push(DrainError {
            id: id.to_string(),
            error: error.into(),
        });
    }
}

/// Statistics about drains.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Drains that ran to completion.
    pub drains_completed: u64,
    /// Drain requests that returned immediately because the engine was
    /// offline or already draining.
    pub drains_skipped: u64,
    /// Items delivered.
    pub actions_synced: u64,
    /// Failed delivery attempts.
    pub failed_attempts: u64,
    /// When the last drain finished, in milliseconds since the epoch.
    pub last_drain_at: Option<u64>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Clears the draining flag however the drain ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Delivers queued actions in FIFO order, one at a time.
///
/// At most one drain runs per engine. A drain works from a snapshot taken
/// when it starts: actions enqueued meanwhile wait for the next drain, and
/// actions removed meanwhile are skipped. Delivered actions leave the
/// queue and write their response through to the resource cache. Failed
/// actions stay queued with a raised retry count until they reach
/// `max_retries`, after which they are parked.
pub struct SyncEngine<T: Transport> {
    config: SyncConfig,
    transport: T,
    queue: QueueStore,
    connectivity: Connectivity,
    draining: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<T: Transport> SyncEngine<T> {
    /// Creates a new sync engine over `store`.
    ///
    /// The engine owns its queue: the queue's event bus is sized by
    /// `config.event_capacity` and its failed/retrying split uses
    /// `config.retry`, so queue stats agree with what the engine parks.
    pub fn new(
        config: SyncConfig,
        transport: T,
        store: Arc<LocalStore>,
        connectivity: Connectivity,
    ) -> Self {
        let queue = QueueStore::new(
            store,
            EventBus::new(config.event_capacity),
            config.retry.max_retries,
        );
        Self {
            config,
            transport,
            queue,
            connectivity,
            draining: AtomicBool::new(false),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        if self.is_draining() {
            SyncState::Draining
        } else {
            SyncState::Idle
        }
    }

    /// Returns true while a drain is running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The queue being drained.
    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// The connectivity flag gating drains.
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// The event bus drains report on.
    pub fn events(&self) -> &EventBus {
        self.queue.events()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Delivers every eligible queued action.
    ///
    /// Returns an empty report without touching the network when offline
    /// or when another drain is running. Delivery failures are counted in
    /// the report; `Err` means the local store failed mid-drain.
    pub async fn drain(&self) -> SyncResult<DrainReport> {
        if !self.connectivity.is_online() {
            debug!("offline, skipping drain");
            self.stats.write().drains_skipped += 1;
            return Ok(DrainReport::default());
        }
        let Some(_guard) = DrainGuard::acquire(&self.draining) else {
            debug!("drain already in progress");
            self.stats.write().drains_skipped += 1;
            return Ok(DrainReport::default());
        };

        let snapshot = self.queue.get_queue();
        let queued = snapshot.len();
        info!(queued, "drain started");
        self.events().publish(SyncEvent::SyncStarted { queued });

        match self.drain_snapshot(snapshot).await {
            Ok(report) => {
                {
                    let mut stats = self.stats.write();
                    stats.drains_completed += 1;
                    stats.last_drain_at = Some(now_millis());
                    if let Some(last) = report.errors.last() {
                        stats.last_error = Some(last.error.clone());
                    }
                }
                info!(
                    success = report.success,
                    failed = report.failed,
                    "drain completed"
                );
                self.events().publish(SyncEvent::SyncCompleted {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "drain aborted");
                self.stats.write().last_error = Some(e.to_string());
                self.events().publish(SyncEvent::SyncFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drain_snapshot(&self, snapshot: Vec<QueueItem>) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();
        let total = snapshot.len();

        for (index, queued) in snapshot.into_iter().enumerate() {
            let Some(item) = self.queue.get(&queued.id) else {
                debug!(id = %queued.id, "item left the queue before delivery");
                continue;
            };

            if self.config.retry.is_exhausted(item.retry_count) {
                debug!(id = %item.id, retry_count = item.retry_count, "skipping parked item");
                let reason = item
                    .last_error
                    .clone()
                    .unwrap_or_else(|| format!("retry limit reached after {} attempts", item.retry_count));
                report.record_failure(&item.id, reason);
                continue;
            }

            match self.deliver(&item).await {
                Ok(response) => {
                    self.on_delivered(&item, response)?;
                    report.success += 1;
                }
                Err(e) => {
                    self.on_failed(item.clone(), &e)?;
                    report.record_failure(&item.id, e.to_string());
                }
            }

            if index + 1 < total && !self.config.item_delay.is_zero() {
                tokio::time::sleep(self.config.item_delay).await;
            }
        }
        Ok(report)
    }

    async fn deliver(&self, item: &QueueItem) -> SyncResult<ReplayResponse> {
        let request = ReplayRequest::for_item(item, &self.config.replay_header);
        debug!(id = %item.id, method = %request.method, url = %request.url, "replaying action");

        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(SyncError::Status {
                status: response.status,
                message: response.error_message(),
            })
        }
    }

    fn on_delivered(&self, item: &QueueItem, response: ReplayResponse) -> SyncResult<()> {
        self.write_through(item, response.body);
        self.queue.acknowledge(&item.id)?;
        self.stats.write().actions_synced += 1;
        info!(id = %item.id, action = %item.action_type, "action synced");
        self.events().publish(SyncEvent::ActionSynced {
            id: item.id.clone(),
        });
        Ok(())
    }

    fn on_failed(&self, mut item: QueueItem, error: &SyncError) -> SyncResult<()> {
        let retry = self.config.retry;
        item.retry_count = item.retry_count.saturating_add(1);
        if retry.park_permanent_failures && error.is_permanent() {
            item.retry_count = item.retry_count.max(retry.max_retries);
        }
        item.last_error = Some(error.to_string());
        self.queue.update(&item)?;
        self.stats.write().failed_attempts += 1;

        warn!(
            id = %item.id,
            retry_count = item.retry_count,
            max_retries = retry.max_retries,
            error = %error,
            "action failed"
        );
        self.events().publish(SyncEvent::ActionFailed {
            id: item.id,
            error: error.to_string(),
            retry_count: item.retry_count,
        });
        Ok(())
    }

    /// Mirrors a delivered action into the resource cache. Failures are
    /// logged; the delivery itself already succeeded.
    fn write_through(&self, item: &QueueItem, body: Option<Value>) {
        let store = self.queue.store();
        let payload_id = resource_id(&item.payload);

        let result = match item.action_type {
            ActionType::Delete => match &payload_id {
                Some(id) => store.evict_cached(item.resource, id).map(|_| ()),
                None => Ok(()),
            },
            ActionType::Create | ActionType::Update => {
                match body.as_ref().and_then(resource_id) {
                    Some(id) => {
                        let cached = store.cache_api_response(item.resource, &id, body.unwrap_or_default());
                        // A create queued under a provisional id is now known by the server's id.
                        match payload_id.filter(|provisional| *provisional != id) {
                            Some(provisional) if item.action_type == ActionType::Create => cached
                                .and_then(|()| store.evict_cached(item.resource, &provisional).map(|_| ())),
                            _ => cached,
                        }
                    }
                    None => {
                        debug!(id = %item.id, "response has no resource id, cache left as is");
                        Ok(())
                    }
                }
            }
        };

        if let Err(e) = result {
            warn!(id = %item.id, resource = %item.resource, error = %e, "cache write-through failed");
        }
    }
}

impl<T: Transport> std::fmt::Debug for SyncEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

//! Queue and sync notifications.

use crate::action::ActionType;
use crate::engine::DrainReport;
use outbox_store::ResourceKind;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// Something observable happened to the queue or a drain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// An action was persisted to the queue.
    Enqueued {
        /// Queue item id.
        id: String,
        /// Mutation kind.
        action_type: ActionType,
        /// Target resource.
        resource: ResourceKind,
    },
    /// A drain took its snapshot and started delivering.
    SyncStarted {
        /// Items in the snapshot.
        queued: usize,
    },
    /// An item was delivered and removed from the queue.
    ActionSynced {
        /// Queue item id.
        id: String,
    },
    /// A delivery attempt failed and the item's retry count was raised.
    ActionFailed {
        /// Queue item id.
        id: String,
        /// Failure message.
        error: String,
        /// Retry count after this failure.
        retry_count: u32,
    },
    /// A drain finished.
    SyncCompleted {
        /// Outcome of the drain.
        report: DrainReport,
    },
    /// A drain aborted on a local store error.
    SyncFailed {
        /// Failure message.
        error: String,
    },
    /// The whole queue was cleared.
    QueueCleared {
        /// Items removed.
        count: usize,
    },
    /// A single item was removed without being delivered.
    ActionRemoved {
        /// Queue item id.
        id: String,
    },
}

impl SyncEvent {
    /// Kebab-case event name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Enqueued { .. } => "enqueued",
            SyncEvent::SyncStarted { .. } => "sync-started",
            SyncEvent::ActionSynced { .. } => "action-synced",
            SyncEvent::ActionFailed { .. } => "action-failed",
            SyncEvent::SyncCompleted { .. } => "sync-completed",
            SyncEvent::SyncFailed { .. } => "sync-failed",
            SyncEvent::QueueCleared { .. } => "queue-cleared",
            SyncEvent::ActionRemoved { .. } => "action-removed",
        }
    }
}

/// Fan-out of [`SyncEvent`]s to any number of subscribers.
///
/// Publishing never blocks and never fails. Subscribers that fall behind
/// by more than the channel capacity lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, event: SyncEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "event published"),
            Err(_) => trace!(event = name, "event dropped, no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

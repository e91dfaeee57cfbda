//! Queued actions.

use crate::error::{SyncError, SyncResult};
use crate::transport::Method;
use outbox_store::{Record, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The kind of mutation a queued action replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// Replayed as POST with the payload as body.
    Create,
    /// Replayed as PUT with the payload as body.
    Update,
    /// Replayed as DELETE with no body.
    Delete,
}

impl ActionType {
    /// The HTTP method used to replay this action.
    pub const fn method(self) -> Method {
        match self {
            ActionType::Create => Method::Post,
            ActionType::Update => Method::Put,
            ActionType::Delete => Method::Delete,
        }
    }

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ActionType::Create => "CREATE",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(ActionType::Create),
            "UPDATE" => Ok(ActionType::Update),
            "DELETE" => Ok(ActionType::Delete),
            _ => Err(SyncError::UnknownActionType(s.to_string())),
        }
    }
}

/// An action the caller wants queued.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAction {
    /// Mutation kind.
    pub action_type: ActionType,
    /// Resource the action targets.
    pub resource: ResourceKind,
    /// Request path or absolute URL.
    pub endpoint: String,
    /// Request body, or for deletes the identity of the deleted entity.
    pub payload: Value,
}

impl NewAction {
    /// Creates an action.
    pub fn new(
        action_type: ActionType,
        resource: ResourceKind,
        endpoint: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            action_type,
            resource,
            endpoint: endpoint.into(),
            payload,
        }
    }

    /// A CREATE action.
    pub fn create(resource: ResourceKind, endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(ActionType::Create, resource, endpoint, payload)
    }

    /// An UPDATE action.
    pub fn update(resource: ResourceKind, endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(ActionType::Update, resource, endpoint, payload)
    }

    /// A DELETE action.
    pub fn delete(resource: ResourceKind, endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(ActionType::Delete, resource, endpoint, payload)
    }

    /// Builds an action from untyped names, rejecting unknown action
    /// types and resources.
    pub fn parse(
        action_type: &str,
        resource: &str,
        endpoint: impl Into<String>,
        payload: Value,
    ) -> SyncResult<Self> {
        Ok(Self::new(
            action_type.parse()?,
            resource.parse()?,
            endpoint,
            payload,
        ))
    }
}

/// A persisted action awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique id, `queue-<millis>-<suffix>`.
    pub id: String,
    /// Mutation kind.
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Resource the action targets.
    pub resource: ResourceKind,
    /// Request path or absolute URL.
    pub endpoint: String,
    /// Request body.
    pub payload: Value,
    /// Enqueue time in milliseconds. Strictly increasing within a store
    /// and the sole FIFO key.
    pub enqueued_at: u64,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
    /// Message of the most recent failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Where this item stands relative to `max_retries`.
    pub fn status(&self, max_retries: u32) -> ItemStatus {
        if self.retry_count >= max_retries {
            ItemStatus::Failed
        } else if self.retry_count > 0 {
            ItemStatus::Retrying
        } else {
            ItemStatus::Pending
        }
    }

    pub(crate) fn to_record(&self) -> SyncResult<Record> {
        let data = serde_json::to_value(self).map_err(|e| SyncError::Codec(e.to_string()))?;
        Ok(Record::new(self.id.clone(), data).with_flag(self.retry_count > 0))
    }

    pub(crate) fn from_record(record: Record) -> SyncResult<Self> {
        serde_json::from_value(record.data).map_err(|e| SyncError::Codec(e.to_string()))
    }
}

/// Delivery status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Never attempted, or never failed.
    Pending,
    /// Failed at least once, still eligible.
    Retrying,
    /// Exhausted its retries and parked.
    Failed,
}

/// Counts over the current queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items in the queue.
    pub total: usize,
    /// Items that have never failed.
    pub pending: usize,
    /// Items that failed but are still eligible.
    pub retrying: usize,
    /// Items that exhausted their retries.
    pub failed: usize,
}

impl QueueStats {
    /// Tallies `items` against `max_retries`.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a QueueItem>, max_retries: u32) -> Self {
        let mut stats = QueueStats::default();
        for item in items {
            stats.total += 1;
            match item.status(max_retries) {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Retrying => stats.retrying += 1,
                ItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

//! Records held by collections.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One keyed entry in a collection.
///
/// For resource collections `data` is the cached remote representation and
/// `flag` means "synced". Notifications use the flag as "read"; queue
/// entries use it as "has failed at least once".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Key, unique within the collection.
    pub id: String,
    /// Stored value.
    pub data: Value,
    /// Write time in milliseconds. Only increases across writes to one key.
    pub timestamp: u64,
    /// Boolean indexed by [`LocalStore::iter_by_flag`](crate::LocalStore::iter_by_flag).
    pub flag: bool,
}

impl Record {
    /// Creates an unflagged record stamped with the current time.
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
            timestamp: now_millis(),
            flag: false,
        }
    }

    /// Sets the flag.
    #[must_use]
    pub fn with_flag(mut self, flag: bool) -> Self {
        self.flag = flag;
        self
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serialized JSON length of the record, used for size estimates.
    pub(crate) fn approximate_size(&self) -> u64 {
        serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0)
    }
}

/// Extracts a string key from the `id` field of a JSON object.
///
/// Numeric ids are rendered in decimal.
pub fn resource_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

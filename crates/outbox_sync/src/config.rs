//! Configuration for queueing and replay.

use std::time::Duration;

/// Header added to every replayed request so the remote API can tell a
/// replay from a live call.
pub const REPLAY_HEADER: &str = "X-Offline-Replay";

/// Configuration for the sync engine and connectivity monitor.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Pause between consecutive deliveries within one drain.
    pub item_delay: Duration,
    /// How often the monitor drains while online.
    pub poll_interval: Duration,
    /// Name and value of the replay marker header.
    pub replay_header: (String, String),
    /// Buffer size of the event channel.
    pub event_capacity: usize,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            item_delay: Duration::from_millis(250),
            poll_interval: Duration::from_secs(30),
            replay_header: (REPLAY_HEADER.to_string(), "true".to_string()),
            event_capacity: 64,
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the pause between consecutive deliveries.
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Sets the monitor's polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the replay marker header.
    pub fn with_replay_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.replay_header = (name.into(), value.into());
        self
    }

    /// Sets the event channel capacity. Zero is raised to one.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// Items are retried once per drain. An item whose `retry_count` has
/// reached `max_retries` is parked: it stays in the queue for inspection
/// and is never delivered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Failed attempts after which an item is parked.
    pub max_retries: u32,
    /// Park items immediately when the remote rejects them with a
    /// non-retryable 4xx.
    pub park_permanent_failures: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            park_permanent_failures: false,
        }
    }

    /// Creates a configuration that parks an item after its first failure.
    pub const fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets whether permanent failures park the item immediately.
    #[must_use]
    pub const fn with_park_permanent_failures(mut self, park: bool) -> Self {
        self.park_permanent_failures = park;
        self
    }

    /// Returns true once `retry_count` has used up every attempt.
    pub const fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert!(!config.retry.park_permanent_failures);
        assert_eq!(config.item_delay, Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.replay_header.0, "X-Offline-Replay");
        assert_eq!(config.replay_header.1, "true");
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_retry(RetryConfig::new(5).with_park_permanent_failures(true))
            .with_item_delay(Duration::ZERO)
            .with_poll_interval(Duration::from_secs(5))
            .with_replay_header("X-Replay", "1")
            .with_event_capacity(0);

        assert_eq!(config.retry.max_retries, 5);
        assert!(config.retry.park_permanent_failures);
        assert_eq!(config.item_delay, Duration::ZERO);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.replay_header, ("X-Replay".into(), "1".into()));
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn retry_exhaustion() {
        let retry = RetryConfig::default();
        assert!(!retry.is_exhausted(0));
        assert!(!retry.is_exhausted(2));
        assert!(retry.is_exhausted(3));
        assert!(RetryConfig::no_retry().is_exhausted(1));
    }
}

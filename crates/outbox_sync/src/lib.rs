//! # Outbox Sync
//!
//! Offline action queue and replay engine.
//!
//! This crate provides:
//! - [`QueueStore`]: a durable FIFO of create, update and delete actions
//! - [`SyncEngine`]: single-flight, in-order replay with bounded retries
//! - [`ConnectivityMonitor`]: drains on reconnect, on an interval, and
//!   when actions are queued while online
//! - [`EventBus`]: broadcast of queue and sync events
//! - [`OfflineClient`]: all of the above wired over one [`LocalStore`]
//! - an HTTP transport abstraction and a scripted mock transport
//!
//! ## Delivery model
//!
//! Queued actions are replayed one at a time, oldest first, each as a
//! single request marked with an `X-Offline-Replay: true` header. A
//! success removes the action and writes the response through to the
//! resource cache. A failure raises the action's retry count; once it
//! reaches `max_retries` the action is parked and kept for inspection.
//!
//! Delivery is at-least-once. A crash between a remote success and the
//! local removal replays the action on the next drain.
//!
//! [`LocalStore`]: outbox_store::LocalStore

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod client;
mod config;
mod connectivity;
mod engine;
mod error;
mod events;
mod http;
mod monitor;
mod queue;
mod transport;

pub use action::{ActionType, ItemStatus, NewAction, QueueItem, QueueStats};
pub use client::{OfflineClient, DELETED_MARKER, OFFLINE_MARKER};
pub use config::{RetryConfig, SyncConfig, REPLAY_HEADER};
pub use connectivity::Connectivity;
pub use engine::{DrainError, DrainReport, SyncEngine, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use events::{EventBus, SyncEvent};
pub use http::{HttpClient, HttpRequest, HttpResponse, HttpTransport};
pub use monitor::{ConnectivityMonitor, MonitorHandle};
pub use queue::QueueStore;
pub use transport::{Method, MockTransport, ReplayRequest, ReplayResponse, Transport};

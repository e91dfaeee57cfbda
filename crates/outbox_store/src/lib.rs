//! # Outbox Store
//!
//! The durable local half of the outbox.
//!
//! This crate provides:
//! - [`LocalStore`]: named collections with point lookup, full scan,
//!   add/put/delete/clear, and ordered iteration by timestamp or flag
//! - [`ResourceKind`]: the closed set of remote resources the store caches
//! - settings and current-user snapshot helpers
//! - store statistics and log compaction
//!
//! ## Persistence
//!
//! A store directory holds `store.log` and a `LOCK` file. Every mutation
//! appends one checksummed CBOR frame to the log; opening the store
//! replays the log into memory. Only one process can hold a store
//! directory open at a time.
//!
//! ## Failure semantics
//!
//! Reads against a store that is not initialized return empty results and
//! log a warning. Writes return [`StoreError::NotInitialized`].
//!
//! ```rust
//! use outbox_store::{LocalStore, ResourceKind, StoreConfig};
//! use serde_json::json;
//!
//! let store = LocalStore::open(StoreConfig::in_memory()).unwrap();
//! store
//!     .cache_api_response(ResourceKind::Property, "p1", json!({"id": "p1"}))
//!     .unwrap();
//! assert!(store.get_cached_api_response(ResourceKind::Property, "p1").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod dir;
mod error;
mod index;
mod log;
mod record;
mod resource;
mod stats;
mod store;

pub use collection::Collection;
pub use config::{StoreConfig, StoreLocation};
pub use error::{StoreError, StoreResult};
pub use record::{now_millis, resource_id, Record};
pub use resource::ResourceKind;
pub use stats::{CollectionCount, CompactionReport, StoreStats};
pub use store::LocalStore;

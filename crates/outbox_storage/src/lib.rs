//! # Outbox Storage
//!
//! Append-only logs underneath the outbox local store.
//!
//! Backends never interpret what they hold. The local store frames its
//! entries on top of them and owns every format decision.
//!
//! - [`InMemoryBackend`] keeps the log in a buffer
//! - [`FileBackend`] keeps it in one file and replaces it by rename
//!
//! ```rust
//! use outbox_storage::{InMemoryBackend, LogBackend};
//!
//! let mut log = InMemoryBackend::new();
//! log.append(b"frame").unwrap();
//! log.replace(b"compacted").unwrap();
//! assert_eq!(log.read_all().unwrap(), b"compacted");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::LogBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

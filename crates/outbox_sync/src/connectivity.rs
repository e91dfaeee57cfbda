//! Observable online/offline flag.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared connectivity state.
///
/// The host flips it from whatever signal it trusts (OS reachability, a
/// health probe, a failed request). Clones share one flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Creates a flag with the given initial state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Sets the state. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// A receiver that observes every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}

//! Background task that drains the queue when it makes sense to.

use crate::engine::SyncEngine;
use crate::events::SyncEvent;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Why the monitor started a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Reconnected,
    Interval,
    Enqueued,
    Missed,
}

/// Drains the queue on reconnect, on a fixed interval while online, and
/// whenever an action is enqueued while online.
///
/// Drains run inline in the monitor task. Triggers that pile up during a
/// drain are collapsed into at most one follow-up drain, so a burst of
/// enqueues costs a failing item one extra attempt, not one per enqueue.
/// The interval restarts after every drain. The first tick fires
/// immediately, which drains anything left over from a previous run.
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    /// Spawns the monitor on the current tokio runtime.
    pub fn spawn<T>(engine: Arc<SyncEngine<T>>, interval: Duration) -> MonitorHandle
    where
        T: Transport + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let mut online = engine.connectivity().subscribe();
        let mut events = engine.events().subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "connectivity monitor started");

            let mut follow_up = false;
            loop {
                let trigger = tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = std::future::ready(()), if follow_up => Trigger::Missed,
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if !*online.borrow_and_update() {
                            debug!("went offline, drains paused");
                            continue;
                        }
                        Trigger::Reconnected
                    }
                    _ = ticker.tick() => {
                        if !engine.connectivity().is_online() {
                            continue;
                        }
                        Trigger::Interval
                    }
                    event = events.recv() => match event {
                        Ok(SyncEvent::Enqueued { .. }) if engine.connectivity().is_online() => {
                            Trigger::Enqueued
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "monitor lagged behind events");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };

                debug!(?trigger, "triggering drain");
                if let Err(e) = engine.drain().await {
                    warn!(?trigger, error = %e, "triggered drain failed");
                }
                follow_up = discard_missed(&mut events, &mut online);
                ticker.reset();
            }
            info!("connectivity monitor stopped");
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Empties the triggers that arrived while a drain ran. Returns true if
/// any of them asked for a drain and the device is still online.
fn discard_missed(
    events: &mut broadcast::Receiver<SyncEvent>,
    online: &mut watch::Receiver<bool>,
) -> bool {
    let reconnected = online.has_changed().unwrap_or(false);
    let is_online = *online.borrow_and_update();

    let mut enqueued = false;
    loop {
        match events.try_recv() {
            Ok(SyncEvent::Enqueued { .. }) | Err(TryRecvError::Lagged(_)) => enqueued = true,
            Ok(_) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    if enqueued || reconnected {
        debug!(enqueued, reconnected, "collapsing triggers missed during drain");
    }
    is_online && (enqueued || reconnected)
}

/// Handle to a running [`ConnectivityMonitor`]. Dropping it stops the
/// monitor after any drain in progress.
#[derive(Debug)]
pub struct MonitorHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stops the monitor and waits for it to exit. A drain in progress
    /// runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "connectivity monitor task failed");
        }
    }

    /// Returns true once the monitor task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

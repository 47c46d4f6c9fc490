//! Graceful shutdown coordination for the server harness.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};

/// A clonable signal used to trigger and await graceful shutdown.
///
/// All clones observe the same trigger. Triggering more than once is
/// idempotent.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates a signal that only fires when triggered programmatically.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Creates a signal wired to SIGINT (and SIGTERM on unix).
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(term) => term,
                    Err(error) => {
                        tracing::warn!(%error, "failed to install SIGTERM handler");
                        let _ = ctrl_c.await;
                        trigger.trigger();
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
            }
            trigger.trigger();
        });
        signal
    }

    /// Triggers the shutdown, notifying every waiter.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Waits until shutdown is triggered.
    pub async fn recv(&self) {
        if self.is_shutdown() {
            return;
        }
        let mut receiver = self.sender.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks in-flight connections so shutdown can wait for them to drain.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    drained: Arc<Notify>,
}

impl ConnectionTracker {
    pub(crate) fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    /// Registers a connection; dropping the token deregisters it.
    pub(crate) fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            tracker: self.clone(),
        }
    }

    pub(crate) fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until every registered connection has finished.
    pub(crate) async fn wait_for_drain(&self) {
        loop {
            if self.active_connections() == 0 {
                return;
            }
            self.drained.notified().await;
        }
    }
}

pub(crate) struct ConnectionToken {
    tracker: ConnectionTracker,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.tracker.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
        signal.trigger();
        signal.trigger();
        assert!(signal.is_shutdown());
        signal.recv().await;
    }

    #[tokio::test]
    async fn test_clones_share_trigger() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        signal.trigger();
        clone.recv().await;
        assert!(clone.is_shutdown());
    }

    #[tokio::test]
    async fn test_tracker_drains_after_tokens_drop() {
        let tracker = ConnectionTracker::new();
        let token = tracker.acquire();
        assert_eq!(tracker.active_connections(), 1);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_drain().await })
        };
        drop(token);
        waiter.await.unwrap();
        assert_eq!(tracker.active_connections(), 0);
    }
}

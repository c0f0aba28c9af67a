//! Process-wide busy state
//!
//! Counts operations in flight. Subscribers see the flag change only when
//! the count moves between zero and one, so nested operations never notify
//! twice.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared busy counter with change notification
#[derive(Debug)]
pub struct BusyState {
    count: Mutex<usize>,
    notify: watch::Sender<bool>,
}

impl BusyState {
    /// Create idle state
    #[must_use]
    pub fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            count: Mutex::new(0),
            notify,
        }
    }

    /// Begin an operation
    ///
    /// The operation ends when the returned guard is dropped.
    #[must_use = "the operation ends when the guard is dropped"]
    pub fn begin(self: &Arc<Self>) -> BusyGuard {
        let mut count = self.count.lock();
        *count += 1;
        if *count == 1 {
            self.notify.send_replace(true);
            tracing::trace!("busy");
        }
        BusyGuard {
            state: Arc::clone(self),
        }
    }

    fn end(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.notify.send_replace(false);
            tracing::trace!("idle");
        }
    }

    /// Whether any operation is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.count.lock() > 0
    }

    /// Number of operations in flight
    #[must_use]
    pub fn depth(&self) -> usize {
        *self.count.lock()
    }

    /// Receiver notified on idle/busy transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.notify.subscribe()
    }
}

impl Default for BusyState {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped busy marker; dropping it ends the operation
#[derive(Debug)]
pub struct BusyGuard {
    state: Arc<BusyState>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.end();
    }
}

//! Cooperative cancellation.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

struct CancelState {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// A cancellation token shared between a strategy and its workers.
///
/// Cancelling wakes every waiter; sleeps taken through [`wait_timeout`]
/// end early, which keeps retry backoffs and periodic ticks responsive to
/// `stop()`.
///
/// [`wait_timeout`]: CancelToken::wait_timeout
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: Mutex::new(false),
                signal: Condvar::new(),
            }),
        }
    }

    /// Cancels the token and wakes all waiters.
    pub fn cancel(&self) {
        let mut cancelled = self.state.cancelled.lock();
        *cancelled = true;
        self.state.signal.notify_all();
    }

    /// Returns true if the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns true if the token was cancelled (before or during the
    /// wait), false if the full duration elapsed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let mut cancelled = self.state.cancelled.lock();
        if *cancelled {
            return true;
        }
        let _ = self.state.signal.wait_for(&mut cancelled, duration);
        *cancelled
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

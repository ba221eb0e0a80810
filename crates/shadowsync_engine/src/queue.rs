//! Merging blocking queue.
//!
//! A bounded FIFO keyed by shadow. Insertion consults the merger, so at
//! most one request per shadow is queued at any instant; a replace keeps
//! the existing queue slot. All mutations happen under one monitor with
//! `not_full` / `not_empty` conditions.
//!
//! The queue can be suspended: `suspend()` wakes every blocked call and
//! makes it return `Interrupted` until `resume()`. Offers that need no
//! wait still succeed, so requests keep accumulating (and merging) while
//! the draining strategy is stopped; only an offer facing a full queue is
//! interrupted, since nothing drains a suspended queue.

use crate::error::{SyncError, SyncResult};
use crate::merger::{self, MergeOutcome};
use crate::request::SyncRequest;
use parking_lot::{Condvar, Mutex};
use shadowsync_document::ShadowKey;
use std::collections::{HashSet, VecDeque};

struct QueueInner {
    fifo: VecDeque<SyncRequest>,
    keys: HashSet<ShadowKey>,
    suspended: bool,
}

impl QueueInner {
    fn check(&self) {
        debug_assert_eq!(self.fifo.len(), self.keys.len(), "key index out of sync");
    }
}

/// Bounded request queue with in-place merging.
pub struct RequestQueue {
    inner: Mutex<QueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl RequestQueue {
    /// Creates a queue bounded to `capacity` requests.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(QueueInner {
                fifo: VecDeque::new(),
                keys: HashSet::new(),
                suspended: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Inserts a request, merging with any queued request for the same
    /// shadow. Blocks while the queue is full.
    ///
    /// Returns `Interrupted` instead of waiting while the queue is
    /// suspended; an insert that needs no wait still succeeds.
    pub fn offer(&self, request: SyncRequest) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        loop {
            // A waiting producer re-checks for its key after every wakeup:
            // another producer may have queued the same shadow meanwhile.
            if inner.keys.contains(request.key()) {
                let position = inner
                    .fifo
                    .iter()
                    .position(|queued| queued.key() == request.key())
                    .expect("indexed key present in fifo");
                match merger::merge(&inner.fifo[position], request) {
                    MergeOutcome::Keep => {}
                    MergeOutcome::Replace(merged) => inner.fifo[position] = merged,
                }
                inner.check();
                return Ok(());
            }
            if inner.fifo.len() < self.capacity {
                inner.keys.insert(request.key().clone());
                inner.fifo.push_back(request);
                inner.check();
                self.not_empty.notify_one();
                return Ok(());
            }
            // Full and suspended: no consumer will make room.
            if inner.suspended {
                return Err(SyncError::Interrupted);
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Removes and returns the head request, blocking while empty.
    ///
    /// Returns `Interrupted` when consumers are suspended.
    pub fn take(&self) -> SyncResult<SyncRequest> {
        let mut inner = self.inner.lock();
        loop {
            if inner.suspended {
                return Err(SyncError::Interrupted);
            }
            if let Some(request) = inner.fifo.pop_front() {
                inner.keys.remove(request.key());
                inner.check();
                self.not_full.notify_one();
                return Ok(request);
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Removes and returns the head request without blocking.
    pub fn poll(&self) -> Option<SyncRequest> {
        let mut inner = self.inner.lock();
        let request = inner.fifo.pop_front()?;
        inner.keys.remove(request.key());
        inner.check();
        self.not_full.notify_one();
        Some(request)
    }

    /// Empties the queue.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.fifo.clear();
        inner.keys.clear();
        self.not_full.notify_all();
    }

    /// Wakes all blocked callers and makes them return `Interrupted`.
    pub fn suspend(&self) {
        let mut inner = self.inner.lock();
        inner.suspended = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Re-enables blocking consumption after `suspend`.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        inner.suspended = false;
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.inner.lock().fifo.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().fifo.is_empty()
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots remaining.
    pub fn remaining_capacity(&self) -> usize {
        self.capacity - self.len()
    }

    /// Returns true if a request for the shadow is queued.
    pub fn contains(&self, key: &ShadowKey) -> bool {
        self.inner.lock().keys.contains(key)
    }
}

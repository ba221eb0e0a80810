//! Cloud data-plane abstraction.
//!
//! The engine talks to the cloud shadow service through [`CloudDataPlane`].
//! Implementations wrap the actual transport; [`MockCloudDataPlane`] is an
//! in-memory stand-in that behaves like the real service and doubles as
//! the cloud side in tests.

use crate::error::SyncError;
use parking_lot::Mutex;
use shadowsync_document::ShadowKey;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Errors returned by the cloud data plane.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// The expected version did not match the current cloud version.
    #[error("shadow version conflict")]
    VersionConflict,

    /// The shadow does not exist in the cloud.
    #[error("shadow not found")]
    NotFound,

    /// The request was throttled.
    #[error("request throttled")]
    Throttled,

    /// The device is not authorized for this operation.
    #[error("unauthorized")]
    Unauthorized,

    /// Transport-level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl CloudError {
    /// Maps this error into the engine taxonomy for the given shadow.
    ///
    /// `NotFound` has context-dependent meaning (a 404 on delete is
    /// success); callers that care match it before converting.
    pub fn into_sync_error(self, key: &ShadowKey) -> SyncError {
        match self {
            CloudError::VersionConflict => SyncError::conflict(key.clone()),
            CloudError::Throttled | CloudError::Transport(_) => {
                SyncError::retryable(self.to_string())
            }
            CloudError::Unauthorized => SyncError::skip(self.to_string()),
            CloudError::NotFound => SyncError::skip(self.to_string()),
        }
    }
}

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// The cloud shadow service as consumed by the engine.
///
/// Writes are versioned: the cloud rejects an update or delete whose
/// expected version does not match the current cloud version.
/// Implementations must be thread-safe.
pub trait CloudDataPlane: Send + Sync {
    /// Fetches a shadow with its cloud version. `None` on 404.
    fn get_thing_shadow(&self, key: &ShadowKey) -> CloudResult<Option<(Vec<u8>, u64)>>;

    /// Creates or replaces a shadow, returning the new cloud version.
    ///
    /// `expected_version` 0 means "create"; anything else must match the
    /// current cloud version.
    fn update_thing_shadow(
        &self,
        key: &ShadowKey,
        document: &[u8],
        expected_version: u64,
    ) -> CloudResult<u64>;

    /// Deletes a shadow at the expected version.
    fn delete_thing_shadow(&self, key: &ShadowKey, expected_version: u64) -> CloudResult<()>;
}

/// Subscription control for cloud shadow events.
///
/// The handler drives these hooks on connectivity and direction changes;
/// the subscription machinery itself lives with the transport.
pub trait CloudSubscriptions: Send + Sync {
    /// Subscribes to cloud shadow event topics.
    fn subscribe(&self);

    /// Unsubscribes from cloud shadow event topics.
    fn unsubscribe(&self);
}

/// A subscription control that does nothing.
#[derive(Debug, Default)]
pub struct NoopSubscriptions;

impl CloudSubscriptions for NoopSubscriptions {
    fn subscribe(&self) {}

    fn unsubscribe(&self) {}
}

#[derive(Debug, Default)]
struct MockCloudState {
    shadows: BTreeMap<ShadowKey, (Vec<u8>, u64)>,
    update_failures: VecDeque<CloudError>,
    delete_failures: VecDeque<CloudError>,
    get_failures: VecDeque<CloudError>,
}

/// An in-memory cloud data plane.
///
/// Implements the real service's version arithmetic: an update must carry
/// the current version (0 for create) and bumps it by one. Failures can be
/// scripted per operation and calls are counted, so tests can assert both
/// outcomes and traffic.
#[derive(Debug, Default)]
pub struct MockCloudDataPlane {
    state: Mutex<MockCloudState>,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockCloudDataPlane {
    /// Creates an empty mock cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a shadow at a specific cloud version.
    pub fn seed_shadow(&self, key: ShadowKey, document: Vec<u8>, version: u64) {
        self.state.lock().shadows.insert(key, (document, version));
    }

    /// Reads a shadow without counting the call.
    pub fn shadow(&self, key: &ShadowKey) -> Option<(Vec<u8>, u64)> {
        self.state.lock().shadows.get(key).cloned()
    }

    /// Queues an error for the next `update_thing_shadow` call.
    pub fn fail_next_update(&self, error: CloudError) {
        self.state.lock().update_failures.push_back(error);
    }

    /// Queues an error for the next `delete_thing_shadow` call.
    pub fn fail_next_delete(&self, error: CloudError) {
        self.state.lock().delete_failures.push_back(error);
    }

    /// Queues an error for the next `get_thing_shadow` call.
    pub fn fail_next_get(&self, error: CloudError) {
        self.state.lock().get_failures.push_back(error);
    }

    /// Number of `get_thing_shadow` calls made.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_thing_shadow` calls made.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete_thing_shadow` calls made.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

impl CloudDataPlane for MockCloudDataPlane {
    fn get_thing_shadow(&self, key: &ShadowKey) -> CloudResult<Option<(Vec<u8>, u64)>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(error) = state.get_failures.pop_front() {
            return Err(error);
        }
        Ok(state.shadows.get(key).cloned())
    }

    fn update_thing_shadow(
        &self,
        key: &ShadowKey,
        document: &[u8],
        expected_version: u64,
    ) -> CloudResult<u64> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(error) = state.update_failures.pop_front() {
            return Err(error);
        }
        let current = state.shadows.get(key).map(|(_, v)| *v).unwrap_or(0);
        if expected_version != current {
            return Err(CloudError::VersionConflict);
        }
        let next = current + 1;
        state.shadows.insert(key.clone(), (document.to_vec(), next));
        Ok(next)
    }

    fn delete_thing_shadow(&self, key: &ShadowKey, expected_version: u64) -> CloudResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if let Some(error) = state.delete_failures.pop_front() {
            return Err(error);
        }
        let current = match state.shadows.get(key) {
            Some((_, version)) => *version,
            None => return Err(CloudError::NotFound),
        };
        if expected_version != current {
            return Err(CloudError::VersionConflict);
        }
        state.shadows.remove(key);
        Ok(())
    }
}

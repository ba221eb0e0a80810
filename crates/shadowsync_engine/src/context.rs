//! Execution context for sync requests.

use crate::cloud::CloudDataPlane;
use crate::config::Direction;
use parking_lot::RwLock;
use shadowsync_store::ShadowStore;
use std::sync::Arc;

/// Read-only bundle passed to every request execution.
///
/// Holds the local store, the cloud client and a live view of the sync
/// direction. The context is handed to `start` rather than stored inside
/// requests, so requests stay plain data.
#[derive(Clone)]
pub struct SyncContext {
    store: Arc<dyn ShadowStore>,
    cloud: Arc<dyn CloudDataPlane>,
    direction: Arc<RwLock<Direction>>,
}

impl SyncContext {
    /// Creates a context with its own direction state.
    pub fn new(store: Arc<dyn ShadowStore>, cloud: Arc<dyn CloudDataPlane>) -> Self {
        Self {
            store,
            cloud,
            direction: Arc::new(RwLock::new(Direction::default())),
        }
    }

    /// Shares an externally owned direction state (the handler's).
    pub fn with_direction(mut self, direction: Arc<RwLock<Direction>>) -> Self {
        self.direction = direction;
        self
    }

    /// The local shadow store.
    pub fn store(&self) -> &Arc<dyn ShadowStore> {
        &self.store
    }

    /// The cloud data plane.
    pub fn cloud(&self) -> &Arc<dyn CloudDataPlane> {
        &self.cloud
    }

    /// The sync direction at this instant.
    pub fn direction(&self) -> Direction {
        *self.direction.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MockCloudDataPlane;
    use shadowsync_store::MemoryShadowStore;

    #[test]
    fn direction_defaults_to_bidirectional() {
        let ctx = SyncContext::new(
            Arc::new(MemoryShadowStore::new()),
            Arc::new(MockCloudDataPlane::new()),
        );
        assert_eq!(ctx.direction(), Direction::BetweenDeviceAndCloud);
    }

    #[test]
    fn shared_direction_tracks_owner() {
        let direction = Arc::new(RwLock::new(Direction::BetweenDeviceAndCloud));
        let ctx = SyncContext::new(
            Arc::new(MemoryShadowStore::new()),
            Arc::new(MockCloudDataPlane::new()),
        )
        .with_direction(Arc::clone(&direction));

        *direction.write() = Direction::CloudToDevice;
        assert_eq!(ctx.direction(), Direction::CloudToDevice);
    }
}

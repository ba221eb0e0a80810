//! In-memory reference store.

use crate::error::{StoreError, StoreResult};
use crate::feed::{ShadowEvent, ShadowEventFeed};
use crate::lock::{LockRegistry, ShadowLock};
use crate::store::ShadowStore;
use crate::sync_info::SyncInformation;
use parking_lot::RwLock;
use shadowsync_document::ShadowKey;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A versioned shadow document held by the memory store.
#[derive(Debug, Clone)]
struct StoredShadow {
    document: Vec<u8>,
    version: u64,
}

/// An in-memory shadow store.
///
/// Reference implementation of [`ShadowStore`]: whole rows swap under one
/// writer lock, versions advance by one per mutation, and local mutations
/// are published on the attached [`ShadowEventFeed`]. Useful as the store
/// for tests and for embedded deployments without a database.
#[derive(Default)]
pub struct MemoryShadowStore {
    shadows: RwLock<BTreeMap<ShadowKey, StoredShadow>>,
    sync_info: RwLock<BTreeMap<ShadowKey, SyncInformation>>,
    locks: LockRegistry,
    feed: Arc<ShadowEventFeed>,
}

impl MemoryShadowStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the event feed local mutations are published on.
    pub fn feed(&self) -> &Arc<ShadowEventFeed> {
        &self.feed
    }

    /// Number of shadow documents currently stored.
    pub fn shadow_count(&self) -> usize {
        self.shadows.read().len()
    }

    /// Seeds a shadow document at a specific version, bypassing the feed.
    ///
    /// Test helper for arranging preconditions.
    pub fn seed_shadow(&self, key: ShadowKey, document: Vec<u8>, version: u64) {
        self.shadows
            .write()
            .insert(key, StoredShadow { document, version });
    }
}

impl ShadowStore for MemoryShadowStore {
    fn list_synced_shadows(&self) -> StoreResult<Vec<ShadowKey>> {
        Ok(self.sync_info.read().keys().cloned().collect())
    }

    fn get_sync_info(&self, key: &ShadowKey) -> StoreResult<Option<SyncInformation>> {
        Ok(self.sync_info.read().get(key).cloned())
    }

    fn upsert_sync_info_if_absent(&self, row: SyncInformation) -> StoreResult<()> {
        self.sync_info.write().entry(row.key.clone()).or_insert(row);
        Ok(())
    }

    fn update_sync_info(&self, row: SyncInformation) -> StoreResult<()> {
        self.sync_info.write().insert(row.key.clone(), row);
        Ok(())
    }

    fn delete_sync_info(&self, key: &ShadowKey) -> StoreResult<()> {
        self.sync_info.write().remove(key);
        Ok(())
    }

    fn get_shadow(&self, key: &ShadowKey) -> StoreResult<Option<(Vec<u8>, u64)>> {
        Ok(self
            .shadows
            .read()
            .get(key)
            .map(|stored| (stored.document.clone(), stored.version)))
    }

    fn update_shadow(&self, key: &ShadowKey, document: &[u8]) -> StoreResult<u64> {
        let version = {
            let mut shadows = self.shadows.write();
            let next = shadows.get(key).map(|s| s.version + 1).unwrap_or(1);
            shadows.insert(
                key.clone(),
                StoredShadow {
                    document: document.to_vec(),
                    version: next,
                },
            );
            next
        };
        self.feed
            .emit(ShadowEvent::updated(key.clone(), version, document.to_vec()));
        Ok(version)
    }

    fn delete_shadow(&self, key: &ShadowKey) -> StoreResult<u64> {
        let version = {
            let mut shadows = self.shadows.write();
            let stored = shadows
                .remove(key)
                .ok_or_else(|| StoreError::shadow_not_found(key.clone()))?;
            stored.version + 1
        };
        self.feed.emit(ShadowEvent::deleted(key.clone(), version));
        Ok(version)
    }

    fn lock(&self, key: &ShadowKey) -> ShadowLock {
        self.locks.acquire(key)
    }
}

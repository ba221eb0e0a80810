//! The shadow store interface consumed by the sync engine.

use crate::error::StoreResult;
use crate::lock::ShadowLock;
use crate::sync_info::SyncInformation;
use shadowsync_document::ShadowKey;

/// A local shadow store.
///
/// The store owns shadow documents and their `SyncInformation` rows. The
/// engine is the only writer of sync rows; document writes also arrive from
/// the device-local request path outside this crate. Versions assigned by
/// the store increase by one on every successful mutation of a shadow.
///
/// `lock` hands out the per-shadow exclusive lock executors hold across a
/// reconcile; all other methods are individually atomic.
pub trait ShadowStore: Send + Sync {
    /// Lists the shadows that have a sync row (the synced set).
    fn list_synced_shadows(&self) -> StoreResult<Vec<ShadowKey>>;

    /// Reads the sync row for a shadow.
    fn get_sync_info(&self, key: &ShadowKey) -> StoreResult<Option<SyncInformation>>;

    /// Inserts a sync row unless one already exists.
    fn upsert_sync_info_if_absent(&self, row: SyncInformation) -> StoreResult<()>;

    /// Replaces the sync row for a shadow. The whole row updates atomically.
    fn update_sync_info(&self, row: SyncInformation) -> StoreResult<()>;

    /// Removes the sync row for a shadow. Removing an absent row is a no-op.
    fn delete_sync_info(&self, key: &ShadowKey) -> StoreResult<()>;

    /// Reads a shadow document with its local version. `None` if absent.
    fn get_shadow(&self, key: &ShadowKey) -> StoreResult<Option<(Vec<u8>, u64)>>;

    /// Creates or replaces a shadow document, returning the new local
    /// version.
    fn update_shadow(&self, key: &ShadowKey, document: &[u8]) -> StoreResult<u64>;

    /// Deletes a shadow document, returning the local version of the
    /// delete. Errors with `ShadowNotFound` if the shadow is absent.
    fn delete_shadow(&self, key: &ShadowKey) -> StoreResult<u64>;

    /// Acquires the exclusive per-shadow lock, blocking until available.
    fn lock(&self, key: &ShadowKey) -> ShadowLock;
}

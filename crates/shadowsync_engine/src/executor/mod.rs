//! Per-variant reconciliation algorithms.
//!
//! Each executor runs under the store's per-shadow lock and writes sync
//! information as its last step, so an aborted execution leaves the row
//! untouched. Version comparisons are `u64`; a cloud write carries the
//! expected version and the cloud rejects stale writers.

pub(crate) mod cloud_delete;
pub(crate) mod cloud_update;
pub(crate) mod full_shadow;
pub(crate) mod local_delete;
pub(crate) mod local_update;
pub(crate) mod overwrite;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use shadowsync_document::{ShadowDocument, ShadowKey};
use shadowsync_store::SyncInformation;
use std::time::{SystemTime, UNIX_EPOCH};

/// Bound on re-reads when the cloud version keeps moving under a
/// reconcile.
pub(crate) const MAX_CONFLICT_RESTARTS: usize = 3;

/// Local wall clock in epoch seconds.
pub(crate) fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Loads the sync row for a shadow; a missing row under the lock is an
/// invariant violation.
pub(crate) fn load_sync_info(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<SyncInformation> {
    ctx.store()
        .get_sync_info(key)?
        .ok_or_else(|| SyncError::fatal(format!("sync information row missing for {key}")))
}

/// The last synced document as a JSON value; an empty object when nothing
/// has been synced yet.
pub(crate) fn last_synced_value(info: &SyncInformation) -> SyncResult<Value> {
    match &info.last_synced_document {
        Some(bytes) => serde_json::from_slice(bytes)
            .map_err(|err| SyncError::skip(format!("corrupt last synced document: {err}"))),
        None => Ok(Value::Object(serde_json::Map::new())),
    }
}

/// Parses document bytes and strips the sync bookkeeping fields.
pub(crate) fn stripped_document(bytes: &[u8]) -> SyncResult<Value> {
    Ok(ShadowDocument::from_bytes(bytes)?.stripped())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for executor tests.

    use super::*;
    use crate::cloud::MockCloudDataPlane;
    use shadowsync_store::{MemoryShadowStore, ShadowStore};
    use std::sync::Arc;

    /// A context over fresh in-memory collaborators.
    pub(crate) struct Fixture {
        pub store: Arc<MemoryShadowStore>,
        pub cloud: Arc<MockCloudDataPlane>,
        pub ctx: SyncContext,
    }

    impl Fixture {
        pub fn new() -> Self {
            let store = Arc::new(MemoryShadowStore::new());
            let cloud = Arc::new(MockCloudDataPlane::new());
            let ctx = SyncContext::new(
                Arc::clone(&store) as Arc<dyn ShadowStore>,
                Arc::clone(&cloud) as Arc<dyn crate::cloud::CloudDataPlane>,
            );
            Self { store, cloud, ctx }
        }

        /// Installs a zeroed sync row for the key.
        pub fn with_sync_row(self, key: &ShadowKey) -> Self {
            self.store
                .upsert_sync_info_if_absent(SyncInformation::initial(key.clone()))
                .unwrap();
            self
        }

        pub fn sync_info(&self, key: &ShadowKey) -> SyncInformation {
            self.store.get_sync_info(key).unwrap().unwrap()
        }
    }
}

//! Push a local delete to the cloud shadow.

use super::{load_sync_info, now_epoch_seconds};
use crate::cloud::CloudError;
use crate::context::SyncContext;
use crate::error::SyncResult;
use shadowsync_document::ShadowKey;
use tracing::debug;

/// Returns true unless the cloud delete has already been propagated.
pub(crate) fn is_update_necessary(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<bool> {
    Ok(ctx
        .store()
        .get_sync_info(key)?
        .map(|info| !info.cloud_deleted)
        .unwrap_or(true))
}

pub(crate) fn execute(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let _lock = ctx.store().lock(key);
    let mut info = load_sync_info(ctx, key)?;

    if info.cloud_deleted {
        debug!(key = %key, "cloud shadow already deleted");
        return Ok(());
    }

    match ctx.cloud().delete_thing_shadow(key, info.cloud_version) {
        // A shadow already absent in the cloud is the outcome we wanted.
        Ok(()) | Err(CloudError::NotFound) => {}
        Err(err) => return Err(err.into_sync_error(key)),
    }

    info.cloud_deleted = true;
    info.cloud_version += 1;
    info.last_synced_document = None;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info)?;

    debug!(key = %key, "propagated local delete to cloud");
    Ok(())
}

//! Apply a cloud delete to the local shadow.

use super::{load_sync_info, now_epoch_seconds};
use crate::context::SyncContext;
use crate::error::SyncResult;
use shadowsync_document::{DeletePayload, ShadowKey};
use tracing::debug;

/// Returns true if a local document still exists to delete.
pub(crate) fn is_update_necessary(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<bool> {
    Ok(ctx.store().get_shadow(key)?.is_some())
}

pub(crate) fn execute(ctx: &SyncContext, key: &ShadowKey, payload: &[u8]) -> SyncResult<()> {
    let payload = DeletePayload::parse(payload)?;

    let _lock = ctx.store().lock(key);
    let mut info = load_sync_info(ctx, key)?;

    if ctx.store().get_shadow(key)?.is_some() {
        match ctx.store().delete_shadow(key) {
            Ok(new_local_version) => info.local_version = new_local_version,
            // Deleted between the read and the delete; the outcome stands.
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
    } else {
        debug!(key = %key, "local shadow already absent");
    }

    info.cloud_version = info.cloud_version.max(payload.version());
    info.cloud_update_time = payload.timestamp().unwrap_or(info.cloud_update_time);
    info.last_synced_document = None;
    info.cloud_deleted = true;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info)?;

    debug!(key = %key, cloud_version = payload.version(), "applied cloud delete locally");
    Ok(())
}

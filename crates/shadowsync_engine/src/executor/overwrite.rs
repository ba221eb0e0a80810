//! Forced one-directional copies.
//!
//! `OverwriteLocal` makes the local shadow match the cloud and
//! `OverwriteCloud` makes the cloud match the local shadow, skipping the
//! three-way compare entirely. These seed full syncs when the direction
//! declares one side authoritative.

use super::{load_sync_info, now_epoch_seconds, stripped_document, MAX_CONFLICT_RESTARTS};
use crate::cloud::CloudError;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use shadowsync_document::{ShadowDocument, ShadowKey};
use tracing::debug;

/// Forces the local shadow to match the cloud.
pub(crate) fn execute_local(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let _lock = ctx.store().lock(key);
    let mut info = load_sync_info(ctx, key)?;

    let cloud_doc = match ctx.cloud().get_thing_shadow(key) {
        Ok(doc) => doc,
        Err(CloudError::NotFound) => None,
        Err(err) => return Err(err.into_sync_error(key)),
    };

    match cloud_doc {
        Some((cloud_bytes, cloud_version)) => {
            if cloud_version == info.cloud_version {
                debug!(key = %key, cloud_version, "cloud unchanged since last sync, local kept");
                return Ok(());
            }
            let document = ShadowDocument::from_bytes(&cloud_bytes)?;
            let body = serde_json::to_vec(&document.stripped()).expect("JSON value serializes");
            let new_local_version = ctx.store().update_shadow(key, &body)?;

            info.local_version = new_local_version;
            info.cloud_version = cloud_version;
            info.cloud_update_time = document.timestamp().unwrap_or(info.cloud_update_time);
            info.last_synced_document = Some(body);
            info.cloud_deleted = false;
            info.last_sync_time = now_epoch_seconds();
            ctx.store().update_sync_info(info)?;
            debug!(key = %key, cloud_version, "overwrote local shadow from cloud");
            Ok(())
        }
        None => {
            match ctx.store().delete_shadow(key) {
                Ok(new_local_version) => info.local_version = new_local_version,
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
            info.last_synced_document = None;
            info.cloud_deleted = true;
            info.last_sync_time = now_epoch_seconds();
            ctx.store().update_sync_info(info)?;
            debug!(key = %key, "cloud shadow absent, deleted local shadow");
            Ok(())
        }
    }
}

/// Forces the cloud shadow to match the local one.
pub(crate) fn execute_cloud(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let _lock = ctx.store().lock(key);
    for _ in 0..MAX_CONFLICT_RESTARTS {
        match overwrite_cloud_once(ctx, key) {
            Err(SyncError::Conflict { .. }) => {
                debug!(key = %key, "cloud moved during overwrite, re-reading");
            }
            outcome => return outcome,
        }
    }
    Err(SyncError::retryable(format!(
        "cloud version for {key} kept moving during overwrite"
    )))
}

fn overwrite_cloud_once(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let mut info = load_sync_info(ctx, key)?;
    let current_cloud_version = match ctx.cloud().get_thing_shadow(key) {
        Ok(Some((_, version))) => version,
        Ok(None) | Err(CloudError::NotFound) => 0,
        Err(err) => return Err(err.into_sync_error(key)),
    };

    match ctx.store().get_shadow(key)? {
        Some((local_bytes, local_version)) => {
            if local_version == info.local_version {
                debug!(key = %key, local_version, "local unchanged since last sync, cloud kept");
                return Ok(());
            }
            let body = stripped_document(&local_bytes)?;
            let mut outgoing = ShadowDocument::from_value(body.clone())?;
            outgoing.set_version(current_cloud_version + 1);

            let new_cloud_version = ctx
                .cloud()
                .update_thing_shadow(key, &outgoing.to_bytes(), current_cloud_version)
                .map_err(|err| err.into_sync_error(key))?;

            info.cloud_version = new_cloud_version;
            info.local_version = local_version;
            info.last_synced_document =
                Some(serde_json::to_vec(&body).expect("JSON value serializes"));
            info.cloud_deleted = false;
            info.last_sync_time = now_epoch_seconds();
            ctx.store().update_sync_info(info)?;
            debug!(key = %key, cloud_version = new_cloud_version, "overwrote cloud shadow from local");
            Ok(())
        }
        None => {
            if current_cloud_version > 0 {
                match ctx.cloud().delete_thing_shadow(key, current_cloud_version) {
                    Ok(()) | Err(CloudError::NotFound) => {}
                    Err(err) => return Err(err.into_sync_error(key)),
                }
                info.cloud_version = current_cloud_version + 1;
            }
            info.last_synced_document = None;
            info.cloud_deleted = true;
            info.last_sync_time = now_epoch_seconds();
            ctx.store().update_sync_info(info)?;
            debug!(key = %key, "local shadow absent, deleted cloud shadow");
            Ok(())
        }
    }
}

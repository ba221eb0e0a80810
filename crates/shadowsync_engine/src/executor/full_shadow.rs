//! Three-way reconcile of both sides.
//!
//! Fetches the cloud and local documents, compares each against the last
//! confirmed versions and resolves per the decision table: unchanged sides
//! follow the changed one, deletes propagate to the side that kept the
//! document, and a divergence on both sides merges the local changes atop
//! the cloud document (local wins on conflicting leaves). Direction
//! restricts which side may be written.
//!
//! A cloud version conflict means the cloud moved between the read and the
//! write; the reconcile restarts with fresh reads, a bounded number of
//! times.

use super::{
    last_synced_value, load_sync_info, now_epoch_seconds, stripped_document,
    MAX_CONFLICT_RESTARTS,
};
use crate::cloud::CloudError;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use shadowsync_document::{diff, merge_patch, ShadowDocument, ShadowKey};
use shadowsync_store::SyncInformation;
use tracing::debug;

pub(crate) fn execute(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let _lock = ctx.store().lock(key);
    for _ in 0..MAX_CONFLICT_RESTARTS {
        match reconcile_once(ctx, key) {
            Err(SyncError::Conflict { .. }) => {
                debug!(key = %key, "cloud moved during full reconcile, re-reading");
            }
            outcome => return outcome,
        }
    }
    Err(SyncError::retryable(format!(
        "cloud version for {key} kept moving during full reconcile"
    )))
}

fn reconcile_once(ctx: &SyncContext, key: &ShadowKey) -> SyncResult<()> {
    let mut info = load_sync_info(ctx, key)?;
    let cloud_doc = match ctx.cloud().get_thing_shadow(key) {
        Ok(doc) => doc,
        Err(CloudError::NotFound) => None,
        Err(err) => return Err(err.into_sync_error(key)),
    };
    let local_doc = ctx.store().get_shadow(key)?;
    let direction = ctx.direction();

    match (cloud_doc, local_doc) {
        (None, None) => {
            info.clear();
            info.last_sync_time = now_epoch_seconds();
            ctx.store().update_sync_info(info)?;
            Ok(())
        }
        (None, Some((local_bytes, local_version))) => {
            if local_version == info.local_version {
                // The cloud deleted the shadow while we were apart.
                if direction.allows_device_bound() {
                    delete_local(ctx, key, &mut info)
                } else {
                    // Device is the source of truth; recreate in the cloud.
                    push_local_to_cloud(ctx, key, &mut info, &local_bytes, local_version, 0)
                }
            } else if direction.allows_cloud_bound() {
                push_local_to_cloud(ctx, key, &mut info, &local_bytes, local_version, 0)
            } else {
                delete_local(ctx, key, &mut info)
            }
        }
        (Some((cloud_bytes, cloud_version)), None) => {
            if cloud_version == info.cloud_version {
                // The local side removed the shadow while we were apart.
                if direction.allows_cloud_bound() {
                    delete_cloud(ctx, key, &mut info, cloud_version)
                } else {
                    write_cloud_to_local(ctx, key, &mut info, &cloud_bytes, cloud_version)
                }
            } else if direction.allows_device_bound() {
                write_cloud_to_local(ctx, key, &mut info, &cloud_bytes, cloud_version)
            } else {
                delete_cloud(ctx, key, &mut info, cloud_version)
            }
        }
        (Some((cloud_bytes, cloud_version)), Some((local_bytes, local_version))) => {
            let cloud_changed = cloud_version != info.cloud_version;
            let local_changed = local_version != info.local_version;
            match (cloud_changed, local_changed) {
                (false, false) => Ok(()),
                (true, false) => {
                    if direction.allows_device_bound() {
                        write_cloud_to_local(ctx, key, &mut info, &cloud_bytes, cloud_version)
                    } else {
                        Ok(())
                    }
                }
                (false, true) => {
                    if direction.allows_cloud_bound() {
                        push_local_to_cloud(
                            ctx,
                            key,
                            &mut info,
                            &local_bytes,
                            local_version,
                            cloud_version,
                        )
                    } else {
                        Ok(())
                    }
                }
                (true, true) => {
                    if !direction.allows_device_bound() {
                        push_local_to_cloud(
                            ctx,
                            key,
                            &mut info,
                            &local_bytes,
                            local_version,
                            cloud_version,
                        )
                    } else if !direction.allows_cloud_bound() {
                        write_cloud_to_local(ctx, key, &mut info, &cloud_bytes, cloud_version)
                    } else {
                        merge_both(
                            ctx,
                            key,
                            &mut info,
                            &cloud_bytes,
                            cloud_version,
                            &local_bytes,
                            local_version,
                        )
                    }
                }
            }
        }
    }
}

fn delete_local(ctx: &SyncContext, key: &ShadowKey, info: &mut SyncInformation) -> SyncResult<()> {
    match ctx.store().delete_shadow(key) {
        Ok(new_local_version) => info.local_version = new_local_version,
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    info.last_synced_document = None;
    info.cloud_deleted = true;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info.clone())?;
    debug!(key = %key, "full reconcile deleted the local shadow");
    Ok(())
}

fn delete_cloud(
    ctx: &SyncContext,
    key: &ShadowKey,
    info: &mut SyncInformation,
    cloud_version: u64,
) -> SyncResult<()> {
    match ctx.cloud().delete_thing_shadow(key, cloud_version) {
        Ok(()) | Err(CloudError::NotFound) => {}
        Err(err) => return Err(err.into_sync_error(key)),
    }
    info.cloud_deleted = true;
    info.cloud_version = cloud_version + 1;
    info.last_synced_document = None;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info.clone())?;
    debug!(key = %key, "full reconcile deleted the cloud shadow");
    Ok(())
}

fn write_cloud_to_local(
    ctx: &SyncContext,
    key: &ShadowKey,
    info: &mut SyncInformation,
    cloud_bytes: &[u8],
    cloud_version: u64,
) -> SyncResult<()> {
    let document = ShadowDocument::from_bytes(cloud_bytes)?;
    let body = serde_json::to_vec(&document.stripped()).expect("JSON value serializes");
    let new_local_version = ctx.store().update_shadow(key, &body)?;

    info.local_version = new_local_version;
    info.cloud_version = cloud_version;
    info.cloud_update_time = document.timestamp().unwrap_or(info.cloud_update_time);
    info.last_synced_document = Some(body);
    info.cloud_deleted = false;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info.clone())?;
    debug!(key = %key, cloud_version, "full reconcile wrote the cloud document locally");
    Ok(())
}

fn push_local_to_cloud(
    ctx: &SyncContext,
    key: &ShadowKey,
    info: &mut SyncInformation,
    local_bytes: &[u8],
    local_version: u64,
    expected_cloud_version: u64,
) -> SyncResult<()> {
    let body = stripped_document(local_bytes)?;
    let mut outgoing = ShadowDocument::from_value(body.clone())?;
    outgoing.set_version(expected_cloud_version + 1);

    let new_cloud_version = ctx
        .cloud()
        .update_thing_shadow(key, &outgoing.to_bytes(), expected_cloud_version)
        .map_err(|err| err.into_sync_error(key))?;

    info.cloud_version = new_cloud_version;
    info.local_version = local_version;
    info.last_synced_document = Some(serde_json::to_vec(&body).expect("JSON value serializes"));
    info.cloud_deleted = false;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info.clone())?;
    debug!(key = %key, cloud_version = new_cloud_version, "full reconcile pushed the local document");
    Ok(())
}

fn merge_both(
    ctx: &SyncContext,
    key: &ShadowKey,
    info: &mut SyncInformation,
    cloud_bytes: &[u8],
    cloud_version: u64,
    local_bytes: &[u8],
    local_version: u64,
) -> SyncResult<()> {
    let base = ShadowDocument::from_value(last_synced_value(info)?)?.stripped();
    let local = stripped_document(local_bytes)?;
    let cloud = stripped_document(cloud_bytes)?;

    // Local edits since the last sync, applied atop the cloud document:
    // cloud additions survive, contested leaves take the local value.
    let local_patch = diff(&base, &local);
    let mut merged = cloud;
    merge_patch(&mut merged, &local_patch);

    let mut outgoing = ShadowDocument::from_value(merged.clone())?;
    outgoing.set_version(cloud_version + 1);

    let new_cloud_version = ctx
        .cloud()
        .update_thing_shadow(key, &outgoing.to_bytes(), cloud_version)
        .map_err(|err| err.into_sync_error(key))?;

    let body = serde_json::to_vec(&merged).expect("JSON value serializes");
    let new_local_version = ctx.store().update_shadow(key, &body)?;

    info.cloud_version = new_cloud_version;
    info.local_version = new_local_version;
    info.last_synced_document = Some(body);
    info.cloud_deleted = false;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info.clone())?;
    debug!(
        key = %key,
        cloud_version = new_cloud_version,
        local_version = new_local_version,
        "full reconcile merged divergent documents"
    );
    Ok(())
}

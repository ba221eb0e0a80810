//! Push a local change to the cloud shadow.

use super::{last_synced_value, load_sync_info, now_epoch_seconds};
use crate::context::SyncContext;
use crate::error::SyncResult;
use serde_json::Value;
use shadowsync_document::{merge_patch, ShadowDocument, ShadowKey};
use tracing::debug;

/// Returns true if applying `document` onto the last synced body would
/// change it. A shadow never synced always needs an update.
pub(crate) fn is_update_necessary(
    ctx: &SyncContext,
    key: &ShadowKey,
    document: &Value,
) -> SyncResult<bool> {
    let info = match ctx.store().get_sync_info(key)? {
        Some(info) => info,
        None => return Ok(true),
    };
    if info.last_synced_document.is_none() {
        return Ok(true);
    }
    let base = last_synced_value(&info)?;
    let merged = merged_body(&base, document)?;
    Ok(merged != ShadowDocument::from_value(base)?.stripped())
}

pub(crate) fn execute(ctx: &SyncContext, key: &ShadowKey, document: &Value) -> SyncResult<()> {
    let _lock = ctx.store().lock(key);
    let mut info = load_sync_info(ctx, key)?;

    let base = last_synced_value(&info)?;
    let merged = merged_body(&base, document)?;
    if info.last_synced_document.is_some()
        && merged == ShadowDocument::from_value(base)?.stripped()
    {
        debug!(key = %key, "cloud shadow already reflects the local document");
        return Ok(());
    }

    let mut outgoing = ShadowDocument::from_value(merged.clone())?;
    outgoing.set_version(info.cloud_version + 1);

    let new_cloud_version = ctx
        .cloud()
        .update_thing_shadow(key, &outgoing.to_bytes(), info.cloud_version)
        .map_err(|err| err.into_sync_error(key))?;

    let body = serde_json::to_vec(&merged).expect("JSON value serializes");
    let local_version = ctx
        .store()
        .get_shadow(key)?
        .map(|(_, version)| version)
        .unwrap_or(info.local_version);

    info.cloud_version = new_cloud_version;
    info.local_version = local_version;
    info.last_synced_document = Some(body);
    info.cloud_deleted = false;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info)?;

    debug!(key = %key, cloud_version = new_cloud_version, "pushed local update to cloud");
    Ok(())
}

/// Applies the update document onto the last synced body with null-leaf
/// deletion, yielding the new cloud body (without bookkeeping fields).
fn merged_body(base: &Value, document: &Value) -> SyncResult<Value> {
    let patch = ShadowDocument::from_value(document.clone())?.stripped();
    let mut merged = ShadowDocument::from_value(base.clone())?.stripped();
    merge_patch(&mut merged, &patch);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::Fixture;
    use serde_json::json;

    fn key() -> ShadowKey {
        ShadowKey::new("t1", "s")
    }

    #[test]
    fn creates_cloud_shadow_on_first_push() {
        let fixture = Fixture::new().with_sync_row(&key());
        let document = json!({"state": {"reported": {"x": 1}}});

        execute(&fixture.ctx, &key(), &document).unwrap();

        let (body, version) = fixture.cloud.shadow(&key()).unwrap();
        assert_eq!(version, 1);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["version"], 1);
        assert_eq!(body["state"]["reported"]["x"], 1);

        let info = fixture.sync_info(&key());
        assert_eq!(info.cloud_version, 1);
        assert!(info.last_synced_document.is_some());
    }

    #[test]
    fn no_op_when_document_already_synced() {
        let fixture = Fixture::new().with_sync_row(&key());
        let document = json!({"state": {"reported": {"x": 1}}});
        execute(&fixture.ctx, &key(), &document).unwrap();
        assert_eq!(fixture.cloud.update_calls(), 1);

        // Re-executing the same request must not touch the cloud.
        execute(&fixture.ctx, &key(), &document).unwrap();
        assert_eq!(fixture.cloud.update_calls(), 1);
        assert_eq!(fixture.sync_info(&key()).cloud_version, 1);
    }

    #[test]
    fn null_leaves_delete_keys_in_the_cloud_body() {
        let fixture = Fixture::new().with_sync_row(&key());
        execute(
            &fixture.ctx,
            &key(),
            &json!({"state": {"reported": {"x": 1, "y": 2}}}),
        )
        .unwrap();
        execute(
            &fixture.ctx,
            &key(),
            &json!({"state": {"reported": {"y": null}}}),
        )
        .unwrap();

        let (body, version) = fixture.cloud.shadow(&key()).unwrap();
        assert_eq!(version, 2);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["state"]["reported"], json!({"x": 1}));
    }

    #[test]
    fn version_conflict_surfaces_as_conflict() {
        let fixture = Fixture::new().with_sync_row(&key());
        // Cloud is already at version 3; our bookkeeping says 0.
        fixture.cloud.seed_shadow(key(), b"{}".to_vec(), 3);

        let err = execute(&fixture.ctx, &key(), &json!({"state": {"reported": {"x": 1}}}))
            .unwrap_err();
        assert!(err.is_conflict());
        // Sync information is untouched on failure.
        assert_eq!(fixture.sync_info(&key()).cloud_version, 0);
    }

    #[test]
    fn records_current_local_version() {
        let fixture = Fixture::new().with_sync_row(&key());
        use shadowsync_store::ShadowStore;
        fixture.store.update_shadow(&key(), b"{\"state\":{}}").unwrap();
        fixture.store.update_shadow(&key(), b"{\"state\":{}}").unwrap();

        execute(&fixture.ctx, &key(), &json!({"state": {"reported": {"x": 1}}})).unwrap();
        let info = fixture.sync_info(&key());
        assert_eq!(info.local_version, 2);
        assert_eq!(info.cloud_version, 1);
    }

    #[test]
    fn update_necessity_check() {
        let fixture = Fixture::new().with_sync_row(&key());
        let document = json!({"state": {"reported": {"x": 1}}});
        assert!(is_update_necessary(&fixture.ctx, &key(), &document).unwrap());

        execute(&fixture.ctx, &key(), &document).unwrap();
        assert!(!is_update_necessary(&fixture.ctx, &key(), &document).unwrap());

        let changed = json!({"state": {"reported": {"x": 2}}});
        assert!(is_update_necessary(&fixture.ctx, &key(), &changed).unwrap());
    }
}

//! Apply a cloud-published document to the local shadow.

use super::{last_synced_value, load_sync_info, now_epoch_seconds};
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use shadowsync_document::{merge_patch, ShadowDocument, ShadowKey};
use tracing::debug;

/// Returns true if applying the cloud document would change the local
/// shadow body.
pub(crate) fn is_update_necessary(
    ctx: &SyncContext,
    key: &ShadowKey,
    document: &[u8],
) -> SyncResult<bool> {
    let update = ShadowDocument::from_bytes(document)?;
    let info = match ctx.store().get_sync_info(key)? {
        Some(info) => info,
        None => return Ok(true),
    };
    if let Ok(cloud_version) = update.version() {
        if cloud_version <= info.cloud_version {
            return Ok(false);
        }
    }
    if info.last_synced_document.is_none() {
        return Ok(true);
    }
    let base = last_synced_value(&info)?;
    let mut merged = ShadowDocument::from_value(base.clone())?.stripped();
    merge_patch(&mut merged, &update.stripped());
    Ok(merged != ShadowDocument::from_value(base)?.stripped())
}

pub(crate) fn execute(ctx: &SyncContext, key: &ShadowKey, document: &[u8]) -> SyncResult<()> {
    let update = ShadowDocument::from_bytes(document)?;
    let cloud_version = update.version()?;

    let _lock = ctx.store().lock(key);
    let mut info = load_sync_info(ctx, key)?;

    // The cloud republishes cumulatively versioned documents; anything at
    // or below the confirmed cloud version has already been applied.
    if cloud_version <= info.cloud_version {
        debug!(key = %key, cloud_version, "dropping stale cloud document");
        return Ok(());
    }

    let base = last_synced_value(&info)?;
    let base_stripped = ShadowDocument::from_value(base)?.stripped();
    let mut merged = base_stripped.clone();
    merge_patch(&mut merged, &update.stripped());

    if info.last_synced_document.is_some() && merged == base_stripped {
        // Body unchanged; only the version bookkeeping advances.
        info.cloud_version = cloud_version;
        info.cloud_update_time = update.timestamp().unwrap_or(info.cloud_update_time);
        info.last_sync_time = now_epoch_seconds();
        ctx.store().update_sync_info(info)?;
        return Ok(());
    }

    let body = serde_json::to_vec(&merged).expect("JSON value serializes");
    let new_local_version = ctx.store().update_shadow(key, &body)?;
    if new_local_version <= info.local_version {
        return Err(SyncError::fatal(format!(
            "local version regressed for {key}: {} -> {new_local_version}",
            info.local_version
        )));
    }

    info.local_version = new_local_version;
    info.cloud_version = cloud_version;
    info.last_synced_document = Some(body);
    info.cloud_update_time = update.timestamp().unwrap_or(info.cloud_update_time);
    info.cloud_deleted = false;
    info.last_sync_time = now_epoch_seconds();
    ctx.store().update_sync_info(info)?;

    debug!(key = %key, cloud_version, local_version = new_local_version, "applied cloud update locally");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::Fixture;
    use serde_json::{json, Value};
    use shadowsync_store::ShadowStore;

    fn key() -> ShadowKey {
        ShadowKey::new("t1", "s")
    }

    fn cloud_doc(version: u64, x: i64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "version": version,
            "timestamp": 1700000100,
            "state": {"reported": {"x": x}},
            "metadata": {}
        }))
        .unwrap()
    }

    #[test]
    fn writes_the_merged_body_locally() {
        let fixture = Fixture::new().with_sync_row(&key());
        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();

        let (body, version) = fixture.store.get_shadow(&key()).unwrap().unwrap();
        assert_eq!(version, 1);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"state": {"reported": {"x": 1}}}));

        let info = fixture.sync_info(&key());
        assert_eq!(info.cloud_version, 3);
        assert_eq!(info.local_version, 1);
        assert_eq!(info.cloud_update_time, 1700000100);
    }

    #[test]
    fn stale_documents_are_dropped() {
        let fixture = Fixture::new().with_sync_row(&key());
        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();
        // A replayed older document must not touch the store.
        execute(&fixture.ctx, &key(), &cloud_doc(2, 9)).unwrap();

        let (body, version) = fixture.store.get_shadow(&key()).unwrap().unwrap();
        assert_eq!(version, 1);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["state"]["reported"]["x"], 1);
    }

    #[test]
    fn replaying_the_same_version_is_a_no_op() {
        let fixture = Fixture::new().with_sync_row(&key());
        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();
        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();
        assert_eq!(fixture.sync_info(&key()).local_version, 1);
    }

    #[test]
    fn version_advance_without_body_change_skips_the_write() {
        let fixture = Fixture::new().with_sync_row(&key());
        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();
        // Same body at a later cloud version (metadata-only change).
        execute(&fixture.ctx, &key(), &cloud_doc(4, 1)).unwrap();

        let info = fixture.sync_info(&key());
        assert_eq!(info.cloud_version, 4);
        assert_eq!(info.local_version, 1, "no local write for an unchanged body");
    }

    #[test]
    fn malformed_documents_are_skips() {
        let fixture = Fixture::new().with_sync_row(&key());
        assert!(execute(&fixture.ctx, &key(), b"not json").unwrap_err().is_skip());
        assert!(execute(&fixture.ctx, &key(), b"{\"state\":{}}")
            .unwrap_err()
            .is_skip());
    }

    #[test]
    fn update_necessity_check() {
        let fixture = Fixture::new().with_sync_row(&key());
        assert!(is_update_necessary(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap());

        execute(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap();
        assert!(!is_update_necessary(&fixture.ctx, &key(), &cloud_doc(3, 1)).unwrap());
        assert!(is_update_necessary(&fixture.ctx, &key(), &cloud_doc(4, 2)).unwrap());
    }
}

//! Sync bookkeeping rows.

use serde::{Deserialize, Serialize};
use shadowsync_document::ShadowKey;

/// Bookkeeping for one synced shadow.
///
/// One row exists per shadow in the active sync configuration. The row
/// records the last versions confirmed on each side and the full document
/// body as of the last successful reconcile; the engine mutates it as the
/// final step of every executor, so a row always describes a state both
/// sides actually reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInformation {
    /// Identity of the shadow this row tracks.
    pub key: ShadowKey,
    /// Last cloud version this device has observed or confirmed.
    pub cloud_version: u64,
    /// Last local version this device has observed or confirmed.
    pub local_version: u64,
    /// Full document bytes as of the last successful reconcile.
    pub last_synced_document: Option<Vec<u8>>,
    /// Server timestamp (epoch seconds) of the last cloud-observed change.
    pub cloud_update_time: i64,
    /// Local wall clock (epoch seconds) of the last successful reconcile.
    pub last_sync_time: i64,
    /// True between observing a cloud delete and propagating it.
    pub cloud_deleted: bool,
}

impl SyncInformation {
    /// Creates the initial row for a newly configured shadow: zero versions,
    /// epoch times, nothing synced yet.
    pub fn initial(key: ShadowKey) -> Self {
        Self {
            key,
            cloud_version: 0,
            local_version: 0,
            last_synced_document: None,
            cloud_update_time: 0,
            last_sync_time: 0,
            cloud_deleted: false,
        }
    }

    /// Returns true if no reconcile has ever completed for this shadow.
    pub fn is_initial(&self) -> bool {
        self.cloud_version == 0 && self.local_version == 0 && self.last_synced_document.is_none()
    }

    /// Resets the row to its initial state, keeping the key.
    ///
    /// Used when both sides are confirmed absent.
    pub fn clear(&mut self) {
        self.cloud_version = 0;
        self.local_version = 0;
        self.last_synced_document = None;
        self.cloud_deleted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_row_is_zeroed() {
        let info = SyncInformation::initial(ShadowKey::classic("t1"));
        assert_eq!(info.cloud_version, 0);
        assert_eq!(info.local_version, 0);
        assert!(info.last_synced_document.is_none());
        assert!(!info.cloud_deleted);
        assert!(info.is_initial());
    }

    #[test]
    fn serde_roundtrip() {
        let mut info = SyncInformation::initial(ShadowKey::new("t1", "config"));
        info.cloud_version = 4;
        info.last_synced_document = Some(vec![0x7b, 0x7d]);

        let json = serde_json::to_string(&info).unwrap();
        let back: SyncInformation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn clear_resets_versions_and_body() {
        let mut info = SyncInformation::initial(ShadowKey::classic("t1"));
        info.cloud_version = 5;
        info.local_version = 3;
        info.last_synced_document = Some(vec![1]);
        info.cloud_deleted = true;

        info.clear();
        assert!(info.is_initial());
        assert!(!info.cloud_deleted);
    }
}

//! Sync request model.

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::executor;
use serde_json::Value;
use shadowsync_document::ShadowKey;
use std::fmt;

/// Tag identifying a request variant, used by the merger and for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Apply a cloud update to the local shadow.
    LocalUpdate,
    /// Apply a cloud delete to the local shadow.
    LocalDelete,
    /// Push a local update to the cloud shadow.
    CloudUpdate,
    /// Push a local delete to the cloud shadow.
    CloudDelete,
    /// Three-way reconcile of both sides.
    FullShadow,
    /// Force local := cloud.
    OverwriteLocal,
    /// Force cloud := local.
    OverwriteCloud,
}

impl RequestKind {
    /// Returns true for the variants that reconcile or overwrite the whole
    /// shadow; these supersede any other pending request for the key.
    pub fn is_full_sync(&self) -> bool {
        matches!(
            self,
            RequestKind::FullShadow | RequestKind::OverwriteLocal | RequestKind::OverwriteCloud
        )
    }

    /// Returns true for the variants mutating the device side.
    pub fn is_device_bound(&self) -> bool {
        matches!(self, RequestKind::LocalUpdate | RequestKind::LocalDelete)
    }

    /// Returns true for the variants mutating the cloud side.
    pub fn is_cloud_bound(&self) -> bool {
        matches!(self, RequestKind::CloudUpdate | RequestKind::CloudDelete)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::LocalUpdate => "local-update",
            RequestKind::LocalDelete => "local-delete",
            RequestKind::CloudUpdate => "cloud-update",
            RequestKind::CloudDelete => "cloud-delete",
            RequestKind::FullShadow => "full-shadow",
            RequestKind::OverwriteLocal => "overwrite-local",
            RequestKind::OverwriteCloud => "overwrite-cloud",
        };
        f.write_str(name)
    }
}

/// One pending sync action for a specific shadow.
///
/// Requests are plain data; everything needed to execute them arrives via
/// the [`SyncContext`]. Execution is idempotent with respect to already
/// reconciled state: when the sync row already reflects the outcome, an
/// executor succeeds without mutating anything.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRequest {
    /// Apply a cloud-published document to the local shadow.
    LocalUpdate {
        /// Shadow to update.
        key: ShadowKey,
        /// Cloud document bytes (carry the cloud version).
        document: Vec<u8>,
    },
    /// Apply a cloud delete to the local shadow.
    LocalDelete {
        /// Shadow to delete.
        key: ShadowKey,
        /// Delete-accepted payload bytes (carry the deleted cloud version).
        payload: Vec<u8>,
    },
    /// Push a local change to the cloud shadow.
    CloudUpdate {
        /// Shadow to update.
        key: ShadowKey,
        /// Update document as applied locally.
        document: Value,
    },
    /// Push a local delete to the cloud shadow.
    CloudDelete {
        /// Shadow to delete.
        key: ShadowKey,
    },
    /// Three-way reconcile of both sides.
    FullShadow {
        /// Shadow to reconcile.
        key: ShadowKey,
    },
    /// Force the local shadow to match the cloud.
    OverwriteLocal {
        /// Shadow to overwrite.
        key: ShadowKey,
    },
    /// Force the cloud shadow to match the local one.
    OverwriteCloud {
        /// Shadow to overwrite.
        key: ShadowKey,
    },
}

impl SyncRequest {
    /// The shadow this request acts on.
    pub fn key(&self) -> &ShadowKey {
        match self {
            SyncRequest::LocalUpdate { key, .. }
            | SyncRequest::LocalDelete { key, .. }
            | SyncRequest::CloudUpdate { key, .. }
            | SyncRequest::CloudDelete { key }
            | SyncRequest::FullShadow { key }
            | SyncRequest::OverwriteLocal { key }
            | SyncRequest::OverwriteCloud { key } => key,
        }
    }

    /// The variant tag.
    pub fn kind(&self) -> RequestKind {
        match self {
            SyncRequest::LocalUpdate { .. } => RequestKind::LocalUpdate,
            SyncRequest::LocalDelete { .. } => RequestKind::LocalDelete,
            SyncRequest::CloudUpdate { .. } => RequestKind::CloudUpdate,
            SyncRequest::CloudDelete { .. } => RequestKind::CloudDelete,
            SyncRequest::FullShadow { .. } => RequestKind::FullShadow,
            SyncRequest::OverwriteLocal { .. } => RequestKind::OverwriteLocal,
            SyncRequest::OverwriteCloud { .. } => RequestKind::OverwriteCloud,
        }
    }

    /// Executes the reconciliation this request describes.
    pub fn execute(&self, ctx: &SyncContext) -> SyncResult<()> {
        match self {
            SyncRequest::LocalUpdate { key, document } => {
                executor::local_update::execute(ctx, key, document)
            }
            SyncRequest::LocalDelete { key, payload } => {
                executor::local_delete::execute(ctx, key, payload)
            }
            SyncRequest::CloudUpdate { key, document } => {
                executor::cloud_update::execute(ctx, key, document)
            }
            SyncRequest::CloudDelete { key } => executor::cloud_delete::execute(ctx, key),
            SyncRequest::FullShadow { key } => executor::full_shadow::execute(ctx, key),
            SyncRequest::OverwriteLocal { key } => executor::overwrite::execute_local(ctx, key),
            SyncRequest::OverwriteCloud { key } => executor::overwrite::execute_cloud(ctx, key),
        }
    }

    /// Returns true if executing now would mutate either side.
    ///
    /// Full-sync variants always report `true`; they decide inside.
    pub fn is_update_necessary(&self, ctx: &SyncContext) -> SyncResult<bool> {
        match self {
            SyncRequest::LocalUpdate { key, document } => {
                executor::local_update::is_update_necessary(ctx, key, document)
            }
            SyncRequest::LocalDelete { key, .. } => {
                executor::local_delete::is_update_necessary(ctx, key)
            }
            SyncRequest::CloudUpdate { key, document } => {
                executor::cloud_update::is_update_necessary(ctx, key, document)
            }
            SyncRequest::CloudDelete { key } => {
                executor::cloud_delete::is_update_necessary(ctx, key)
            }
            SyncRequest::FullShadow { .. }
            | SyncRequest::OverwriteLocal { .. }
            | SyncRequest::OverwriteCloud { .. } => Ok(true),
        }
    }
}

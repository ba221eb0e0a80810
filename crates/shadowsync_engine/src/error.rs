//! Error types for the sync engine.

use shadowsync_document::{DocumentError, ShadowKey};
use shadowsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while executing sync requests.
///
/// The taxonomy drives the strategy workers: retryable failures back off
/// and retry, skips drop the request after logging, conflicts are absorbed
/// into a full reconcile, interruptions end the worker cleanly, and fatal
/// errors stop the strategy.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transient cloud, network or local-contention failure.
    #[error("retryable sync failure: {message}")]
    Retryable {
        /// Description of the failure.
        message: String,
    },

    /// Permanent logical failure; the request is dropped.
    #[error("skipping sync request: {message}")]
    Skip {
        /// Description of the failure.
        message: String,
    },

    /// The cloud rejected a write because the expected version was stale.
    #[error("cloud version conflict for {key}")]
    Conflict {
        /// Shadow whose versions diverged.
        key: ShadowKey,
    },

    /// Cooperative cancellation.
    #[error("sync interrupted")]
    Interrupted,

    /// Invariant violation; the strategy stops.
    #[error("fatal sync invariant violation: {message}")]
    Fatal {
        /// Description of the violation.
        message: String,
    },
}

impl SyncError {
    /// Creates a retryable error.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    /// Creates a skip error.
    pub fn skip(message: impl Into<String>) -> Self {
        Self::Skip {
            message: message.into(),
        }
    }

    /// Creates a conflict error for a shadow.
    pub fn conflict(key: ShadowKey) -> Self {
        Self::Conflict { key }
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns true if the request should be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Retryable { .. })
    }

    /// Returns true if the request should be dropped.
    pub fn is_skip(&self) -> bool {
        matches!(self, SyncError::Skip { .. })
    }

    /// Returns true if this is a cloud version conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }

    /// Returns true if this is a cooperative interruption.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SyncError::Interrupted)
    }

    /// Returns true if the strategy must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Fatal { .. })
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            // A shadow vanishing mid-request is a permanent outcome for
            // that request, not a transient failure.
            StoreError::ShadowNotFound { .. } => SyncError::skip(err.to_string()),
            StoreError::Backend { .. } => SyncError::retryable(err.to_string()),
        }
    }
}

impl From<DocumentError> for SyncError {
    fn from(err: DocumentError) -> Self {
        // Malformed documents never become well-formed by retrying.
        SyncError::skip(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(SyncError::retryable("throttled").is_retryable());
        assert!(SyncError::skip("unauthorized").is_skip());
        assert!(SyncError::conflict(ShadowKey::classic("t1")).is_conflict());
        assert!(SyncError::Interrupted.is_interrupted());
        assert!(SyncError::fatal("row missing").is_fatal());

        assert!(!SyncError::skip("x").is_retryable());
        assert!(!SyncError::Interrupted.is_fatal());
    }

    #[test]
    fn store_errors_map_by_kind() {
        let not_found = StoreError::shadow_not_found(ShadowKey::classic("t1"));
        assert!(SyncError::from(not_found).is_skip());

        let backend = StoreError::backend("lock contention");
        assert!(SyncError::from(backend).is_retryable());
    }

    #[test]
    fn document_errors_are_skips() {
        let err = DocumentError::missing_field("version");
        assert!(SyncError::from(err).is_skip());
    }
}

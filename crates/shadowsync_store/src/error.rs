//! Error types for the shadow store.

use shadowsync_document::ShadowKey;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in shadow store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested shadow does not exist.
    #[error("shadow not found: {key}")]
    ShadowNotFound {
        /// Identity of the missing shadow.
        key: ShadowKey,
    },

    /// The storage backend failed.
    #[error("storage backend failure: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a shadow-not-found error.
    pub fn shadow_not_found(key: ShadowKey) -> Self {
        Self::ShadowNotFound { key }
    }

    /// Creates a backend failure error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns true if this error denotes a missing shadow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::ShadowNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        let err = StoreError::shadow_not_found(ShadowKey::classic("t1"));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("t1"));

        assert!(!StoreError::backend("disk full").is_not_found());
    }
}

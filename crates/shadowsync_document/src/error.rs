//! Error types for the document model.

use thiserror::Error;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur while interpreting shadow documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The bytes were not valid JSON.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document root was not a JSON object.
    #[error("document is not a JSON object")]
    NotAnObject,

    /// A required field was absent.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The version field was present but unusable.
    #[error("invalid version field: {reason}")]
    InvalidVersion {
        /// Description of why the version is invalid.
        reason: String,
    },
}

impl DocumentError {
    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an invalid version error.
    pub fn invalid_version(reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            reason: reason.into(),
        }
    }
}

//! Shadow document wrapper.

use crate::error::{DocumentError, DocumentResult};
use crate::patch::merge_patch;
use serde_json::Value;

/// Top-level field holding the document version.
pub const FIELD_VERSION: &str = "version";
/// Top-level field holding the server timestamp on cloud responses.
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Top-level field holding per-leaf metadata.
pub const FIELD_METADATA: &str = "metadata";

/// A shadow document: a JSON object carrying `state`, `metadata` and a
/// numeric `version`.
///
/// Body content is treated opaquely; the only interpreted pieces are the
/// top-level sync bookkeeping fields and the recursive merge semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDocument {
    value: Value,
}

impl ShadowDocument {
    /// Wraps a JSON value. The root must be an object.
    pub fn from_value(value: Value) -> DocumentResult<Self> {
        if !value.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        Ok(Self { value })
    }

    /// Parses a document from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> DocumentResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Serializes the document to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.value).expect("JSON value serializes")
    }

    /// Returns the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the wrapper and returns the JSON value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Extracts the required `version` field.
    ///
    /// Rejects missing, non-integer and negative versions; those documents
    /// cannot participate in version arithmetic.
    pub fn version(&self) -> DocumentResult<u64> {
        let field = self
            .value
            .get(FIELD_VERSION)
            .ok_or(DocumentError::missing_field(FIELD_VERSION))?;
        field
            .as_u64()
            .ok_or_else(|| DocumentError::invalid_version(format!("not a non-negative integer: {field}")))
    }

    /// Extracts the `version` field if present and well-formed.
    pub fn version_opt(&self) -> Option<u64> {
        self.value.get(FIELD_VERSION).and_then(Value::as_u64)
    }

    /// Extracts the server `timestamp` field if present.
    pub fn timestamp(&self) -> Option<i64> {
        self.value.get(FIELD_TIMESTAMP).and_then(Value::as_i64)
    }

    /// Sets the `version` field, inserting it if absent.
    pub fn set_version(&mut self, version: u64) {
        if let Some(fields) = self.value.as_object_mut() {
            fields.insert(FIELD_VERSION.to_string(), Value::from(version));
        }
    }

    /// Returns a copy with `version`, `timestamp` and `metadata` removed.
    ///
    /// This is the canonical form used for change detection: bookkeeping
    /// fields never make two documents "different".
    pub fn stripped(&self) -> Value {
        strip_sync_fields(&self.value)
    }

    /// Compares two documents ignoring `version`, `timestamp` and
    /// `metadata`.
    ///
    /// `serde_json` object equality is key-order independent; numbers keep
    /// their lexical representation class, so `1` and `1.0` differ.
    pub fn equals_ignoring_metadata(&self, other: &ShadowDocument) -> bool {
        self.stripped() == other.stripped()
    }

    /// Applies a merge patch onto this document (null leaves delete).
    pub fn apply_patch(&mut self, patch: &Value) {
        merge_patch(&mut self.value, patch);
    }
}

/// Removes the top-level sync bookkeeping fields from a document value.
pub(crate) fn strip_sync_fields(value: &Value) -> Value {
    let mut stripped = value.clone();
    if let Some(fields) = stripped.as_object_mut() {
        fields.remove(FIELD_VERSION);
        fields.remove(FIELD_TIMESTAMP);
        fields.remove(FIELD_METADATA);
    }
    stripped
}

/// Payload of a cloud delete-accepted event.
///
/// Carries the cloud version at which the shadow was deleted; the local
/// delete executor uses it to advance version bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePayload {
    version: u64,
    timestamp: Option<i64>,
}

impl DeletePayload {
    /// Creates a payload from its parts.
    pub fn new(version: u64, timestamp: Option<i64>) -> Self {
        Self { version, timestamp }
    }

    /// Parses a delete payload from raw bytes.
    pub fn parse(bytes: &[u8]) -> DocumentResult<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        if !value.is_object() {
            return Err(DocumentError::NotAnObject);
        }
        let field = value
            .get(FIELD_VERSION)
            .ok_or(DocumentError::missing_field(FIELD_VERSION))?;
        let version = field
            .as_u64()
            .ok_or_else(|| DocumentError::invalid_version(format!("not a non-negative integer: {field}")))?;
        let timestamp = value.get(FIELD_TIMESTAMP).and_then(Value::as_i64);
        Ok(Self { version, timestamp })
    }

    /// Serializes the payload to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut fields = serde_json::Map::new();
        fields.insert(FIELD_VERSION.to_string(), Value::from(self.version));
        if let Some(timestamp) = self.timestamp {
            fields.insert(FIELD_TIMESTAMP.to_string(), Value::from(timestamp));
        }
        serde_json::to_vec(&Value::Object(fields)).expect("JSON value serializes")
    }

    /// The cloud version at which the shadow was deleted.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The server timestamp of the delete, if present.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

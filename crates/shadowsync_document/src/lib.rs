//! # ShadowSync Document Model
//!
//! Shadow document types and operations for ShadowSync.
//!
//! This crate provides:
//! - `ShadowKey` for shadow identity
//! - `ShadowDocument` for version extraction and canonical comparison
//! - Null-leaf merge patches and patch generation
//! - Delete payload parsing
//!
//! This is a pure document crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod key;
mod patch;

pub use document::{DeletePayload, ShadowDocument, FIELD_METADATA, FIELD_TIMESTAMP, FIELD_VERSION};
pub use error::{DocumentError, DocumentResult};
pub use key::ShadowKey;
pub use patch::{diff, merge_patch};

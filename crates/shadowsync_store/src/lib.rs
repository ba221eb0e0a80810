//! # ShadowSync Store
//!
//! Local shadow store interface for ShadowSync.
//!
//! This crate provides:
//! - `SyncInformation` bookkeeping rows
//! - The `ShadowStore` trait consumed by the sync engine
//! - A per-shadow lock registry with scoped guards
//! - `MemoryShadowStore`, the reference in-memory implementation
//! - A change feed for local shadow events

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod feed;
mod lock;
mod memory;
mod store;
mod sync_info;

pub use error::{StoreError, StoreResult};
pub use feed::{ShadowEvent, ShadowEventFeed, ShadowEventKind};
pub use lock::{LockRegistry, ShadowLock};
pub use memory::MemoryShadowStore;
pub use store::ShadowStore;
pub use sync_info::SyncInformation;

//! # ShadowSync Engine
//!
//! Sync engine reconciling device-local shadows with their cloud
//! counterparts.
//!
//! This crate provides:
//! - The sync request model and the request merger
//! - A bounded merging queue (one request per shadow)
//! - Per-variant reconciliation executors with version arithmetic
//! - Realtime (worker pool) and periodic (scheduled) drain strategies
//! - The [`SyncHandler`] façade wiring policy, lifecycle and connectivity
//!
//! Ordering is per shadow: the queue holds at most one request per key and
//! executors are idempotent, so requests for the same shadow serialize
//! while distinct shadows reconcile in parallel.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod cloud;
mod config;
mod context;
mod error;
mod executor;
mod handler;
mod merger;
mod queue;
mod request;
mod strategy;

pub use cancel::CancelToken;
pub use cloud::{
    CloudDataPlane, CloudError, CloudResult, CloudSubscriptions, MockCloudDataPlane,
    NoopSubscriptions,
};
pub use config::{
    Direction, EngineConfig, RetryConfig, StrategyConfig, StrategyKind, SyncConfiguration,
    DEFAULT_PARALLELISM, DEFAULT_PERIODIC_INTERVAL, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use context::SyncContext;
pub use error::{SyncError, SyncResult};
pub use handler::SyncHandler;
pub use merger::{merge, MergeOutcome};
pub use queue::RequestQueue;
pub use request::{RequestKind, SyncRequest};
pub use strategy::{build_strategy, PeriodicSyncStrategy, RealtimeSyncStrategy, SyncStrategy};

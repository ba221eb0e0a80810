//! Queue-draining strategies.
//!
//! A strategy owns the worker threads that drain the request queue and
//! execute reconciles. Two policies exist: [`RealtimeSyncStrategy`] drains
//! continuously with a worker pool, [`PeriodicSyncStrategy`] drains in
//! scheduled batches. Both share the retry/drop/promote handling in
//! [`run_request`].

mod periodic;
mod realtime;

pub use periodic::PeriodicSyncStrategy;
pub use realtime::RealtimeSyncStrategy;

use crate::cancel::CancelToken;
use crate::config::{EngineConfig, RetryConfig, StrategyConfig, StrategyKind};
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::queue::RequestQueue;
use crate::request::SyncRequest;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A policy for draining the request queue.
///
/// `stop` is idempotent and waits (bounded by the shutdown timeout) for
/// in-flight executors; an executor aborted by `stop` has not yet written
/// sync information, so no bookkeeping is lost.
pub trait SyncStrategy: Send + Sync {
    /// Starts the strategy's workers.
    fn start(&self, context: Arc<SyncContext>, parallelism: usize) -> SyncResult<()>;

    /// Stops the workers and waits for in-flight requests.
    fn stop(&self);

    /// Enqueues a request. Delegates to the queue, so merging applies.
    fn put(&self, request: SyncRequest) -> SyncResult<()>;

    /// Empties the queue.
    fn clear(&self);

    /// Free queue slots remaining.
    fn remaining_capacity(&self) -> usize;

    /// Returns true if a fatal error stopped the workers.
    fn is_errored(&self) -> bool;
}

/// Builds the strategy a configuration asks for, draining `queue`.
pub fn build_strategy(
    config: &StrategyConfig,
    queue: Arc<RequestQueue>,
    engine: &EngineConfig,
) -> Arc<dyn SyncStrategy> {
    match config.kind {
        StrategyKind::Realtime => Arc::new(RealtimeSyncStrategy::new(
            queue,
            engine.retry.clone(),
            engine.shutdown_timeout,
        )),
        StrategyKind::Periodic => Arc::new(PeriodicSyncStrategy::new(
            queue,
            engine.retry.clone(),
            config.interval,
            engine.shutdown_timeout,
        )),
    }
}

/// Executes one request with the shared error policy.
///
/// Retryable failures back off (cancel-aware) and retry up to the attempt
/// budget, then drop. Skips drop immediately. A cloud version conflict is
/// absorbed by enqueueing a full reconcile for the shadow. Only
/// `Interrupted` and `Fatal` escape to the caller.
pub(crate) fn run_request(
    request: &SyncRequest,
    ctx: &SyncContext,
    queue: &RequestQueue,
    retry: &RetryConfig,
    cancel: &CancelToken,
) -> SyncResult<()> {
    for attempt in 0..retry.max_attempts.max(1) {
        if attempt > 0 {
            let delay = retry.delay_for_attempt(attempt);
            if cancel.wait_timeout(delay) {
                return Err(SyncError::Interrupted);
            }
        } else if cancel.is_cancelled() {
            return Err(SyncError::Interrupted);
        }

        match request.execute(ctx) {
            Ok(()) => return Ok(()),
            Err(SyncError::Conflict { key }) => {
                debug!(key = %key, kind = %request.kind(), "version conflict, scheduling full reconcile");
                queue.offer(SyncRequest::FullShadow { key })?;
                return Ok(());
            }
            Err(SyncError::Skip { message }) => {
                warn!(key = %request.key(), kind = %request.kind(), reason = %message, "dropping sync request");
                return Ok(());
            }
            Err(SyncError::Retryable { message }) => {
                if attempt + 1 >= retry.max_attempts {
                    warn!(
                        key = %request.key(),
                        kind = %request.kind(),
                        reason = %message,
                        attempts = retry.max_attempts,
                        "retries exhausted, dropping sync request"
                    );
                    return Ok(());
                }
                debug!(key = %request.key(), kind = %request.kind(), reason = %message, attempt, "sync request failed, will retry");
            }
            Err(SyncError::Interrupted) => return Err(SyncError::Interrupted),
            Err(err @ SyncError::Fatal { .. }) => return Err(err),
        }
    }
    Ok(())
}

/// Joins workers, bounded by the shutdown timeout. Workers still running
/// at the deadline are detached with a warning.
pub(crate) fn join_with_timeout(workers: Vec<JoinHandle<()>>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    for worker in workers {
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        if worker.is_finished() {
            let _ = worker.join();
        } else {
            warn!("sync worker did not stop within the shutdown timeout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudError, MockCloudDataPlane};
    use crate::executor::testing::Fixture;
    use crate::request::RequestKind;
    use serde_json::json;
    use shadowsync_document::ShadowKey;

    fn key() -> ShadowKey {
        ShadowKey::new("t1", "s")
    }

    fn cloud_update() -> SyncRequest {
        SyncRequest::CloudUpdate {
            key: key(),
            document: json!({"state": {"reported": {"x": 1}}}),
        }
    }

    #[test]
    fn successful_request_runs_once() {
        let fixture = Fixture::new().with_sync_row(&key());
        let queue = RequestQueue::new(8);
        run_request(
            &cloud_update(),
            &fixture.ctx,
            &queue,
            &RetryConfig::no_retry(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(fixture.cloud.update_calls(), 1);
    }

    #[test]
    fn retryable_failures_retry_until_success() {
        let fixture = Fixture::new().with_sync_row(&key());
        fixture.cloud.fail_next_update(CloudError::Throttled);

        let retry = RetryConfig::new(3).with_initial_delay(Duration::from_millis(1));
        let queue = RequestQueue::new(8);
        run_request(&cloud_update(), &fixture.ctx, &queue, &retry, &CancelToken::new()).unwrap();
        assert_eq!(fixture.cloud.update_calls(), 2);
        assert_eq!(fixture.sync_info(&key()).cloud_version, 1);
    }

    #[test]
    fn exhausted_retries_drop_the_request() {
        let fixture = Fixture::new().with_sync_row(&key());
        fixture.cloud.fail_next_update(CloudError::Throttled);
        fixture.cloud.fail_next_update(CloudError::Throttled);

        let retry = RetryConfig::new(2).with_initial_delay(Duration::from_millis(1));
        let queue = RequestQueue::new(8);
        run_request(&cloud_update(), &fixture.ctx, &queue, &retry, &CancelToken::new()).unwrap();
        assert_eq!(fixture.cloud.update_calls(), 2);
        // The cloud was never updated.
        assert_eq!(fixture.sync_info(&key()).cloud_version, 0);
    }

    #[test]
    fn skip_failures_drop_without_retry() {
        let fixture = Fixture::new().with_sync_row(&key());
        fixture.cloud.fail_next_update(CloudError::Unauthorized);

        let retry = RetryConfig::new(5).with_initial_delay(Duration::from_millis(1));
        let queue = RequestQueue::new(8);
        run_request(&cloud_update(), &fixture.ctx, &queue, &retry, &CancelToken::new()).unwrap();
        assert_eq!(fixture.cloud.update_calls(), 1);
    }

    #[test]
    fn conflicts_promote_to_full_shadow() {
        let fixture = Fixture::new().with_sync_row(&key());
        // Cloud is ahead of the bookkeeping: the push conflicts.
        fixture.cloud.seed_shadow(key(), b"{}".to_vec(), 4);

        let queue = RequestQueue::new(8);
        run_request(
            &cloud_update(),
            &fixture.ctx,
            &queue,
            &RetryConfig::no_retry(),
            &CancelToken::new(),
        )
        .unwrap();

        let promoted = queue.poll().unwrap();
        assert_eq!(promoted.kind(), RequestKind::FullShadow);
        assert_eq!(promoted.key(), &key());
    }

    #[test]
    fn cancellation_interrupts_backoff() {
        let fixture = Fixture::new().with_sync_row(&key());
        fixture.cloud.fail_next_update(CloudError::Throttled);

        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        // The first attempt fails; the 30s backoff must end at the cancel.
        let retry = RetryConfig::new(3).with_initial_delay(Duration::from_secs(30));
        let queue = RequestQueue::new(8);
        let start = std::time::Instant::now();
        let err = run_request(&cloud_update(), &fixture.ctx, &queue, &retry, &cancel);
        assert!(matches!(err, Err(SyncError::Interrupted)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(fixture.cloud.update_calls(), 1);
        handle.join().unwrap();
    }

    #[test]
    fn fatal_errors_escape() {
        let fixture = Fixture::new(); // no sync row: fatal invariant
        let queue = RequestQueue::new(8);
        let err = run_request(
            &cloud_update(),
            &fixture.ctx,
            &queue,
            &RetryConfig::no_retry(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn factory_builds_the_requested_kind() {
        let queue = Arc::new(RequestQueue::new(8));
        let engine = EngineConfig::default();

        let realtime = build_strategy(&StrategyConfig::realtime(), Arc::clone(&queue), &engine);
        assert_eq!(realtime.remaining_capacity(), 8);

        let periodic = build_strategy(
            &StrategyConfig::periodic(Duration::from_millis(50)),
            queue,
            &engine,
        );
        assert_eq!(periodic.remaining_capacity(), 8);
    }

    #[test]
    fn cancelled_token_blocks_execution_entirely() {
        let store = std::sync::Arc::new(shadowsync_store::MemoryShadowStore::new());
        let cloud = std::sync::Arc::new(MockCloudDataPlane::new());
        let ctx = SyncContext::new(store, cloud.clone());

        let cancel = CancelToken::new();
        cancel.cancel();
        let queue = RequestQueue::new(8);
        let err = run_request(
            &cloud_update(),
            &ctx,
            &queue,
            &RetryConfig::no_retry(),
            &cancel,
        );
        assert!(matches!(err, Err(SyncError::Interrupted)));
        assert_eq!(cloud.update_calls(), 0);
    }
}

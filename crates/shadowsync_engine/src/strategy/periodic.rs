//! Periodic drainer: scheduled batch syncs.

use super::{join_with_timeout, run_request, SyncStrategy};
use crate::cancel::CancelToken;
use crate::config::RetryConfig;
use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::queue::RequestQueue;
use crate::request::SyncRequest;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

struct Running {
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

/// Drains the queue on a fixed interval with a single scheduled thread.
///
/// The first tick fires one interval after `start`. Each tick polls the
/// queue without blocking until it is empty or the tick budget (one
/// interval) is spent; requests arriving mid-tick are picked up in the
/// same tick when budget remains.
pub struct PeriodicSyncStrategy {
    queue: Arc<RequestQueue>,
    retry: RetryConfig,
    interval: Duration,
    shutdown_timeout: Duration,
    running: Mutex<Option<Running>>,
    errored: Arc<AtomicBool>,
}

impl PeriodicSyncStrategy {
    /// Creates a strategy draining `queue` every `interval`.
    pub fn new(
        queue: Arc<RequestQueue>,
        retry: RetryConfig,
        interval: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            retry,
            interval,
            shutdown_timeout,
            running: Mutex::new(None),
            errored: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SyncStrategy for PeriodicSyncStrategy {
    fn start(&self, context: Arc<SyncContext>, _parallelism: usize) -> SyncResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }
        self.errored.store(false, Ordering::SeqCst);
        self.queue.resume();

        let cancel = CancelToken::new();
        let queue = Arc::clone(&self.queue);
        let retry = self.retry.clone();
        let interval = self.interval;
        let tick_cancel = cancel.clone();
        let errored = Arc::clone(&self.errored);
        let worker = thread::Builder::new()
            .name("shadow-sync-periodic".to_string())
            .spawn(move || tick_loop(&queue, &context, &retry, interval, &tick_cancel, &errored))
            .map_err(|err| SyncError::fatal(format!("failed to spawn sync worker: {err}")))?;

        *running = Some(Running { cancel, worker });
        info!(interval_s = self.interval.as_secs(), "periodic sync strategy started");
        Ok(())
    }

    fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        self.queue.suspend();
        join_with_timeout(vec![running.worker], self.shutdown_timeout);
        info!("periodic sync strategy stopped");
    }

    fn put(&self, request: SyncRequest) -> SyncResult<()> {
        self.queue.offer(request)
    }

    fn clear(&self) {
        self.queue.clear();
    }

    fn remaining_capacity(&self) -> usize {
        self.queue.remaining_capacity()
    }

    fn is_errored(&self) -> bool {
        self.errored.load(Ordering::SeqCst)
    }
}

fn tick_loop(
    queue: &RequestQueue,
    context: &SyncContext,
    retry: &RetryConfig,
    interval: Duration,
    cancel: &CancelToken,
    errored: &AtomicBool,
) {
    loop {
        if cancel.wait_timeout(interval) {
            break;
        }

        let tick_start = Instant::now();
        let mut drained = 0usize;
        while tick_start.elapsed() < interval {
            let Some(request) = queue.poll() else {
                break;
            };
            match run_request(&request, context, queue, retry, cancel) {
                Ok(()) => drained += 1,
                Err(SyncError::Interrupted) => return,
                Err(err) => {
                    error!(error = %err, "stopping periodic sync after fatal error");
                    errored.store(true, Ordering::SeqCst);
                    return;
                }
            }
        }
        if drained > 0 {
            debug!(drained, "periodic sync tick completed");
        }
    }
}

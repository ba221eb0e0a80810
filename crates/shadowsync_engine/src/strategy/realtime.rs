//! Realtime drainer: a worker pool over the blocking queue.

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
use std::time::Duration;
use tracing::{error, info};

struct Running {
    cancel: CancelToken,
    workers: Vec<JoinHandle<()>>,
}

/// Drains the queue continuously with `parallelism` worker threads.
///
/// Workers block on `take`, execute with the retry policy and loop.
/// Between `take` and completion a request is in flight and absent from
/// the queue, so a fresh request for the same shadow may enter; executor
/// idempotence and version arithmetic make that safe.
pub struct RealtimeSyncStrategy {
    queue: Arc<RequestQueue>,
    retry: RetryConfig,
    shutdown_timeout: Duration,
    running: Mutex<Option<Running>>,
    errored: Arc<AtomicBool>,
}

impl RealtimeSyncStrategy {
    /// Creates a strategy draining `queue`.
    pub fn new(queue: Arc<RequestQueue>, retry: RetryConfig, shutdown_timeout: Duration) -> Self {
        Self {
            queue,
            retry,
            shutdown_timeout,
            running: Mutex::new(None),
            errored: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SyncStrategy for RealtimeSyncStrategy {
    fn start(&self, context: Arc<SyncContext>, parallelism: usize) -> SyncResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }
        self.errored.store(false, Ordering::SeqCst);
        self.queue.resume();

        let cancel = CancelToken::new();
        let mut workers = Vec::with_capacity(parallelism.max(1));
        for index in 0..parallelism.max(1) {
            let queue = Arc::clone(&self.queue);
            let context = Arc::clone(&context);
            let retry = self.retry.clone();
            let cancel = cancel.clone();
            let errored = Arc::clone(&self.errored);
            let worker = thread::Builder::new()
                .name(format!("shadow-sync-{index}"))
                .spawn(move || worker_loop(&queue, &context, &retry, &cancel, &errored))
                .map_err(|err| SyncError::fatal(format!("failed to spawn sync worker: {err}")))?;
            workers.push(worker);
        }

        *running = Some(Running { cancel, workers });
        info!(parallelism = parallelism.max(1), "realtime sync strategy started");
        Ok(())
    }

    fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        self.queue.suspend();
        join_with_timeout(running.workers, self.shutdown_timeout);
        info!("realtime sync strategy stopped");
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

fn worker_loop(
    queue: &RequestQueue,
    context: &SyncContext,
    retry: &RetryConfig,
    cancel: &CancelToken,
    errored: &AtomicBool,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let request = match queue.take() {
            Ok(request) => request,
            Err(_) => break,
        };
        match run_request(&request, context, queue, retry, cancel) {
            Ok(()) => {}
            Err(SyncError::Interrupted) => break,
            Err(err) => {
                error!(error = %err, "stopping sync workers after fatal error");
                errored.store(true, Ordering::SeqCst);
                // Wake the siblings so the whole pool stops.
                queue.suspend();
                break;
            }
        }
    }
}

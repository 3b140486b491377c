//! Bounded worker pool and result collection for one batch.
//!
//! Every call to [`WorkerPool::run`] allocates its own work queue and results
//! channel, so concurrent batches (for different owners) never see each
//! other's items. Workers pull from the queue until it is empty, push one
//! result per item, and are abandoned in place if the batch deadline passes.

use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Runs a fixed number of workers over a FIFO queue with an overall deadline.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    worker_count: usize,
    batch_timeout: Duration,
}

/// What a pool run produced.
#[derive(Debug)]
pub struct PoolReport<T> {
    /// Results in completion order
    pub results: Vec<T>,

    /// Workers still running when the deadline passed
    pub incomplete_workers: usize,

    /// Whether the deadline passed before every worker finished
    pub timed_out: bool,
}

/// Per-batch work queue shared by the workers of one run.
struct WorkQueue<I> {
    items: Mutex<VecDeque<I>>,
}

impl<I> WorkQueue<I> {
    fn new(items: Vec<I>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    /// Non-blocking pop; `None` means the queue is drained.
    fn pop(&self) -> Option<I> {
        match self.items.lock() {
            Ok(mut items) => items.pop_front(),
            // A worker that panicked mid-pop cannot leave the deque inconsistent
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }
}

impl WorkerPool {
    /// Create a pool of `worker_count` workers (at least one).
    pub fn new(worker_count: usize, batch_timeout: Duration) -> Self {
        Self {
            worker_count: worker_count.max(1),
            batch_timeout,
        }
    }

    /// Process `items` with `check`, returning whatever was collected by the
    /// deadline.
    ///
    /// Workers still busy at the deadline are not aborted: they finish their
    /// current item on their own, take no new items, and anything they produce
    /// after collection is discarded.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, check: F) -> PoolReport<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let queue = Arc::new(WorkQueue::new(items));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let check = Arc::new(check);

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let queue = queue.clone();
            let tx = tx.clone();
            let stop = stop.clone();
            let check = check.clone();

            handles.push(tokio::spawn(async move {
                let mut processed = 0usize;
                while !stop.load(Ordering::Relaxed) {
                    let Some(item) = queue.pop() else {
                        break;
                    };
                    let result = check(item).await;
                    processed += 1;
                    if tx.send(result).is_err() {
                        // Collector has moved on
                        break;
                    }
                }
                debug!(worker_id, processed, "Worker finished");
            }));
        }
        drop(tx);

        let joined = tokio::time::timeout(self.batch_timeout, join_all(handles.iter_mut())).await;
        let (timed_out, incomplete_workers) = match joined {
            Ok(outcomes) => {
                for outcome in outcomes {
                    if let Err(e) = outcome {
                        error!(error = %e, "Worker terminated abnormally");
                    }
                }
                (false, 0)
            }
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                let incomplete = handles.iter().filter(|h| !h.is_finished()).count();
                warn!(
                    incomplete_workers = incomplete,
                    timeout = ?self.batch_timeout,
                    "{} workers did not complete before the batch deadline",
                    incomplete
                );
                (true, incomplete)
            }
        };

        let mut results = Vec::new();
        while let Ok(result) = rx.try_recv() {
            results.push(result);
        }

        PoolReport {
            results,
            incomplete_workers,
            timed_out,
        }
    }
}

//! Bounded worker pool with blocking backpressure
//!
//! Jobs go through a bounded channel: when it is full, [`WorkerPool::submit`]
//! waits for a slot instead of rejecting or discarding the job, so the
//! enumeration feeding the pool is never silently truncated.
//!
//! ```text
//! driver ──submit──▶ [ bounded queue ] ──▶ worker 1
//!                                      ├─▶ worker 2
//!                                      └─▶ worker N
//! ```
//!
//! Shutdown closes the queue, waits up to a grace period for the workers, and
//! aborts whatever is still running. Dropping the pool aborts all workers.

use crate::error::{ExplorerError, Result};
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unit of work executed by a worker
pub type Job = BoxFuture<'static, ()>;

/// How the pool went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShutdown {
    /// All workers exited within the grace period
    pub graceful: bool,
    /// Workers that had to be aborted
    pub aborted: usize,
}

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    cancel: watch::Sender<bool>,
    queue_capacity: usize,
    executed: Arc<AtomicUsize>,
    discarded: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Start `workers` workers fed by a queue of `queue_capacity` jobs
    ///
    /// Both values are raised to at least 1.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let (cancel, cancel_rx) = watch::channel(false);
        let executed = Arc::new(AtomicUsize::new(0));
        let discarded = Arc::new(AtomicUsize::new(0));

        let handles = (0..workers)
            .map(|worker| {
                let receiver = receiver.clone();
                let cancel_rx = cancel_rx.clone();
                let executed = executed.clone();
                let discarded = discarded.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(job) = next else { break };
                        if *cancel_rx.borrow() {
                            discarded.fetch_add(1, Ordering::SeqCst);
                            continue;
                        }
                        job.await;
                        executed.fetch_add(1, Ordering::SeqCst);
                    }
                    debug!(worker, "Worker exited");
                })
            })
            .collect();

        info!(workers, queue_capacity, "Worker pool started");
        Self {
            sender: Some(sender),
            workers: handles,
            cancel,
            queue_capacity,
            executed,
            discarded,
        }
    }

    /// Queue a job, waiting while the queue is full
    pub async fn submit(&self, job: Job) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(ExplorerError::PoolClosed)?;
        sender.send(job).await.map_err(|_| ExplorerError::PoolClosed)
    }

    /// Drop queued jobs instead of running them; running jobs continue
    pub fn cancel_pending(&self) {
        self.cancel.send_replace(true);
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Jobs run to completion so far
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    /// Queued jobs dropped after [`cancel_pending`](Self::cancel_pending)
    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Close the queue and wait for the workers, aborting them after `grace`
    pub async fn shutdown(&mut self, grace: Duration) -> PoolShutdown {
        self.sender.take();
        let graceful = tokio::time::timeout(grace, join_all(self.workers.iter_mut()))
            .await
            .is_ok();

        let mut aborted = 0;
        if !graceful {
            for handle in &self.workers {
                if !handle.is_finished() {
                    handle.abort();
                    aborted += 1;
                }
            }
            warn!(
                aborted,
                grace_secs = grace.as_secs_f64(),
                "Worker pool did not stop within grace period"
            );
        }
        self.workers.clear();
        info!(
            executed = self.executed(),
            discarded = self.discarded(),
            graceful,
            "Worker pool shut down"
        );
        PoolShutdown { graceful, aborted }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for handle in &self.workers {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_all_jobs_run_through_tiny_queue() {
        let mut pool = WorkerPool::new(1, 1);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            pool.submit(
                async move {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            )
            .await
            .unwrap();
        }

        let report = pool.shutdown(Duration::from_secs(5)).await;
        assert!(report.graceful);
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.executed(), 10);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let mut pool = WorkerPool::new(2, 4);
        pool.shutdown(Duration::from_secs(1)).await;
        assert!(pool.is_closed());
        let err = pool.submit(async {}.boxed()).await.unwrap_err();
        assert!(matches!(err, ExplorerError::PoolClosed));
    }

    #[tokio::test]
    async fn test_stuck_workers_are_aborted_after_grace() {
        let mut pool = WorkerPool::new(2, 2);
        for _ in 0..2 {
            pool.submit(tokio::time::sleep(Duration::from_secs(3600)).boxed())
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = pool.shutdown(Duration::from_millis(50)).await;
        assert!(!report.graceful);
        assert_eq!(report.aborted, 2);
    }

    #[tokio::test]
    async fn test_cancel_pending_discards_queued_jobs() {
        let mut pool = WorkerPool::new(1, 8);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        pool.submit(
            async move {
                let _ = started_tx.send(());
                let _ = release_rx.await;
            }
            .boxed(),
        )
        .await
        .unwrap();
        started_rx.await.unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let ran = ran.clone();
            pool.submit(
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            )
            .await
            .unwrap();
        }

        pool.cancel_pending();
        let _ = release_tx.send(());
        let report = pool.shutdown(Duration::from_secs(5)).await;
        assert!(report.graceful);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.discarded(), 3);
    }
}

//! Bounded dispatcher: at most K row tasks execute at once, process-wide.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, warn};

use super::types::{DrainReport, PoolStatus};

/// Error type for dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher no longer admits work.
    #[error("Dispatcher is closed")]
    Closed,
}

/// Tracks statistics for the pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicUsize,
    queued: AtomicUsize,
    peak: AtomicUsize,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, name: &str, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            active_jobs: self.active.load(Ordering::Relaxed),
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed),
            peak_active: self.peak.load(Ordering::Relaxed),
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Decrements `active` when a task ends, panicking or not.
struct ActiveGuard(Arc<PoolStats>);

impl ActiveGuard {
    fn enter(stats: &Arc<PoolStats>) -> Self {
        let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(stats))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Decrements `queued` once a submission stops waiting, even if the wait is
/// abandoned.
struct QueuedGuard(Arc<PoolStats>);

impl QueuedGuard {
    fn enter(stats: &Arc<PoolStats>) -> Self {
        stats.queued.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(stats))
    }
}

impl Drop for QueuedGuard {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Counting-semaphore worker pool shared by every ingestion run.
///
/// The permit is taken before a task is spawned and released when the task
/// body returns, so the bound applies to tasks actually executing rather
/// than to tasks merely queued.
#[derive(Clone)]
pub struct Dispatcher {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
}

impl Dispatcher {
    /// Creates a pool running at most `max_concurrent` tasks (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Opens a batch whose tasks can be drained together.
    ///
    /// `on_panic` runs once for every task of this batch that panics, so the
    /// owner can account for the lost work.
    pub fn batch<F>(&self, on_panic: F) -> Batch
    where
        F: Fn() + Send + Sync + 'static,
    {
        Batch {
            semaphore: Arc::clone(&self.semaphore),
            stats: Arc::clone(&self.stats),
            tasks: JoinSet::new(),
            on_panic: Arc::new(on_panic),
            report: DrainReport::default(),
        }
    }

    /// Stops admitting new work. Submissions waiting for a slot fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns the current pool status.
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status("rows", self.max_concurrent)
    }
}

/// The tasks submitted for one unit of work (one file).
pub struct Batch {
    semaphore: Arc<Semaphore>,
    stats: Arc<PoolStats>,
    tasks: JoinSet<()>,
    on_panic: Arc<dyn Fn() + Send + Sync>,
    report: DrainReport,
}

impl Batch {
    /// Admits `task` for execution, waiting while the pool is at capacity.
    ///
    /// Dropping the returned future before it resolves leaves the task
    /// unsubmitted.
    pub async fn submit<F>(&mut self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        let permit = {
            let _queued = QueuedGuard::enter(&self.stats);
            Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| DispatchError::Closed)?
        };

        let stats = Arc::clone(&self.stats);
        let on_panic = Arc::clone(&self.on_panic);

        self.tasks.spawn(async move {
            let _permit = permit;
            let _active = ActiveGuard::enter(&stats);

            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => {
                    stats.total_processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    stats.total_failed.fetch_add(1, Ordering::Relaxed);
                    error!("Row task panicked: {}", panic_message(payload.as_ref()));
                    on_panic();
                }
            }
        });

        Ok(())
    }

    /// Tasks submitted but not yet collected.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every submitted task has finished.
    pub async fn drain(&mut self) -> DrainReport {
        while let Some(result) = self.tasks.join_next().await {
            self.settle(result);
        }
        self.report
    }

    /// Aborts tasks that have not started yet. Running tasks finish normally.
    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }

    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.settle(result);
        }
    }

    fn settle(&mut self, result: Result<(), JoinError>) {
        match result {
            Ok(()) => self.report.finished += 1,
            Err(e) if e.is_cancelled() => self.report.aborted += 1,
            Err(e) => {
                // Panics are caught inside the task; this only fires if the
                // catch itself was bypassed.
                warn!("Row task failed outside the panic boundary: {}", e);
                self.report.finished += 1;
                (self.on_panic)();
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrency_never_exceeds_limit() {
        let dispatcher = Dispatcher::new(3);
        let mut batch = dispatcher.batch(|| {});
        let running = Arc::new(AtomicUsize::new(0));
        let observed_peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..24 {
            let running = Arc::clone(&running);
            let observed_peak = Arc::clone(&observed_peak);
            batch
                .submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    observed_peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(10));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        let report = batch.drain().await;
        assert_eq!(report.finished, 24);
        assert!(observed_peak.load(Ordering::SeqCst) <= 3);
        assert!(observed_peak.load(Ordering::SeqCst) >= 1);

        let status = dispatcher.status();
        assert!(status.peak_active <= 3);
        assert_eq!(status.active_jobs, 0);
        assert_eq!(status.queued_jobs, 0);
        assert_eq!(status.total_processed, 24);
    }

    #[tokio::test]
    async fn test_drain_waits_for_all_tasks() {
        let dispatcher = Dispatcher::new(2);
        let mut batch = dispatcher.batch(|| {});
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = Arc::clone(&done);
            tokio_test::assert_ok!(
                batch
                    .submit(move || {
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
            );
        }

        batch.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(batch.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let dispatcher = Dispatcher::new(2);
        let panics = Arc::new(AtomicUsize::new(0));
        let panics_seen = Arc::clone(&panics);
        let mut batch = dispatcher.batch(move || {
            panics_seen.fetch_add(1, Ordering::SeqCst);
        });
        let survivors = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let survivors = Arc::clone(&survivors);
            batch
                .submit(move || {
                    if i % 3 == 0 {
                        panic!("row {} exploded", i);
                    }
                    survivors.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        let report = batch.drain().await;
        assert_eq!(report.finished, 6);
        assert_eq!(panics.load(Ordering::SeqCst), 2);
        assert_eq!(survivors.load(Ordering::SeqCst), 4);
        assert_eq!(dispatcher.status().total_failed, 2);
        assert_eq!(dispatcher.status().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_closed_dispatcher_rejects_work() {
        let dispatcher = Dispatcher::new(1);
        dispatcher.close();
        let mut batch = dispatcher.batch(|| {});

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let result = batch.submit(move || flag.store(true, Ordering::SeqCst)).await;

        assert!(matches!(result, Err(DispatchError::Closed)));
        batch.drain().await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_batches_share_the_bound() {
        let dispatcher = Dispatcher::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let observed_peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let dispatcher = dispatcher.clone();
            let running = Arc::clone(&running);
            let observed_peak = Arc::clone(&observed_peak);
            handles.push(tokio::spawn(async move {
                let mut batch = dispatcher.batch(|| {});
                for _ in 0..6 {
                    let running = Arc::clone(&running);
                    let observed_peak = Arc::clone(&observed_peak);
                    batch
                        .submit(move || {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            observed_peak.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(5));
                            running.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                        .unwrap();
                }
                batch.drain().await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().finished, 6);
        }
        assert!(observed_peak.load(Ordering::SeqCst) <= 2);
    }
}

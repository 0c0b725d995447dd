//! Bounded-concurrency work queue for external tool invocations.
//!
//! Logical requests queue without bound; at most `limit` submitted tasks run
//! at once. Only leaf work (one probe, one ffmpeg run) should be submitted:
//! a task that waits on other submitted tasks while holding a slot can
//! deadlock a queue with a limit of 1.

use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Counters for a work queue.
#[derive(Default)]
struct QueueStats {
    active: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
}

/// Snapshot of queue activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub limit: usize,
    pub active: u64,
    pub queued: u64,
    pub completed: u64,
}

/// Cloneable handle to a shared concurrency limiter.
#[derive(Clone)]
pub struct WorkQueue {
    limit: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<QueueStats>,
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("limit", &self.limit)
            .field("available", &self.semaphore.available_permits())
            .finish()
    }
}

impl WorkQueue {
    /// Creates a queue running at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Creates a queue sized to the host's logical CPU count.
    pub fn with_cpu_count() -> Self {
        Self::new(num_cpus::get())
    }

    /// Maximum number of tasks running at once.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs `task` once a slot is free and returns its output.
    ///
    /// Dropping the returned future before it gets a slot leaves the queue
    /// unchanged; dropping it while running frees the slot.
    pub async fn submit<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let stats = &self.stats;
        stats.queued.fetch_add(1, Ordering::Relaxed);
        let _queued = CounterGuard(&stats.queued);

        // The semaphore is never closed
        let _permit = self.semaphore.acquire().await.ok();
        drop(_queued);

        stats.active.fetch_add(1, Ordering::Relaxed);
        let _active = CounterGuard(&stats.active);

        let output = task.await;
        stats.completed.fetch_add(1, Ordering::Relaxed);
        output
    }

    /// Returns the current queue status.
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            limit: self.limit,
            active: self.stats.active.load(Ordering::Relaxed),
            queued: self.stats.queued.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
        }
    }
}

/// Decrements a counter when dropped, so cancelled tasks are accounted for.
struct CounterGuard<'a>(&'a AtomicU64);

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

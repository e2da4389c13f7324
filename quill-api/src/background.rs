//! Bounded, deadline-limited background work.
//!
//! Cache population and read-event emission run after the response is
//! produced. Each task is spawned detached so dropping the request future
//! does not cancel it, wrapped in a timeout so none runs unbounded, and
//! admitted through a semaphore so a slow cache cannot pile up tasks.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quill_core::QuillResult;
use tokio::sync::Semaphore;

use crate::config::ApiConfig;
use crate::telemetry::metrics;

/// Outcome counters for background tasks.
#[derive(Debug, Default)]
pub struct BackgroundStats {
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub rejected: AtomicU64,
}

/// Point-in-time copy of [`BackgroundStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
}

impl BackgroundStats {
    pub fn snapshot(&self) -> BackgroundSnapshot {
        BackgroundSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn record(&self, task: &'static str, outcome: TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::Failed => &self.failed,
            TaskOutcome::TimedOut => &self.timed_out,
            TaskOutcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = metrics() {
            metrics.record_background_task(task, outcome.as_str());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Completed,
    Failed,
    TimedOut,
    Rejected,
}

impl TaskOutcome {
    fn as_str(self) -> &'static str {
        match self {
            TaskOutcome::Completed => "completed",
            TaskOutcome::Failed => "failed",
            TaskOutcome::TimedOut => "timed_out",
            TaskOutcome::Rejected => "rejected",
        }
    }
}

/// Spawns fire-and-forget tasks with a per-task deadline and an in-flight bound.
#[derive(Debug, Clone)]
pub struct BackgroundDispatcher {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    max_in_flight: usize,
    stats: Arc<BackgroundStats>,
}

impl BackgroundDispatcher {
    pub fn new(timeout: Duration, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight)),
            timeout,
            max_in_flight,
            stats: Arc::new(BackgroundStats::default()),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.background_timeout, config.background_max_in_flight)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> BackgroundSnapshot {
        self.stats.snapshot()
    }

    /// Run `work` in the background.
    ///
    /// Returns `false` when the in-flight bound is reached and the task was
    /// dropped without running.
    pub fn spawn<F>(&self, task: &'static str, work: F) -> bool
    where
        F: Future<Output = QuillResult<()>> + Send + 'static,
    {
        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(
                    task,
                    max_in_flight = self.max_in_flight,
                    "Background task limit reached, dropping task"
                );
                self.stats.record(task, TaskOutcome::Rejected);
                return false;
            }
        };

        let stats = Arc::clone(&self.stats);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, work).await {
                Ok(Ok(())) => stats.record(task, TaskOutcome::Completed),
                Ok(Err(e)) => {
                    tracing::warn!(task, error = %e, "Background task failed");
                    stats.record(task, TaskOutcome::Failed);
                }
                Err(_) => {
                    tracing::warn!(
                        task,
                        timeout_ms = timeout.as_millis() as u64,
                        "Background task timed out"
                    );
                    stats.record(task, TaskOutcome::TimedOut);
                }
            }
        });
        true
    }

    /// Wait until every task spawned so far has finished.
    ///
    /// Used at shutdown and by tests that assert on background effects.
    pub async fn drain(&self) {
        let permits = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        if let Ok(all) = self.semaphore.acquire_many(permits).await {
            drop(all);
        }
    }
}

impl Default for BackgroundDispatcher {
    fn default() -> Self {
        Self::from_config(&ApiConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{QuillError, StorageError};
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn test_completed_and_failed_are_counted() {
        let dispatcher = BackgroundDispatcher::new(Duration::from_secs(1), 4);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        assert!(dispatcher.spawn("ok", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }));
        assert!(dispatcher.spawn("err", async {
            Err(QuillError::Storage(StorageError::LockPoisoned))
        }));
        dispatcher.drain().await;

        assert!(ran.load(Ordering::SeqCst));
        let stats = dispatcher.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_task_times_out() {
        let dispatcher = BackgroundDispatcher::new(Duration::from_millis(50), 4);
        dispatcher.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        });
        dispatcher.drain().await;
        assert_eq!(dispatcher.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn test_tasks_beyond_bound_are_rejected() {
        let dispatcher = BackgroundDispatcher::new(Duration::from_secs(5), 1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        assert!(dispatcher.spawn("blocker", async move {
            let _ = release_rx.await;
            Ok(())
        }));
        assert!(!dispatcher.spawn("extra", async { Ok(()) }));

        let _ = release_tx.send(());
        dispatcher.drain().await;
        let stats = dispatcher.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.completed, 1);
    }

    #[test]
    fn test_zero_bound_is_clamped() {
        let dispatcher = BackgroundDispatcher::new(Duration::from_secs(1), 0);
        assert_eq!(dispatcher.max_in_flight, 1);
    }
}

//! Cache sweep job.
//!
//! Expired entries are dropped lazily when read, so keys that are never read
//! again would stay on disk forever. This job purges them on a fixed interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quill_storage::cache::CacheBackend;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Counters for the sweep loop.
#[derive(Debug, Default)]
pub struct CacheSweepMetrics {
    runs: AtomicU64,
    purged: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`CacheSweepMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSweepSnapshot {
    pub runs: u64,
    pub purged: u64,
    pub failures: u64,
}

impl CacheSweepMetrics {
    pub fn snapshot(&self) -> CacheSweepSnapshot {
        CacheSweepSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

async fn sweep_once<B: CacheBackend>(backend: &B, metrics: &CacheSweepMetrics) {
    metrics.runs.fetch_add(1, Ordering::Relaxed);
    match backend.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => {
            metrics.purged.fetch_add(purged, Ordering::Relaxed);
            tracing::debug!(purged, "Cache sweep removed expired entries");
        }
        Err(e) => {
            metrics.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(error = %e, "Cache sweep failed");
        }
    }
}

/// Purge expired cache entries every `every` until shutdown.
///
/// The returned task resolves to the sweep counters once the shutdown
/// signal flips to `true`.
pub fn spawn_cache_sweeper<B: CacheBackend>(
    backend: B,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<CacheSweepMetrics>> {
    tokio::spawn(async move {
        let metrics = Arc::new(CacheSweepMetrics::default());
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_secs = every.as_secs(), "Cache sweep started");
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("Cache sweep shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    sweep_once(&backend, &metrics).await;
                }
            }
        }
        metrics
    })
}

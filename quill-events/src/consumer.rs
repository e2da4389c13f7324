//! Polling consumer.
//!
//! A consumer group reads a topic in offset order, hands each delivery to a
//! [`MessageHandler`] and commits the batch's last offset afterwards. A crash
//! between handling and committing redelivers the batch, so handlers see
//! every message at least once and occasionally more than once.
//!
//! A delivery that keeps failing is retried `max_attempts` times, then logged
//! and skipped so one poisoned message cannot stall the group.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::EventResult;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::{Delivery, MessageQueue};

/// Processes one delivery. Must tolerate seeing the same offset twice.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, delivery: &Delivery) -> EventResult<()>;
}

#[async_trait]
impl<H: MessageHandler + ?Sized> MessageHandler for Arc<H> {
    async fn handle(&self, delivery: &Delivery) -> EventResult<()> {
        (**self).handle(delivery).await
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for a consumer group.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Consumer group name; offsets are committed per group.
    pub group: String,
    /// How often to poll for new messages (default: 200 ms)
    pub poll_interval: Duration,
    /// Maximum deliveries fetched per poll (default: 100)
    pub batch_size: usize,
    /// Handler attempts per delivery before it is skipped (default: 3)
    pub max_attempts: u32,
    /// Pause between attempts on the same delivery (default: 50 ms)
    pub retry_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "interactive".to_string(),
            poll_interval: Duration::from_millis(200),
            batch_size: 100,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl ConsumerConfig {
    /// Create ConsumerConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `QUILL_CONSUMER_GROUP`: Consumer group name (default: interactive)
    /// - `QUILL_CONSUMER_POLL_MS`: Poll interval in milliseconds (default: 200)
    /// - `QUILL_CONSUMER_BATCH`: Deliveries per poll (default: 100)
    /// - `QUILL_CONSUMER_MAX_ATTEMPTS`: Attempts per delivery (default: 3)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            group: std::env::var("QUILL_CONSUMER_GROUP").unwrap_or(defaults.group),
            poll_interval: std::env::var("QUILL_CONSUMER_POLL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            batch_size: std::env::var("QUILL_CONSUMER_BATCH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.batch_size),
            max_attempts: std::env::var("QUILL_CONSUMER_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
            retry_backoff: defaults.retry_backoff,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for one consumer task.
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Deliveries handled successfully
    pub processed: AtomicU64,
    /// Handler attempts that returned an error
    pub failed_attempts: AtomicU64,
    /// Deliveries given up on after `max_attempts`
    pub skipped: AtomicU64,
    /// Non-empty batches completed
    pub batches: AtomicU64,
    /// Failed fetches or commits
    pub queue_errors: AtomicU64,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConsumerSnapshot {
        ConsumerSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            queue_errors: self.queue_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of consumer metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSnapshot {
    pub processed: u64,
    pub failed_attempts: u64,
    pub skipped: u64,
    pub batches: u64,
    pub queue_errors: u64,
}

// ============================================================================
// CONSUMER
// ============================================================================

/// One consumer group on one topic.
pub struct Consumer<Q, H> {
    queue: Q,
    topic: String,
    handler: H,
    config: ConsumerConfig,
    metrics: Arc<ConsumerMetrics>,
}

impl<Q: MessageQueue, H: MessageHandler> Consumer<Q, H> {
    pub fn new(queue: Q, topic: impl Into<String>, handler: H, config: ConsumerConfig) -> Self {
        Self {
            queue,
            topic: topic.into(),
            handler,
            config,
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Fetch, handle and commit one batch. Returns the number of deliveries
    /// in the batch.
    pub async fn poll_once(&self) -> EventResult<usize> {
        let batch = match self
            .queue
            .fetch(&self.topic, &self.config.group, self.config.batch_size)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.metrics.queue_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let Some(last_offset) = batch.last().map(|d| d.offset) else {
            return Ok(0);
        };

        for delivery in &batch {
            self.deliver(delivery).await;
        }

        if let Err(e) = self
            .queue
            .commit(&self.topic, &self.config.group, last_offset)
            .await
        {
            self.metrics.queue_errors.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        self.metrics.batches.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            topic = %self.topic,
            group = %self.config.group,
            count = batch.len(),
            last_offset,
            "Consumer batch committed"
        );
        Ok(batch.len())
    }

    async fn deliver(&self, delivery: &Delivery) {
        for attempt in 1..=self.config.max_attempts {
            match self.handler.handle(delivery).await {
                Ok(()) => {
                    self.metrics.processed.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(e) => {
                    self.metrics.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        topic = %self.topic,
                        offset = delivery.offset,
                        attempt,
                        error = %e,
                        "Message handler failed"
                    );
                    if attempt < self.config.max_attempts {
                        sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        self.metrics.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            topic = %self.topic,
            group = %self.config.group,
            offset = delivery.offset,
            max_attempts = self.config.max_attempts,
            "Skipping message after repeated handler failures"
        );
    }

    /// Poll until `shutdown_rx` turns true or its sender is dropped.
    ///
    /// Full batches are drained back to back; otherwise the consumer waits
    /// for the next tick.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> Arc<ConsumerMetrics> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            topic = %self.topic,
            group = %self.config.group,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Consumer started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!(topic = %self.topic, "Consumer shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    loop {
                        match self.poll_once().await {
                            Ok(n) if n >= self.config.batch_size => continue,
                            Ok(_) => break,
                            Err(e) => {
                                tracing::error!(topic = %self.topic, error = %e, "Consumer poll failed");
                                break;
                            }
                        }
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            topic = %self.topic,
            processed = snapshot.processed,
            skipped = snapshot.skipped,
            batches = snapshot.batches,
            queue_errors = snapshot.queue_errors,
            "Consumer stopped"
        );
        self.metrics
    }
}

/// Register `handler` on `topic` and run it on a background task.
pub fn subscribe<Q, H>(
    queue: Q,
    topic: impl Into<String>,
    handler: H,
    config: ConsumerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<ConsumerMetrics>>
where
    Q: MessageQueue,
    H: MessageHandler,
{
    let consumer = Consumer::new(queue, topic, handler, config);
    tokio::spawn(consumer.run(shutdown_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryMessageQueue, Message};
    use quill_core::EventError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<i64>>,
        fail_offset: Option<i64>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, delivery: &Delivery) -> EventResult<()> {
            if Some(delivery.offset) == self.fail_offset {
                return Err(EventError::HandlerFailed {
                    offset: delivery.offset,
                    reason: "boom".to_string(),
                });
            }
            self.seen.lock().unwrap().push(delivery.offset);
            Ok(())
        }
    }

    fn quick_config() -> ConsumerConfig {
        ConsumerConfig {
            batch_size: 2,
            retry_backoff: Duration::from_millis(1),
            ..ConsumerConfig::default()
        }
    }

    async fn queue_with(n: u8) -> InMemoryMessageQueue {
        let queue = InMemoryMessageQueue::default();
        for i in 0..n {
            queue.publish("t", Message::keyed("k", vec![i])).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn test_poll_once_commits_batch() {
        let queue = queue_with(3).await;
        let handler = Arc::new(Recorder::default());
        let consumer = Consumer::new(queue.clone(), "t", handler.clone(), quick_config());

        assert_eq!(consumer.poll_once().await.unwrap(), 2);
        assert_eq!(queue.committed_offset("t", "interactive").await, 2);
        assert_eq!(consumer.poll_once().await.unwrap(), 1);
        assert_eq!(consumer.poll_once().await.unwrap(), 0);

        assert_eq!(*handler.seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(consumer.metrics().snapshot().batches, 2);
    }

    #[tokio::test]
    async fn test_failing_message_is_skipped_after_retries() {
        let queue = queue_with(2).await;
        let handler = Arc::new(Recorder {
            fail_offset: Some(1),
            ..Default::default()
        });
        let consumer = Consumer::new(queue.clone(), "t", handler.clone(), quick_config());

        consumer.poll_once().await.unwrap();
        let snapshot = consumer.metrics().snapshot();
        assert_eq!(snapshot.failed_attempts, 3);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.processed, 1);
        assert_eq!(queue.committed_offset("t", "interactive").await, 2);
    }

    #[tokio::test]
    async fn test_subscribe_runs_until_shutdown() {
        let queue = queue_with(5).await;
        let handler = Arc::new(Recorder::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = subscribe(
            queue.clone(),
            "t",
            handler.clone(),
            quick_config().with_poll_interval(Duration::from_millis(5)),
            shutdown_rx,
        );

        for _ in 0..200 {
            if handler.seen.lock().unwrap().len() == 5 {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();

        assert_eq!(metrics.snapshot().processed, 5);
        assert_eq!(queue.committed_offset("t", "interactive").await, 5);
    }
}

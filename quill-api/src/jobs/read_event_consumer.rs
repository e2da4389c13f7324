//! Read-event consumer job.
//!
//! Subscribes to the read-event topic and increments the article read
//! counter for every delivered event. Each handler attempt is also counted
//! in Prometheus under the topic name.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{EventResult, READ_EVENT_TOPIC};
use quill_events::{
    subscribe, ConsumerConfig, ConsumerMetrics, Delivery, InteractionCounter, MessageHandler,
    MessageQueue, ReadEventConsumer,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::telemetry::metrics;

/// Wraps a handler and records each attempt's outcome.
pub struct MeteredHandler<H> {
    topic: &'static str,
    inner: H,
}

impl<H: MessageHandler> MeteredHandler<H> {
    pub fn new(topic: &'static str, inner: H) -> Self {
        Self { topic, inner }
    }
}

#[async_trait]
impl<H: MessageHandler> MessageHandler for MeteredHandler<H> {
    async fn handle(&self, delivery: &Delivery) -> EventResult<()> {
        let result = self.inner.handle(delivery).await;
        if let Some(metrics) = metrics() {
            metrics.record_consumed(self.topic, result.is_ok());
        }
        result
    }
}

/// Start consuming read events into `counter`.
///
/// Returns the consumer's task; it resolves to the final counters once the
/// shutdown signal flips to `true`.
pub fn spawn_read_event_consumer<Q, C>(
    queue: Q,
    counter: C,
    config: ConsumerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<Arc<ConsumerMetrics>>
where
    Q: MessageQueue,
    C: InteractionCounter,
{
    tracing::info!(
        topic = READ_EVENT_TOPIC,
        group = %config.group,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting read event consumer"
    );
    let handler = MeteredHandler::new(READ_EVENT_TOPIC, ReadEventConsumer::new(counter));
    subscribe(queue, READ_EVENT_TOPIC, handler, config, shutdown_rx)
}

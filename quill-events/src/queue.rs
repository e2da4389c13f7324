//! Message queue contract.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{EventResult, TimestampMs};

/// A message to publish. `key` selects ordering: messages with the same key
/// are delivered in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn keyed(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: Some(key.into()),
            payload,
        }
    }
}

/// A message as handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Position in the topic log; strictly increasing per topic.
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub published_at: TimestampMs,
}

/// Durable, offset-based topic log with per-group committed offsets.
///
/// Delivery is at-least-once: everything after a group's committed offset
/// is handed out again until the group commits past it.
#[async_trait]
pub trait MessageQueue: Send + Sync + 'static {
    async fn publish(&self, topic: &str, message: Message) -> EventResult<()>;

    /// Up to `max` deliveries after the group's committed offset, in order.
    async fn fetch(&self, topic: &str, group: &str, max: usize) -> EventResult<Vec<Delivery>>;

    /// Mark everything up to and including `offset` as consumed by `group`.
    /// Committing an offset lower than the current one is a no-op.
    async fn commit(&self, topic: &str, group: &str, offset: i64) -> EventResult<()>;
}

#[async_trait]
impl<Q: MessageQueue + ?Sized> MessageQueue for Arc<Q> {
    async fn publish(&self, topic: &str, message: Message) -> EventResult<()> {
        (**self).publish(topic, message).await
    }

    async fn fetch(&self, topic: &str, group: &str, max: usize) -> EventResult<Vec<Delivery>> {
        (**self).fetch(topic, group, max).await
    }

    async fn commit(&self, topic: &str, group: &str, offset: i64) -> EventResult<()> {
        (**self).commit(topic, group, offset).await
    }
}

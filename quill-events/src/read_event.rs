//! Read events: producer side and the counting consumer.

use async_trait::async_trait;
use quill_core::{EventError, EventResult, ReadEvent, ARTICLE_BIZ, READ_EVENT_TOPIC};

use crate::{Delivery, InteractionCounter, Message, MessageHandler, MessageQueue};

/// Something that can emit a [`ReadEvent`]. The repository holds this as a
/// trait object so it does not carry the queue type.
#[async_trait]
pub trait ReadEventPublisher: Send + Sync + 'static {
    async fn produce_read_event(&self, event: ReadEvent) -> EventResult<()>;
}

/// Publishes read events as JSON on [`READ_EVENT_TOPIC`], keyed by article id.
#[derive(Debug, Clone)]
pub struct ReadEventProducer<Q> {
    queue: Q,
}

impl<Q: MessageQueue> ReadEventProducer<Q> {
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl<Q: MessageQueue> ReadEventPublisher for ReadEventProducer<Q> {
    async fn produce_read_event(&self, event: ReadEvent) -> EventResult<()> {
        let payload = serde_json::to_vec(&event).map_err(|e| EventError::PublishFailed {
            topic: READ_EVENT_TOPIC.to_string(),
            reason: e.to_string(),
        })?;
        self.queue
            .publish(READ_EVENT_TOPIC, Message::keyed(event.key(), payload))
            .await
    }
}

/// Increments the article read counter once per delivered event.
///
/// Redelivered events are counted again; read counts are approximate.
#[derive(Debug, Clone)]
pub struct ReadEventConsumer<C> {
    counter: C,
}

impl<C: InteractionCounter> ReadEventConsumer<C> {
    pub fn new(counter: C) -> Self {
        Self { counter }
    }

    pub fn decode(delivery: &Delivery) -> EventResult<ReadEvent> {
        serde_json::from_slice(&delivery.payload).map_err(|e| EventError::Decode {
            offset: delivery.offset,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl<C: InteractionCounter> MessageHandler for ReadEventConsumer<C> {
    async fn handle(&self, delivery: &Delivery) -> EventResult<()> {
        let event = match Self::decode(delivery) {
            Ok(event) => event,
            Err(e) => {
                // Retrying cannot fix a malformed payload.
                tracing::warn!(offset = delivery.offset, error = %e, "Dropping undecodable read event");
                return Ok(());
            }
        };

        self.counter
            .incr_read_count(ARTICLE_BIZ, event.article_id)
            .await
            .map_err(|e| EventError::HandlerFailed {
                offset: delivery.offset,
                reason: e.to_string(),
            })?;

        tracing::trace!(
            article_id = event.article_id,
            reader_id = event.reader_id,
            "Read counted"
        );
        Ok(())
    }
}

//! In-process message queue with the same offset semantics as the Postgres log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{Clock, EventError, EventResult, SystemClock};
use tokio::sync::RwLock;

use crate::{Delivery, Message, MessageQueue};

#[derive(Debug, Default)]
struct QueueState {
    topics: HashMap<String, Vec<Delivery>>,
    committed: HashMap<(String, String), i64>,
}

/// Message queue held in memory. Offsets start at 1 per topic.
#[derive(Debug, Clone)]
pub struct InMemoryMessageQueue {
    state: Arc<RwLock<QueueState>>,
    clock: Arc<dyn Clock>,
    fail_publishes: Arc<AtomicBool>,
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemoryMessageQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(QueueState::default())),
            clock,
            fail_publishes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every publish fail until turned off again.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// All messages ever published to `topic`.
    pub async fn published(&self, topic: &str) -> Vec<Delivery> {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn committed_offset(&self, topic: &str, group: &str) -> i64 {
        self.state
            .read()
            .await
            .committed
            .get(&(topic.to_string(), group.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, topic: &str, message: Message) -> EventResult<()> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(EventError::PublishFailed {
                topic: topic.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        let mut state = self.state.write().await;
        let log = state.topics.entry(topic.to_string()).or_default();
        let offset = log.len() as i64 + 1;
        log.push(Delivery {
            offset,
            key: message.key,
            payload: message.payload,
            published_at: self.clock.now_millis(),
        });
        Ok(())
    }

    async fn fetch(&self, topic: &str, group: &str, max: usize) -> EventResult<Vec<Delivery>> {
        let state = self.state.read().await;
        let committed = state
            .committed
            .get(&(topic.to_string(), group.to_string()))
            .copied()
            .unwrap_or(0);
        Ok(state
            .topics
            .get(topic)
            .map(|log| {
                log.iter()
                    .filter(|d| d.offset > committed)
                    .take(max)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, topic: &str, group: &str, offset: i64) -> EventResult<()> {
        let mut state = self.state.write().await;
        let current = state
            .committed
            .entry((topic.to_string(), group.to_string()))
            .or_insert(0);
        *current = (*current).max(offset);
        Ok(())
    }
}

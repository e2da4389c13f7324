//! Postgres-backed topic log.
//!
//! Messages are rows in `mq_messages`; each consumer group keeps its
//! committed offset in `mq_consumer_offsets`. Fetches only return rows older
//! than `settle_delay`: a `BIGSERIAL` value is assigned before its insert
//! commits, so a row with a lower offset can become visible after a higher
//! one. Waiting out that window keeps a group from committing past it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use quill_core::{Clock, EventError, EventResult, StorageError, StorageResult};
use tracing::info;

use crate::{Delivery, Message, MessageQueue};

/// DDL for the queue and interaction tables.
pub const EVENTS_SCHEMA_SQL: &str = include_str!("../sql/events.sql");

/// Default visibility delay for freshly published rows.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct PgMessageLog {
    pool: Pool,
    clock: Arc<dyn Clock>,
    settle_delay: Duration,
}

impl PgMessageLog {
    pub fn new(pool: Pool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Create the queue and interaction tables if they do not exist yet.
    pub async fn apply_schema(&self) -> StorageResult<()> {
        let client = self.pool.get().await.map_err(|e| StorageError::Pool {
            reason: e.to_string(),
        })?;
        client
            .batch_execute(EVENTS_SCHEMA_SQL)
            .await
            .map_err(|e| StorageError::QueryFailed {
                reason: e.to_string(),
            })?;
        info!("Event schema applied");
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for PgMessageLog {
    async fn publish(&self, topic: &str, message: Message) -> EventResult<()> {
        let publish_err = |reason: String| EventError::PublishFailed {
            topic: topic.to_string(),
            reason,
        };

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| publish_err(e.to_string()))?;
        client
            .execute(
                "INSERT INTO mq_messages (topic, msg_key, payload, ctime) VALUES ($1, $2, $3, $4)",
                &[&topic, &message.key, &message.payload, &self.clock.now_millis()],
            )
            .await
            .map_err(|e| publish_err(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, topic: &str, group: &str, max: usize) -> EventResult<Vec<Delivery>> {
        let fetch_err = |reason: String| EventError::FetchFailed {
            topic: topic.to_string(),
            group: group.to_string(),
            reason,
        };

        let visible_before =
            self.clock.now_millis() - i64::try_from(self.settle_delay.as_millis()).unwrap_or(0);
        let limit = i64::try_from(max).unwrap_or(i64::MAX);

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let rows = client
            .query(
                "SELECT offset_id, msg_key, payload, ctime FROM mq_messages \
                 WHERE topic = $1 \
                   AND offset_id > COALESCE( \
                       (SELECT committed FROM mq_consumer_offsets \
                        WHERE topic = $1 AND consumer_group = $2), 0) \
                   AND ctime <= $3 \
                 ORDER BY offset_id \
                 LIMIT $4",
                &[&topic, &group, &visible_before, &limit],
            )
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Delivery {
                    offset: row.try_get("offset_id").map_err(|e| fetch_err(e.to_string()))?,
                    key: row.try_get("msg_key").map_err(|e| fetch_err(e.to_string()))?,
                    payload: row.try_get("payload").map_err(|e| fetch_err(e.to_string()))?,
                    published_at: row.try_get("ctime").map_err(|e| fetch_err(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn commit(&self, topic: &str, group: &str, offset: i64) -> EventResult<()> {
        let commit_err = |reason: String| EventError::CommitFailed {
            topic: topic.to_string(),
            group: group.to_string(),
            reason,
        };

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| commit_err(e.to_string()))?;
        client
            .execute(
                "INSERT INTO mq_consumer_offsets (topic, consumer_group, committed, utime) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (topic, consumer_group) DO UPDATE SET \
                     committed = GREATEST(mq_consumer_offsets.committed, EXCLUDED.committed), \
                     utime = EXCLUDED.utime",
                &[&topic, &group, &offset, &self.clock.now_millis()],
            )
            .await
            .map_err(|e| commit_err(e.to_string()))?;
        Ok(())
    }
}

#[cfg(all(test, feature = "db-tests"))]
mod db_tests {
    use super::*;
    use deadpool_postgres::{Config, Runtime};
    use quill_core::SystemClock;
    use tokio_postgres::NoTls;

    fn test_log() -> PgMessageLog {
        let url = std::env::var("QUILL_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost/quill_test".to_string());
        let mut cfg = Config::new();
        cfg.url = Some(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .expect("pool creation should succeed");
        PgMessageLog::new(pool, Arc::new(SystemClock)).with_settle_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_pg_log_fetch_and_commit() {
        let log = test_log();
        log.apply_schema().await.unwrap();
        let topic = format!("test-{}", SystemClock.now_millis());

        log.publish(&topic, Message::keyed("1", b"a".to_vec()))
            .await
            .unwrap();
        log.publish(&topic, Message::keyed("1", b"b".to_vec()))
            .await
            .unwrap();

        let batch = log.fetch(&topic, "g", 10).await.unwrap();
        assert_eq!(batch.len(), 2);
        log.commit(&topic, "g", batch[0].offset).await.unwrap();

        let rest = log.fetch(&topic, "g", 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].payload, b"b".to_vec());
    }
}

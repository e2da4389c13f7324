//! Interaction counters keyed by `(biz, biz_id)`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use quill_core::{Clock, StorageError, StorageResult, TimestampMs, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Counters for one business object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub biz: String,
    pub biz_id: i64,
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
}

impl Interaction {
    /// All-zero counters, returned for objects nobody has touched yet.
    pub fn empty(biz: &str, biz_id: i64) -> Self {
        Self {
            biz: biz.to_string(),
            biz_id,
            read_cnt: 0,
            like_cnt: 0,
            collect_cnt: 0,
        }
    }
}

#[async_trait]
pub trait InteractionCounter: Send + Sync + 'static {
    /// Add one read. Creates the row on first use.
    async fn incr_read_count(&self, biz: &str, biz_id: i64) -> StorageResult<()>;

    /// Record that `uid` likes the object. Liking twice counts once.
    async fn like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()>;

    /// Undo a like by `uid`. A no-op when `uid` does not like the object.
    async fn cancel_like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()>;

    /// File the object into collection `cid` of `uid`. Each user counts once
    /// per object, whichever collection it lands in.
    async fn collect(&self, biz: &str, biz_id: i64, cid: i64, uid: UserId) -> StorageResult<()>;

    /// Current counters; zeroes when no row exists.
    async fn get(&self, biz: &str, biz_id: i64) -> StorageResult<Interaction>;
}

#[async_trait]
impl<C: InteractionCounter + ?Sized> InteractionCounter for Arc<C> {
    async fn incr_read_count(&self, biz: &str, biz_id: i64) -> StorageResult<()> {
        (**self).incr_read_count(biz, biz_id).await
    }

    async fn like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        (**self).like(biz, biz_id, uid).await
    }

    async fn cancel_like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        (**self).cancel_like(biz, biz_id, uid).await
    }

    async fn collect(&self, biz: &str, biz_id: i64, cid: i64, uid: UserId) -> StorageResult<()> {
        (**self).collect(biz, biz_id, cid, uid).await
    }

    async fn get(&self, biz: &str, biz_id: i64) -> StorageResult<Interaction> {
        (**self).get(biz, biz_id).await
    }
}

// ============================================================================
// POSTGRES
// ============================================================================

/// Counter stored in the `interactives` table.
#[derive(Clone)]
pub struct PgInteractionCounter {
    pool: Pool,
    clock: Arc<dyn Clock>,
}

impl PgInteractionCounter {
    pub fn new(pool: Pool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

fn query_err(e: tokio_postgres::Error) -> StorageError {
    StorageError::QueryFailed {
        reason: e.to_string(),
    }
}

fn pool_err(e: deadpool_postgres::PoolError) -> StorageError {
    StorageError::Pool {
        reason: e.to_string(),
    }
}

fn tx_err(e: tokio_postgres::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

/// Shift one counter column by `delta`, creating the row on first use.
/// Counters never drop below zero.
fn bump_sql(column: &str) -> String {
    format!(
        "INSERT INTO interactives (biz, biz_id, {column}, ctime, utime) \
         VALUES ($1, $2, GREATEST($3::BIGINT, 0), $4, $4) \
         ON CONFLICT (biz, biz_id) DO UPDATE SET \
             {column} = GREATEST(interactives.{column} + $3, 0), \
             utime = EXCLUDED.utime"
    )
}

impl PgInteractionCounter {
    /// Run `marker` and, when it changed a row, bump `column` by `delta`,
    /// all in one transaction.
    async fn toggle(
        &self,
        marker: &str,
        marker_params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        column: &str,
        biz: &str,
        biz_id: i64,
        delta: i64,
    ) -> StorageResult<()> {
        let now: TimestampMs = self.clock.now_millis();
        let mut conn = self.pool.get().await.map_err(pool_err)?;
        let tx = conn.transaction().await.map_err(tx_err)?;

        let changed = tx.execute(marker, marker_params).await.map_err(query_err)?;
        if changed > 0 {
            tx.execute(bump_sql(column).as_str(), &[&biz, &biz_id, &delta, &now])
                .await
                .map_err(query_err)?;
        }
        tx.commit().await.map_err(tx_err)?;
        Ok(())
    }
}

#[async_trait]
impl InteractionCounter for PgInteractionCounter {
    async fn incr_read_count(&self, biz: &str, biz_id: i64) -> StorageResult<()> {
        let now: TimestampMs = self.clock.now_millis();
        let conn = self.pool.get().await.map_err(pool_err)?;
        conn.execute(
            "INSERT INTO interactives (biz, biz_id, read_cnt, ctime, utime) \
             VALUES ($1, $2, 1, $3, $3) \
             ON CONFLICT (biz, biz_id) DO UPDATE SET \
                 read_cnt = interactives.read_cnt + 1, \
                 utime = EXCLUDED.utime",
            &[&biz, &biz_id, &now],
        )
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        let now: TimestampMs = self.clock.now_millis();
        self.toggle(
            "INSERT INTO user_like_bizs (uid, biz, biz_id, status, ctime, utime) \
             VALUES ($1, $2, $3, 1, $4, $4) \
             ON CONFLICT (uid, biz, biz_id) DO UPDATE SET status = 1, utime = EXCLUDED.utime \
             WHERE user_like_bizs.status = 0",
            &[&uid, &biz, &biz_id, &now],
            "like_cnt",
            biz,
            biz_id,
            1,
        )
        .await
    }

    async fn cancel_like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        let now: TimestampMs = self.clock.now_millis();
        self.toggle(
            "UPDATE user_like_bizs SET status = 0, utime = $4 \
             WHERE uid = $1 AND biz = $2 AND biz_id = $3 AND status = 1",
            &[&uid, &biz, &biz_id, &now],
            "like_cnt",
            biz,
            biz_id,
            -1,
        )
        .await
    }

    async fn collect(&self, biz: &str, biz_id: i64, cid: i64, uid: UserId) -> StorageResult<()> {
        let now: TimestampMs = self.clock.now_millis();
        self.toggle(
            "INSERT INTO user_collection_bizs (uid, cid, biz, biz_id, ctime, utime) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             ON CONFLICT (uid, biz, biz_id) DO NOTHING",
            &[&uid, &cid, &biz, &biz_id, &now],
            "collect_cnt",
            biz,
            biz_id,
            1,
        )
        .await
    }

    async fn get(&self, biz: &str, biz_id: i64) -> StorageResult<Interaction> {
        let conn = self.pool.get().await.map_err(pool_err)?;
        let row = conn
            .query_opt(
                "SELECT read_cnt, like_cnt, collect_cnt FROM interactives \
                 WHERE biz = $1 AND biz_id = $2",
                &[&biz, &biz_id],
            )
            .await
            .map_err(query_err)?;

        let Some(row) = row else {
            return Ok(Interaction::empty(biz, biz_id));
        };
        Ok(Interaction {
            biz: biz.to_string(),
            biz_id,
            read_cnt: row.try_get("read_cnt").map_err(query_err)?,
            like_cnt: row.try_get("like_cnt").map_err(query_err)?,
            collect_cnt: row.try_get("collect_cnt").map_err(query_err)?,
        })
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

type BizKey = (String, i64);

#[derive(Debug, Default)]
struct CounterState {
    counts: HashMap<BizKey, Interaction>,
    likes: HashSet<(UserId, BizKey)>,
    collections: HashMap<(UserId, BizKey), i64>,
}

impl CounterState {
    fn entry(&mut self, biz: &str, biz_id: i64) -> &mut Interaction {
        self.counts
            .entry((biz.to_string(), biz_id))
            .or_insert_with(|| Interaction::empty(biz, biz_id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryInteractionCounter {
    state: Arc<Mutex<CounterState>>,
}

impl InMemoryInteractionCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionCounter for InMemoryInteractionCounter {
    async fn incr_read_count(&self, biz: &str, biz_id: i64) -> StorageResult<()> {
        self.state.lock().await.entry(biz, biz_id).read_cnt += 1;
        Ok(())
    }

    async fn like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if state.likes.insert((uid, (biz.to_string(), biz_id))) {
            state.entry(biz, biz_id).like_cnt += 1;
        }
        Ok(())
    }

    async fn cancel_like(&self, biz: &str, biz_id: i64, uid: UserId) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if state.likes.remove(&(uid, (biz.to_string(), biz_id))) {
            let interaction = state.entry(biz, biz_id);
            interaction.like_cnt = (interaction.like_cnt - 1).max(0);
        }
        Ok(())
    }

    async fn collect(&self, biz: &str, biz_id: i64, cid: i64, uid: UserId) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        let key = (uid, (biz.to_string(), biz_id));
        if !state.collections.contains_key(&key) {
            state.collections.insert(key, cid);
            state.entry(biz, biz_id).collect_cnt += 1;
        }
        Ok(())
    }

    async fn get(&self, biz: &str, biz_id: i64) -> StorageResult<Interaction> {
        Ok(self
            .state
            .lock()
            .await
            .counts
            .get(&(biz.to_string(), biz_id))
            .cloned()
            .unwrap_or_else(|| Interaction::empty(biz, biz_id)))
    }
}

//! `articles` and `published_articles` on Postgres.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use futures_util::future::BoxFuture;
use quill_core::{
    ArticleId, ArticleStatus, EntityKind, StorageError, StorageResult, TimestampMs, UserId,
};
use tokio_postgres::{GenericClient, Row, Transaction};
use tracing::warn;

use super::{pool_err, query_err, tx_err};
use crate::{ArticleRecord, ArticleStore, ArticleTx, DraftStore, PublishedStore};

const COLUMNS: &str = "id, title, content, author_id, status, ctime, utime";

fn record_from_row(row: &Row) -> StorageResult<ArticleRecord> {
    Ok(ArticleRecord {
        id: row.try_get("id").map_err(query_err)?,
        title: row.try_get("title").map_err(query_err)?,
        content: row.try_get("content").map_err(query_err)?,
        author_id: row.try_get("author_id").map_err(query_err)?,
        status: row.try_get("status").map_err(query_err)?,
        ctime: row.try_get("ctime").map_err(query_err)?,
        utime: row.try_get("utime").map_err(query_err)?,
    })
}

fn not_owned(id: ArticleId, author_id: UserId) -> StorageError {
    StorageError::NotFoundOrNotOwned {
        entity: EntityKind::Article,
        id,
        author_id,
    }
}

// ============================================================================
// SHARED STATEMENTS
// ============================================================================

async fn insert_draft<C: GenericClient + Sync>(
    client: &C,
    record: &ArticleRecord,
    now: TimestampMs,
) -> StorageResult<ArticleId> {
    let row = client
        .query_one(
            "INSERT INTO articles (title, content, author_id, status, ctime, utime) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING id",
            &[
                &record.title,
                &record.content,
                &record.author_id,
                &record.status,
                &now,
            ],
        )
        .await
        .map_err(|e| StorageError::InsertFailed {
            entity: EntityKind::Article,
            reason: e.to_string(),
        })?;
    row.try_get(0).map_err(query_err)
}

async fn update_draft<C: GenericClient + Sync>(
    client: &C,
    record: &ArticleRecord,
    now: TimestampMs,
) -> StorageResult<()> {
    let affected = client
        .execute(
            "UPDATE articles SET title = $1, content = $2, status = $3, utime = $4 \
             WHERE id = $5 AND author_id = $6",
            &[
                &record.title,
                &record.content,
                &record.status,
                &now,
                &record.id,
                &record.author_id,
            ],
        )
        .await
        .map_err(query_err)?;
    if affected == 0 {
        return Err(not_owned(record.id, record.author_id));
    }
    Ok(())
}

async fn set_draft_status<C: GenericClient + Sync>(
    client: &C,
    id: ArticleId,
    author_id: UserId,
    status: ArticleStatus,
    now: TimestampMs,
) -> StorageResult<()> {
    let affected = client
        .execute(
            "UPDATE articles SET status = $1, utime = $2 WHERE id = $3 AND author_id = $4",
            &[&status.as_i16(), &now, &id, &author_id],
        )
        .await
        .map_err(query_err)?;
    if affected != 1 {
        return Err(not_owned(id, author_id));
    }
    Ok(())
}

async fn find_draft<C: GenericClient + Sync>(
    client: &C,
    id: ArticleId,
) -> StorageResult<Option<ArticleRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM articles WHERE id = $1");
    let row = client.query_opt(sql.as_str(), &[&id]).await.map_err(query_err)?;
    row.as_ref().map(record_from_row).transpose()
}

async fn list_drafts_by_author<C: GenericClient + Sync>(
    client: &C,
    author_id: UserId,
    offset: i64,
    limit: i64,
) -> StorageResult<Vec<ArticleRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM articles WHERE author_id = $1 \
         ORDER BY utime DESC, id DESC LIMIT $2 OFFSET $3"
    );
    let rows = client
        .query(sql.as_str(), &[&author_id, &limit, &offset])
        .await
        .map_err(query_err)?;
    rows.iter().map(record_from_row).collect()
}

async fn upsert_published<C: GenericClient + Sync>(
    client: &C,
    record: &ArticleRecord,
    now: TimestampMs,
) -> StorageResult<()> {
    client
        .execute(
            "INSERT INTO published_articles (id, title, content, author_id, status, ctime, utime) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                 title = EXCLUDED.title, \
                 content = EXCLUDED.content, \
                 status = EXCLUDED.status, \
                 utime = EXCLUDED.utime",
            &[
                &record.id,
                &record.title,
                &record.content,
                &record.author_id,
                &record.status,
                &now,
            ],
        )
        .await
        .map_err(query_err)?;
    Ok(())
}

async fn set_published_status<C: GenericClient + Sync>(
    client: &C,
    id: ArticleId,
    status: ArticleStatus,
    now: TimestampMs,
) -> StorageResult<u64> {
    client
        .execute(
            "UPDATE published_articles SET status = $1, utime = $2 WHERE id = $3",
            &[&status.as_i16(), &now, &id],
        )
        .await
        .map_err(query_err)
}

async fn find_published<C: GenericClient + Sync>(
    client: &C,
    id: ArticleId,
) -> StorageResult<Option<ArticleRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM published_articles WHERE id = $1");
    let row = client.query_opt(sql.as_str(), &[&id]).await.map_err(query_err)?;
    row.as_ref().map(record_from_row).transpose()
}

// ============================================================================
// POOLED STORE
// ============================================================================

/// Article store over a deadpool pool. Each call checks out its own connection.
#[derive(Clone)]
pub struct PgArticleStore {
    pool: Pool,
}

impl PgArticleStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(pool_err)
    }
}

#[async_trait]
impl DraftStore for PgArticleStore {
    async fn insert_draft(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<ArticleId> {
        let conn = self.conn().await?;
        insert_draft(&**conn, record, now).await
    }

    async fn update_draft(&self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()> {
        let conn = self.conn().await?;
        update_draft(&**conn, record, now).await
    }

    async fn set_draft_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()> {
        let conn = self.conn().await?;
        set_draft_status(&**conn, id, author_id, status, now).await
    }

    async fn find_draft(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        let conn = self.conn().await?;
        find_draft(&**conn, id).await
    }

    async fn list_drafts_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<ArticleRecord>> {
        let conn = self.conn().await?;
        list_drafts_by_author(&**conn, author_id, offset, limit).await
    }
}

#[async_trait]
impl PublishedStore for PgArticleStore {
    async fn upsert_published(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<()> {
        let conn = self.conn().await?;
        upsert_published(&**conn, record, now).await
    }

    async fn set_published_status(
        &self,
        id: ArticleId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<u64> {
        let conn = self.conn().await?;
        set_published_status(&**conn, id, status, now).await
    }

    async fn find_published(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        let conn = self.conn().await?;
        find_published(&**conn, id).await
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn with_transaction<T, F>(&self, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t dyn ArticleTx) -> BoxFuture<'t, StorageResult<T>> + Send + 'static,
    {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(tx_err)?;

        let outcome = {
            let handle = PgArticleTx { tx: &*tx };
            work(&handle).await
        };

        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(tx_err)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, cause = %e, "Article transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

// ============================================================================
// TRANSACTION HANDLE
// ============================================================================

/// Both article tables seen through one open transaction.
pub struct PgArticleTx<'a, 'c> {
    tx: &'a Transaction<'c>,
}

#[async_trait]
impl DraftStore for PgArticleTx<'_, '_> {
    async fn insert_draft(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<ArticleId> {
        insert_draft(self.tx, record, now).await
    }

    async fn update_draft(&self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()> {
        update_draft(self.tx, record, now).await
    }

    async fn set_draft_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()> {
        set_draft_status(self.tx, id, author_id, status, now).await
    }

    async fn find_draft(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        find_draft(self.tx, id).await
    }

    async fn list_drafts_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<ArticleRecord>> {
        list_drafts_by_author(self.tx, author_id, offset, limit).await
    }
}

#[async_trait]
impl PublishedStore for PgArticleTx<'_, '_> {
    async fn upsert_published(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<()> {
        upsert_published(self.tx, record, now).await
    }

    async fn set_published_status(
        &self,
        id: ArticleId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<u64> {
        set_published_status(self.tx, id, status, now).await
    }

    async fn find_published(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        find_published(self.tx, id).await
    }
}

//! Store traits for the draft and published article tables.
//!
//! Both the pooled store and a transaction handle implement the same
//! per-table traits, so the write algorithms in the repository are written
//! once and run either standalone or inside [`ArticleStore::with_transaction`].

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use quill_core::{ArticleId, ArticleStatus, StorageResult, TimestampMs, UserId};

use crate::ArticleRecord;

/// Access to the `articles` (draft) table.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Insert a new draft with `ctime = utime = now`; returns the store-assigned id.
    async fn insert_draft(&self, record: &ArticleRecord, now: TimestampMs)
        -> StorageResult<ArticleId>;

    /// Overwrite title, content, status and utime of the draft with
    /// `record.id`, only if it belongs to `record.author_id`.
    ///
    /// Zero affected rows is `StorageError::NotFoundOrNotOwned`.
    async fn update_draft(&self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()>;

    /// Set status and utime on an owned draft. Same ownership rule as
    /// [`DraftStore::update_draft`].
    async fn set_draft_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()>;

    async fn find_draft(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>>;

    /// Drafts of one author ordered by utime descending.
    async fn list_drafts_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<ArticleRecord>>;
}

/// Access to the `published_articles` table.
#[async_trait]
pub trait PublishedStore: Send + Sync {
    /// Insert, or on id conflict overwrite title, content, status and utime.
    /// An existing row keeps its ctime.
    async fn upsert_published(&self, record: &ArticleRecord, now: TimestampMs)
        -> StorageResult<()>;

    /// Set status and utime; returns the number of rows touched (0 or 1).
    async fn set_published_status(
        &self,
        id: ArticleId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<u64>;

    async fn find_published(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>>;
}

/// Handle passed to the closure of [`ArticleStore::with_transaction`].
///
/// Everything done through it commits or rolls back together.
pub trait ArticleTx: DraftStore + PublishedStore {}

impl<T: DraftStore + PublishedStore> ArticleTx for T {}

/// A store that owns both article tables and can write them atomically.
#[async_trait]
pub trait ArticleStore: DraftStore + PublishedStore + 'static {
    /// Run `work` inside one transaction spanning both tables.
    ///
    /// Commits when `work` returns `Ok`, rolls back otherwise. The error from
    /// `work` is returned unchanged; commit failures are
    /// `StorageError::TransactionFailed`.
    async fn with_transaction<T, F>(&self, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t dyn ArticleTx) -> BoxFuture<'t, StorageResult<T>> + Send + 'static;
}

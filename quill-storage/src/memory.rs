//! In-memory stores for tests and local runs.
//!
//! [`InMemoryArticleStore`] gives the same transactional guarantee as the
//! Postgres store: a transaction works on a private copy of both tables and
//! swaps it in on commit, so a failed transaction leaves no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use quill_core::{
    ArticleId, ArticleStatus, EntityKind, StorageError, StorageResult, TimestampMs, UserId,
};

use crate::{
    ArticleRecord, ArticleStore, ArticleTx, AuthorLookup, DraftStore, PublishedStore, UserProfile,
};

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Default, Clone)]
struct Tables {
    drafts: BTreeMap<ArticleId, ArticleRecord>,
    published: BTreeMap<ArticleId, ArticleRecord>,
    last_id: ArticleId,
}

impl Tables {
    fn insert_draft(&mut self, record: &ArticleRecord, now: TimestampMs) -> ArticleId {
        self.last_id += 1;
        let id = self.last_id;
        let row = ArticleRecord {
            id,
            ctime: now,
            utime: now,
            ..record.clone()
        };
        self.drafts.insert(id, row);
        id
    }

    fn owned_draft_mut(
        &mut self,
        id: ArticleId,
        author_id: UserId,
    ) -> StorageResult<&mut ArticleRecord> {
        match self.drafts.get_mut(&id) {
            Some(row) if row.author_id == author_id => Ok(row),
            _ => Err(StorageError::NotFoundOrNotOwned {
                entity: EntityKind::Article,
                id,
                author_id,
            }),
        }
    }

    fn update_draft(&mut self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()> {
        let row = self.owned_draft_mut(record.id, record.author_id)?;
        row.title = record.title.clone();
        row.content = record.content.clone();
        row.status = record.status;
        row.utime = now;
        Ok(())
    }

    fn set_draft_status(
        &mut self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()> {
        let row = self.owned_draft_mut(id, author_id)?;
        row.status = status.as_i16();
        row.utime = now;
        Ok(())
    }

    fn list_drafts_by_author(&self, author_id: UserId, offset: i64, limit: i64) -> Vec<ArticleRecord> {
        let mut rows: Vec<ArticleRecord> = self
            .drafts
            .values()
            .filter(|row| row.author_id == author_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.utime.cmp(&a.utime).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }

    fn upsert_published(&mut self, record: &ArticleRecord, now: TimestampMs) {
        self.published
            .entry(record.id)
            .and_modify(|row| {
                row.title = record.title.clone();
                row.content = record.content.clone();
                row.status = record.status;
                row.utime = now;
            })
            .or_insert_with(|| ArticleRecord {
                ctime: now,
                utime: now,
                ..record.clone()
            });
    }

    fn set_published_status(&mut self, id: ArticleId, status: ArticleStatus, now: TimestampMs) -> u64 {
        match self.published.get_mut(&id) {
            Some(row) => {
                row.status = status.as_i16();
                row.utime = now;
                1
            }
            None => 0,
        }
    }
}

// ============================================================================
// CALL COUNTERS AND FAULTS
// ============================================================================

/// Snapshot of how often the store was queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub draft_reads: u64,
    pub published_reads: u64,
    pub writes: u64,
    pub transactions: u64,
}

#[derive(Debug, Default)]
struct Instrumentation {
    draft_reads: AtomicU64,
    published_reads: AtomicU64,
    writes: AtomicU64,
    transactions: AtomicU64,
    fail_published_writes: AtomicBool,
}

impl Instrumentation {
    fn check_published_fault(&self) -> StorageResult<()> {
        if self.fail_published_writes.load(Ordering::SeqCst) {
            return Err(StorageError::QueryFailed {
                reason: "injected published-store failure".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// ARTICLE STORE
// ============================================================================

/// In-memory draft + published tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArticleStore {
    tables: Arc<tokio::sync::Mutex<Tables>>,
    instrumentation: Arc<Instrumentation>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every published-table write fail until turned off again.
    pub fn fail_published_writes(&self, fail: bool) {
        self.instrumentation
            .fail_published_writes
            .store(fail, Ordering::SeqCst);
    }

    pub fn call_counts(&self) -> StoreCallCounts {
        let i = &self.instrumentation;
        StoreCallCounts {
            draft_reads: i.draft_reads.load(Ordering::SeqCst),
            published_reads: i.published_reads.load(Ordering::SeqCst),
            writes: i.writes.load(Ordering::SeqCst),
            transactions: i.transactions.load(Ordering::SeqCst),
        }
    }

    /// Read a draft row without touching the call counters.
    pub async fn peek_draft(&self, id: ArticleId) -> Option<ArticleRecord> {
        self.tables.lock().await.drafts.get(&id).cloned()
    }

    /// Read a published row without touching the call counters.
    pub async fn peek_published(&self, id: ArticleId) -> Option<ArticleRecord> {
        self.tables.lock().await.published.get(&id).cloned()
    }

    pub async fn draft_count(&self) -> usize {
        self.tables.lock().await.drafts.len()
    }

    pub async fn published_count(&self) -> usize {
        self.tables.lock().await.published.len()
    }
}

#[async_trait]
impl DraftStore for InMemoryArticleStore {
    async fn insert_draft(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<ArticleId> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.insert_draft(record, now))
    }

    async fn update_draft(&self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().await.update_draft(record, now)
    }

    async fn set_draft_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .await
            .set_draft_status(id, author_id, status, now)
    }

    async fn find_draft(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        self.instrumentation.draft_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.drafts.get(&id).cloned())
    }

    async fn list_drafts_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<ArticleRecord>> {
        self.instrumentation.draft_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tables
            .lock()
            .await
            .list_drafts_by_author(author_id, offset, limit))
    }
}

#[async_trait]
impl PublishedStore for InMemoryArticleStore {
    async fn upsert_published(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<()> {
        self.instrumentation.check_published_fault()?;
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().await.upsert_published(record, now);
        Ok(())
    }

    async fn set_published_status(
        &self,
        id: ArticleId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<u64> {
        self.instrumentation.check_published_fault()?;
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.set_published_status(id, status, now))
    }

    async fn find_published(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        self.instrumentation
            .published_reads
            .fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.published.get(&id).cloned())
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn with_transaction<T, F>(&self, work: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: for<'t> FnOnce(&'t dyn ArticleTx) -> BoxFuture<'t, StorageResult<T>> + Send + 'static,
    {
        self.instrumentation
            .transactions
            .fetch_add(1, Ordering::SeqCst);

        // Held for the whole transaction; concurrent transactions serialize.
        let mut committed = self.tables.lock().await;
        let tx = MemoryTx {
            working: Mutex::new(committed.clone()),
            instrumentation: Arc::clone(&self.instrumentation),
        };

        let value = work(&tx).await?;

        let working = tx
            .working
            .into_inner()
            .map_err(|_| StorageError::LockPoisoned)?;
        *committed = working;
        Ok(value)
    }
}

/// Transaction handle over a private copy of the tables.
struct MemoryTx {
    working: Mutex<Tables>,
    instrumentation: Arc<Instrumentation>,
}

impl MemoryTx {
    fn with_tables<R>(&self, f: impl FnOnce(&mut Tables) -> StorageResult<R>) -> StorageResult<R> {
        let mut tables = self
            .working
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?;
        f(&mut tables)
    }
}

#[async_trait]
impl DraftStore for MemoryTx {
    async fn insert_draft(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<ArticleId> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| Ok(t.insert_draft(record, now)))
    }

    async fn update_draft(&self, record: &ArticleRecord, now: TimestampMs) -> StorageResult<()> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| t.update_draft(record, now))
    }

    async fn set_draft_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<()> {
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| t.set_draft_status(id, author_id, status, now))
    }

    async fn find_draft(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        self.instrumentation.draft_reads.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| Ok(t.drafts.get(&id).cloned()))
    }

    async fn list_drafts_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> StorageResult<Vec<ArticleRecord>> {
        self.instrumentation.draft_reads.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| Ok(t.list_drafts_by_author(author_id, offset, limit)))
    }
}

#[async_trait]
impl PublishedStore for MemoryTx {
    async fn upsert_published(
        &self,
        record: &ArticleRecord,
        now: TimestampMs,
    ) -> StorageResult<()> {
        self.instrumentation.check_published_fault()?;
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| {
            t.upsert_published(record, now);
            Ok(())
        })
    }

    async fn set_published_status(
        &self,
        id: ArticleId,
        status: ArticleStatus,
        now: TimestampMs,
    ) -> StorageResult<u64> {
        self.instrumentation.check_published_fault()?;
        self.instrumentation.writes.fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| Ok(t.set_published_status(id, status, now)))
    }

    async fn find_published(&self, id: ArticleId) -> StorageResult<Option<ArticleRecord>> {
        self.instrumentation
            .published_reads
            .fetch_add(1, Ordering::SeqCst);
        self.with_tables(|t| Ok(t.published.get(&id).cloned()))
    }
}

// ============================================================================
// USER STORE
// ============================================================================

/// In-memory user directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, UserProfile>>>,
    lookups: Arc<AtomicU64>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: UserProfile) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        users.insert(profile.id, profile);
        Ok(())
    }

    pub fn remove(&self, id: UserId) -> StorageResult<()> {
        let mut users = self.users.write().map_err(|_| StorageError::LockPoisoned)?;
        users.remove(&id);
        Ok(())
    }

    /// Number of `find_by_id` calls served.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorLookup for InMemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> StorageResult<UserProfile> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let users = self.users.read().map_err(|_| StorageError::LockPoisoned)?;
        users.get(&id).cloned().ok_or(StorageError::NotFound {
            entity: EntityKind::User,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn record(author_id: UserId, title: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            content: format!("{title} body"),
            author_id,
            status: ArticleStatus::Unpublished.as_i16(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = InMemoryArticleStore::new();
        let a = store.insert_draft(&record(1, "a"), 10).await.unwrap();
        let b = store.insert_draft(&record(1, "b"), 11).await.unwrap();
        assert!(b > a);
        let row = store.peek_draft(a).await.unwrap();
        assert_eq!((row.ctime, row.utime), (10, 10));
    }

    #[tokio::test]
    async fn test_update_by_other_author_is_rejected() {
        let store = InMemoryArticleStore::new();
        let id = store.insert_draft(&record(1, "a"), 10).await.unwrap();

        let mut hijack = record(2, "stolen");
        hijack.id = id;
        let err = store.update_draft(&hijack, 20).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFoundOrNotOwned { .. }));
        assert_eq!(store.peek_draft(id).await.unwrap().title, "a");
    }

    #[tokio::test]
    async fn test_list_orders_by_utime_desc() {
        let store = InMemoryArticleStore::new();
        let old = store.insert_draft(&record(1, "old"), 10).await.unwrap();
        let new = store.insert_draft(&record(1, "new"), 20).await.unwrap();
        store.insert_draft(&record(2, "other"), 30).await.unwrap();

        let rows = store.list_drafts_by_author(1, 0, 100).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new, old]);

        let page = store.list_drafts_by_author(1, 1, 1).await.unwrap();
        assert_eq!(page[0].id, old);
    }

    #[tokio::test]
    async fn test_upsert_published_keeps_ctime() {
        let store = InMemoryArticleStore::new();
        let mut rec = record(1, "a");
        rec.id = 5;
        store.upsert_published(&rec, 100).await.unwrap();
        rec.title = "b".to_string();
        store.upsert_published(&rec, 200).await.unwrap();

        let row = store.peek_published(5).await.unwrap();
        assert_eq!(row.title, "b");
        assert_eq!((row.ctime, row.utime), (100, 200));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let store = InMemoryArticleStore::new();
        store.fail_published_writes(true);

        let rec = record(1, "a");
        let result = store
            .with_transaction(move |tx| {
                async move {
                    let id = tx.insert_draft(&rec, 10).await?;
                    let published = ArticleRecord { id, ..rec };
                    tx.upsert_published(&published, 10).await?;
                    Ok(id)
                }
                .boxed()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.draft_count().await, 0);
        assert_eq!(store.published_count().await, 0);
    }

    #[tokio::test]
    async fn test_transaction_commits_both_tables() {
        let store = InMemoryArticleStore::new();
        let rec = record(1, "a");
        let id = store
            .with_transaction(move |tx| {
                async move {
                    let id = tx.insert_draft(&rec, 10).await?;
                    tx.upsert_published(&ArticleRecord { id, ..rec }, 10).await?;
                    Ok(id)
                }
                .boxed()
            })
            .await
            .unwrap();

        assert!(store.peek_draft(id).await.is_some());
        assert!(store.peek_published(id).await.is_some());
        assert_eq!(store.call_counts().transactions, 1);
    }

    #[tokio::test]
    async fn test_user_store_lookup() {
        let users = InMemoryUserStore::new();
        users.insert(UserProfile::new(3, "ann")).unwrap();
        assert_eq!(users.find_by_id(3).await.unwrap().display_name, "ann");
        let err = users.find_by_id(4).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: EntityKind::User, .. }));
        assert_eq!(users.lookup_count(), 2);
    }
}

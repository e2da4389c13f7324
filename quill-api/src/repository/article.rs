//! Article Repository
//!
//! Writes go to the relational stores first and invalidate cache entries
//! afterwards. Reads are cache-aside: a miss falls through to the store and
//! the cache is repopulated in the background. The cache is never the
//! source of truth, so every cache or event failure is logged and absorbed.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use quill_core::{
    Article, ArticleId, ArticleStatus, CacheResult, Clock, EntityKind, QuillError, QuillResult,
    ReadEvent, StorageError, UserId, ValidationError,
};
use quill_events::ReadEventPublisher;
use quill_storage::cache::{ArticleCache, CacheNamespace};
use quill_storage::{ArticleRecord, ArticleStore, AuthorLookup};

use crate::background::BackgroundDispatcher;
use crate::constants::{FIRST_PAGE_SIZE, MAX_PREFETCH_CONTENT_BYTES};
use crate::telemetry::metrics;

// ============================================================================
// INTERFACE
// ============================================================================

/// Article persistence with caching and read tracking.
#[async_trait]
pub trait ArticleRepository: Send + Sync + 'static {
    /// Insert a new draft. The status is forced to `Unpublished`.
    async fn create(&self, article: &Article) -> QuillResult<ArticleId>;

    /// Overwrite an existing draft owned by `article.author`.
    async fn update(&self, article: &Article) -> QuillResult<()>;

    /// Write the draft and its published copy in one transaction.
    async fn sync(&self, article: &Article) -> QuillResult<ArticleId>;

    /// Change the status of both copies in one transaction.
    async fn sync_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
    ) -> QuillResult<()>;

    /// The author's drafts, newest first, with content cut to its abstract.
    async fn get_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> QuillResult<Vec<Article>>;

    async fn get_by_id(&self, id: ArticleId) -> QuillResult<Article>;

    /// Published view of `id`, with the author's display name resolved.
    /// Counts as one read by `reader_id` while the article is published.
    async fn get_pub_by_id(&self, id: ArticleId, reader_id: UserId) -> QuillResult<Article>;
}

// ============================================================================
// CACHED IMPLEMENTATION
// ============================================================================

/// [`ArticleRepository`] over an [`ArticleStore`] with an [`ArticleCache`] in front.
pub struct CachedArticleRepository<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    authors: Arc<dyn AuthorLookup>,
    events: Arc<dyn ReadEventPublisher>,
    clock: Arc<dyn Clock>,
    background: BackgroundDispatcher,
    prefetch_limit: usize,
}

impl<S, C> Clone for CachedArticleRepository<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            authors: Arc::clone(&self.authors),
            events: Arc::clone(&self.events),
            clock: Arc::clone(&self.clock),
            background: self.background.clone(),
            prefetch_limit: self.prefetch_limit,
        }
    }
}

impl<S: ArticleStore, C: ArticleCache> CachedArticleRepository<S, C> {
    pub fn new(
        store: Arc<S>,
        cache: Arc<C>,
        authors: Arc<dyn AuthorLookup>,
        events: Arc<dyn ReadEventPublisher>,
        clock: Arc<dyn Clock>,
        background: BackgroundDispatcher,
    ) -> Self {
        Self {
            store,
            cache,
            authors,
            events,
            clock,
            background,
            prefetch_limit: MAX_PREFETCH_CONTENT_BYTES,
        }
    }

    /// Largest content, in bytes, pre-fetched into the single-article cache.
    pub fn with_prefetch_limit(mut self, bytes: usize) -> Self {
        self.prefetch_limit = bytes;
        self
    }

    async fn invalidate_first_page(&self, author_id: UserId) {
        if let Err(e) = self.cache.del_first_page(author_id).await {
            tracing::warn!(author_id, error = %e, "First page invalidation failed");
        }
    }

    /// Store the published view of `record` and check it against the store.
    ///
    /// A status change that commits while this task runs may invalidate
    /// before the write lands. Re-reading the row after the write catches
    /// that case and drops the entry.
    fn cache_published_in_background(&self, record: ArticleRecord, article: Option<Article>) {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let authors = Arc::clone(&self.authors);
        self.background.spawn("cache_published", async move {
            let article = match article {
                Some(article) => article,
                None => with_author_name(authors.as_ref(), record.clone().into_article()).await?,
            };
            cache.set_pub(&article).await?;
            if store.find_published(record.id).await?.as_ref() != Some(&record) {
                tracing::debug!(article_id = record.id, "Published row changed during cache fill");
                cache.del_pub(record.id).await?;
            }
            Ok(())
        });
    }

    fn emit_read_event(&self, id: ArticleId, reader_id: UserId) {
        let events = Arc::clone(&self.events);
        self.background.spawn("read_event", async move {
            let result = events.produce_read_event(ReadEvent::new(id, reader_id)).await;
            if let Some(metrics) = metrics() {
                metrics.record_read_event(result.is_ok());
            }
            result.map_err(QuillError::from)
        });
    }
}

fn ensure_persistable(status: ArticleStatus) -> QuillResult<()> {
    if status.is_persistable() {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue {
            field: "status".to_string(),
            reason: format!("{status} cannot be stored"),
        }
        .into())
    }
}

async fn with_author_name(authors: &dyn AuthorLookup, mut article: Article) -> QuillResult<Article> {
    let author_id = article.author_id();
    let profile = authors
        .find_by_id(author_id)
        .await
        .map_err(|e| QuillError::AuthorLookupFailed {
            author_id,
            reason: e.to_string(),
        })?;
    article.author.name = profile.display_name;
    Ok(article)
}

/// Turn a cache read into an optional value, counting the outcome.
fn cache_lookup<T>(namespace: CacheNamespace, key_id: i64, result: CacheResult<Option<T>>) -> Option<T> {
    let (value, outcome) = match result {
        Ok(Some(value)) => (Some(value), "hit"),
        Ok(None) => (None, "miss"),
        Err(e) => {
            tracing::warn!(namespace = %namespace, id = key_id, error = %e, "Cache read failed");
            (None, "error")
        }
    };
    if let Some(metrics) = metrics() {
        metrics.record_cache_lookup(namespace.as_str(), outcome);
    }
    value
}

fn not_found(id: ArticleId, entity: EntityKind) -> QuillError {
    StorageError::NotFound { entity, id }.into()
}

#[async_trait]
impl<S: ArticleStore, C: ArticleCache> ArticleRepository for CachedArticleRepository<S, C> {
    async fn create(&self, article: &Article) -> QuillResult<ArticleId> {
        let mut record = ArticleRecord::from(article);
        record.status = ArticleStatus::Unpublished.as_i16();
        let id = self
            .store
            .insert_draft(&record, self.clock.now_millis())
            .await?;
        tracing::debug!(article_id = id, author_id = record.author_id, "Draft created");
        self.invalidate_first_page(record.author_id).await;
        Ok(id)
    }

    async fn update(&self, article: &Article) -> QuillResult<()> {
        ensure_persistable(article.status)?;
        let record = ArticleRecord::from(article);
        self.store
            .update_draft(&record, self.clock.now_millis())
            .await?;
        self.invalidate_first_page(record.author_id).await;
        Ok(())
    }

    async fn sync(&self, article: &Article) -> QuillResult<ArticleId> {
        ensure_persistable(article.status)?;
        let record = ArticleRecord::from(article);
        let now = self.clock.now_millis();

        let published = self
            .store
            .with_transaction(move |tx| {
                async move {
                    let mut record = record;
                    if record.id > 0 {
                        tx.update_draft(&record, now).await?;
                    } else {
                        record.id = tx.insert_draft(&record, now).await?;
                    }
                    tx.upsert_published(&record, now).await?;
                    tx.find_published(record.id)
                        .await?
                        .ok_or(StorageError::NotFound {
                            entity: EntityKind::PublishedArticle,
                            id: record.id,
                        })
                }
                .boxed()
            })
            .await?;

        let id = published.id;
        let author_id = published.author_id;
        tracing::debug!(article_id = id, author_id, "Article synced to published store");

        let cache = Arc::clone(&self.cache);
        self.background.spawn("invalidate_first_page", async move {
            cache.del_first_page(author_id).await?;
            Ok(())
        });
        self.cache_published_in_background(published, None);

        Ok(id)
    }

    async fn sync_status(
        &self,
        id: ArticleId,
        author_id: UserId,
        status: ArticleStatus,
    ) -> QuillResult<()> {
        ensure_persistable(status)?;
        let now = self.clock.now_millis();

        let published_rows = self
            .store
            .with_transaction(move |tx| {
                async move {
                    tx.set_draft_status(id, author_id, status, now).await?;
                    tx.set_published_status(id, status, now).await
                }
                .boxed()
            })
            .await?;

        tracing::debug!(
            article_id = id,
            author_id,
            status = %status,
            published_rows,
            "Article status synced"
        );

        self.invalidate_first_page(author_id).await;
        if let Err(e) = self.cache.del_pub(id).await {
            tracing::warn!(article_id = id, error = %e, "Published cache invalidation failed");
        }
        Ok(())
    }

    async fn get_by_author(
        &self,
        author_id: UserId,
        offset: i64,
        limit: i64,
    ) -> QuillResult<Vec<Article>> {
        let first_page = offset == 0 && limit == FIRST_PAGE_SIZE;
        if first_page {
            let cached = cache_lookup(
                CacheNamespace::FirstPage,
                author_id,
                self.cache.get_first_page(author_id).await,
            );
            if let Some(page) = cached {
                return Ok(page);
            }
        }

        let articles: Vec<Article> = self
            .store
            .list_drafts_by_author(author_id, offset, limit)
            .await?
            .into_iter()
            .map(ArticleRecord::into_article)
            .collect();
        // Listings carry abstracts whether or not they came from the cache.
        let summaries: Vec<Article> = articles.iter().map(Article::to_summary).collect();

        let prefetch = articles
            .first()
            .filter(|article| article.content.len() <= self.prefetch_limit)
            .cloned();
        let page = first_page.then_some(articles);
        if prefetch.is_some() || page.is_some() {
            let cache = Arc::clone(&self.cache);
            self.background.spawn("cache_author_page", async move {
                if let Some(page) = page {
                    cache.set_first_page(author_id, &page).await?;
                }
                if let Some(article) = prefetch {
                    cache.set(&article).await?;
                }
                Ok(())
            });
        }

        Ok(summaries)
    }

    async fn get_by_id(&self, id: ArticleId) -> QuillResult<Article> {
        if let Some(article) = cache_lookup(CacheNamespace::Article, id, self.cache.get(id).await) {
            return Ok(article);
        }

        let article = self
            .store
            .find_draft(id)
            .await?
            .ok_or_else(|| not_found(id, EntityKind::Article))?
            .into_article();

        let cache = Arc::clone(&self.cache);
        let cached = article.clone();
        self.background.spawn("cache_article", async move {
            cache.set(&cached).await?;
            Ok(())
        });

        Ok(article)
    }

    async fn get_pub_by_id(&self, id: ArticleId, reader_id: UserId) -> QuillResult<Article> {
        let cached = cache_lookup(CacheNamespace::Published, id, self.cache.get_pub(id).await);
        if let Some(article) = cached {
            if article.status == ArticleStatus::Published {
                self.emit_read_event(id, reader_id);
            }
            return Ok(article);
        }

        let record = self
            .store
            .find_published(id)
            .await?
            .ok_or_else(|| not_found(id, EntityKind::PublishedArticle))?;
        let article = with_author_name(self.authors.as_ref(), record.clone().into_article()).await?;

        // Only live articles are cached or counted.
        if article.status == ArticleStatus::Published {
            self.cache_published_in_background(record, Some(article.clone()));
            self.emit_read_event(id, reader_id);
        }

        Ok(article)
    }
}

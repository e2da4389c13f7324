//! Typed article namespaces over a [`CacheBackend`].

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{Article, ArticleId, CacheResult, UserId};

use super::config::CacheConfig;
use super::key::CacheKey;
use super::traits::{get_json, set_json, CacheBackend};

/// First-page, single-article and published-detail caches.
#[async_trait]
pub trait ArticleCache: Send + Sync + 'static {
    async fn get_first_page(&self, author_id: UserId) -> CacheResult<Option<Vec<Article>>>;

    /// Store the page with every content replaced by its abstract.
    async fn set_first_page(&self, author_id: UserId, articles: &[Article]) -> CacheResult<()>;

    async fn del_first_page(&self, author_id: UserId) -> CacheResult<()>;

    async fn get(&self, id: ArticleId) -> CacheResult<Option<Article>>;

    async fn set(&self, article: &Article) -> CacheResult<()>;

    async fn get_pub(&self, id: ArticleId) -> CacheResult<Option<Article>>;

    async fn set_pub(&self, article: &Article) -> CacheResult<()>;

    async fn del_pub(&self, id: ArticleId) -> CacheResult<()>;
}

#[async_trait]
impl<C: ArticleCache + ?Sized> ArticleCache for Arc<C> {
    async fn get_first_page(&self, author_id: UserId) -> CacheResult<Option<Vec<Article>>> {
        (**self).get_first_page(author_id).await
    }

    async fn set_first_page(&self, author_id: UserId, articles: &[Article]) -> CacheResult<()> {
        (**self).set_first_page(author_id, articles).await
    }

    async fn del_first_page(&self, author_id: UserId) -> CacheResult<()> {
        (**self).del_first_page(author_id).await
    }

    async fn get(&self, id: ArticleId) -> CacheResult<Option<Article>> {
        (**self).get(id).await
    }

    async fn set(&self, article: &Article) -> CacheResult<()> {
        (**self).set(article).await
    }

    async fn get_pub(&self, id: ArticleId) -> CacheResult<Option<Article>> {
        (**self).get_pub(id).await
    }

    async fn set_pub(&self, article: &Article) -> CacheResult<()> {
        (**self).set_pub(article).await
    }

    async fn del_pub(&self, id: ArticleId) -> CacheResult<()> {
        (**self).del_pub(id).await
    }
}

/// [`ArticleCache`] stored as JSON in any [`CacheBackend`].
#[derive(Debug)]
pub struct KvArticleCache<B> {
    backend: B,
    config: CacheConfig,
}

impl<B: CacheBackend> KvArticleCache<B> {
    pub fn new(backend: B, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: CacheBackend> ArticleCache for KvArticleCache<B> {
    async fn get_first_page(&self, author_id: UserId) -> CacheResult<Option<Vec<Article>>> {
        get_json(&self.backend, &CacheKey::first_page(author_id)).await
    }

    async fn set_first_page(&self, author_id: UserId, articles: &[Article]) -> CacheResult<()> {
        let summaries: Vec<Article> = articles.iter().map(Article::to_summary).collect();
        set_json(
            &self.backend,
            &CacheKey::first_page(author_id),
            &summaries,
            self.config.first_page_ttl,
        )
        .await
    }

    async fn del_first_page(&self, author_id: UserId) -> CacheResult<()> {
        self.backend
            .delete(&CacheKey::first_page(author_id))
            .await
            .map(|_| ())
    }

    async fn get(&self, id: ArticleId) -> CacheResult<Option<Article>> {
        get_json(&self.backend, &CacheKey::article(id)).await
    }

    async fn set(&self, article: &Article) -> CacheResult<()> {
        set_json(
            &self.backend,
            &CacheKey::article(article.id),
            article,
            self.config.article_ttl,
        )
        .await
    }

    async fn get_pub(&self, id: ArticleId) -> CacheResult<Option<Article>> {
        get_json(&self.backend, &CacheKey::published(id)).await
    }

    async fn set_pub(&self, article: &Article) -> CacheResult<()> {
        set_json(
            &self.backend,
            &CacheKey::published(article.id),
            article,
            self.config.published_ttl,
        )
        .await
    }

    async fn del_pub(&self, id: ArticleId) -> CacheResult<()> {
        self.backend
            .delete(&CacheKey::published(id))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use quill_core::{ArticleStatus, Author, ManualClock, ABSTRACT_CHARS};
    use std::time::Duration;

    fn cache(clock: Arc<ManualClock>) -> KvArticleCache<InMemoryCacheBackend> {
        KvArticleCache::new(InMemoryCacheBackend::new(clock), CacheConfig::default())
    }

    fn article(id: ArticleId, content: &str) -> Article {
        Article {
            id,
            title: format!("title {id}"),
            content: content.to_string(),
            author: Author::new(7),
            status: ArticleStatus::Published,
            ctime: 1,
            utime: 2,
        }
    }

    #[tokio::test]
    async fn test_first_page_stores_abstracts() {
        let cache = cache(Arc::new(ManualClock::new(0)));
        let long = "y".repeat(ABSTRACT_CHARS * 2);
        cache
            .set_first_page(7, &[article(1, &long), article(2, "short")])
            .await
            .unwrap();

        let page = cache.get_first_page(7).await.unwrap().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].content.len(), ABSTRACT_CHARS);
        assert_eq!(page[1].content, "short");
        assert!(cache.get_first_page(8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_article_ttl_is_short() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache(clock.clone());
        cache.set(&article(3, "body")).await.unwrap();
        cache.set_pub(&article(3, "body")).await.unwrap();

        clock.advance(Duration::from_secs(11).as_millis() as i64);
        assert!(cache.get(3).await.unwrap().is_none());
        assert_eq!(cache.get_pub(3).await.unwrap().unwrap().content, "body");
    }

    #[tokio::test]
    async fn test_deletes_are_per_namespace() {
        let cache = cache(Arc::new(ManualClock::new(0)));
        cache.set_first_page(7, &[article(1, "a")]).await.unwrap();
        cache.set_pub(&article(1, "a")).await.unwrap();

        cache.del_first_page(7).await.unwrap();
        assert!(cache.get_first_page(7).await.unwrap().is_none());
        assert!(cache.get_pub(1).await.unwrap().is_some());

        cache.del_pub(1).await.unwrap();
        assert!(cache.get_pub(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let backend = Arc::new(InMemoryCacheBackend::new(Arc::new(ManualClock::new(0))));
        backend
            .set(&CacheKey::article(1), b"not json", Duration::from_secs(5))
            .await
            .unwrap();
        let cache = KvArticleCache::new(backend, CacheConfig::default());
        assert!(cache.get(1).await.is_err());
    }
}

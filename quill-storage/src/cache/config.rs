//! Per-namespace cache TTLs.

use std::time::Duration;

/// TTL configuration for the cache namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Author first page of summaries.
    pub first_page_ttl: Duration,
    /// Speculative single-article pre-fetch; kept short.
    pub article_ttl: Duration,
    /// Published detail with resolved author name.
    pub published_ttl: Duration,
    /// User profiles.
    pub user_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            first_page_ttl: Duration::from_secs(10 * 60),
            article_ttl: Duration::from_secs(10),
            published_ttl: Duration::from_secs(10 * 60),
            user_ttl: Duration::from_secs(15 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_first_page_ttl(mut self, ttl: Duration) -> Self {
        self.first_page_ttl = ttl;
        self
    }

    pub fn with_article_ttl(mut self, ttl: Duration) -> Self {
        self.article_ttl = ttl;
        self
    }

    pub fn with_published_ttl(mut self, ttl: Duration) -> Self {
        self.published_ttl = ttl;
        self
    }

    pub fn with_user_ttl(mut self, ttl: Duration) -> Self {
        self.user_ttl = ttl;
        self
    }
}

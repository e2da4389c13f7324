//! Author lookup: resolves a user id to a display name.

use std::sync::Arc;

use async_trait::async_trait;
use quill_core::{StorageResult, UserId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::UserCache;

/// Public profile of a user, as needed to attribute an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
}

impl UserProfile {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Finds users by id. A missing user is `StorageError::NotFound`.
#[async_trait]
pub trait AuthorLookup: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> StorageResult<UserProfile>;
}

#[async_trait]
impl<T: AuthorLookup + ?Sized> AuthorLookup for Arc<T> {
    async fn find_by_id(&self, id: UserId) -> StorageResult<UserProfile> {
        (**self).find_by_id(id).await
    }
}

/// Cache-aside wrapper over an [`AuthorLookup`] using the user namespace.
///
/// Cache errors degrade to a store read; the store remains authoritative.
pub struct CachedAuthorLookup<L, C> {
    inner: L,
    cache: C,
}

impl<L, C> CachedAuthorLookup<L, C> {
    pub fn new(inner: L, cache: C) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<L, C> AuthorLookup for CachedAuthorLookup<L, C>
where
    L: AuthorLookup,
    C: UserCache,
{
    async fn find_by_id(&self, id: UserId) -> StorageResult<UserProfile> {
        match self.cache.get(id).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) => warn!(user_id = id, error = %e, "User cache read failed"),
        }

        let profile = self.inner.find_by_id(id).await?;
        if let Err(e) = self.cache.set(&profile).await {
            warn!(user_id = id, error = %e, "User cache write failed");
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, InMemoryCacheBackend, KvUserCache};
    use crate::memory::InMemoryUserStore;
    use quill_core::SystemClock;

    #[tokio::test]
    async fn test_cached_lookup_hits_store_once() {
        let users = InMemoryUserStore::new();
        users.insert(UserProfile::new(1, "ann")).unwrap();
        let backend = InMemoryCacheBackend::new(Arc::new(SystemClock));
        let lookup = CachedAuthorLookup::new(
            users.clone(),
            KvUserCache::new(backend, CacheConfig::default()),
        );

        assert_eq!(lookup.find_by_id(1).await.unwrap().display_name, "ann");
        assert_eq!(lookup.find_by_id(1).await.unwrap().display_name, "ann");
        assert_eq!(users.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_cached_lookup_propagates_not_found() {
        let users = InMemoryUserStore::new();
        let backend = InMemoryCacheBackend::new(Arc::new(SystemClock));
        let lookup =
            CachedAuthorLookup::new(users, KvUserCache::new(backend, CacheConfig::default()));
        assert!(lookup.find_by_id(9).await.unwrap_err().is_not_found());
    }
}

//! User profile namespace.

use async_trait::async_trait;
use quill_core::{CacheResult, UserId};

use super::config::CacheConfig;
use super::key::CacheKey;
use super::traits::{get_json, set_json, CacheBackend};
use crate::UserProfile;

#[async_trait]
pub trait UserCache: Send + Sync + 'static {
    async fn get(&self, id: UserId) -> CacheResult<Option<UserProfile>>;

    async fn set(&self, profile: &UserProfile) -> CacheResult<()>;
}

/// [`UserCache`] stored as JSON in any [`CacheBackend`].
#[derive(Debug)]
pub struct KvUserCache<B> {
    backend: B,
    config: CacheConfig,
}

impl<B: CacheBackend> KvUserCache<B> {
    pub fn new(backend: B, config: CacheConfig) -> Self {
        Self { backend, config }
    }
}

#[async_trait]
impl<B: CacheBackend> UserCache for KvUserCache<B> {
    async fn get(&self, id: UserId) -> CacheResult<Option<UserProfile>> {
        get_json(&self.backend, &CacheKey::user(id)).await
    }

    async fn set(&self, profile: &UserProfile) -> CacheResult<()> {
        set_json(
            &self.backend,
            &CacheKey::user(profile.id),
            profile,
            self.config.user_ttl,
        )
        .await
    }
}

//! In-process cache backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{CacheError, CacheResult, Clock, TimestampMs};

use super::key::CacheKey;
use super::traits::{expires_at, CacheBackend, CacheStats, StatsRecorder};

fn poisoned() -> CacheError {
    CacheError::Backend {
        reason: "cache lock poisoned".to_string(),
    }
}

/// `HashMap`-backed cache with the same TTL semantics as the LMDB backend.
#[derive(Debug)]
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, (TimestampMs, Vec<u8>)>>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

impl InMemoryCacheBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            stats: StatsRecorder::default(),
        }
    }

    /// Whether a live entry exists, without touching statistics.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let now = self.clock.now_millis();
        self.entries
            .read()
            .map(|entries| {
                entries
                    .get(key.as_str())
                    .is_some_and(|(expires, _)| *expires > now)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now_millis();
        let found = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            entries.get(key.as_str()).cloned()
        };

        match found {
            Some((expires, value)) if expires > now => {
                self.stats.hit();
                Ok(Some(value))
            }
            Some(_) => {
                self.entries
                    .write()
                    .map_err(|_| poisoned())?
                    .remove(key.as_str());
                self.stats.expired();
                Ok(None)
            }
            None => {
                self.stats.miss();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let expires = expires_at(self.clock.now_millis(), ttl);
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key.as_str().to_string(), (expires, value.to_vec()));
        self.stats.write();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let removed = self
            .entries
            .write()
            .map_err(|_| poisoned())?
            .remove(key.as_str())
            .is_some();
        if removed {
            self.stats.delete();
        }
        Ok(removed)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let len = self.entries.read().map_err(|_| poisoned())?.len();
        Ok(self.stats.snapshot(len as u64))
    }

    async fn purge_expired(&self) -> CacheResult<u64> {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, (expires, _)| *expires > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::ManualClock;

    #[tokio::test]
    async fn test_ttl_expiry() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = InMemoryCacheBackend::new(clock.clone());
        let key = CacheKey::article(9);

        backend.set(&key, b"x", Duration::from_secs(10)).await.unwrap();
        clock.advance(9_999);
        assert!(backend.contains(&key));
        assert_eq!(backend.get(&key).await.unwrap(), Some(b"x".to_vec()));

        clock.advance(1);
        assert!(!backend.contains(&key));
        assert_eq!(backend.get(&key).await.unwrap(), None);

        let stats = backend.stats().await.unwrap();
        assert_eq!((stats.hits, stats.misses, stats.expirations), (1, 1, 1));
        assert_eq!(stats.entry_count, 0);
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let backend = InMemoryCacheBackend::new(Arc::new(ManualClock::new(0)));
        let key = CacheKey::user(1);
        assert!(!backend.delete(&key).await.unwrap());
        backend.set(&key, b"u", Duration::from_secs(1)).await.unwrap();
        assert!(backend.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let backend = InMemoryCacheBackend::new(clock.clone());
        backend
            .set(&CacheKey::article(1), b"short", Duration::from_secs(10))
            .await
            .unwrap();
        backend
            .set(&CacheKey::first_page(1), b"long", Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(backend.purge_expired().await.unwrap(), 0);
        clock.advance(10_000);
        assert_eq!(backend.purge_expired().await.unwrap(), 1);

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.entry_count, 1);
        assert!(backend.contains(&CacheKey::first_page(1)));
    }
}

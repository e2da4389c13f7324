//! Cache backend trait, statistics and the stored entry envelope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{CacheError, CacheResult, TimestampMs};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::CacheKey;

/// Byte-level key/value store with per-entry TTL.
///
/// Writes are last-writer-wins overwrites. Expired entries read as misses.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()>;

    /// Returns whether a live or expired entry was removed.
    async fn delete(&self, key: &CacheKey) -> CacheResult<bool>;

    async fn stats(&self) -> CacheResult<CacheStats>;

    /// Remove every entry whose TTL has passed. Returns how many were removed.
    async fn purge_expired(&self) -> CacheResult<u64>;
}

#[async_trait]
impl<B: CacheBackend + ?Sized> CacheBackend for Arc<B> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        (**self).delete(key).await
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        (**self).stats().await
    }

    async fn purge_expired(&self) -> CacheResult<u64> {
        (**self).purge_expired().await
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of successful writes.
    pub writes: u64,
    /// Number of deletes that removed an entry.
    pub deletes: u64,
    /// Entries found expired on read.
    pub expirations: u64,
    /// Number of entries currently stored, expired-but-unread included.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters shared by the backends.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    expirations: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
        self.miss();
    }

    pub(crate) fn write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entry_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entry_count,
        }
    }
}

// ============================================================================
// ENTRY ENVELOPE
// ============================================================================

/// Stored format: `[expires_at_ms: 8 bytes LE][payload]`.
pub(crate) const ENVELOPE_HEADER_LEN: usize = 8;

pub(crate) fn expires_at(now: TimestampMs, ttl: Duration) -> TimestampMs {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(ttl_ms)
}

pub(crate) fn encode_entry(expires_at: TimestampMs, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
    bytes.extend_from_slice(&expires_at.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Split a stored entry into its expiry and payload. `None` if truncated.
pub(crate) fn decode_entry(bytes: &[u8]) -> Option<(TimestampMs, &[u8])> {
    if bytes.len() < ENVELOPE_HEADER_LEN {
        return None;
    }
    let (header, payload) = bytes.split_at(ENVELOPE_HEADER_LEN);
    let header: [u8; ENVELOPE_HEADER_LEN] = header.try_into().ok()?;
    Some((i64::from_le_bytes(header), payload))
}

// ============================================================================
// JSON HELPERS
// ============================================================================

pub(crate) async fn get_json<B, T>(backend: &B, key: &CacheKey) -> CacheResult<Option<T>>
where
    B: CacheBackend + ?Sized,
    T: DeserializeOwned,
{
    match backend.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

pub(crate) async fn set_json<B, T>(
    backend: &B,
    key: &CacheKey,
    value: &T,
    ttl: Duration,
) -> CacheResult<()>
where
    B: CacheBackend + ?Sized,
    T: Serialize + Sync + ?Sized,
{
    let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    backend.set(key, &bytes, ttl).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let bytes = encode_entry(1234, b"{\"a\":1}");
        let (expires, payload) = decode_entry(&bytes).unwrap();
        assert_eq!(expires, 1234);
        assert_eq!(payload, b"{\"a\":1}");
    }

    #[test]
    fn test_truncated_envelope_is_rejected() {
        assert!(decode_entry(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_expires_at_saturates() {
        assert_eq!(expires_at(i64::MAX - 1, Duration::from_secs(10)), i64::MAX);
        assert_eq!(expires_at(1_000, Duration::from_millis(500)), 1_500);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}

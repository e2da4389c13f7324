//! LMDB-backed cache implementation.
//!
//! Uses the heed crate (Rust bindings for LMDB) as a memory-mapped key/value
//! store shared by every cache namespace. Each value is wrapped in the
//! expiry envelope from [`super::traits`]; an entry found expired on read is
//! deleted and reported as a miss.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `get`
//! - Write transactions for `set`, `delete` and expiry cleanup
//! - Statistics are tracked with atomic counters

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use quill_core::{CacheError, CacheResult, Clock, TimestampMs};
use tracing::debug;

use super::key::CacheKey;
use super::traits::{decode_entry, encode_entry, expires_at, CacheBackend, CacheStats, StatsRecorder};

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CacheError {
    fn from(e: LmdbCacheError) -> Self {
        CacheError::Backend {
            reason: e.to_string(),
        }
    }
}

fn txn_err(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed cache.
pub struct LmdbCacheBackend {
    path: PathBuf,
    env: Env,
    db: Database<Bytes, Bytes>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

impl std::fmt::Debug for LmdbCacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbCacheBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    /// * `clock` - Source of "now" for TTL checks
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_err)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_err)?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            env,
            db,
            clock,
            stats: StatsRecorder::default(),
        })
    }

    fn remove(&self, key: &[u8]) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        let deleted = self.db.delete(&mut wtxn, key).map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;
        Ok(deleted)
    }

    /// Collect and delete expired or truncated entries in one write transaction.
    fn remove_expired(&self, now: TimestampMs) -> Result<u64, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_err)?;

        let mut expired = Vec::new();
        for result in self.db.iter(&wtxn).map_err(txn_err)? {
            let (key, bytes) = result.map_err(txn_err)?;
            match decode_entry(bytes) {
                Some((expires, _)) if expires > now => {}
                _ => expired.push(key.to_vec()),
            }
        }

        let mut removed = 0u64;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(txn_err)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(txn_err)?;
        Ok(removed)
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now_millis();
        let found = {
            let rtxn = self.env.read_txn().map_err(txn_err)?;
            self.db
                .get(&rtxn, key.as_bytes())
                .map_err(txn_err)?
                .map(|bytes| bytes.to_vec())
        };

        let Some(bytes) = found else {
            self.stats.miss();
            return Ok(None);
        };

        match decode_entry(&bytes) {
            Some((expires, payload)) if expires > now => {
                self.stats.hit();
                Ok(Some(payload.to_vec()))
            }
            _ => {
                debug!(key = %key, "Dropping expired or truncated cache entry");
                self.remove(key.as_bytes())?;
                self.stats.expired();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> CacheResult<()> {
        let entry = encode_entry(expires_at(self.clock.now_millis(), ttl), value);

        let mut wtxn = self.env.write_txn().map_err(txn_err)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &entry)
            .map_err(txn_err)?;
        wtxn.commit().map_err(txn_err)?;

        self.stats.write();
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let deleted = self.remove(key.as_bytes())?;
        if deleted {
            self.stats.delete();
        }
        Ok(deleted)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_err)?;
        let entries = self.db.len(&rtxn).map_err(txn_err)?;
        Ok(self.stats.snapshot(entries))
    }

    async fn purge_expired(&self) -> CacheResult<u64> {
        let removed = self.remove_expired(self.clock.now_millis())?;
        if removed > 0 {
            debug!(removed, path = %self.path.display(), "Purged expired cache entries");
        }
        Ok(removed)
    }
}

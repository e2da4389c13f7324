//! API Configuration Module
//!
//! Server, background-work and cache settings loaded from environment
//! variables with defaults suitable for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quill_core::Clock;
use quill_storage::cache::{CacheBackend, CacheConfig, InMemoryCacheBackend, LmdbCacheBackend};

use crate::constants::{
    DEFAULT_BACKGROUND_MAX_IN_FLIGHT, DEFAULT_BACKGROUND_TIMEOUT_MS, DEFAULT_BIND_ADDR,
    DEFAULT_CACHE_MAP_SIZE_MB, DEFAULT_CACHE_SWEEP_INTERVAL_SECS, DEFAULT_CORS_MAX_AGE_SECS,
};
use crate::error::{ApiError, ApiResult};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Server and background-work configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Listen address, `host:port`.
    pub bind_addr: String,

    /// Deadline for each background task.
    pub background_timeout: Duration,

    /// Background tasks allowed in flight at once.
    pub background_max_in_flight: usize,

    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,

    /// CORS preflight cache lifetime in seconds.
    pub cors_max_age_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            background_timeout: Duration::from_millis(DEFAULT_BACKGROUND_TIMEOUT_MS),
            background_max_in_flight: DEFAULT_BACKGROUND_MAX_IN_FLIGHT,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `QUILL_BIND_ADDR`: Listen address (default: 0.0.0.0:8080)
    /// - `QUILL_BACKGROUND_TIMEOUT_MS`: Background task deadline (default: 1000)
    /// - `QUILL_BACKGROUND_MAX_IN_FLIGHT`: Background task bound (default: 1024)
    /// - `QUILL_CORS_ORIGINS`: Comma-separated allowed origins (default: any)
    /// - `QUILL_CORS_MAX_AGE_SECS`: Preflight cache lifetime (default: 3600)
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("QUILL_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let background_timeout = Duration::from_millis(
            std::env::var("QUILL_BACKGROUND_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_BACKGROUND_TIMEOUT_MS),
        );

        let background_max_in_flight = std::env::var("QUILL_BACKGROUND_MAX_IN_FLIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_BACKGROUND_MAX_IN_FLIGHT);

        let cors_origins = std::env::var("QUILL_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("QUILL_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORS_MAX_AGE_SECS);

        Self {
            bind_addr,
            background_timeout,
            background_max_in_flight,
            cors_origins,
            cors_max_age_secs,
        }
    }

    /// Parse `bind_addr`.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        self.bind_addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", self.bind_addr, e))
        })
    }
}

// ============================================================================
// CACHE SETTINGS
// ============================================================================

/// Where the cache lives and how long entries are kept.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// LMDB directory. `None` selects the in-process backend.
    pub path: Option<PathBuf>,

    /// LMDB map size in megabytes.
    pub map_size_mb: usize,

    /// Per-namespace TTLs.
    pub ttls: CacheConfig,

    /// Interval between purges of expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            map_size_mb: DEFAULT_CACHE_MAP_SIZE_MB,
            ttls: CacheConfig::default(),
            sweep_interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CacheSettings {
    /// Create CacheSettings from environment variables.
    ///
    /// Environment variables:
    /// - `QUILL_CACHE_PATH`: LMDB directory (empty or unset = in-memory)
    /// - `QUILL_CACHE_MAP_SIZE_MB`: LMDB map size (default: 256)
    /// - `QUILL_CACHE_FIRST_PAGE_TTL_SECS`: First-page TTL (default: 600)
    /// - `QUILL_CACHE_ARTICLE_TTL_SECS`: Single-article TTL (default: 10)
    /// - `QUILL_CACHE_PUBLISHED_TTL_SECS`: Published-detail TTL (default: 600)
    /// - `QUILL_CACHE_USER_TTL_SECS`: User TTL (default: 900)
    /// - `QUILL_CACHE_SWEEP_SECS`: Interval between expiry sweeps (default: 60)
    pub fn from_env() -> Self {
        let path = std::env::var("QUILL_CACHE_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let map_size_mb = std::env::var("QUILL_CACHE_MAP_SIZE_MB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_MAP_SIZE_MB);

        let mut ttls = CacheConfig::default();
        if let Some(ttl) = secs_from_env("QUILL_CACHE_FIRST_PAGE_TTL_SECS") {
            ttls = ttls.with_first_page_ttl(ttl);
        }
        if let Some(ttl) = secs_from_env("QUILL_CACHE_ARTICLE_TTL_SECS") {
            ttls = ttls.with_article_ttl(ttl);
        }
        if let Some(ttl) = secs_from_env("QUILL_CACHE_PUBLISHED_TTL_SECS") {
            ttls = ttls.with_published_ttl(ttl);
        }
        if let Some(ttl) = secs_from_env("QUILL_CACHE_USER_TTL_SECS") {
            ttls = ttls.with_user_ttl(ttl);
        }

        let sweep_interval = secs_from_env("QUILL_CACHE_SWEEP_SECS")
            .filter(|every| !every.is_zero())
            .unwrap_or(Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS));

        Self {
            path,
            map_size_mb,
            ttls,
            sweep_interval,
        }
    }

    /// Open the configured backend: LMDB when a path is set, otherwise in-process.
    pub fn open_backend(&self, clock: Arc<dyn Clock>) -> ApiResult<Arc<dyn CacheBackend>> {
        match &self.path {
            Some(path) => {
                let backend = LmdbCacheBackend::new(path, self.map_size_mb, clock).map_err(|e| {
                    ApiError::internal_error(format!(
                        "Failed to open cache at {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                tracing::info!(path = %path.display(), map_size_mb = self.map_size_mb, "Using LMDB cache");
                Ok(Arc::new(backend))
            }
            None => {
                tracing::info!("Using in-memory cache");
                Ok(Arc::new(InMemoryCacheBackend::new(clock)))
            }
        }
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.background_timeout, Duration::from_secs(1));
        assert_eq!(config.background_max_in_flight, 1024);
        assert!(config.socket_addr().is_ok());
    }

    #[test]
    fn test_background_settings_from_env() {
        let _timeout = EnvVarGuard::set("QUILL_BACKGROUND_TIMEOUT_MS", Some("250"));
        let _bound = EnvVarGuard::set("QUILL_BACKGROUND_MAX_IN_FLIGHT", Some("0"));
        let config = ApiConfig::from_env();
        assert_eq!(config.background_timeout, Duration::from_millis(250));
        // Zero would disable background work entirely; it falls back to the default.
        assert_eq!(config.background_max_in_flight, 1024);
    }

    #[test]
    fn test_cors_origins_from_env() {
        let _origins = EnvVarGuard::set(
            "QUILL_CORS_ORIGINS",
            Some("https://a.example, ,https://b.example"),
        );
        let config = ApiConfig::from_env();
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_invalid_bind_addr() {
        let config = ApiConfig {
            bind_addr: "not an address".to_string(),
            ..ApiConfig::default()
        };
        assert!(config.socket_addr().is_err());
    }

    #[tokio::test]
    async fn test_open_lmdb_backend() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CacheSettings {
            path: Some(dir.path().join("cache")),
            map_size_mb: 8,
            ..CacheSettings::default()
        };
        let backend = settings
            .open_backend(Arc::new(quill_core::SystemClock))
            .unwrap();
        assert_eq!(backend.stats().await.unwrap().entry_count, 0);
    }

    #[test]
    fn test_cache_settings_from_env() {
        let _path = EnvVarGuard::set("QUILL_CACHE_PATH", Some("  "));
        let _ttl = EnvVarGuard::set("QUILL_CACHE_ARTICLE_TTL_SECS", Some("30"));
        let _sweep = EnvVarGuard::set("QUILL_CACHE_SWEEP_SECS", Some("0"));
        let settings = CacheSettings::from_env();
        assert!(settings.path.is_none());
        assert_eq!(settings.ttls.article_ttl, Duration::from_secs(30));
        assert_eq!(settings.ttls.first_page_ttl, Duration::from_secs(600));
        assert_eq!(settings.sweep_interval, Duration::from_secs(60));
    }
}

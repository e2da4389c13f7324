//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres. Queries live in
//! `quill-storage` and `quill-events`; this module only builds the pool the
//! stores share and checks that it is reachable.

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait/create/recycle timeout for pool checkouts
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "quill".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUILL_DB_HOST` (default: localhost)
    /// - `QUILL_DB_PORT` (default: 5432)
    /// - `QUILL_DB_NAME` (default: quill)
    /// - `QUILL_DB_USER` (default: postgres)
    /// - `QUILL_DB_PASSWORD` (default: empty)
    /// - `QUILL_DB_POOL_SIZE` (default: 16)
    /// - `QUILL_DB_TIMEOUT_MS` (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("QUILL_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("QUILL_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("QUILL_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("QUILL_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("QUILL_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("QUILL_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("QUILL_DB_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened until the first checkout.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        pool_cfg.timeouts.recycle = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

/// Round-trip a trivial query to prove the database is reachable.
pub async fn health_check(pool: &Pool) -> ApiResult<()> {
    let conn = pool.get().await?;
    conn.simple_query("SELECT 1")
        .await
        .map_err(|e| ApiError::database_error(format!("Health check failed: {}", e)))?;
    Ok(())
}

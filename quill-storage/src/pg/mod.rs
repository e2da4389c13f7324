//! Postgres implementations over a deadpool connection pool.
//!
//! All SQL is written once against `tokio_postgres::GenericClient`, so the
//! same statements run on a pooled connection and inside a transaction.

mod article;
mod user;

pub use article::{PgArticleStore, PgArticleTx};
pub use user::PgUserStore;

use deadpool_postgres::Pool;
use quill_core::{StorageError, StorageResult};
use tracing::info;

/// DDL for the article and user tables.
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub(crate) fn query_err(e: tokio_postgres::Error) -> StorageError {
    StorageError::QueryFailed {
        reason: e.to_string(),
    }
}

pub(crate) fn pool_err(e: deadpool_postgres::PoolError) -> StorageError {
    StorageError::Pool {
        reason: e.to_string(),
    }
}

pub(crate) fn tx_err(e: tokio_postgres::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

/// Create the tables if they do not exist yet.
pub async fn apply_schema(pool: &Pool) -> StorageResult<()> {
    let client = pool.get().await.map_err(pool_err)?;
    client.batch_execute(SCHEMA_SQL).await.map_err(query_err)?;
    info!("Article schema applied");
    Ok(())
}

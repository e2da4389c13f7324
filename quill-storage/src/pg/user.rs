//! `users` on Postgres, read-only from this service.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use quill_core::{EntityKind, StorageError, StorageResult, UserId};

use super::{pool_err, query_err};
use crate::{AuthorLookup, UserProfile};

#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorLookup for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> StorageResult<UserProfile> {
        let conn = self.pool.get().await.map_err(pool_err)?;
        let row = conn
            .query_opt("SELECT id, nickname FROM users WHERE id = $1", &[&id])
            .await
            .map_err(query_err)?
            .ok_or(StorageError::NotFound {
                entity: EntityKind::User,
                id,
            })?;

        Ok(UserProfile {
            id: row.try_get("id").map_err(query_err)?,
            display_name: row.try_get("nickname").map_err(query_err)?,
        })
    }
}

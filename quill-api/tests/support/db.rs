use deadpool_postgres::Pool;
use quill_api::DbConfig;

pub async fn test_pool() -> Pool {
    let config = DbConfig::from_env();
    let pool = config.create_pool().expect("Failed to create database pool");
    quill_storage::pg::apply_schema(&pool)
        .await
        .expect("Failed to apply schema");
    pool
}

/// Register `id` in `users` so author lookups resolve.
pub async fn ensure_user(pool: &Pool, id: i64, nickname: &str) {
    let client = pool.get().await.expect("Failed to get connection");
    client
        .execute(
            "INSERT INTO users (id, nickname, ctime, utime) VALUES ($1, $2, 0, 0) \
             ON CONFLICT (id) DO UPDATE SET nickname = EXCLUDED.nickname",
            &[&id, &nickname],
        )
        .await
        .expect("Failed to insert user");
}

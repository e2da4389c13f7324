//! Quill API Server Entry Point
//!
//! Bootstraps configuration, applies the schema, starts the read-event
//! consumer and the cache sweep, and serves the Axum router until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use quill_api::jobs::{spawn_cache_sweeper, spawn_read_event_consumer};
use quill_api::telemetry::{init_tracing, TelemetryConfig};
use quill_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, ArticleService,
    BackgroundDispatcher, CacheSettings, CachedArticleRepository, DbConfig, HealthState,
};
use quill_core::{Clock, SystemClock};
use quill_events::{ConsumerConfig, PgInteractionCounter, PgMessageLog, ReadEventProducer};
use quill_storage::cache::{KvArticleCache, KvUserCache};
use quill_storage::pg::{apply_schema, PgArticleStore, PgUserStore};
use quill_storage::CachedAuthorLookup;
use tokio::sync::watch;

/// How long shutdown waits for in-flight background work.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let cache_settings = CacheSettings::from_env();
    let consumer_config = ConsumerConfig::from_env();
    let db_config = DbConfig::from_env();

    let pool = db_config.create_pool()?;
    apply_schema(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = Arc::new(PgMessageLog::new(pool.clone(), Arc::clone(&clock)));
    queue.apply_schema().await?;
    let counter = Arc::new(PgInteractionCounter::new(pool.clone(), Arc::clone(&clock)));

    let cache_backend = cache_settings.open_backend(Arc::clone(&clock))?;
    let article_cache = Arc::new(KvArticleCache::new(
        Arc::clone(&cache_backend),
        cache_settings.ttls.clone(),
    ));
    let authors = Arc::new(CachedAuthorLookup::new(
        PgUserStore::new(pool.clone()),
        KvUserCache::new(Arc::clone(&cache_backend), cache_settings.ttls.clone()),
    ));

    let background = BackgroundDispatcher::from_config(&api_config);
    let repository = CachedArticleRepository::new(
        Arc::new(PgArticleStore::new(pool.clone())),
        article_cache,
        authors,
        Arc::new(ReadEventProducer::new(Arc::clone(&queue))),
        clock,
        background.clone(),
    );
    let articles = ArticleService::new(Arc::new(repository), counter.clone());
    let state = AppState::new(
        articles,
        HealthState::new(Some(pool.clone()), background.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_cache_sweeper(
        cache_backend,
        cache_settings.sweep_interval,
        shutdown_rx.clone(),
    );
    let consumer = spawn_read_event_consumer(queue, counter, consumer_config, shutdown_rx);

    let app = create_api_router(state, &api_config);
    let addr = api_config.socket_addr()?;
    tracing::info!(%addr, "Starting Quill API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    match consumer.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                processed = snapshot.processed,
                skipped = snapshot.skipped,
                "Read event consumer stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Read event consumer task failed"),
    }
    match sweeper.await {
        Ok(metrics) => {
            let snapshot = metrics.snapshot();
            tracing::info!(
                runs = snapshot.runs,
                purged = snapshot.purged,
                "Cache sweep stopped"
            );
        }
        Err(e) => tracing::error!(error = %e, "Cache sweep task failed"),
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, background.drain())
        .await
        .is_err()
    {
        tracing::warn!("Background tasks still running at shutdown");
    }

    Ok(())
}

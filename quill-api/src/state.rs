//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use deadpool_postgres::Pool;

use crate::background::BackgroundDispatcher;
use crate::services::ArticleService;

/// What the health endpoints look at.
#[derive(Clone)]
pub struct HealthState {
    /// Database pool. `None` when running on in-memory stores.
    pub db: Option<Pool>,
    pub background: BackgroundDispatcher,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(db: Option<Pool>, background: BackgroundDispatcher) -> Self {
        Self {
            db,
            background,
            start_time: Instant::now(),
        }
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub articles: ArticleService,
    pub health: Arc<HealthState>,
}

impl AppState {
    pub fn new(articles: ArticleService, health: HealthState) -> Self {
        Self {
            articles,
            health: Arc::new(health),
        }
    }
}

crate::impl_from_ref!(ArticleService, articles);
crate::impl_from_ref!(Arc<HealthState>, health);

//! Quill API - HTTP Layer and Article Orchestration
//!
//! This crate wires the Quill stores, cache and read-event pipeline into a
//! running service:
//!
//! - [`repository`]: the article repository (dual-store sync, cache-aside reads)
//! - [`services`]: status transitions on top of the repository
//! - [`routes`]: the Axum router for `/articles`, `/health` and `/metrics`
//! - [`jobs`]: the read-event consumer task
//! - [`background`]: bounded, deadline-limited background work

pub mod background;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod extractors;
pub mod jobs;
pub mod macros;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use background::{BackgroundDispatcher, BackgroundSnapshot};
pub use config::{ApiConfig, CacheSettings};
pub use db::DbConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use repository::{ArticleRepository, CachedArticleRepository};
pub use routes::create_api_router;
pub use services::ArticleService;
pub use state::{AppState, HealthState};
pub use types::*;

//! Route assembly.
//!
//! Execution order: CORS -> Observability -> Handler.

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::constants::USER_ID_HEADER;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub mod article;
pub mod health;

/// Build the full application router.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .nest("/articles", article::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(config))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// With no configured origins every origin is allowed.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: allowing all origins");
        return cors.allow_origin(Any).allow_headers(Any);
    }

    tracing::info!(origins = ?config.cors_origins, "CORS: allowing configured origins");
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins).allow_headers([
        header::CONTENT_TYPE,
        header::ACCEPT,
        HeaderName::from_static(USER_ID_HEADER),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _any = build_cors_layer(&ApiConfig::default());
        let config = ApiConfig {
            cors_origins: vec!["https://quill.example".into(), "bad\norigin".into()],
            ..ApiConfig::default()
        };
        let _restricted = build_cors_layer(&config);
    }
}

//! Axum Middleware for HTTP Request Tracing and Metrics
//!
//! Provides automatic instrumentation of all HTTP requests with:
//! - A tracing span per request
//! - Prometheus metrics collection

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;

/// Normalize path for metrics/spans (replace numeric ids with placeholders).
///
/// This prevents high-cardinality label explosion in Prometheus.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Observability middleware for Axum.
///
/// This middleware wraps every request with:
/// 1. A tracing span carrying method and route
/// 2. Prometheus metrics recording
/// 3. Request/response logging
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.route = %normalized_path,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Some(metrics) = metrics() {
        metrics.record_http_request(
            method.as_str(),
            &normalized_path,
            status.as_u16(),
            duration.as_secs_f64(),
        );
    }

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    response
}

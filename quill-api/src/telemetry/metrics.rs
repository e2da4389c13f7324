//! Prometheus Metrics Definitions
//!
//! Defines all Quill metrics with their labels and exposes a /metrics
//! endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<QuillMetrics>> = Lazy::new(QuillMetrics::new);

/// The registered metrics, or `None` if registration failed.
///
/// Recording is best-effort; a registration failure is logged once and
/// metrics are skipped from then on.
pub fn metrics() -> Option<&'static QuillMetrics> {
    match METRICS.as_ref() {
        Ok(metrics) => Some(metrics),
        Err(_) => None,
    }
}

/// Container for all Quill metrics.
#[derive(Clone)]
pub struct QuillMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: IntCounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Cache lookups - labels: namespace, outcome (hit/miss/error)
    pub cache_lookups_total: IntCounterVec,

    /// Background tasks - labels: task, outcome (completed/failed/timed_out/rejected)
    pub background_tasks_total: IntCounterVec,

    /// Read events - labels: outcome (published/failed)
    pub read_events_total: IntCounterVec,

    /// Consumed messages - labels: topic, outcome (processed/failed)
    pub consumer_messages_total: IntCounterVec,
}

fn register_err(name: &str, e: prometheus::Error) -> ApiError {
    let err = ApiError::internal_error(format!("Failed to register {}: {}", name, e));
    tracing::error!(metric = name, error = %e, "Metric registration failed");
    err
}

impl QuillMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_int_counter_vec!(
                "quill_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| register_err("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "quill_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| register_err("http_request_duration_seconds", e))?,

            cache_lookups_total: register_int_counter_vec!(
                "quill_cache_lookups_total",
                "Cache lookups by namespace and outcome",
                &["namespace", "outcome"]
            )
            .map_err(|e| register_err("cache_lookups_total", e))?,

            background_tasks_total: register_int_counter_vec!(
                "quill_background_tasks_total",
                "Background tasks by name and outcome",
                &["task", "outcome"]
            )
            .map_err(|e| register_err("background_tasks_total", e))?,

            read_events_total: register_int_counter_vec!(
                "quill_read_events_total",
                "Read events emitted by outcome",
                &["outcome"]
            )
            .map_err(|e| register_err("read_events_total", e))?,

            consumer_messages_total: register_int_counter_vec!(
                "quill_consumer_messages_total",
                "Consumed queue messages by topic and outcome",
                &["topic", "outcome"]
            )
            .map_err(|e| register_err("consumer_messages_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a cache lookup outcome.
    pub fn record_cache_lookup(&self, namespace: &str, outcome: &str) {
        self.cache_lookups_total
            .with_label_values(&[namespace, outcome])
            .inc();
    }

    /// Record how a background task ended.
    pub fn record_background_task(&self, task: &str, outcome: &str) {
        self.background_tasks_total
            .with_label_values(&[task, outcome])
            .inc();
    }

    /// Record a read event emission.
    pub fn record_read_event(&self, success: bool) {
        let outcome = if success { "published" } else { "failed" };
        self.read_events_total.with_label_values(&[outcome]).inc();
    }

    /// Record one handler attempt in a consumer.
    pub fn record_consumed(&self, topic: &str, success: bool) {
        let outcome = if success { "processed" } else { "failed" };
        self.consumer_messages_total
            .with_label_values(&[topic, outcome])
            .inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_http_request("GET", "/articles/pub/{id}", 200, 0.015);
        Ok(())
    }

    #[test]
    fn test_cache_lookup_counter_increments() -> Result<(), String> {
        let metrics = metrics().ok_or("metrics unavailable")?;
        let counter = metrics
            .cache_lookups_total
            .with_label_values(&["published", "hit"]);
        let before = counter.get();
        metrics.record_cache_lookup("published", "hit");
        assert!(counter.get() > before);
        Ok(())
    }

    #[test]
    fn test_outcome_recorders() -> Result<(), String> {
        let metrics = metrics().ok_or("metrics unavailable")?;
        metrics.record_background_task("cache_published", "timed_out");
        metrics.record_read_event(false);
        metrics.record_consumed("read_article", true);
        Ok(())
    }
}

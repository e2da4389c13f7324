//! Health Check Endpoints
//!
//! - /health/live - Process alive check
//! - /health/ready - Database connectivity check
//!
//! No authentication required for health endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::background::BackgroundSnapshot;
use crate::db::health_check;
use crate::state::{AppState, HealthState};

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub database: ComponentHealth,
    pub background: BackgroundHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundHealth {
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
}

impl From<BackgroundSnapshot> for BackgroundHealth {
    fn from(s: BackgroundSnapshot) -> Self {
        Self {
            completed: s.completed,
            failed: s.failed,
            timed_out: s.timed_out,
            rejected: s.rejected,
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (database connectivity)
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let status = database.status;

    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            database,
            background: state.background.stats().into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_database(state: &HealthState) -> ComponentHealth {
    let Some(pool) = state.db.as_ref() else {
        return ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: None,
            error: None,
        };
    };

    let start = std::time::Instant::now();
    match health_check(pool).await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(format!("Database check failed: {}", e.message)),
        },
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no auth required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("Process is alive".to_string()),
            details: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_database_check_without_pool_is_healthy() {
        let state = HealthState::new(None, Default::default());
        let health = check_database(&state).await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.latency_ms.is_none());
    }
}

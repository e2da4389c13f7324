//! Error Types for the Quill API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversions from the domain error taxonomy
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quill_core::{QuillError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Request carries no usable caller identity
    Unauthorized,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Field value is out of valid range
    InvalidRange,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested article does not exist or is not visible to the caller
    ArticleNotFound,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Database operation failed
    DatabaseError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::ArticleNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ServiceUnavailable | ErrorCode::ConnectionPoolExhausted => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",

            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of valid range",

            ErrorCode::ArticleNotFound => "Article not found",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_range(field: &str, min: impl fmt::Display, max: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidRange,
            format!("Field '{}' must be between {} and {}", field, min, max),
        )
    }

    /// Article missing or not visible to the caller. The two cases are not
    /// distinguished in the response.
    pub fn article_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ArticleNotFound, format!("Article {} not found", id))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Map the domain taxonomy onto HTTP errors.
///
/// Ownership failures are reported exactly like missing rows. Internal
/// causes are logged here and replaced by a generic message.
impl From<QuillError> for ApiError {
    fn from(err: QuillError) -> Self {
        match err {
            QuillError::Storage(StorageError::NotFound { id, .. })
            | QuillError::Storage(StorageError::NotFoundOrNotOwned { id, .. }) => {
                ApiError::article_not_found(id)
            }
            QuillError::Storage(StorageError::Pool { reason }) => {
                tracing::error!(reason = %reason, "Connection pool error");
                ApiError::connection_pool_exhausted()
            }
            QuillError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                ApiError::database_error("Database operation failed")
            }
            QuillError::Validation(e) => ApiError::validation_failed(e.to_string()),
            other => {
                tracing::error!(error = %other, "Internal error");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        QuillError::from(err).into()
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{EntityKind, EventError, ValidationError};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::ValidationFailed.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::ArticleNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InternalError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::ServiceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_not_owned_looks_like_not_found() {
        let missing: ApiError = QuillError::from(StorageError::NotFound {
            entity: EntityKind::Article,
            id: 4,
        })
        .into();
        let not_owned: ApiError = QuillError::from(StorageError::NotFoundOrNotOwned {
            entity: EntityKind::Article,
            id: 4,
            author_id: 9,
        })
        .into();
        assert_eq!(missing, not_owned);
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_causes_are_hidden() {
        let err: ApiError = QuillError::from(StorageError::QueryFailed {
            reason: "relation \"articles\" does not exist".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("relation"));

        let err: ApiError = QuillError::from(EventError::PublishFailed {
            topic: "read_article".to_string(),
            reason: "down".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: ApiError = QuillError::from(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message.contains("title"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::unauthorized("Missing X-User-Id header");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("X-User-Id"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_api_error_with_details() {
        let details = serde_json::json!({ "field": "limit", "max": 100 });
        let err = ApiError::invalid_range("limit", 1, 100).with_details(details.clone());
        assert_eq!(err.code, ErrorCode::InvalidRange);
        assert_eq!(err.details, Some(details));
    }
}

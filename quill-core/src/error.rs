//! Error types for Quill operations

use thiserror::Error;

use crate::{ArticleId, EntityKind, UserId};

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: EntityKind, id: i64 },

    /// Row absent or owned by someone else. The two cases are deliberately
    /// indistinguishable to callers.
    #[error("Update rejected: {entity} {id} not found or not owned by {author_id}")]
    NotFoundOrNotOwned {
        entity: EntityKind,
        id: ArticleId,
        author_id: UserId,
    },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: EntityKind, reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// True for both `NotFound` and `NotFoundOrNotOwned`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::NotFoundOrNotOwned { .. }
        )
    }
}

/// Cache layer errors. Never surfaced to readers; the repository logs them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {reason}")]
    Backend { reason: String },

    #[error("Cache serialization error for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache deserialization error for {key}: {reason}")]
    Deserialization { key: String, reason: String },
}

/// Message queue and read-event pipeline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("Publish to {topic} failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("Fetch from {topic} for group {group} failed: {reason}")]
    FetchFailed {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("Offset commit on {topic} for group {group} failed: {reason}")]
    CommitFailed {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("Malformed message at offset {offset}: {reason}")]
    Decode { offset: i64, reason: String },

    #[error("Handler failed at offset {offset}: {reason}")]
    HandlerFailed { offset: i64, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Master error type for all Quill errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QuillError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Author lookup failed for user {author_id}: {reason}")]
    AuthorLookupFailed { author_id: UserId, reason: String },
}

impl QuillError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QuillError::Storage(e) if e.is_not_found())
    }
}

/// Result type alias for Quill operations.
pub type QuillResult<T> = Result<T, QuillError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for queue operations.
pub type EventResult<T> = Result<T, EventError>;

// =============================================================================
// TESTS
// =============================================================================

//! Identifier and time aliases shared across the workspace.

/// Store-assigned article identifier. Zero means "not yet persisted".
pub type ArticleId = i64;

/// User identifier, used both for authors and readers.
pub type UserId = i64;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

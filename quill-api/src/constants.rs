//! Constants for the Quill API
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// ARTICLE LISTS
// ============================================================================

/// Page size of the cached first page of an author's articles.
pub const FIRST_PAGE_SIZE: i64 = 100;

/// Largest `limit` accepted by the list endpoint.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Articles with a body above this size are not pre-cached after a list read.
pub const MAX_PREFETCH_CONTENT_BYTES: usize = 1024 * 1024;

// ============================================================================
// BACKGROUND WORK
// ============================================================================

/// Deadline for one cache-population or event-emission task.
pub const DEFAULT_BACKGROUND_TIMEOUT_MS: u64 = 1000;

/// Maximum background tasks in flight before new ones are dropped.
pub const DEFAULT_BACKGROUND_MAX_IN_FLIGHT: usize = 1024;

// ============================================================================
// SERVER
// ============================================================================

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Default CORS preflight cache lifetime.
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 3600;

// ============================================================================
// CACHE
// ============================================================================

/// Default LMDB map size in megabytes.
pub const DEFAULT_CACHE_MAP_SIZE_MB: usize = 256;

/// Default interval between sweeps of expired cache entries.
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

//! Cache layer in front of the article and user stores.
//!
//! The cache is never the source of truth. Every namespace is independent,
//! entries expire by TTL, and any entry can be dropped and rebuilt from the
//! relational store at any time.
//!
//! # Layers
//!
//! - [`CacheBackend`]: byte-level get/set/delete with TTL
//!   ([`LmdbCacheBackend`], [`InMemoryCacheBackend`])
//! - [`ArticleCache`] / [`UserCache`]: typed namespaces over a backend
//! - [`CacheKey`]: the only way to address an entry, one constructor per namespace

pub mod article_cache;
pub mod config;
pub mod key;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod traits;
pub mod user_cache;

pub use article_cache::{ArticleCache, KvArticleCache};
pub use config::CacheConfig;
pub use key::{CacheKey, CacheNamespace};
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use traits::{CacheBackend, CacheStats};
pub use user_cache::{KvUserCache, UserCache};

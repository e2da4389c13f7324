//! Quill Storage
//!
//! Persistence for articles and users plus the cache layer in front of it:
//!
//! - [`DraftStore`] / [`PublishedStore`]: per-table data access
//! - [`ArticleStore::with_transaction`]: the dual-table atomic write
//! - [`pg`]: Postgres implementations over a deadpool pool
//! - [`memory`]: in-process implementations used by tests and local runs
//! - [`cache`]: key/value cache backends and typed namespaces

pub mod cache;
pub mod memory;
pub mod pg;

mod record;
mod traits;
mod user;

pub use record::*;
pub use traits::*;
pub use user::*;

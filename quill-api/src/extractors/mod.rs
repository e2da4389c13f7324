//! Custom extractors for Axum handlers.

mod caller;

pub use caller::Caller;

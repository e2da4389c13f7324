//! Repository Layer
//!
//! Orchestrates the draft store, the published store, the cache and the
//! read-event producer behind one interface per aggregate.

mod article;

pub use article::*;

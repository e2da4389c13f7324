//! Service Layer
//!
//! Business rules on top of the repositories: which status an operation
//! writes and which repository call it maps to.

mod article_service;

pub use article_service::*;

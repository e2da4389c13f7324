//! Quill Core - Domain Types
//!
//! Articles, statuses, read events, errors and the clock abstraction.
//! Every other crate in the workspace depends on this one; it performs no I/O.

mod article;
mod clock;
mod enums;
mod error;
mod event;
mod identity;

pub use article::*;
pub use clock::*;
pub use enums::*;
pub use error::*;
pub use event::*;
pub use identity::*;

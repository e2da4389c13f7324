//! Quill Events
//!
//! The asynchronous read-event pipeline:
//!
//! - [`MessageQueue`]: durable, offset-based topic log with consumer groups
//!   ([`PgMessageLog`], [`InMemoryMessageQueue`])
//! - [`ReadEventProducer`]: publishes one [`quill_core::ReadEvent`] per read
//! - [`subscribe`]: long-running polling consumer with at-least-once delivery
//! - [`ReadEventConsumer`]: feeds delivered events into an [`InteractionCounter`]

mod consumer;
mod interactive;
mod memory;
mod pg_log;
mod queue;
mod read_event;

pub use consumer::*;
pub use interactive::*;
pub use memory::*;
pub use pg_log::*;
pub use queue::*;
pub use read_event::*;

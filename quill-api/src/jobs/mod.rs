//! Background Jobs for the Quill API
//!
//! Long-running tasks spawned at startup and stopped through a shared
//! `watch` shutdown signal:
//!
//! - `read_event_consumer`: feeds read events into the interaction counter
//! - `cache_sweep`: purges cache entries whose TTL has passed
//!
//! # Usage
//!
//! ```ignore
//! use quill_api::jobs::spawn_read_event_consumer;
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = spawn_read_event_consumer(queue, counter, ConsumerConfig::from_env(), shutdown_rx);
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

pub mod cache_sweep;
pub mod read_event_consumer;

pub use cache_sweep::{spawn_cache_sweeper, CacheSweepMetrics, CacheSweepSnapshot};
pub use read_event_consumer::{spawn_read_event_consumer, MeteredHandler};

//! # shipper-producer
//!
//! Tails an Icinga log file and publishes each parsed event to the bus.
//!
//! This crate provides:
//!
//! - [`FileTailer`] — Follows a growing file across truncation and rotation
//! - [`OffsetStore`] — Atomic byte-offset checkpoint
//! - [`Publisher`] — Encodes and publishes events with bounded retry
//! - [`Producer`] — The tail, parse, queue and publish pipeline with orderly
//!   shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use shipper_bus::MemoryBus;
//! use shipper_producer::{Producer, ProducerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> shipper_producer::Result<()> {
//! let config = ProducerConfig::new("/var/log/icinga/icinga.log").with_checkpoint("seek");
//! let shutdown = CancellationToken::new();
//!
//! let report = Producer::new(config, MemoryBus::new()).run(shutdown).await?;
//! println!("shipped {} events", report.published);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod publisher;
pub mod tailer;

pub use checkpoint::OffsetStore;
pub use config::{ProducerConfig, RetryPolicy, TailConfig};
pub use error::{CheckpointError, ProducerError, Result, TailError};
pub use pipeline::{Producer, ProducerReport};
pub use publisher::Publisher;
pub use tailer::{FileTailer, TailedLine};

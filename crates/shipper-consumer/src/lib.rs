//! # shipper-consumer
//!
//! Durably subscribes to shipped Icinga events and writes each one into the
//! index for its UTC day.
//!
//! This crate provides:
//!
//! - [`Subscriber`] — Durable subscription loop with a bounded worker pool
//! - [`EventHandler`] — What the subscriber does with each decoded event
//! - [`Consumer`] — Subscriber wired to an [`shipper_index::IndexWriter`]
//! - [`ConsumerConfig`] — Topic, durable name, queue group and worker settings
//!
//! ## Example
//!
//! ```rust,no_run
//! use shipper_bus::MemoryBus;
//! use shipper_consumer::{Consumer, ConsumerConfig};
//! use shipper_index::MemoryIndexStore;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> shipper_consumer::Result<()> {
//! let consumer = Consumer::new(
//!     ConsumerConfig::new("consumer_web01"),
//!     MemoryBus::new(),
//!     MemoryIndexStore::new(),
//! );
//! let report = consumer.run(CancellationToken::new()).await?;
//! println!("indexed {} events", report.handled);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod subscriber;

pub use config::ConsumerConfig;
pub use error::{ConsumerError, Result};
pub use pipeline::Consumer;
pub use subscriber::{ConsumerReport, EventHandler, Subscriber};

//! # shipper-bus
//!
//! Durable message bus used between the producer and the consumer.
//!
//! This crate provides:
//!
//! - [`MessageBus`] / [`Subscription`] / [`Delivery`] — Abstract bus traits
//! - [`ClientIdentity`] — Stable per-machine client and durable names
//! - [`BusConfig`] — Connection settings
//! - [`NatsBus`] — NATS JetStream backend
//! - [`MemoryBus`] — In-process backend with durable cursors, for tests
//!
//! ## Example
//!
//! ```rust
//! use shipper_bus::{
//!     Delivery, MemoryBus, MessageBus, OutboundMessage, SubscribeOptions, Subscription,
//! };
//!
//! # async fn example() -> shipper_bus::Result<()> {
//! let bus = MemoryBus::new();
//! bus.publish("icinga", OutboundMessage::new(b"hello".to_vec())).await?;
//!
//! let mut sub = bus.subscribe(&SubscribeOptions::new("icinga", "consumer_host")).await?;
//! if let Some(delivery) = sub.next().await {
//!     let delivery = delivery?;
//!     assert_eq!(delivery.payload(), b"hello");
//!     delivery.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod identity;
pub mod memory;
pub mod nats;
pub mod traits;

pub use config::{BusConfig, Credentials, DEFAULT_NATS_PORT};
pub use error::{BusError, Result};
pub use identity::ClientIdentity;
pub use memory::{MemoryBus, MemoryDelivery, MemorySubscription};
pub use nats::{NatsBus, NatsDelivery, NatsSubscription};
pub use traits::{
    Delivery, MessageBus, OutboundMessage, StartPolicy, SubscribeOptions, Subscription,
};

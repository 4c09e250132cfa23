//! # shipper-index
//!
//! Writes events into one index per UTC calendar day.
//!
//! This crate provides:
//!
//! - [`IndexStore`] — The `exists` / `create` / `write` surface of a document store
//! - [`ElasticsearchStore`] — Elasticsearch over HTTP
//! - [`MemoryIndexStore`] — In-process store for tests
//! - [`IndexWriter`] — Lazily and idempotently creates daily indices, then
//!   writes one document per event
//!
//! ## Example
//!
//! ```rust
//! use shipper_index::{IndexWriter, MemoryIndexStore, index_name};
//! use shipper_proto::{Event, HostEvent};
//! use chrono::DateTime;
//!
//! # async fn example() -> shipper_index::Result<()> {
//! let store = MemoryIndexStore::new();
//! let writer = IndexWriter::new(store.clone());
//!
//! let event = Event::host(
//!     DateTime::from_timestamp(1_234_567_890, 0).unwrap_or_default(),
//!     HostEvent {
//!         subtype: "HOST ALERT".into(),
//!         host_name: "webhost".into(),
//!         state: "UP".into(),
//!         state_type: "HARD".into(),
//!         state_count: 1,
//!         message: "PING OK".into(),
//!     },
//! );
//!
//! writer.write(&event).await?;
//! assert_eq!(index_name(&event), "logstash-2009.02.13");
//! assert_eq!(store.documents("logstash-2009.02.13").len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod memory;
pub mod store;
pub mod writer;

pub use config::ElasticsearchConfig;
pub use elasticsearch::ElasticsearchStore;
pub use error::{IndexError, Result};
pub use memory::MemoryIndexStore;
pub use store::{CreateOutcome, IndexStore};
pub use writer::{INDEX_PREFIX, IndexWriter, index_mapping, index_name};

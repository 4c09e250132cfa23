//! # shipper-proto
//!
//! Event model shared by the icinga-shipper producer and consumer.
//!
//! This crate provides:
//!
//! - [`Event`] — A timestamped monitoring event with a closed [`EventPayload`]
//! - [`HostEvent`] / [`ServiceEvent`] — Structured host and service records
//! - [`LineParser`] — Parses Icinga log lines into events
//! - [`wire`] — The JSON envelope carried on the bus and stored in the index
//!
//! ## Example
//!
//! ```rust
//! use shipper_proto::{EventKind, LineParser, ParsedLine};
//!
//! let parser = LineParser::new();
//! let parsed = parser
//!     .parse("[1234567890] HOST ALERT: webhost;UP;HARD;1;PING OK")
//!     .unwrap();
//!
//! if let ParsedLine::Event(event) = parsed {
//!     assert_eq!(event.kind(), EventKind::Host);
//!     assert_eq!(event.timestamp_millis(), 1_234_567_890_000);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod parser;
pub mod wire;

pub use error::{CodecError, ParseError};
pub use event::{Event, EventKind, EventPayload, HostEvent, ServiceEvent};
pub use parser::{LineParser, ParsedLine};

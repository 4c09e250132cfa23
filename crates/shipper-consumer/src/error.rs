//! Error types for the consumer.

use shipper_bus::BusError;
use shipper_index::IndexError;
use shipper_proto::CodecError;
use thiserror::Error;

/// Errors surfaced by the consumer.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Subscribing, receiving or acknowledging failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// Writing to the index failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// A message could not be decoded.
    #[error("decoding error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for consumer operations.
pub type Result<T> = std::result::Result<T, ConsumerError>;

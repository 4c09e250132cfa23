//! Error types for parsing and encoding events.

use thiserror::Error;

/// Reasons a log line could not be turned into an event.
///
/// All variants are local to a single line: the caller logs the failure and
/// moves on to the next line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The line has no `[timestamp] LABEL:` header.
    #[error("missing event header")]
    MissingHeader,

    /// The bracketed timestamp is not an integer count of epoch seconds.
    #[error("bad timestamp: {0:?}")]
    BadTimestamp(String),

    /// A host event body does not have the expected fields.
    #[error("bad host body: {0}")]
    BadHostBody(String),

    /// A service event body does not have the expected fields.
    #[error("bad service body: {0}")]
    BadServiceBody(String),
}

/// Errors raised while encoding or decoding the wire envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The envelope timestamp is not a valid epoch-millisecond string.
    #[error("invalid envelope timestamp: {0:?}")]
    Timestamp(String),

    /// Unrecognized events have no wire representation.
    #[error("cannot encode unrecognized event {0:?}")]
    Unrecognized(String),
}

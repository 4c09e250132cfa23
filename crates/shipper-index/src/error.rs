//! Error types for index operations.

use std::time::Duration;

use shipper_proto::CodecError;
use thiserror::Error;

/// Errors that can occur while writing to the index store.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The HTTP request could not be sent or its response read.
    #[error("request failed: {0}")]
    Request(String),

    /// The store answered with an unexpected status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Index creation was not acknowledged.
    #[error("creating index {0} was not acknowledged; check that the timeout value is correct")]
    NotAcknowledged(String),

    /// A request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The event could not be encoded as a document.
    #[error("encoding error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = IndexError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected status 503: unavailable");

        let err = IndexError::NotAcknowledged("logstash-2009.02.13".to_string());
        assert!(err.to_string().contains("logstash-2009.02.13"));

        let err = IndexError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "request timed out after 5s");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IndexError>();
    }
}

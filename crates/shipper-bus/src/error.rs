//! Error types for bus operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur talking to the message bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// Could not establish the durable connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The bus did not persist a published message.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Creating or resuming a subscription failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// Receiving the next message failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Acknowledging a message failed.
    #[error("ack failed: {0}")]
    Ack(String),

    /// A bus call did not complete in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured limit.
        timeout: Duration,
    },

    /// The bus or subscription has been closed.
    #[error("bus closed")]
    Closed,

    /// The local client identity could not be derived.
    #[error("client identity unavailable: {0}")]
    Identity(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Runs `fut` with a deadline, mapping expiry to [`BusError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BusError::Timeout { operation, timeout })?
}

//! Publishes events to the bus with bounded retry.

use shipper_bus::{MessageBus, OutboundMessage};
use shipper_proto::{Event, wire};
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{ProducerError, Result};

/// Encodes events and publishes them to one topic.
///
/// Retries of one event reuse its message id so the bus can drop a
/// duplicate when an earlier attempt was persisted but its ack was lost.
#[derive(Debug)]
pub struct Publisher<B> {
    bus: B,
    topic: String,
    retry: RetryPolicy,
}

impl<B: MessageBus> Publisher<B> {
    /// Creates a publisher for `topic`.
    pub fn new(bus: B, topic: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            bus,
            topic: topic.into(),
            retry,
        }
    }

    /// Publishes `event`, returning once the bus has persisted it.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::Codec`] if the event cannot be encoded, or
    /// the last [`ProducerError::Bus`] error once all attempts have failed.
    pub async fn publish(&self, event: &Event) -> Result<()> {
        let message = OutboundMessage::new(wire::encode(event)?);
        let attempts = self.retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.bus.publish(&self.topic, message.clone()).await {
                Ok(()) => {
                    debug!(topic = %self.topic, id = %message.id, attempt, "published event");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        topic = %self.topic,
                        attempt,
                        error = %e,
                        retry_in = ?delay,
                        "publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(ProducerError::Bus(e)),
            }
        }
    }
}

//! Traits for message bus backends.
//!
//! The producer only publishes and the consumer only subscribes; both are
//! generic over [`MessageBus`] so tests can swap in [`crate::MemoryBus`].

use std::future::Future;

use uuid::Uuid;

use crate::error::Result;

/// Where a new durable subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
    /// Every message still held by the bus, then live ones.
    #[default]
    DeliverAll,
    /// Only messages published after the subscription is created.
    New,
}

/// A message ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Identifier the bus uses to drop duplicates of a retried publish.
    pub id: String,
    /// Message body.
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    /// Creates a message with a fresh id.
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
        }
    }

    /// Creates a message with an explicit id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

/// Options for a durable, queue-grouped subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Subject to receive from.
    pub topic: String,
    /// Queue group members share deliveries; `None` for a lone subscriber.
    pub queue_group: Option<String>,
    /// Name of the durable cursor restarts resume from.
    pub durable_name: String,
    /// Where a brand-new durable starts.
    pub start: StartPolicy,
    /// Remove the durable cursor when the subscription is closed.
    pub delete_durable_on_close: bool,
}

impl SubscribeOptions {
    /// Creates options delivering all available messages.
    #[must_use]
    pub fn new(topic: impl Into<String>, durable_name: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            queue_group: None,
            durable_name: durable_name.into(),
            start: StartPolicy::DeliverAll,
            delete_durable_on_close: false,
        }
    }

    /// Sets the queue group.
    #[must_use]
    pub fn with_queue_group(mut self, group: impl Into<String>) -> Self {
        self.queue_group = Some(group.into());
        self
    }

    /// Sets the start policy.
    #[must_use]
    pub const fn with_start(mut self, start: StartPolicy) -> Self {
        self.start = start;
        self
    }

    /// Removes the durable cursor on close.
    #[must_use]
    pub const fn with_delete_durable_on_close(mut self, delete: bool) -> Self {
        self.delete_durable_on_close = delete;
        self
    }
}

/// A durable publish/subscribe bus.
pub trait MessageBus: Send + Sync {
    /// Subscription handle returned by [`MessageBus::subscribe`].
    type Subscription: Subscription;

    /// Publishes `message` to `topic`.
    ///
    /// Returns only after the bus has persisted the message.
    fn publish(
        &self,
        topic: &str,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Creates or resumes a durable subscription.
    fn subscribe(
        &self,
        options: &SubscribeOptions,
    ) -> impl Future<Output = Result<Self::Subscription>> + Send;
}

/// A live durable subscription.
pub trait Subscription: Send {
    /// A single delivered message.
    type Delivery: Delivery;

    /// Waits for the next message in delivery order.
    ///
    /// Returns `None` once the subscription has ended.
    fn next(&mut self) -> impl Future<Output = Option<Result<Self::Delivery>>> + Send;

    /// Stops receiving. The durable cursor survives unless the options asked
    /// for it to be deleted.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// A message delivered to a subscriber, pending acknowledgement.
pub trait Delivery: Send + 'static {
    /// Message body.
    fn payload(&self) -> &[u8];

    /// Position of the message in its stream.
    fn sequence(&self) -> u64;

    /// Acknowledges the message so it is not redelivered to this durable.
    fn ack(self) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_options_defaults() {
        let options = SubscribeOptions::new("icinga", "consumer_web01");
        assert_eq!(options.topic, "icinga");
        assert_eq!(options.durable_name, "consumer_web01");
        assert_eq!(options.start, StartPolicy::DeliverAll);
        assert!(options.queue_group.is_none());
        assert!(!options.delete_durable_on_close);
    }

    #[test]
    fn subscribe_options_builder() {
        let options = SubscribeOptions::new("icinga", "d")
            .with_queue_group("indexers")
            .with_start(StartPolicy::New)
            .with_delete_durable_on_close(true);
        assert_eq!(options.queue_group.as_deref(), Some("indexers"));
        assert_eq!(options.start, StartPolicy::New);
        assert!(options.delete_durable_on_close);
    }

    #[test]
    fn outbound_ids_are_unique() {
        let a = OutboundMessage::new(Vec::new());
        let b = OutboundMessage::new(Vec::new());
        assert_ne!(a.id, b.id);

        let c = OutboundMessage::with_id("fixed", b"x".to_vec());
        assert_eq!(c.id, "fixed");
    }
}

//! NATS JetStream backend.
//!
//! Each `(cluster, topic)` pair maps to one JetStream stream named
//! `<cluster>_<topic>` capturing the topic subject. Durable subscriptions
//! are pull consumers with explicit acks.
//!
//! JetStream has no queue groups. [`SubscribeOptions::queue_group`] is only
//! logged here: instances split deliveries when they use the same durable
//! name, so group members must be given one durable name between them.

use std::collections::HashSet;
use std::pin::Pin;
use std::time::Duration;

use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, PullConsumer, pull};
use async_nats::jetstream::{self, stream};
use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::BusConfig;
use crate::error::{BusError, Result, with_timeout};
use crate::identity::{ClientIdentity, sanitize_name};
use crate::traits::{
    Delivery, MessageBus, OutboundMessage, StartPolicy, SubscribeOptions, Subscription,
};

const MSG_ID_HEADER: &str = "Nats-Msg-Id";

/// A durable connection to a NATS JetStream server.
///
/// Queue-group membership comes from a shared durable name, not from
/// [`SubscribeOptions::queue_group`].
pub struct NatsBus {
    jetstream: jetstream::Context,
    cluster_id: String,
    timeout: Duration,
    known_streams: Mutex<HashSet<String>>,
}

impl NatsBus {
    /// Connects under the given client identity.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] for an invalid config and
    /// [`BusError::Connect`] if the server cannot be reached.
    pub async fn connect(config: &BusConfig, identity: &ClientIdentity) -> Result<Self> {
        config.validate()?;

        let mut options = async_nats::ConnectOptions::new()
            .name(identity.client_id())
            .connection_timeout(config.request_timeout);
        if let Some(credentials) = &config.credentials {
            options = options
                .user_and_password(credentials.username.clone(), credentials.password.clone());
        }

        let url = config.server_url();
        let client = options
            .connect(url.as_str())
            .await
            .map_err(|e| BusError::Connect(format!("{url}: {e}")))?;

        info!(
            url = %url,
            cluster = %config.cluster_id,
            client_id = %identity.client_id(),
            "connected to bus"
        );

        Ok(Self {
            jetstream: jetstream::new(client),
            cluster_id: config.cluster_id.clone(),
            timeout: config.request_timeout,
            known_streams: Mutex::new(HashSet::new()),
        })
    }

    /// Name of the stream holding `topic`.
    #[must_use]
    pub fn stream_name(&self, topic: &str) -> String {
        sanitize_name(&format!("{}_{topic}", self.cluster_id))
    }

    async fn ensure_stream(&self, topic: &str) -> Result<stream::Stream> {
        let name = self.stream_name(topic);
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: name.clone(),
                subjects: vec![topic.to_string()],
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Subscribe(format!("stream {name}: {e}")))?;
        self.known_streams.lock().insert(topic.to_string());
        Ok(stream)
    }
}

impl MessageBus for NatsBus {
    type Subscription = NatsSubscription;

    async fn publish(&self, topic: &str, message: OutboundMessage) -> Result<()> {
        with_timeout("publish", self.timeout, async {
            let known = self.known_streams.lock().contains(topic);
            if !known {
                self.ensure_stream(topic).await?;
            }

            let mut headers = async_nats::HeaderMap::new();
            headers.insert(MSG_ID_HEADER, message.id.as_str());

            let ack = self
                .jetstream
                .publish_with_headers(topic.to_string(), headers, message.payload.into())
                .await
                .map_err(|e| BusError::Publish(e.to_string()))?;
            ack.await.map_err(|e| BusError::Publish(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn subscribe(&self, options: &SubscribeOptions) -> Result<NatsSubscription> {
        let durable = options.durable_name.clone();
        let deliver_policy = match options.start {
            StartPolicy::DeliverAll => DeliverPolicy::All,
            StartPolicy::New => DeliverPolicy::New,
        };

        with_timeout("subscribe", self.timeout, async {
            let stream = self.ensure_stream(&options.topic).await?;
            let consumer: PullConsumer = stream
                .get_or_create_consumer(
                    &durable,
                    pull::Config {
                        durable_name: Some(durable.clone()),
                        deliver_policy,
                        ack_policy: AckPolicy::Explicit,
                        filter_subject: options.topic.clone(),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| BusError::Subscribe(format!("consumer {durable}: {e}")))?;

            let messages = consumer
                .messages()
                .await
                .map_err(|e| BusError::Subscribe(e.to_string()))?;

            debug!(
                topic = %options.topic,
                durable = %durable,
                queue_group = ?options.queue_group,
                "durable subscription ready"
            );

            Ok(NatsSubscription {
                messages: Box::pin(messages),
                stream,
                durable: durable.clone(),
                delete_on_close: options.delete_durable_on_close,
                timeout: self.timeout,
            })
        })
        .await
    }
}

/// A durable pull subscription on JetStream.
pub struct NatsSubscription {
    messages: Pin<Box<pull::Stream>>,
    stream: stream::Stream,
    durable: String,
    delete_on_close: bool,
    timeout: Duration,
}

impl Subscription for NatsSubscription {
    type Delivery = NatsDelivery;

    async fn next(&mut self) -> Option<Result<NatsDelivery>> {
        let timeout = self.timeout;
        self.messages.next().await.map(|result| {
            result
                .map(|message| NatsDelivery { message, timeout })
                .map_err(|e| BusError::Receive(e.to_string()))
        })
    }

    async fn close(self) -> Result<()> {
        drop(self.messages);
        if self.delete_on_close {
            let stream = self.stream;
            let durable = self.durable;
            with_timeout("delete durable", self.timeout, async {
                stream
                    .delete_consumer(&durable)
                    .await
                    .map(|_| ())
                    .map_err(|e| BusError::Subscribe(format!("delete {durable}: {e}")))
            })
            .await?;
        }
        Ok(())
    }
}

/// A JetStream message pending acknowledgement.
pub struct NatsDelivery {
    message: jetstream::Message,
    timeout: Duration,
}

impl Delivery for NatsDelivery {
    fn payload(&self) -> &[u8] {
        &self.message.message.payload
    }

    fn sequence(&self) -> u64 {
        self.message
            .info()
            .map(|info| info.stream_sequence)
            .unwrap_or_default()
    }

    async fn ack(self) -> Result<()> {
        let message = self.message;
        with_timeout("ack", self.timeout, async move {
            message.ack().await.map_err(|e| BusError::Ack(e.to_string()))
        })
        .await
    }
}

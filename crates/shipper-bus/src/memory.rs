//! In-process message bus.
//!
//! Mirrors the durable semantics of the real bus closely enough for tests:
//!
//! - messages are kept per topic and numbered from 1
//! - a durable cursor is shared by every subscription using its name, so
//!   queue-group members split the stream between them
//! - when the last subscription of a durable goes away, unacknowledged
//!   messages are redelivered to the next subscription
//! - publishes carrying an id that was already stored are dropped

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{BusError, Result};
use crate::traits::{
    Delivery, MessageBus, OutboundMessage, StartPolicy, SubscribeOptions, Subscription,
};

type DurableKey = (String, String);

#[derive(Default)]
struct TopicLog {
    messages: Vec<Arc<Vec<u8>>>,
    ids: HashSet<String>,
}

#[derive(Default)]
struct DurableState {
    /// Index into the topic log of the next never-delivered message.
    next_index: usize,
    /// Sequences delivered but not yet acknowledged.
    unacked: BTreeSet<u64>,
    /// Sequences to hand out again before continuing at `next_index`.
    redeliver: VecDeque<u64>,
    /// Live subscriptions sharing this cursor.
    active: usize,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, TopicLog>,
    durables: HashMap<DurableKey, DurableState>,
    injected_publish_failures: u32,
    closed: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// In-memory [`MessageBus`]. Cheap to clone; clones share the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

impl MemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` publishes fail.
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.state.lock().injected_publish_failures = count;
    }

    /// Returns the stored payloads of `topic`, oldest first.
    #[must_use]
    pub fn messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map(|log| log.messages.iter().map(|m| m.as_ref().clone()).collect())
            .unwrap_or_default()
    }

    /// Number of delivered but unacknowledged messages for a durable.
    #[must_use]
    pub fn pending_acks(&self, topic: &str, durable: &str) -> usize {
        self.inner
            .state
            .lock()
            .durables
            .get(&(topic.to_string(), durable.to_string()))
            .map_or(0, |d| d.unacked.len())
    }

    /// Returns true if a durable cursor with this name exists.
    #[must_use]
    pub fn has_durable(&self, topic: &str, durable: &str) -> bool {
        self.inner
            .state
            .lock()
            .durables
            .contains_key(&(topic.to_string(), durable.to_string()))
    }

    /// Closes the bus, ending every subscription.
    pub fn close(&self) {
        self.inner.state.lock().closed = true;
        self.inner.notify.notify_waiters();
    }
}

impl MessageBus for MemoryBus {
    type Subscription = MemorySubscription;

    async fn publish(&self, topic: &str, message: OutboundMessage) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(BusError::Closed);
            }
            if state.injected_publish_failures > 0 {
                state.injected_publish_failures -= 1;
                return Err(BusError::Publish("injected failure".to_string()));
            }

            let log = state.topics.entry(topic.to_string()).or_default();
            if !log.ids.insert(message.id.clone()) {
                debug!(topic, id = %message.id, "dropping duplicate publish");
                return Ok(());
            }
            log.messages.push(Arc::new(message.payload));
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, options: &SubscribeOptions) -> Result<MemorySubscription> {
        let key = (options.topic.clone(), options.durable_name.clone());
        {
            let mut guard = self.inner.state.lock();
            let State {
                topics,
                durables,
                closed,
                ..
            } = &mut *guard;
            if *closed {
                return Err(BusError::Closed);
            }

            let published = topics.get(&options.topic).map_or(0, |log| log.messages.len());
            let durable = durables.entry(key.clone()).or_insert_with(|| DurableState {
                next_index: match options.start {
                    StartPolicy::DeliverAll => 0,
                    StartPolicy::New => published,
                },
                ..DurableState::default()
            });

            if durable.active == 0 && !durable.unacked.is_empty() {
                let unacked = std::mem::take(&mut durable.unacked);
                durable.redeliver = unacked.into_iter().collect();
            }
            durable.active += 1;
        }

        Ok(MemorySubscription {
            inner: Arc::clone(&self.inner),
            key,
            delete_on_close: options.delete_durable_on_close,
        })
    }
}

/// Subscription on a [`MemoryBus`].
pub struct MemorySubscription {
    inner: Arc<Inner>,
    key: DurableKey,
    delete_on_close: bool,
}

impl MemorySubscription {
    fn try_take(&self) -> Option<Option<MemoryDelivery>> {
        let mut guard = self.inner.state.lock();
        let State {
            topics,
            durables,
            closed,
            ..
        } = &mut *guard;
        if *closed {
            return Some(None);
        }
        let durable = durables.get_mut(&self.key)?;
        let log = topics.get(&self.key.0)?;

        let sequence = if let Some(seq) = durable.redeliver.pop_front() {
            seq
        } else if durable.next_index < log.messages.len() {
            durable.next_index += 1;
            durable.next_index as u64
        } else {
            return None;
        };
        durable.unacked.insert(sequence);

        let payload = Arc::clone(&log.messages[(sequence - 1) as usize]);
        Some(Some(MemoryDelivery {
            inner: Arc::clone(&self.inner),
            key: self.key.clone(),
            sequence,
            payload,
        }))
    }
}

impl Subscription for MemorySubscription {
    type Delivery = MemoryDelivery;

    async fn next(&mut self) -> Option<Result<MemoryDelivery>> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(delivery) = self.try_take() {
                return delivery.map(Ok);
            }
            notified.await;
        }
    }

    async fn close(self) -> Result<()> {
        if self.delete_on_close {
            self.inner.state.lock().durables.remove(&self.key);
        }
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Some(durable) = self.inner.state.lock().durables.get_mut(&self.key) {
            durable.active = durable.active.saturating_sub(1);
        }
    }
}

/// A message delivered by a [`MemorySubscription`].
pub struct MemoryDelivery {
    inner: Arc<Inner>,
    key: DurableKey,
    sequence: u64,
    payload: Arc<Vec<u8>>,
}

impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }

    async fn ack(self) -> Result<()> {
        if let Some(durable) = self.inner.state.lock().durables.get_mut(&self.key) {
            durable.unacked.remove(&self.sequence);
        }
        Ok(())
    }
}

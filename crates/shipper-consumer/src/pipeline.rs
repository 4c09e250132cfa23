//! The consumer pipeline: subscribe, decode, index, ack.

use std::sync::Arc;

use shipper_bus::MessageBus;
use shipper_index::{IndexStore, IndexWriter};
use tokio_util::sync::CancellationToken;

use crate::config::ConsumerConfig;
use crate::error::Result;
use crate::subscriber::{ConsumerReport, Subscriber};

/// Indexes every event of a durable subscription into daily indices.
pub struct Consumer<B, S> {
    subscriber: Subscriber<B>,
    writer: Arc<IndexWriter<S>>,
}

impl<B: MessageBus, S: IndexStore + 'static> Consumer<B, S> {
    /// Creates a consumer reading from `bus` and writing to `store`.
    pub fn new(config: ConsumerConfig, bus: B, store: S) -> Self {
        Self {
            subscriber: Subscriber::new(bus, config),
            writer: Arc::new(IndexWriter::new(store)),
        }
    }

    /// Runs until `shutdown` is cancelled or the subscription ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be created or closed.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<ConsumerReport> {
        self.subscriber
            .run(Arc::clone(&self.writer), shutdown)
            .await
    }
}

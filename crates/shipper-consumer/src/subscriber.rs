//! Durable subscription loop with a bounded worker pool.
//!
//! Messages arrive in order from one subscription and are fanned out to at
//! most `worker_count` concurrent handlers. Each message is acknowledged once
//! its handler finishes, whether or not the handler succeeded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shipper_bus::{BusError, Delivery, MessageBus, Subscription};
use shipper_index::{IndexStore, IndexWriter};
use shipper_proto::{Event, EventKind, wire};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::error::Result;

/// Processes one decoded event.
pub trait EventHandler: Send + Sync + 'static {
    /// Handles `event`. An error is logged and the message still acknowledged.
    fn handle(&self, event: &Event) -> impl Future<Output = Result<()>> + Send;
}

impl<S: IndexStore + 'static> EventHandler for IndexWriter<S> {
    async fn handle(&self, event: &Event) -> Result<()> {
        self.write(event).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    handled: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    undecodable: AtomicU64,
}

/// Outcome of a completed subscription run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsumerReport {
    /// Messages taken from the subscription.
    pub received: u64,
    /// Events the handler accepted.
    pub handled: u64,
    /// Events the handler rejected.
    pub failed: u64,
    /// Messages with an unrecognized event type.
    pub skipped: u64,
    /// Messages that were not valid envelopes.
    pub undecodable: u64,
}

impl Counters {
    fn report(&self) -> ConsumerReport {
        ConsumerReport {
            received: self.received.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
        }
    }
}

/// Receives events from a durable subscription and dispatches them.
#[derive(Debug)]
pub struct Subscriber<B> {
    bus: B,
    config: ConsumerConfig,
}

impl<B: MessageBus> Subscriber<B> {
    /// Creates a subscriber on `bus`.
    pub const fn new(bus: B, config: ConsumerConfig) -> Self {
        Self { bus, config }
    }

    /// Subscribes and handles messages until `shutdown` is cancelled or the
    /// subscription ends.
    ///
    /// In-flight handlers are awaited before the subscription is closed.
    /// Messages taken but not yet dispatched at shutdown stay unacknowledged
    /// and are redelivered on the next run.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config, if subscribing or closing the
    /// subscription fails, or after `max_receive_failures` consecutive failed
    /// receives. Failed receives are retried with a doubling delay.
    pub async fn run<H: EventHandler>(
        &self,
        handler: Arc<H>,
        shutdown: CancellationToken,
    ) -> Result<ConsumerReport> {
        self.config.validate()?;
        let options = self.config.subscribe_options();
        let mut subscription = self.bus.subscribe(&options).await?;
        info!(
            topic = %options.topic,
            durable = %options.durable_name,
            queue_group = ?options.queue_group,
            start = ?options.start,
            workers = self.config.worker_count,
            "subscribed"
        );

        let counters = Arc::new(Counters::default());
        let permits = Arc::new(Semaphore::new(self.config.worker_count));
        let mut workers = JoinSet::new();

        let mut receive_failures = 0u32;
        let mut failure = None;
        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                next = subscription.next() => next,
            };
            let delivery = match next {
                Some(Ok(delivery)) => {
                    receive_failures = 0;
                    delivery
                }
                Some(Err(BusError::Closed)) | None => {
                    info!("subscription ended");
                    break;
                }
                Some(Err(e)) => {
                    receive_failures += 1;
                    if receive_failures >= self.config.max_receive_failures {
                        error!(
                            error = %e,
                            failures = receive_failures,
                            "giving up on subscription"
                        );
                        failure = Some(e);
                        break;
                    }
                    let delay = self.config.receive_backoff_after(receive_failures);
                    warn!(
                        error = %e,
                        failures = receive_failures,
                        retry_in = ?delay,
                        "receive failed"
                    );
                    tokio::select! {
                        biased;
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(delay) => continue,
                    }
                }
            };
            counters.received.fetch_add(1, Ordering::Relaxed);

            let permit = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            workers.spawn(process(
                delivery,
                Arc::clone(&handler),
                Arc::clone(&counters),
                permit,
            ));

            while let Some(joined) = workers.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "worker task failed");
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }
        let closed = subscription.close().await;

        let report = counters.report();
        info!(?report, "subscriber stopped");
        if let Some(e) = failure {
            if let Err(close_error) = closed {
                warn!(error = %close_error, "closing failed subscription");
            }
            return Err(e.into());
        }
        closed?;
        Ok(report)
    }
}

async fn process<D: Delivery, H: EventHandler>(
    delivery: D,
    handler: Arc<H>,
    counters: Arc<Counters>,
    _permit: OwnedSemaphorePermit,
) {
    let sequence = delivery.sequence();
    match wire::decode(delivery.payload()) {
        Ok(event) if event.kind() == EventKind::Unrecognized => {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(sequence, payload = ?event.payload, "skipping unrecognized event");
        }
        Ok(event) => match handler.handle(&event).await {
            Ok(()) => {
                counters.handled.fetch_add(1, Ordering::Relaxed);
                debug!(sequence, kind = %event.kind(), "handled event");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(sequence, error = %e, kind = %event.kind(), "handling event failed");
            }
        },
        Err(e) => {
            counters.undecodable.fetch_add(1, Ordering::Relaxed);
            warn!(
                sequence,
                error = %e,
                payload = %String::from_utf8_lossy(delivery.payload()),
                "dropping undecodable message"
            );
        }
    }

    if let Err(e) = delivery.ack().await {
        warn!(sequence, error = %e, "ack failed, message may be redelivered");
    }
}

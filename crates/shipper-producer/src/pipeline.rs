//! The producer pipeline: tail, parse, queue, publish, checkpoint.
//!
//! ```text
//! FileTailer ─▶ LineParser ─▶ mpsc queue ─▶ Publisher ─▶ bus
//!      │                                        │
//!  handed-off offset                     published offset ─▶ periodic checkpoint
//! ```
//!
//! On shutdown the tailer stops first. The queue is then drained within the
//! drain timeout and the offset of the last handed-off line is saved. If the
//! drain times out only the published offset is saved, so unpublished lines
//! are read again on restart.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use shipper_bus::MessageBus;
use shipper_proto::{Event, LineParser, ParsedLine};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::OffsetStore;
use crate::config::ProducerConfig;
use crate::error::{Result, TailError};
use crate::publisher::Publisher;
use crate::tailer::FileTailer;

#[derive(Debug, Default)]
struct ProducerStats {
    lines: AtomicU64,
    skipped: AtomicU64,
    parse_failures: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl ProducerStats {
    fn report(&self, checkpoint: u64, drained: bool) -> ProducerReport {
        ProducerReport {
            lines: self.lines.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            checkpoint,
            drained,
        }
    }
}

/// Outcome of a completed producer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    /// Complete lines read from the file.
    pub lines: u64,
    /// Lines with an event type that is not shipped.
    pub skipped: u64,
    /// Lines that failed to parse.
    pub parse_failures: u64,
    /// Events the bus accepted.
    pub published: u64,
    /// Events dropped after exhausting publish retries.
    pub dropped: u64,
    /// Offset written to the checkpoint.
    pub checkpoint: u64,
    /// Whether the queue was fully drained before shutdown.
    pub drained: bool,
}

/// Ships one log file to the bus until cancelled.
pub struct Producer<B> {
    config: ProducerConfig,
    bus: B,
}

impl<B: MessageBus + 'static> Producer<B> {
    /// Creates a producer publishing through `bus`.
    pub const fn new(config: ProducerConfig, bus: B) -> Self {
        Self { config, bus }
    }

    /// Runs until `shutdown` is cancelled or the tailer fails.
    ///
    /// The checkpoint is saved before returning in both cases.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid config, a missing file when
    /// `must_exist` is set, a tail read failure, or a failed final
    /// checkpoint save.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ProducerReport> {
        self.config.validate()?;
        let Self { config, bus } = self;

        let store = OffsetStore::new(&config.checkpoint);
        let start = store.load();
        let tailer = FileTailer::open(config.tail_config(start)).await?;
        let start = tailer.offset();
        info!(
            file = %config.file.display(),
            topic = %config.topic,
            offset = start,
            "starting producer"
        );

        let stats = Arc::new(ProducerStats::default());
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (published_tx, published_rx) = watch::channel(start);

        let tail_task = tokio::spawn(tail_loop(
            tailer,
            queue_tx,
            shutdown.clone(),
            Arc::clone(&stats),
        ));
        let publish_task = tokio::spawn(publish_loop(
            Publisher::new(bus, config.topic.clone(), config.retry),
            queue_rx,
            published_tx,
            Arc::clone(&stats),
        ));

        let checkpoint_stop = CancellationToken::new();
        let checkpoint_task = config.checkpoint_interval.map(|interval| {
            tokio::spawn(checkpoint_loop(
                store.clone(),
                interval,
                published_rx.clone(),
                checkpoint_stop.clone(),
            ))
        });

        let (handed_off, tail_result) = match tail_task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "tailer task failed");
                (*published_rx.borrow(), Ok(()))
            }
        };

        let drained = drain(publish_task, config.drain_timeout).await;

        checkpoint_stop.cancel();
        if let Some(task) = checkpoint_task {
            let _ = task.await;
        }

        let checkpoint = if drained {
            handed_off
        } else {
            *published_rx.borrow()
        };
        store.save(checkpoint)?;

        let report = stats.report(checkpoint, drained);
        info!(?report, "producer stopped");

        tail_result?;
        Ok(report)
    }
}

/// Reads and parses lines until cancelled, returning the offset after the
/// last line whose handling finished.
async fn tail_loop(
    mut tailer: FileTailer,
    queue: mpsc::Sender<(Event, u64)>,
    shutdown: CancellationToken,
    stats: Arc<ProducerStats>,
) -> (u64, std::result::Result<(), TailError>) {
    let parser = LineParser::new();
    let mut handed_off = tailer.offset();

    loop {
        let tailed = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            line = tailer.next_line() => match line {
                Ok(line) => line,
                Err(e) => {
                    error!(error = %e, "tailer failed");
                    return (handed_off, Err(e));
                }
            },
        };
        stats.lines.fetch_add(1, Ordering::Relaxed);

        match parser.parse(&tailed.line) {
            Ok(ParsedLine::Event(event)) => {
                let sent = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    sent = queue.send((event, tailed.offset)) => sent,
                };
                if sent.is_err() {
                    warn!("publisher stopped, ending tailer");
                    break;
                }
            }
            Ok(ParsedLine::Skipped { label }) => {
                stats.skipped.fetch_add(1, Ordering::Relaxed);
                debug!(label = %label, "skipping event type");
            }
            Err(e) => {
                stats.parse_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, line = %tailed.line, "skipping unparseable line");
            }
        }
        handed_off = tailed.offset;
    }

    debug!(offset = handed_off, "tailer stopped");
    (handed_off, Ok(()))
}

async fn publish_loop<B: MessageBus>(
    publisher: Publisher<B>,
    mut queue: mpsc::Receiver<(Event, u64)>,
    published: watch::Sender<u64>,
    stats: Arc<ProducerStats>,
) {
    while let Some((event, offset)) = queue.recv().await {
        match publisher.publish(&event).await {
            Ok(()) => {
                stats.published.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!(
                    error = %e,
                    kind = %event.kind(),
                    timestamp = event.timestamp_millis(),
                    "dropping event after failed publish"
                );
            }
        }
        published.send_replace(offset);
    }
}

async fn checkpoint_loop(
    store: OffsetStore,
    interval: Duration,
    mut published: watch::Receiver<u64>,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if !published.has_changed().unwrap_or(false) {
            continue;
        }
        let offset = *published.borrow_and_update();
        if let Err(e) = store.save(offset) {
            warn!(error = %e, "periodic checkpoint failed");
        }
    }
}

/// Waits for the publisher to empty the queue. Returns false if it did not
/// finish within `timeout`; the task is aborted in that case.
async fn drain(mut publish_task: JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, &mut publish_task).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(error = %e, "publisher task failed");
            false
        }
        Err(_) => {
            warn!(?timeout, "drain timed out, unpublished lines will be re-read");
            publish_task.abort();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use shipper_bus::MemoryBus;
    use shipper_proto::{EventKind, wire};
    use tempfile::TempDir;

    use super::*;
    use crate::config::RetryPolicy;

    const HOST_LINE: &str = "[1234567890] HOST ALERT: webhost;UP;HARD;1;PING OK\n";
    const SERVICE_LINE: &str =
        "[1234567891] SERVICE ALERT: webhost;http;CRITICAL;SOFT;2;connection refused\n";

    fn append(path: &Path, data: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open for append");
        file.write_all(data.as_bytes()).expect("append");
    }

    fn config(dir: &TempDir) -> ProducerConfig {
        ProducerConfig::new(dir.path().join("icinga.log"))
            .with_checkpoint(dir.path().join("seek"))
            .with_poll_interval(Duration::from_millis(10))
            .with_retry(
                RetryPolicy::default()
                    .with_max_attempts(2)
                    .with_base_delay(Duration::from_millis(1)),
            )
    }

    async fn wait_for_messages(bus: &MemoryBus, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while bus.messages("icinga").len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages before timeout");
    }

    #[tokio::test]
    async fn ships_lines_and_checkpoints_on_shutdown() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir);
        append(&config.file, HOST_LINE);
        append(&config.file, "[1234567890] EXTERNAL COMMAND: SCHEDULE_FORCED_SVC_CHECK\n");
        append(&config.file, "garbage without header\n");
        append(&config.file, SERVICE_LINE);
        let file_len = std::fs::metadata(&config.file).expect("metadata").len();

        let bus = MemoryBus::new();
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config.clone(), bus.clone()).run(shutdown.clone()));

        wait_for_messages(&bus, 2).await;
        // let the tailer consume the trailing lines before stopping
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        let report = run.await.expect("join").expect("run");

        let kinds: Vec<EventKind> = bus
            .messages("icinga")
            .iter()
            .map(|m| wire::decode(m).expect("decode").kind())
            .collect();
        assert_eq!(kinds, vec![EventKind::Host, EventKind::Service]);

        assert_eq!(report.lines, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.published, 2);
        assert!(report.drained);
        assert_eq!(report.checkpoint, file_len);
        assert_eq!(OffsetStore::new(&config.checkpoint).load(), file_len);
    }

    #[tokio::test]
    async fn restart_resumes_from_checkpoint() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir);
        append(&config.file, HOST_LINE);
        let bus = MemoryBus::new();

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config.clone(), bus.clone()).run(shutdown.clone()));
        wait_for_messages(&bus, 1).await;
        shutdown.cancel();
        run.await.expect("join").expect("first run");

        append(&config.file, SERVICE_LINE);
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config.clone(), bus.clone()).run(shutdown.clone()));
        wait_for_messages(&bus, 2).await;
        shutdown.cancel();
        run.await.expect("join").expect("second run");

        let messages = bus.messages("icinga");
        assert_eq!(messages.len(), 2);
        assert_eq!(
            wire::decode(&messages[1]).expect("decode").kind(),
            EventKind::Service
        );
    }

    #[tokio::test]
    async fn failed_publishes_are_dropped_without_stalling() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir);
        append(&config.file, HOST_LINE);
        append(&config.file, SERVICE_LINE);

        let bus = MemoryBus::new();
        // both attempts of the first event fail
        bus.fail_next_publishes(2);
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config, bus.clone()).run(shutdown.clone()));

        wait_for_messages(&bus, 1).await;
        shutdown.cancel();
        let report = run.await.expect("join").expect("run");

        assert_eq!(report.dropped, 1);
        assert_eq!(report.published, 1);
        assert_eq!(
            wire::decode(&bus.messages("icinga")[0]).expect("decode").kind(),
            EventKind::Service
        );
    }

    #[tokio::test]
    async fn periodic_checkpoint_tracks_published_offset() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir).with_checkpoint_interval(Some(Duration::from_millis(20)));
        append(&config.file, HOST_LINE);

        let bus = MemoryBus::new();
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config.clone(), bus.clone()).run(shutdown.clone()));

        wait_for_messages(&bus, 1).await;
        let store = OffsetStore::new(&config.checkpoint);
        let expected = HOST_LINE.len() as u64;
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.load() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("periodic checkpoint before timeout");

        shutdown.cancel();
        run.await.expect("join").expect("run");
    }

    #[tokio::test]
    async fn timed_out_drain_saves_published_offset() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir)
            .with_drain_timeout(Duration::from_millis(50))
            .with_retry(
                RetryPolicy::default()
                    .with_max_attempts(10)
                    .with_base_delay(Duration::from_secs(1)),
            );
        append(&config.file, HOST_LINE);

        let bus = MemoryBus::new();
        bus.fail_next_publishes(100);
        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Producer::new(config.clone(), bus.clone()).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        let report = run.await.expect("join").expect("run");

        assert!(!report.drained);
        assert_eq!(report.checkpoint, 0);
        assert_eq!(OffsetStore::new(&config.checkpoint).load(), 0);
    }

    #[tokio::test]
    async fn missing_file_with_must_exist_fails_fast() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir).with_must_exist(true);

        let result = Producer::new(config, MemoryBus::new())
            .run(CancellationToken::new())
            .await;
        assert!(matches!(result, Err(crate::ProducerError::Tail(_))));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let dir = TempDir::new().expect("create temp dir");
        let config = config(&dir).with_queue_capacity(0);

        let result = Producer::new(config, MemoryBus::new())
            .run(CancellationToken::new())
            .await;
        assert!(matches!(result, Err(crate::ProducerError::Config(_))));
    }
}

//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shipper_bus::MemoryBus;
use shipper_consumer::{Consumer, ConsumerConfig, ConsumerReport};
use shipper_index::MemoryIndexStore;
use shipper_producer::{Producer, ProducerConfig, ProducerReport, RetryPolicy};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default test timeout.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Topic used by every test.
pub const TOPIC: &str = "icinga";

/// Durable name used by the test consumer.
pub const DURABLE: &str = "consumer_e2e";

/// A log file with its checkpoint in a private temp dir.
pub struct LogFixture {
    pub dir: TempDir,
    pub log: PathBuf,
    pub checkpoint: PathBuf,
}

impl LogFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let log = dir.path().join("icinga.log");
        let checkpoint = dir.path().join("seek");
        Self {
            dir,
            log,
            checkpoint,
        }
    }

    pub fn append(&self, lines: &[&str]) {
        append(&self.log, lines);
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig::new(&self.log)
            .with_checkpoint(&self.checkpoint)
            .with_topic(TOPIC)
            .with_poll_interval(Duration::from_millis(10))
            .with_retry(
                RetryPolicy::default()
                    .with_max_attempts(3)
                    .with_base_delay(Duration::from_millis(1)),
            )
    }

    pub fn len(&self) -> u64 {
        std::fs::metadata(&self.log).map(|m| m.len()).unwrap_or(0)
    }
}

/// Appends `lines`, each followed by a newline.
pub fn append(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log for append");
    for line in lines {
        writeln!(file, "{line}").expect("append line");
    }
}

/// A running producer.
pub struct RunningProducer {
    shutdown: CancellationToken,
    handle: JoinHandle<shipper_producer::Result<ProducerReport>>,
}

impl RunningProducer {
    pub fn start(config: ProducerConfig, bus: &MemoryBus) -> Self {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Producer::new(config, bus.clone()).run(shutdown.clone()));
        Self { shutdown, handle }
    }

    pub async fn stop(self) -> ProducerReport {
        self.shutdown.cancel();
        tokio::time::timeout(TEST_TIMEOUT, self.handle)
            .await
            .expect("producer stops")
            .expect("producer task")
            .expect("producer run")
    }
}

/// A running consumer.
pub struct RunningConsumer {
    shutdown: CancellationToken,
    handle: JoinHandle<shipper_consumer::Result<ConsumerReport>>,
}

impl RunningConsumer {
    pub fn start(config: ConsumerConfig, bus: &MemoryBus, store: &MemoryIndexStore) -> Self {
        let shutdown = CancellationToken::new();
        let consumer = Consumer::new(config, bus.clone(), store.clone());
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { consumer.run(token).await });
        Self { shutdown, handle }
    }

    pub async fn stop(self) -> ConsumerReport {
        self.shutdown.cancel();
        tokio::time::timeout(TEST_TIMEOUT, self.handle)
            .await
            .expect("consumer stops")
            .expect("consumer task")
            .expect("consumer run")
    }
}

/// Polls `condition` until it holds or [`TEST_TIMEOUT`] expires.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// Total documents across all indices.
pub fn total_documents(store: &MemoryIndexStore) -> usize {
    store
        .index_names()
        .iter()
        .map(|name| store.documents(name).len())
        .sum()
}

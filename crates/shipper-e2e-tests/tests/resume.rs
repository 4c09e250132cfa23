//! End-to-end tests for restarts on both sides of the bus.
//!
//! These tests verify:
//! 1. A restarted producer resumes at its checkpoint and re-sends nothing
//! 2. A restarted consumer resumes its durable cursor
//! 3. Lines written while the producer is down are shipped on restart
//! 4. A truncated log is followed from its start

mod helpers;

use helpers::{
    DURABLE, LogFixture, RunningConsumer, RunningProducer, TOPIC, total_documents, wait_until,
};
use shipper_bus::MemoryBus;
use shipper_consumer::ConsumerConfig;
use shipper_index::MemoryIndexStore;
use shipper_producer::OffsetStore;

#[tokio::test]
async fn test_producer_restart_resumes_at_checkpoint() {
    let fixture = LogFixture::new();
    fixture.append(&[
        "[1234567890] HOST ALERT: web1;UP;HARD;1;PING OK",
        "[1234567891] HOST ALERT: web2;UP;HARD;1;PING OK",
    ]);
    let bus = MemoryBus::new();

    let producer = RunningProducer::start(fixture.producer_config(), &bus);
    wait_until("first batch published", || bus.messages(TOPIC).len() == 2).await;
    let first = producer.stop().await;
    assert_eq!(first.checkpoint, fixture.len());
    assert_eq!(OffsetStore::new(&fixture.checkpoint).load(), fixture.len());

    // written while the producer is down
    fixture.append(&["[1234567892] SERVICE ALERT: web1;http;OK;HARD;1;HTTP OK"]);

    let producer = RunningProducer::start(fixture.producer_config(), &bus);
    wait_until("second batch published", || bus.messages(TOPIC).len() == 3).await;
    let second = producer.stop().await;

    assert_eq!(second.lines, 1);
    assert_eq!(second.published, 1);
    assert_eq!(bus.messages(TOPIC).len(), 3);
}

#[tokio::test]
async fn test_consumer_restart_resumes_durable_cursor() {
    let fixture = LogFixture::new();
    fixture.append(&["[1234567890] HOST ALERT: web1;UP;HARD;1;PING OK"]);
    let bus = MemoryBus::new();
    let store = MemoryIndexStore::new();

    let producer = RunningProducer::start(fixture.producer_config(), &bus);
    let consumer = RunningConsumer::start(ConsumerConfig::new(DURABLE), &bus, &store);
    wait_until("first document", || total_documents(&store) == 1).await;
    consumer.stop().await;

    // published while the consumer is down
    fixture.append(&["[1234567891] HOST ALERT: web2;DOWN;SOFT;1;PING CRITICAL"]);
    wait_until("second message published", || bus.messages(TOPIC).len() == 2).await;

    let consumer = RunningConsumer::start(ConsumerConfig::new(DURABLE), &bus, &store);
    wait_until("second document", || total_documents(&store) == 2).await;
    // give a stray redelivery time to show up
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let report = consumer.stop().await;
    producer.stop().await;

    assert_eq!(report.received, 1);
    assert_eq!(total_documents(&store), 2);
}

#[tokio::test]
async fn test_truncated_log_is_followed_from_start() {
    let fixture = LogFixture::new();
    fixture.append(&["[1234567890] HOST ALERT: web1;UP;HARD;1;PING OK"]);
    let bus = MemoryBus::new();

    let producer = RunningProducer::start(fixture.producer_config(), &bus);
    wait_until("first message", || bus.messages(TOPIC).len() == 1).await;

    std::fs::write(
        &fixture.log,
        "[1234567999] HOST ALERT: web9;UP;HARD;1;OK\n",
    )
    .expect("truncate log");
    wait_until("message from truncated log", || bus.messages(TOPIC).len() == 2).await;
    let report = producer.stop().await;

    assert_eq!(report.published, 2);
    assert_eq!(report.checkpoint, fixture.len());
}

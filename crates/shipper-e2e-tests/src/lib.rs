//! End-to-end integration tests for the Icinga log shipper.
//!
//! These tests exercise both halves over in-memory backends:
//! - Producer tailing a log file into the bus
//! - Consumer indexing bus messages into daily indices
//! - Checkpoint resume and durable cursor resume across restarts

#![cfg(test)]

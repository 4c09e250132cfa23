//! Date-partitioned event writer.

use std::collections::HashSet;

use parking_lot::Mutex;
use serde_json::json;
use shipper_proto::{Event, wire};
use tracing::{debug, info};

use crate::error::{IndexError, Result};
use crate::store::{CreateOutcome, IndexStore};

/// Prefix of every daily index name.
pub const INDEX_PREFIX: &str = "logstash-";

/// Name of the index an event belongs to: `logstash-YYYY.MM.DD` in UTC.
#[must_use]
pub fn index_name(event: &Event) -> String {
    format!("{INDEX_PREFIX}{}", event.timestamp.format("%Y.%m.%d"))
}

/// Mapping every daily index is created with.
#[must_use]
pub fn index_mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "timestamp": { "type": "date", "format": "epoch_millis" }
            }
        }
    })
}

/// Writes events into their daily index, creating it on first use.
///
/// Creation tolerates concurrent creators: an index that appears between the
/// `exists` check and the `create` call counts as success. Names created or
/// observed by this writer are cached so later writes skip the check.
#[derive(Debug)]
pub struct IndexWriter<S> {
    store: S,
    known: Mutex<HashSet<String>>,
}

impl<S: IndexStore> IndexWriter<S> {
    /// Creates a writer over `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            known: Mutex::new(HashSet::new()),
        }
    }

    /// Writes `event` as one document, returning the document id.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be encoded, the index cannot be
    /// created, creation is not acknowledged, or the write fails.
    pub async fn write(&self, event: &Event) -> Result<String> {
        let document = wire::to_value(event)?;
        let index = index_name(event);
        self.ensure_index(&index).await?;
        let id = self.store.write(&index, &document).await?;
        debug!(index = %index, id = %id, "document written");
        Ok(id)
    }

    /// Makes sure `index` exists, creating it with [`index_mapping`] if not.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or creation is not acknowledged.
    pub async fn ensure_index(&self, index: &str) -> Result<()> {
        if self.known.lock().contains(index) {
            return Ok(());
        }

        if !self.store.exists(index).await? {
            match self.store.create(index, &index_mapping()).await? {
                CreateOutcome::Created { acknowledged: true } => {
                    info!(index, "created index");
                }
                CreateOutcome::Created {
                    acknowledged: false,
                } => {
                    return Err(IndexError::NotAcknowledged(index.to_string()));
                }
                CreateOutcome::AlreadyExists => {
                    debug!(index, "index already exists");
                }
            }
        }

        self.known.lock().insert(index.to_string());
        Ok(())
    }
}

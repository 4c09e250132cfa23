//! In-memory index store for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{IndexError, Result};
use crate::store::{CreateOutcome, IndexStore};

#[derive(Debug, Default)]
struct StoredIndex {
    mapping: serde_json::Value,
    documents: Vec<(String, serde_json::Value)>,
}

#[derive(Debug, Default)]
struct Inner {
    indices: RwLock<HashMap<String, StoredIndex>>,
    create_calls: AtomicU64,
    next_doc: AtomicU64,
    unacknowledged_creates: AtomicU64,
    failing_writes: AtomicU64,
}

/// In-memory [`IndexStore`]. Cheap to clone; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndexStore {
    inner: Arc<Inner>,
}

impl MemoryIndexStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all indices, sorted.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.indices.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Documents of an index in write order.
    #[must_use]
    pub fn documents(&self, index: &str) -> Vec<serde_json::Value> {
        self.inner
            .indices
            .read()
            .get(index)
            .map(|i| i.documents.iter().map(|(_, doc)| doc.clone()).collect())
            .unwrap_or_default()
    }

    /// Mapping an index was created with.
    #[must_use]
    pub fn mapping(&self, index: &str) -> Option<serde_json::Value> {
        self.inner.indices.read().get(index).map(|i| i.mapping.clone())
    }

    /// Number of `create` calls received, successful or not.
    #[must_use]
    pub fn create_calls(&self) -> u64 {
        self.inner.create_calls.load(Ordering::Relaxed)
    }

    /// Makes the next `count` successful creates report no acknowledgement.
    pub fn leave_next_creates_unacknowledged(&self, count: u64) {
        self.inner
            .unacknowledged_creates
            .store(count, Ordering::Relaxed);
    }

    /// Makes the next `count` document writes fail.
    pub fn fail_next_writes(&self, count: u64) {
        self.inner.failing_writes.store(count, Ordering::Relaxed);
    }
}

/// Decrements `counter` if it is positive, returning whether it was.
fn take_one(counter: &AtomicU64) -> bool {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        .is_ok()
}

impl IndexStore for MemoryIndexStore {
    async fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.inner.indices.read().contains_key(index))
    }

    async fn create(&self, index: &str, mapping: &serde_json::Value) -> Result<CreateOutcome> {
        self.inner.create_calls.fetch_add(1, Ordering::Relaxed);
        let mut indices = self.inner.indices.write();
        if indices.contains_key(index) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        indices.insert(
            index.to_string(),
            StoredIndex {
                mapping: mapping.clone(),
                documents: Vec::new(),
            },
        );
        let acknowledged = !take_one(&self.inner.unacknowledged_creates);
        Ok(CreateOutcome::Created { acknowledged })
    }

    async fn write(&self, index: &str, document: &serde_json::Value) -> Result<String> {
        if take_one(&self.inner.failing_writes) {
            return Err(IndexError::Status {
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        let id = self.inner.next_doc.fetch_add(1, Ordering::Relaxed).to_string();
        let mut indices = self.inner.indices.write();
        // Writing to a missing index auto-creates it without a mapping, as
        // Elasticsearch does by default.
        indices
            .entry(index.to_string())
            .or_default()
            .documents
            .push((id.clone(), document.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_then_exists() {
        let store = MemoryIndexStore::new();
        assert_eq!(store.exists("a").await.ok(), Some(false));

        let outcome = store.create("a", &json!({"m": 1})).await.ok();
        assert_eq!(outcome, Some(CreateOutcome::Created { acknowledged: true }));
        assert_eq!(store.exists("a").await.ok(), Some(true));
        assert_eq!(store.mapping("a"), Some(json!({"m": 1})));
    }

    #[tokio::test]
    async fn second_create_reports_already_exists() {
        let store = MemoryIndexStore::new();
        let _ = store.create("a", &json!({})).await;
        let outcome = store.create("a", &json!({})).await.ok();
        assert_eq!(outcome, Some(CreateOutcome::AlreadyExists));
        assert_eq!(store.create_calls(), 2);
    }

    #[tokio::test]
    async fn unacknowledged_creates_are_injectable() {
        let store = MemoryIndexStore::new();
        store.leave_next_creates_unacknowledged(1);
        let outcome = store.create("a", &json!({})).await.ok();
        assert_eq!(outcome, Some(CreateOutcome::Created { acknowledged: false }));
        let outcome = store.create("b", &json!({})).await.ok();
        assert_eq!(outcome, Some(CreateOutcome::Created { acknowledged: true }));
    }

    #[tokio::test]
    async fn writes_keep_order_and_assign_ids() {
        let store = MemoryIndexStore::new();
        let first = store.write("a", &json!({"n": 1})).await.ok();
        let second = store.write("a", &json!({"n": 2})).await.ok();
        assert_ne!(first, second);
        assert_eq!(store.documents("a"), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[tokio::test]
    async fn failing_writes_are_injectable() {
        let store = MemoryIndexStore::new();
        store.fail_next_writes(1);
        assert!(store.write("a", &json!({})).await.is_err());
        assert!(store.write("a", &json!({})).await.is_ok());
        assert_eq!(store.documents("a").len(), 1);
    }
}

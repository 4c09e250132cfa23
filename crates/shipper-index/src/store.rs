//! Trait for document index backends.

use std::future::Future;

use crate::error::Result;

/// Result of asking the store to create an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The index was created by this call.
    Created {
        /// Whether the cluster acknowledged the creation in time.
        acknowledged: bool,
    },
    /// Another writer created the index first.
    AlreadyExists,
}

/// The subset of a document store the index writer needs.
pub trait IndexStore: Send + Sync {
    /// Returns true if the named index exists.
    fn exists(&self, index: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Creates the named index with `mapping`.
    fn create(
        &self,
        index: &str,
        mapping: &serde_json::Value,
    ) -> impl Future<Output = Result<CreateOutcome>> + Send;

    /// Writes one document, returning its id.
    fn write(
        &self,
        index: &str,
        document: &serde_json::Value,
    ) -> impl Future<Output = Result<String>> + Send;
}

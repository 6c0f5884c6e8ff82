//! Key-addressed JSON document store with field-path updates and change feeds.
//!
//! Every document carries a monotonically increasing `version`. Updates may be made
//! conditional on the version the caller read, which turns a read-modify-write into a
//! compare-and-swap.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

mod error;
mod feed;
pub mod memory;
pub mod path;
pub mod sqlite;

pub use error::StoreError;
pub use feed::DEFAULT_FEED_CAPACITY;
pub use memory::MemoryStore;
pub use path::{FieldOp, FieldPath};
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    pub collection: String,
    pub id: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A full document as of one version.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: DocumentKey,
    pub version: u64,
    pub data: Value,
}

/// The current snapshot of a document plus every later change to it.
///
/// The receiver is attached before `initial` is read, so it may replay versions at or
/// below `initial.version`; consumers drop anything not newer than what they have seen.
pub struct ChangeFeed {
    pub initial: Snapshot,
    pub receiver: broadcast::Receiver<Snapshot>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Snapshot>, StoreError>;

    /// Inserts a new document, failing with [`StoreError::AlreadyExists`] if the key is taken.
    async fn create(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError>;

    /// Replaces the whole document, creating it if absent.
    async fn set(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError>;

    /// Applies `ops` as one write. When `expected_version` is given the write only lands
    /// if the stored version still matches.
    async fn update(
        &self,
        key: &DocumentKey,
        ops: &[FieldOp],
        expected_version: Option<u64>,
    ) -> Result<Snapshot, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError>;

    async fn list_where(
        &self,
        collection: &str,
        field: &FieldPath,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let documents = self.list(collection).await?;
        Ok(documents
            .into_iter()
            .filter(|snapshot| path::lookup(&snapshot.data, field) == Some(value))
            .collect())
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<ChangeFeed, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    feed::{FeedRegistry, DEFAULT_FEED_CAPACITY},
    path::apply_ops,
    ChangeFeed, DocumentKey, DocumentStore, FieldOp, Snapshot, StoreError,
};

/// In-process store, used by tests and by the server when no database is configured.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    documents: RwLock<HashMap<DocumentKey, Snapshot>>,
    feeds: FeedRegistry,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_feed_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                documents: RwLock::new(HashMap::new()),
                feeds: FeedRegistry::new(capacity),
            }),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.inner.documents.read().await.get(key).cloned())
    }

    async fn create(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        let mut documents = self.inner.documents.write().await;
        if documents.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.clone()));
        }
        let snapshot = Snapshot {
            key: key.clone(),
            version: 1,
            data,
        };
        documents.insert(key.clone(), snapshot.clone());
        self.inner.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn set(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        let mut documents = self.inner.documents.write().await;
        let version = documents.get(key).map_or(1, |current| current.version + 1);
        let snapshot = Snapshot {
            key: key.clone(),
            version,
            data,
        };
        documents.insert(key.clone(), snapshot.clone());
        self.inner.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn update(
        &self,
        key: &DocumentKey,
        ops: &[FieldOp],
        expected_version: Option<u64>,
    ) -> Result<Snapshot, StoreError> {
        let mut documents = self.inner.documents.write().await;
        let current = documents
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(StoreError::VersionConflict {
                    key: key.clone(),
                    expected,
                    actual: current.version,
                });
            }
        }
        let snapshot = Snapshot {
            key: key.clone(),
            version: current.version + 1,
            data: apply_ops(&current.data, ops)?,
        };
        documents.insert(key.clone(), snapshot.clone());
        // Published under the write lock so listeners observe versions in order.
        self.inner.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        let documents = self.inner.documents.read().await;
        let mut matching: Vec<Snapshot> = documents
            .values()
            .filter(|snapshot| snapshot.key.collection == collection)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.key.id.cmp(&b.key.id));
        Ok(matching)
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<ChangeFeed, StoreError> {
        let receiver = self.inner.feeds.subscribe(key).await;
        let failure = match self.get(key).await {
            Ok(Some(initial)) => return Ok(ChangeFeed { initial, receiver }),
            Ok(None) => StoreError::NotFound(key.clone()),
            Err(err) => err,
        };
        drop(receiver);
        self.inner.feeds.release(key).await;
        Err(failure)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;

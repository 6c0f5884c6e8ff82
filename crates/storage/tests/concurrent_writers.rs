use std::sync::Arc;

use serde_json::json;
use storage::{DocumentKey, DocumentStore, FieldOp, FieldPath, MemoryStore, SqliteStore, StoreError};

const WRITERS: u64 = 16;

/// Each writer increments a shared counter with a read-then-conditional-write loop.
/// With compare-and-swap no increment may be lost.
async fn increment_concurrently(store: Arc<dyn DocumentStore>) {
    let key = DocumentKey::new("counters", "c1");
    store.create(&key, json!({ "count": 0 })).await.expect("create");

    let mut tasks = Vec::new();
    for _ in 0..WRITERS {
        let store = store.clone();
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                let current = store.get(&key).await.expect("get").expect("doc");
                let count = current.data["count"].as_u64().expect("count");
                let ops = [FieldOp::Set(FieldPath::field("count"), json!(count + 1))];
                match store.update(&key, &ops, Some(current.version)).await {
                    Ok(_) => break,
                    Err(StoreError::VersionConflict { .. }) => tokio::task::yield_now().await,
                    Err(StoreError::Database(_)) => tokio::task::yield_now().await,
                    Err(other) => panic!("unexpected store error: {other}"),
                }
            }
        }));
    }
    for task in tasks {
        task.await.expect("writer");
    }

    let last = store.get(&key).await.expect("get").expect("doc");
    assert_eq!(last.data["count"], json!(WRITERS));
    assert_eq!(last.version, WRITERS + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_store_loses_no_increments() {
    increment_concurrently(Arc::new(MemoryStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sqlite_store_loses_no_increments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}",
        dir.path().join("counters.db").to_string_lossy().replace('\\', "/")
    );
    let store = SqliteStore::new(&url).await.expect("db");
    increment_concurrently(Arc::new(store)).await;
}

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::debug;

use crate::{
    feed::{FeedRegistry, DEFAULT_FEED_CAPACITY},
    path::apply_ops,
    ChangeFeed, DocumentKey, DocumentStore, FieldOp, Snapshot, StoreError,
};

/// Documents persisted as JSON text in SQLite, one row per key.
///
/// Change feeds are in-process: listeners see writes made through this handle (and its
/// clones), not writes made by another process sharing the database file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    feeds: Arc<FeedRegistry>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_feed_capacity(database_url, DEFAULT_FEED_CAPACITY).await
    }

    pub async fn with_feed_capacity(
        database_url: &str,
        feed_capacity: usize,
    ) -> Result<Self, StoreError> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            feeds: Arc::new(FeedRegistry::new(feed_capacity)),
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query("SELECT version, body FROM documents WHERE collection = ? AND id = ?")
            .bind(&key.collection)
            .bind(&key.id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| snapshot_from_row(key.clone(), &r)).transpose()
    }

    async fn create(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        let body = serde_json::to_string(&data)?;
        let inserted = sqlx::query(
            "INSERT INTO documents (collection, id, version, body) VALUES (?, ?, 1, ?)
             ON CONFLICT(collection, id) DO NOTHING",
        )
        .bind(&key.collection)
        .bind(&key.id)
        .bind(body)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(key.clone()));
        }
        let snapshot = Snapshot {
            key: key.clone(),
            version: 1,
            data,
        };
        self.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn set(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        let body = serde_json::to_string(&data)?;
        let rec = sqlx::query(
            "INSERT INTO documents (collection, id, version, body) VALUES (?, ?, 1, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
                 version = documents.version + 1,
                 body = excluded.body,
                 updated_at = CURRENT_TIMESTAMP
             RETURNING version",
        )
        .bind(&key.collection)
        .bind(&key.id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;
        let snapshot = Snapshot {
            key: key.clone(),
            version: to_version(rec.get::<i64, _>(0)),
            data,
        };
        self.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn update(
        &self,
        key: &DocumentKey,
        ops: &[FieldOp],
        expected_version: Option<u64>,
    ) -> Result<Snapshot, StoreError> {
        let current = self
            .get(key)
            .await?
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

        let data = apply_ops(&current.data, ops)?;
        let written = sqlx::query(
            "UPDATE documents SET body = ?, version = version + 1, updated_at = CURRENT_TIMESTAMP
             WHERE collection = ? AND id = ? AND version = ?",
        )
        .bind(serde_json::to_string(&data)?)
        .bind(&key.collection)
        .bind(&key.id)
        .bind(from_version(current.version))
        .execute(&self.pool)
        .await?;
        if written.rows_affected() == 0 {
            // Another writer landed between our read and this statement.
            let actual = self
                .get(key)
                .await?
                .map_or(current.version, |latest| latest.version);
            return Err(StoreError::VersionConflict {
                key: key.clone(),
                expected: current.version,
                actual,
            });
        }

        let snapshot = Snapshot {
            key: key.clone(),
            version: current.version + 1,
            data,
        };
        debug!(key = %snapshot.key, version = snapshot.version, ops = ops.len(), "document updated");
        self.feeds.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, version, body FROM documents
             WHERE collection = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let key = DocumentKey::new(collection, r.get::<String, _>(0));
                Ok(Snapshot {
                    key,
                    version: to_version(r.get::<i64, _>(1)),
                    data: serde_json::from_str(&r.get::<String, _>(2))?,
                })
            })
            .collect()
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<ChangeFeed, StoreError> {
        let receiver = self.feeds.subscribe(key).await;
        let failure = match self.get(key).await {
            Ok(Some(initial)) => return Ok(ChangeFeed { initial, receiver }),
            Ok(None) => StoreError::NotFound(key.clone()),
            Err(err) => err,
        };
        drop(receiver);
        self.feeds.release(key).await;
        Err(failure)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

fn snapshot_from_row(key: DocumentKey, row: &SqliteRow) -> Result<Snapshot, StoreError> {
    Ok(Snapshot {
        key,
        version: to_version(row.get::<i64, _>(0)),
        data: serde_json::from_str(&row.get::<String, _>(1))?,
    })
}

fn to_version(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}

fn from_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<(), StoreError> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent)?;
    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/sqlite_tests.rs"]
mod tests;

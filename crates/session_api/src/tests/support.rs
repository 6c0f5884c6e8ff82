use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use shared::domain::{Board, BoardId, PokerRoom, RoomId, UserId};
use storage::{
    ChangeFeed, DocumentKey, DocumentStore, FieldOp, FieldPath, MemoryStore, Snapshot, StoreError,
};

use crate::{board_key, room_key, ApiContext};

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

pub fn fixed_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub fn sample_board(creator: &str) -> Board {
    Board::with_default_sections(
        BoardId::from("board-1"),
        "Sprint 12 retro",
        user(creator),
        fixed_time(),
    )
}

pub fn sample_room(owner: &str) -> PokerRoom {
    PokerRoom::new(RoomId::from("room000001"), user(owner), owner, fixed_time())
}

pub async fn seed_board(ctx: &ApiContext, board: &Board) {
    let data = serde_json::to_value(board).expect("encode board");
    ctx.store
        .create(&board_key(&board.id), data)
        .await
        .expect("seed board");
}

pub async fn seed_room(ctx: &ApiContext, room: &PokerRoom) {
    let data = serde_json::to_value(room).expect("encode room");
    ctx.store
        .create(&room_key(&room.id), data)
        .await
        .expect("seed room");
}

/// A store whose backend is gone: every call fails the way a dropped database would.
pub struct UnavailableStore;

fn offline() -> StoreError {
    StoreError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "store offline"))
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn get(&self, _key: &DocumentKey) -> Result<Option<Snapshot>, StoreError> {
        Err(offline())
    }

    async fn create(&self, _key: &DocumentKey, _data: Value) -> Result<Snapshot, StoreError> {
        Err(offline())
    }

    async fn set(&self, _key: &DocumentKey, _data: Value) -> Result<Snapshot, StoreError> {
        Err(offline())
    }

    async fn update(
        &self,
        _key: &DocumentKey,
        _ops: &[FieldOp],
        _expected_version: Option<u64>,
    ) -> Result<Snapshot, StoreError> {
        Err(offline())
    }

    async fn list(&self, _collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        Err(offline())
    }

    async fn subscribe(&self, _key: &DocumentKey) -> Result<ChangeFeed, StoreError> {
        Err(offline())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(offline())
    }
}

/// Wraps a [`MemoryStore`] and lets another writer sneak in right before the next
/// `interruptions` conditional updates, so they hit a version conflict.
pub struct ContendedStore {
    pub inner: MemoryStore,
    interruptions: AtomicUsize,
    pub updates_attempted: AtomicUsize,
}

impl ContendedStore {
    pub fn new(interruptions: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            interruptions: AtomicUsize::new(interruptions),
            updates_attempted: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for ContendedStore {
    async fn get(&self, key: &DocumentKey) -> Result<Option<Snapshot>, StoreError> {
        self.inner.get(key).await
    }

    async fn create(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        self.inner.create(key, data).await
    }

    async fn set(&self, key: &DocumentKey, data: Value) -> Result<Snapshot, StoreError> {
        self.inner.set(key, data).await
    }

    async fn update(
        &self,
        key: &DocumentKey,
        ops: &[FieldOp],
        expected_version: Option<u64>,
    ) -> Result<Snapshot, StoreError> {
        let attempt = self.updates_attempted.fetch_add(1, Ordering::SeqCst);
        let interrupt = self
            .interruptions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if interrupt {
            let touch = FieldOp::Set(FieldPath::field("touchedBy"), json!(attempt));
            self.inner.update(key, &[touch], None).await?;
        }
        self.inner.update(key, ops, expected_version).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.list(collection).await
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<ChangeFeed, StoreError> {
        self.inner.subscribe(key).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.health_check().await
    }
}

pub fn contended_context(interruptions: usize) -> (ApiContext, Arc<ContendedStore>) {
    let store = Arc::new(ContendedStore::new(interruptions));
    (ApiContext::new(store.clone()), store)
}

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use session_api::{board, visibility::NoteBody};
use shared::domain::BoardVisibility;
use storage::{
    ChangeFeed, DocumentKey, DocumentStore, FieldOp, FieldPath, MemoryStore, Snapshot, StoreError,
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time::{sleep, timeout},
};

use super::*;

const WAIT: Duration = Duration::from_secs(2);

async fn next<T>(receiver: &mut UnboundedReceiver<T>) -> T {
    timeout(WAIT, receiver.recv())
        .await
        .expect("timed out waiting for view")
        .expect("channel open")
}

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

#[tokio::test]
async fn board_watcher_rederives_redaction_on_each_snapshot() {
    let ctx = ApiContext::in_memory();
    let dispatcher = SubscriptionDispatcher::new(ctx.store.clone());
    let board_id = board::create_board(&ctx, &uid("carol"), "retro")
        .await
        .expect("board");
    let section = board::get_board(&ctx, &board_id).await.expect("board").sections[0]
        .id
        .clone();
    board::add_note(&ctx, &board_id, &section, &uid("bob"), "secret")
        .await
        .expect("note");

    let (tx, mut views) = mpsc::unbounded_channel();
    let _subscription = watch_board(
        &dispatcher,
        &board_id,
        &uid("alice"),
        move |view| {
            let _ = tx.send(view);
        },
        |_| {},
    );

    let view = next(&mut views).await;
    assert!(matches!(view.sections[0].notes[0].body, NoteBody::Shown { .. }));

    board::toggle_board_visibility(&ctx, &board_id, &uid("carol"))
        .await
        .expect("hide");
    let view = next(&mut views).await;
    assert_eq!(view.board_visibility, BoardVisibility::Hidden);
    assert_eq!(view.sections[0].notes[0].body, NoteBody::Redacted);
    assert_eq!(view.sections[0].note_count, 1);
}

#[tokio::test]
async fn room_session_confirms_vote_from_snapshot() {
    let ctx = ApiContext::in_memory();
    let dispatcher = SubscriptionDispatcher::new(ctx.store.clone());
    let room_id = poker::create_room(&ctx, &uid("olga"), "Olga")
        .await
        .expect("room");
    poker::join_room(&ctx, &room_id, &uid("pat"), "Pat")
        .await
        .expect("join");

    let mut session = RoomSession::new(ctx.clone(), room_id.clone(), uid("pat"));
    let (tx, mut views) = mpsc::unbounded_channel();
    session.open(
        &dispatcher,
        move |view| {
            let _ = tx.send(view);
        },
        |_| {},
    );
    assert_eq!(next(&mut views).await.my_vote, None);

    session.cast_vote(VoteValue::Points(5)).await.expect("vote");
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));

    let view = next(&mut views).await;
    assert_eq!(view.my_vote, Some(VoteValue::Points(5)));
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));
    session.close();
}

#[tokio::test]
async fn rejected_vote_reverts_to_last_confirmed() {
    let ctx = ApiContext::in_memory();
    let dispatcher = SubscriptionDispatcher::new(ctx.store.clone());
    let room_id = poker::create_room(&ctx, &uid("olga"), "Olga")
        .await
        .expect("room");

    let mut session = RoomSession::new(ctx.clone(), room_id.clone(), uid("olga"));
    let (tx, mut views) = mpsc::unbounded_channel();
    session.open(
        &dispatcher,
        move |view| {
            let _ = tx.send(view);
        },
        |_| {},
    );
    next(&mut views).await;

    session.cast_vote(VoteValue::Points(3)).await.expect("vote");
    next(&mut views).await;
    poker::reveal(&ctx, &room_id, &uid("olga"))
        .await
        .expect("reveal");
    next(&mut views).await;

    let err = session
        .cast_vote(VoteValue::Points(8))
        .await
        .expect_err("votes frozen after reveal");
    assert!(matches!(err, SessionError::Forbidden(_)));
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(3)));
}

/// Shares a [`MemoryStore`] but takes its time over every update.
struct SlowWrites {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait]
impl DocumentStore for SlowWrites {
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
        sleep(self.delay).await;
        self.inner.update(key, ops, expected_version).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.list(collection).await
    }

    async fn list_where(
        &self,
        collection: &str,
        field: &FieldPath,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.list_where(collection, field, value).await
    }

    async fn subscribe(&self, key: &DocumentKey) -> Result<ChangeFeed, StoreError> {
        self.inner.subscribe(key).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn pending_vote_survives_other_players_snapshots() {
    let shared_store = Arc::new(MemoryStore::new());
    let fast = ApiContext::new(shared_store.clone());
    let slow = ApiContext::new(Arc::new(SlowWrites {
        inner: shared_store.clone(),
        delay: Duration::from_millis(300),
    }));
    let dispatcher = SubscriptionDispatcher::new(shared_store.clone());

    let room_id = poker::create_room(&fast, &uid("olga"), "Olga")
        .await
        .expect("room");
    poker::join_room(&fast, &room_id, &uid("pat"), "Pat")
        .await
        .expect("join");

    let mut session = RoomSession::new(slow, room_id.clone(), uid("pat"));
    let (tx, mut views) = mpsc::unbounded_channel();
    session.open(
        &dispatcher,
        move |view| {
            let _ = tx.send(view);
        },
        |_| {},
    );
    next(&mut views).await;

    let session = Arc::new(session);
    let write = tokio::spawn({
        let session = session.clone();
        async move { session.cast_vote(VoteValue::Points(5)).await }
    });
    sleep(Duration::from_millis(50)).await;
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));

    poker::cast_vote(&fast, &room_id, &uid("olga"), VoteValue::Points(8))
        .await
        .expect("other vote");
    let unrelated = next(&mut views).await;
    assert_eq!(unrelated.my_vote, None);
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));

    write.await.expect("join").expect("vote");
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));
    assert_eq!(next(&mut views).await.my_vote, Some(VoteValue::Points(5)));
    assert_eq!(session.displayed_vote(), Some(VoteValue::Points(5)));
}

//! Live views over websockets. Each socket follows one document and receives a freshly
//! rendered, viewer-specific view for every new version.

use std::{future, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::{
    stream::{self, BoxStream},
    SinkExt, StreamExt,
};
use serde::{Deserialize, Serialize};
use session_api::{
    board_key, room_key, store_error,
    visibility::{self, BoardView, RoomView},
};
use shared::{
    domain::{Board, BoardId, PokerRoom, RoomId, UserId},
    error::{ApiError, SessionError},
    protocol::ViewerQuery,
};
use storage::{ChangeFeed, DocumentKey, Snapshot};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::{
    api::{http_error, HttpError},
    AppState,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LiveTarget {
    Board(BoardId),
    Room(RoomId),
}

impl LiveTarget {
    pub(crate) fn key(&self) -> DocumentKey {
        match self {
            Self::Board(id) => board_key(id),
            Self::Room(id) => room_key(id),
        }
    }

    fn render(&self, snapshot: &Snapshot, viewer: &UserId) -> LiveEvent {
        let version = snapshot.version;
        let rendered = match self {
            Self::Board(_) => serde_json::from_value::<Board>(snapshot.data.clone()).map(|board| {
                LiveEvent::Board {
                    version,
                    view: visibility::board_view(&board, viewer),
                }
            }),
            Self::Room(_) => serde_json::from_value::<PokerRoom>(snapshot.data.clone()).map(|room| {
                LiveEvent::Room {
                    version,
                    view: visibility::room_view(&room, viewer),
                }
            }),
        };
        rendered.unwrap_or_else(|error| {
            warn!(key = %snapshot.key, version, %error, "stored document is malformed");
            LiveEvent::Error {
                error: SessionError::Internal(format!("{} is malformed", snapshot.key)).into(),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum LiveEvent {
    Board { version: u64, view: BoardView },
    Room { version: u64, view: RoomView },
    /// Last frame on a socket.
    Error { error: ApiError },
}

/// Views for the feed's current snapshot and every newer version after it.
///
/// Replayed or out-of-order snapshots are dropped. A lagging socket skips to whatever
/// the feed still holds rather than closing.
pub(crate) fn live_events(
    feed: ChangeFeed,
    target: LiveTarget,
    viewer: UserId,
) -> BoxStream<'static, LiveEvent> {
    let ChangeFeed { initial, receiver } = feed;
    let changes = BroadcastStream::new(receiver).filter_map(|item| {
        future::ready(match item {
            Ok(snapshot) => Some(snapshot),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "live socket fell behind; skipping ahead");
                None
            }
        })
    });

    let mut last_version = 0;
    stream::once(future::ready(initial))
        .chain(changes)
        .filter(move |snapshot| {
            let newer = snapshot.version > last_version;
            if newer {
                last_version = snapshot.version;
            }
            future::ready(newer)
        })
        .map(move |snapshot| target.render(&snapshot, &viewer))
        .boxed()
}

pub(crate) async fn board_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(board_id): Path<BoardId>,
    Query(q): Query<ViewerQuery>,
) -> Result<Response, HttpError> {
    open_socket(ws, &state, LiveTarget::Board(board_id), q.user_id).await
}

pub(crate) async fn room_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<RoomId>,
    Query(q): Query<ViewerQuery>,
) -> Result<Response, HttpError> {
    open_socket(ws, &state, LiveTarget::Room(room_id), q.user_id).await
}

async fn open_socket(
    ws: WebSocketUpgrade,
    state: &AppState,
    target: LiveTarget,
    viewer: UserId,
) -> Result<Response, HttpError> {
    let feed = state
        .api
        .store
        .subscribe(&target.key())
        .await
        .map_err(|e| http_error(store_error(e)))?;
    debug!(key = %target.key(), %viewer, "live socket opened");
    let events = live_events(feed, target, viewer);
    Ok(ws.on_upgrade(move |socket| live_connection(socket, events)))
}

async fn live_connection(socket: WebSocket, mut events: BoxStream<'static, LiveEvent>) {
    let (mut sender, mut receiver) = socket.split();

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let last = matches!(event, LiveEvent::Error { .. });
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() || last {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

#[cfg(test)]
#[path = "tests/live_tests.rs"]
mod tests;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{Board, BoardId, PokerRoom, RoomId, UserId},
    error::SessionError,
};
use storage::{FieldPath, Snapshot};
use tracing::warn;

use crate::{mutation::decode, store_error, ApiContext, BOARDS, ROOMS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub board_id: BoardId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub is_creator: bool,
    /// Distinct note authors.
    pub member_count: usize,
    pub has_user_note: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    pub player_count: usize,
    pub revealed: bool,
}

/// Boards the user created or wrote at least one note on, newest first.
pub async fn list_user_boards(
    ctx: &ApiContext,
    user_id: &UserId,
) -> Result<Vec<BoardSummary>, SessionError> {
    let snapshots = ctx.store.list(BOARDS).await.map_err(store_error)?;
    let mut boards: Vec<BoardSummary> = decode_all::<Board>(snapshots, "board")
        .filter_map(|board| summarize_board(&board, user_id))
        .collect();
    boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(boards)
}

fn summarize_board(board: &Board, user_id: &UserId) -> Option<BoardSummary> {
    let authors: BTreeSet<&UserId> = board.notes().map(|note| &note.author_id).collect();
    let is_creator = board.is_creator(user_id);
    let has_user_note = authors.contains(user_id);
    if !is_creator && !has_user_note {
        return None;
    }
    Some(BoardSummary {
        board_id: board.id.clone(),
        title: board.title.clone(),
        created_at: board.created_at,
        is_creator,
        member_count: authors.len(),
        has_user_note,
    })
}

/// Rooms the user owns, newest first.
pub async fn list_user_rooms(
    ctx: &ApiContext,
    user_id: &UserId,
) -> Result<Vec<RoomSummary>, SessionError> {
    let snapshots = ctx
        .store
        .list_where(
            ROOMS,
            &FieldPath::field("createdBy"),
            &Value::String(user_id.to_string()),
        )
        .await
        .map_err(store_error)?;
    let mut rooms: Vec<RoomSummary> = decode_all::<PokerRoom>(snapshots, "room")
        .map(|room| RoomSummary {
            room_id: room.id,
            created_at: room.created_at,
            player_count: room.players.len(),
            revealed: room.revealed,
        })
        .collect();
    rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rooms)
}

/// A document that no longer decodes is left out of listings rather than failing them.
fn decode_all<D: serde::de::DeserializeOwned>(
    snapshots: Vec<Snapshot>,
    kind: &'static str,
) -> impl Iterator<Item = D> {
    snapshots
        .into_iter()
        .filter_map(move |snapshot| match decode(&snapshot, kind) {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(key = %snapshot.key, error = %err, "skipping undecodable {kind}");
                None
            }
        })
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;

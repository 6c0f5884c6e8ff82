//! Planning-poker room operations.

use chrono::Utc;
use shared::{
    domain::{PokerRoom, RoomId, Suit, UserId, VoteValue},
    error::SessionError,
};
use storage::StoreError;
use tracing::{info, warn};

use crate::{
    aggregation::{self, VoteSummary},
    mutation::{commit, decode, encode_error, fetch, store_error},
    room_key,
    visibility::{self, RoomView},
    ApiContext,
};

pub mod rules;

pub use rules::JoinOutcome;

const KIND: &str = "room";
/// Room ids are short, so a collision on create is possible; draw a new id this many times.
const CREATE_ATTEMPTS: usize = 5;

pub async fn create_room(
    ctx: &ApiContext,
    owner: &UserId,
    owner_name: &str,
) -> Result<RoomId, SessionError> {
    let now = Utc::now();
    for _ in 0..CREATE_ATTEMPTS {
        let room = rules::new_room(owner, owner_name, now)?;
        let data = serde_json::to_value(&room).map_err(encode_error)?;
        match ctx.store.create(&room_key(&room.id), data).await {
            Ok(_) => {
                info!(room_id = %room.id, owner = %owner, "room created");
                return Ok(room.id);
            }
            Err(StoreError::AlreadyExists(key)) => {
                warn!(%key, "room id already taken; drawing another");
            }
            Err(err) => return Err(store_error(err)),
        }
    }
    Err(SessionError::Conflict(format!(
        "could not allocate a free room id after {CREATE_ATTEMPTS} attempts"
    )))
}

pub async fn get_room(ctx: &ApiContext, room_id: &RoomId) -> Result<PokerRoom, SessionError> {
    let snapshot = fetch(ctx, &room_key(room_id), KIND).await?;
    decode(&snapshot, KIND)
}

pub async fn room_view(
    ctx: &ApiContext,
    room_id: &RoomId,
    viewer: &UserId,
) -> Result<RoomView, SessionError> {
    let room = get_room(ctx, room_id).await?;
    Ok(visibility::room_view(&room, viewer))
}

pub async fn vote_summary(ctx: &ApiContext, room_id: &RoomId) -> Result<VoteSummary, SessionError> {
    let room = get_room(ctx, room_id).await?;
    Ok(aggregation::summarize(&room))
}

pub async fn join_room(
    ctx: &ApiContext,
    room_id: &RoomId,
    caller: &UserId,
    name: &str,
) -> Result<JoinOutcome, SessionError> {
    let now = Utc::now();
    let outcome = commit(ctx, &room_key(room_id), KIND, |room: &PokerRoom| {
        rules::join_room(room, caller, name, now)
    })
    .await?;
    info!(%room_id, player = %caller, ?outcome, "player joined");
    Ok(outcome)
}

pub async fn cast_vote(
    ctx: &ApiContext,
    room_id: &RoomId,
    caller: &UserId,
    value: VoteValue,
) -> Result<(), SessionError> {
    let suit = Suit::random();
    commit(ctx, &room_key(room_id), KIND, |room: &PokerRoom| {
        rules::cast_vote(room, caller, value, suit)
    })
    .await?;
    // The value itself stays out of the logs until reveal.
    info!(%room_id, player = %caller, "vote cast");
    Ok(())
}

pub async fn reveal(ctx: &ApiContext, room_id: &RoomId, caller: &UserId) -> Result<(), SessionError> {
    commit(ctx, &room_key(room_id), KIND, |room: &PokerRoom| {
        rules::reveal(room, caller)
    })
    .await?;
    info!(%room_id, "votes revealed");
    Ok(())
}

pub async fn reset(ctx: &ApiContext, room_id: &RoomId, caller: &UserId) -> Result<(), SessionError> {
    commit(ctx, &room_key(room_id), KIND, |room: &PokerRoom| {
        rules::reset(room, caller)
    })
    .await?;
    info!(%room_id, "room reset");
    Ok(())
}

pub async fn rename_player(
    ctx: &ApiContext,
    room_id: &RoomId,
    caller: &UserId,
    target: &UserId,
    name: &str,
) -> Result<(), SessionError> {
    commit(ctx, &room_key(room_id), KIND, |room: &PokerRoom| {
        rules::rename_player(room, caller, target, name)
    })
    .await?;
    info!(%room_id, player = %target, "player renamed");
    Ok(())
}

#[cfg(test)]
#[path = "tests/poker_tests.rs"]
mod tests;

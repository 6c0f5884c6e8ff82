use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{PlayerData, PokerRoom, RoomId, Suit, UserId, VoteValue},
    error::SessionError,
};
use storage::FieldPath;

use crate::{
    mutation::{set, Mutation},
    validation,
    visibility::{ensure_player_self, ensure_room_owner, ensure_voting_open},
};

/// What [`join_room`] did for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadySeated,
    Renamed,
}

fn player_path(user_id: &UserId) -> FieldPath {
    FieldPath::new(["players", user_id.as_str()])
}

fn seated<'a>(room: &'a PokerRoom, user_id: &UserId) -> Result<&'a PlayerData, SessionError> {
    room.players
        .get(user_id)
        .ok_or_else(|| SessionError::not_found(format!("{user_id} has not joined room {}", room.id)))
}

fn ensure_name_free(room: &PokerRoom, name: &str, claimant: &UserId) -> Result<(), SessionError> {
    match room.player_named(name) {
        Some(holder) if &holder.user_id != claimant => Err(SessionError::invalid(format!(
            "the name '{name}' is already taken in this room"
        ))),
        _ => Ok(()),
    }
}

pub fn new_room(
    owner: &UserId,
    owner_name: &str,
    now: DateTime<Utc>,
) -> Result<PokerRoom, SessionError> {
    let name = validation::display_name(owner_name)?;
    Ok(PokerRoom::new(RoomId::generate(), owner.clone(), name, now))
}

pub fn join_room(
    room: &PokerRoom,
    caller: &UserId,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Mutation<JoinOutcome>, SessionError> {
    let name = validation::display_name(name)?;
    match room.players.get(caller) {
        Some(player) if player.name == name => Ok(Mutation::unchanged(JoinOutcome::AlreadySeated)),
        Some(_) => {
            let renamed = rename_player(room, caller, caller, &name)?;
            Ok(Mutation::write(renamed.ops, JoinOutcome::Renamed))
        }
        None => {
            ensure_name_free(room, &name, caller)?;
            let player = PlayerData::new(name, caller.clone(), now);
            Ok(Mutation::write(
                vec![set(player_path(caller), &player)?],
                JoinOutcome::Joined,
            ))
        }
    }
}

/// Puts `value` on the table for `caller`, dealing the card a fresh `suit`.
pub fn cast_vote(
    room: &PokerRoom,
    caller: &UserId,
    value: VoteValue,
    suit: Suit,
) -> Result<Mutation<()>, SessionError> {
    if !value.is_in_deck() {
        return Err(SessionError::invalid(format!(
            "{value} is not a card in the deck"
        )));
    }
    let player = seated(room, caller)?;
    ensure_voting_open(room)?;
    if player.vote == Some(value) {
        return Ok(Mutation::unchanged(()));
    }
    let path = player_path(caller);
    Ok(Mutation::write(
        vec![
            set(path.child("vote"), &value)?,
            set(path.child("suit"), &suit)?,
        ],
        (),
    ))
}

pub fn reveal(room: &PokerRoom, caller: &UserId) -> Result<Mutation<()>, SessionError> {
    ensure_room_owner(room, caller)?;
    if room.revealed {
        return Ok(Mutation::unchanged(()));
    }
    Ok(Mutation::write(
        vec![set(FieldPath::field("revealed"), &true)?],
        (),
    ))
}

/// Clears every card and turns them face down again, in one write.
pub fn reset(room: &PokerRoom, caller: &UserId) -> Result<Mutation<()>, SessionError> {
    ensure_room_owner(room, caller)?;
    if !room.revealed && room.players.values().all(|player| !player.has_voted()) {
        return Ok(Mutation::unchanged(()));
    }
    let mut players = room.players.clone();
    for player in players.values_mut() {
        player.vote = None;
        player.suit = None;
    }
    Ok(Mutation::write(
        vec![
            set(FieldPath::field("players"), &players)?,
            set(FieldPath::field("revealed"), &false)?,
        ],
        (),
    ))
}

pub fn rename_player(
    room: &PokerRoom,
    caller: &UserId,
    target: &UserId,
    name: &str,
) -> Result<Mutation<()>, SessionError> {
    let name = validation::display_name(name)?;
    let player = seated(room, target)?;
    ensure_player_self(player, caller)?;
    if player.name == name {
        return Ok(Mutation::unchanged(()));
    }
    ensure_name_free(room, &name, target)?;
    Ok(Mutation::write(
        vec![set(player_path(target).child("name"), &name)?],
        (),
    ))
}

#[cfg(test)]
#[path = "tests/rules_tests.rs"]
mod tests;

//! What a given viewer may see of a session, and what they may do to it.
//!
//! Views are derived from one snapshot at a time and never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        Board, BoardId, BoardVisibility, Note, NoteId, NoteStatus, PlayerData, PokerRoom, RoomId,
        Section, SectionId, SectionKind, Suit, UserId, VoteKind, VoteValue,
    },
    error::SessionError,
};

use crate::aggregation::{display_label, summarize, VoteSummary};

pub fn ensure_board_creator(board: &Board, caller: &UserId) -> Result<(), SessionError> {
    if board.is_creator(caller) {
        Ok(())
    } else {
        Err(SessionError::forbidden(
            "only the board creator can perform this action",
        ))
    }
}

pub fn ensure_note_author(note: &Note, caller: &UserId) -> Result<(), SessionError> {
    if &note.author_id == caller {
        Ok(())
    } else {
        Err(SessionError::forbidden("only the note author can change it"))
    }
}

pub fn ensure_room_owner(room: &PokerRoom, caller: &UserId) -> Result<(), SessionError> {
    if room.is_owner(caller) {
        Ok(())
    } else {
        Err(SessionError::forbidden(
            "only the room owner can perform this action",
        ))
    }
}

pub fn ensure_player_self(player: &PlayerData, caller: &UserId) -> Result<(), SessionError> {
    if &player.user_id == caller {
        Ok(())
    } else {
        Err(SessionError::forbidden("players can only rename themselves"))
    }
}

pub fn ensure_voting_open(room: &PokerRoom) -> Result<(), SessionError> {
    if room.revealed {
        Err(SessionError::forbidden(
            "votes are frozen once the room is revealed",
        ))
    } else {
        Ok(())
    }
}

/// Whether `viewer` may read the content of `note` on `board`.
pub fn note_content_visible(board: &Board, note: &Note, viewer: &UserId) -> bool {
    if &note.author_id == viewer {
        return true;
    }
    board.board_visibility == BoardVisibility::Visible && note.status == NoteStatus::Visible
}

/// Whether `viewer` may see the card `player` put down.
pub fn vote_visible(room: &PokerRoom, player: &PlayerData, viewer: &UserId) -> bool {
    room.revealed || &player.user_id == viewer
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub id: BoardId,
    pub title: String,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub board_visibility: BoardVisibility,
    pub is_creator: bool,
    pub note_count: usize,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionView {
    pub id: SectionId,
    pub title: String,
    pub kind: SectionKind,
    pub note_count: usize,
    pub notes: Vec<NoteView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteView {
    pub id: NoteId,
    pub created_at: DateTime<Utc>,
    pub status: NoteStatus,
    pub body: NoteBody,
    pub upvotes: usize,
    pub downvotes: usize,
    pub my_vote: Option<VoteKind>,
    pub can_edit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "visibility", rename_all = "snake_case")]
pub enum NoteBody {
    Shown { content: String, author_id: UserId },
    Redacted,
}

pub fn board_view(board: &Board, viewer: &UserId) -> BoardView {
    BoardView {
        id: board.id.clone(),
        title: board.title.clone(),
        creator_id: board.creator_id.clone(),
        created_at: board.created_at,
        board_visibility: board.board_visibility,
        is_creator: board.is_creator(viewer),
        note_count: board.note_count(),
        sections: board
            .sections
            .iter()
            .map(|section| section_view(board, section, viewer))
            .collect(),
    }
}

fn section_view(board: &Board, section: &Section, viewer: &UserId) -> SectionView {
    SectionView {
        id: section.id.clone(),
        title: section.title.clone(),
        kind: section.kind,
        note_count: section.notes.len(),
        notes: section
            .notes
            .iter()
            .map(|note| note_view(board, note, viewer))
            .collect(),
    }
}

fn note_view(board: &Board, note: &Note, viewer: &UserId) -> NoteView {
    let body = if note_content_visible(board, note, viewer) {
        NoteBody::Shown {
            content: note.content.clone(),
            author_id: note.author_id.clone(),
        }
    } else {
        NoteBody::Redacted
    };
    NoteView {
        id: note.id.clone(),
        created_at: note.created_at,
        status: note.status,
        body,
        upvotes: note.count_votes(VoteKind::Up),
        downvotes: note.count_votes(VoteKind::Down),
        my_vote: note.vote_by(viewer).map(|vote| vote.kind),
        can_edit: &note.author_id == viewer,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: RoomId,
    pub created_by: UserId,
    pub revealed: bool,
    pub is_owner: bool,
    pub can_reveal: bool,
    pub can_reset: bool,
    pub can_vote: bool,
    pub my_vote: Option<VoteValue>,
    pub players: Vec<PlayerView>,
    pub summary: VoteSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub user_id: UserId,
    pub name: String,
    pub is_owner: bool,
    pub is_me: bool,
    pub card: Card,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "face", rename_all = "snake_case")]
pub enum Card {
    /// The player has not voted.
    Empty,
    /// The player voted but the viewer may not see the value yet.
    FaceDown,
    FaceUp {
        value: VoteValue,
        label: String,
        suit: Option<Suit>,
    },
}

pub fn room_view(room: &PokerRoom, viewer: &UserId) -> RoomView {
    let is_owner = room.is_owner(viewer);
    let me = room.players.get(viewer);

    let mut seated: Vec<&PlayerData> = room.players.values().collect();
    seated.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.name.cmp(&b.name)));

    RoomView {
        id: room.id.clone(),
        created_by: room.created_by.clone(),
        revealed: room.revealed,
        is_owner,
        can_reveal: is_owner && !room.revealed,
        can_reset: is_owner,
        can_vote: me.is_some() && !room.revealed,
        my_vote: me.and_then(|player| player.vote),
        players: seated
            .into_iter()
            .map(|player| player_view(room, player, viewer))
            .collect(),
        summary: summarize(room),
    }
}

fn player_view(room: &PokerRoom, player: &PlayerData, viewer: &UserId) -> PlayerView {
    let card = match player.vote {
        None => Card::Empty,
        Some(_) if !vote_visible(room, player, viewer) => Card::FaceDown,
        Some(value) => Card::FaceUp {
            value,
            label: display_label(value),
            suit: player.suit,
        },
    };
    PlayerView {
        user_id: player.user_id.clone(),
        name: player.name.clone(),
        is_owner: player.is_owner,
        is_me: &player.user_id == viewer,
        card,
    }
}

#[cfg(test)]
#[path = "tests/visibility_tests.rs"]
mod tests;

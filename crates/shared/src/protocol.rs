use serde::{Deserialize, Serialize};

use crate::domain::{
    BoardId, BoardVisibility, NoteId, NoteStatus, RoomId, SectionId, UserId, VoteKind, VoteValue,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub user_id: UserId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardResponse {
    pub board_id: BoardId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTitleRequest {
    pub user_id: UserId,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionCreatedResponse {
    pub section_id: SectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardVisibilityRequest {
    pub user_id: UserId,
    pub visibility: BoardVisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteContentRequest {
    pub user_id: UserId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteCreatedResponse {
    pub note_id: NoteId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteNoteRequest {
    pub user_id: UserId,
    pub kind: VoteKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteStatusRequest {
    pub user_id: UserId,
    pub status: NoteStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

/// Body of join and rename requests: the caller and the display name they want.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerNameRequest {
    pub user_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub user_id: UserId,
    pub vote: VoteValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomActionRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerQuery {
    pub user_id: UserId,
}

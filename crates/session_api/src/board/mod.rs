//! Retro board operations.

use chrono::Utc;
use shared::{
    domain::{Board, BoardId, BoardVisibility, NoteId, NoteStatus, SectionId, UserId, VoteKind},
    error::SessionError,
};
use tracing::info;

use crate::{
    board_key,
    mutation::{commit, decode, encode_error, fetch, store_error},
    visibility::{self, BoardView},
    ApiContext,
};

pub mod rules;

const KIND: &str = "board";

pub async fn create_board(
    ctx: &ApiContext,
    creator: &UserId,
    title: &str,
) -> Result<BoardId, SessionError> {
    let board = rules::new_board(title, creator, Utc::now())?;
    let data = serde_json::to_value(&board).map_err(encode_error)?;
    ctx.store
        .create(&board_key(&board.id), data)
        .await
        .map_err(store_error)?;
    info!(board_id = %board.id, creator = %creator, "board created");
    Ok(board.id)
}

pub async fn get_board(ctx: &ApiContext, board_id: &BoardId) -> Result<Board, SessionError> {
    let snapshot = fetch(ctx, &board_key(board_id), KIND).await?;
    decode(&snapshot, KIND)
}

pub async fn board_view(
    ctx: &ApiContext,
    board_id: &BoardId,
    viewer: &UserId,
) -> Result<BoardView, SessionError> {
    let board = get_board(ctx, board_id).await?;
    Ok(visibility::board_view(&board, viewer))
}

pub async fn add_note(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    author: &UserId,
    content: &str,
) -> Result<NoteId, SessionError> {
    let now = Utc::now();
    let note_id = commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::add_note(board, section_id, author, content, now)
    })
    .await?;
    info!(%board_id, %section_id, %note_id, author = %author, "note added");
    Ok(note_id)
}

pub async fn edit_note(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    content: &str,
) -> Result<(), SessionError> {
    commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::edit_note(board, section_id, note_id, caller, content)
    })
    .await?;
    info!(%board_id, %note_id, "note edited");
    Ok(())
}

pub async fn delete_note(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
) -> Result<(), SessionError> {
    commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::delete_note(board, section_id, note_id, caller)
    })
    .await?;
    info!(%board_id, %note_id, "note deleted");
    Ok(())
}

/// Returns the caller's vote on the note after the toggle.
pub async fn vote_note(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    kind: VoteKind,
) -> Result<Option<VoteKind>, SessionError> {
    let now = Utc::now();
    let mine = commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::vote_note(board, section_id, note_id, caller, kind, now)
    })
    .await?;
    info!(%board_id, %note_id, voter = %caller, vote = ?mine, "note vote toggled");
    Ok(mine)
}

pub async fn set_note_status(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    status: NoteStatus,
) -> Result<(), SessionError> {
    commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::set_note_status(board, section_id, note_id, caller, status)
    })
    .await?;
    info!(%board_id, %note_id, ?status, "note status changed");
    Ok(())
}

pub async fn add_section(
    ctx: &ApiContext,
    board_id: &BoardId,
    caller: &UserId,
    title: &str,
) -> Result<SectionId, SessionError> {
    let section_id = commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::add_section(board, caller, title)
    })
    .await?;
    info!(%board_id, %section_id, "section added");
    Ok(section_id)
}

pub async fn rename_section(
    ctx: &ApiContext,
    board_id: &BoardId,
    section_id: &SectionId,
    caller: &UserId,
    title: &str,
) -> Result<(), SessionError> {
    commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::rename_section(board, section_id, caller, title)
    })
    .await?;
    info!(%board_id, %section_id, "section renamed");
    Ok(())
}

pub async fn set_board_visibility(
    ctx: &ApiContext,
    board_id: &BoardId,
    caller: &UserId,
    visibility: BoardVisibility,
) -> Result<BoardVisibility, SessionError> {
    let applied = commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::set_board_visibility(board, caller, visibility)
    })
    .await?;
    info!(%board_id, visibility = ?applied, "board visibility set");
    Ok(applied)
}

/// Flips between visible and hidden relative to the version the write is based on.
pub async fn toggle_board_visibility(
    ctx: &ApiContext,
    board_id: &BoardId,
    caller: &UserId,
) -> Result<BoardVisibility, SessionError> {
    let applied = commit(ctx, &board_key(board_id), KIND, |board: &Board| {
        rules::toggle_board_visibility(board, caller)
    })
    .await?;
    info!(%board_id, visibility = ?applied, "board visibility toggled");
    Ok(applied)
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;

//! Board mutations as pure functions of the current document.
//!
//! Each rule locates its target, checks the caller's capability and returns the
//! narrowest field writes that express the change. Sections and notes are addressed by
//! array index, which is safe because the writes are conditional on the version read.

use chrono::{DateTime, Utc};
use shared::{
    domain::{
        Board, BoardId, BoardVisibility, Note, NoteId, NoteStatus, Section, SectionId,
        SectionKind, UserId, Vote, VoteKind,
    },
    error::SessionError,
};
use storage::FieldPath;

use crate::{
    mutation::{set, Mutation},
    validation,
    visibility::{ensure_board_creator, ensure_note_author},
};

fn sections_path() -> FieldPath {
    FieldPath::field("sections")
}

fn section_path(section: usize) -> FieldPath {
    sections_path().index(section)
}

fn notes_path(section: usize) -> FieldPath {
    section_path(section).child("notes")
}

fn note_path(section: usize, note: usize) -> FieldPath {
    notes_path(section).index(note)
}

fn locate_section(board: &Board, section_id: &SectionId) -> Result<usize, SessionError> {
    board
        .section_index(section_id)
        .ok_or_else(|| SessionError::not_found(format!("section {section_id} not found")))
}

fn locate_note(
    board: &Board,
    section_id: &SectionId,
    note_id: &NoteId,
) -> Result<(usize, usize), SessionError> {
    let section = locate_section(board, section_id)?;
    let note = board.sections[section]
        .note_index(note_id)
        .ok_or_else(|| SessionError::not_found(format!("note {note_id} not found")))?;
    Ok((section, note))
}

pub fn new_board(title: &str, creator: &UserId, now: DateTime<Utc>) -> Result<Board, SessionError> {
    let title = validation::title(title)?;
    Ok(Board::with_default_sections(
        BoardId::generate(),
        title,
        creator.clone(),
        now,
    ))
}

pub fn add_note(
    board: &Board,
    section_id: &SectionId,
    author: &UserId,
    content: &str,
    now: DateTime<Utc>,
) -> Result<Mutation<NoteId>, SessionError> {
    let content = validation::note_content(content)?;
    let section = locate_section(board, section_id)?;
    let note = Note {
        id: NoteId::generate(),
        content,
        created_at: now,
        author_id: author.clone(),
        votes: Vec::new(),
        status: NoteStatus::Visible,
    };
    let append_at = board.sections[section].notes.len();
    Ok(Mutation::write(
        vec![set(note_path(section, append_at), &note)?],
        note.id,
    ))
}

pub fn edit_note(
    board: &Board,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    content: &str,
) -> Result<Mutation<()>, SessionError> {
    let content = validation::note_content(content)?;
    let (section, index) = locate_note(board, section_id, note_id)?;
    let note = &board.sections[section].notes[index];
    ensure_note_author(note, caller)?;
    if note.content == content {
        return Ok(Mutation::unchanged(()));
    }
    Ok(Mutation::write(
        vec![set(note_path(section, index).child("content"), &content)?],
        (),
    ))
}

pub fn delete_note(
    board: &Board,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
) -> Result<Mutation<()>, SessionError> {
    let (section, index) = locate_note(board, section_id, note_id)?;
    ensure_note_author(&board.sections[section].notes[index], caller)?;
    let mut notes = board.sections[section].notes.clone();
    notes.remove(index);
    Ok(Mutation::write(vec![set(notes_path(section), &notes)?], ()))
}

/// Casts, switches or withdraws `caller`'s vote on a note. Returns the caller's vote
/// afterwards.
pub fn vote_note(
    board: &Board,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    kind: VoteKind,
    now: DateTime<Utc>,
) -> Result<Mutation<Option<VoteKind>>, SessionError> {
    let (section, index) = locate_note(board, section_id, note_id)?;
    let note = &board.sections[section].notes[index];
    let votes = toggle_vote(&note.votes, caller, kind, now);
    let mine = votes
        .iter()
        .find(|vote| &vote.user_id == caller)
        .map(|vote| vote.kind);
    Ok(Mutation::write(
        vec![set(note_path(section, index).child("votes"), &votes)?],
        mine,
    ))
}

/// Same kind twice removes the vote, the other kind replaces it in place. Any extra
/// entries the user somehow holds are collapsed into that one outcome.
pub fn toggle_vote(votes: &[Vote], user_id: &UserId, kind: VoteKind, now: DateTime<Utc>) -> Vec<Vote> {
    let current = votes
        .iter()
        .find(|vote| &vote.user_id == user_id)
        .map(|vote| vote.kind);
    let fresh = Vote {
        user_id: user_id.clone(),
        kind,
        created_at: now,
    };

    let mut next = Vec::with_capacity(votes.len() + 1);
    let mut placed = false;
    for vote in votes {
        if &vote.user_id != user_id {
            next.push(vote.clone());
        } else if current != Some(kind) && !placed {
            next.push(fresh.clone());
            placed = true;
        }
    }
    if current.is_none() {
        next.push(fresh);
    }
    next
}

pub fn set_note_status(
    board: &Board,
    section_id: &SectionId,
    note_id: &NoteId,
    caller: &UserId,
    status: NoteStatus,
) -> Result<Mutation<()>, SessionError> {
    let (section, index) = locate_note(board, section_id, note_id)?;
    ensure_board_creator(board, caller)?;
    if board.sections[section].notes[index].status == status {
        return Ok(Mutation::unchanged(()));
    }
    Ok(Mutation::write(
        vec![set(note_path(section, index).child("status"), &status)?],
        (),
    ))
}

pub fn add_section(
    board: &Board,
    caller: &UserId,
    title: &str,
) -> Result<Mutation<SectionId>, SessionError> {
    ensure_board_creator(board, caller)?;
    let title = validation::title(title)?;
    let section = Section::new(title, SectionKind::Custom);
    Ok(Mutation::write(
        vec![set(section_path(board.sections.len()), &section)?],
        section.id,
    ))
}

pub fn rename_section(
    board: &Board,
    section_id: &SectionId,
    caller: &UserId,
    title: &str,
) -> Result<Mutation<()>, SessionError> {
    let section = locate_section(board, section_id)?;
    ensure_board_creator(board, caller)?;
    let title = validation::title(title)?;
    if board.sections[section].title == title {
        return Ok(Mutation::unchanged(()));
    }
    Ok(Mutation::write(
        vec![set(section_path(section).child("title"), &title)?],
        (),
    ))
}

pub fn set_board_visibility(
    board: &Board,
    caller: &UserId,
    visibility: BoardVisibility,
) -> Result<Mutation<BoardVisibility>, SessionError> {
    ensure_board_creator(board, caller)?;
    if board.board_visibility == visibility {
        return Ok(Mutation::unchanged(visibility));
    }
    Ok(Mutation::write(
        vec![set(FieldPath::field("boardVisibility"), &visibility)?],
        visibility,
    ))
}

pub fn toggle_board_visibility(
    board: &Board,
    caller: &UserId,
) -> Result<Mutation<BoardVisibility>, SessionError> {
    set_board_visibility(board, caller, board.board_visibility.toggled())
}

#[cfg(test)]
#[path = "tests/rules_tests.rs"]
mod tests;

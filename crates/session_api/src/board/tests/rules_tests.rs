use super::*;
use crate::test_support::{fixed_time, sample_board, user};

fn paths<T>(mutation: &Mutation<T>) -> Vec<String> {
    mutation.ops.iter().map(|op| op.path().to_string()).collect()
}

fn board_with_note(author: &str) -> (Board, SectionId, NoteId) {
    let board = sample_board("carol");
    let section_id = board.sections[1].id.clone();
    let added = add_note(&board, &section_id, &user(author), "standups run long", fixed_time())
        .expect("add note");
    let note_id = added.output.clone();
    (added.apply(&board).expect("apply"), section_id, note_id)
}

#[test]
fn add_note_appends_at_the_end_of_its_section() {
    let (board, section_id, _) = board_with_note("alice");
    let second = add_note(&board, &section_id, &user("bob"), "retro ran late", fixed_time())
        .expect("add note");
    assert_eq!(paths(&second), vec!["sections.1.notes.1"]);

    let board = second.apply(&board).expect("apply");
    let notes = &board.sections[1].notes;
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].content, "standups run long");
    assert_eq!(notes[1].id, second.output);
    assert_eq!(notes[1].status, NoteStatus::Visible);
    assert!(notes[1].votes.is_empty());
}

#[test]
fn add_note_rejects_unknown_section_and_blank_content() {
    let board = sample_board("carol");
    assert!(matches!(
        add_note(&board, &SectionId::from("nope"), &user("a"), "x", fixed_time()),
        Err(SessionError::NotFound(_))
    ));
    let section_id = board.sections[0].id.clone();
    assert!(matches!(
        add_note(&board, &section_id, &user("a"), "   ", fixed_time()),
        Err(SessionError::InvalidArgument(_))
    ));
}

#[test]
fn same_vote_twice_withdraws_it() {
    let (board, section_id, note_id) = board_with_note("alice");
    let voter = user("bob");

    let first = vote_note(&board, &section_id, &note_id, &voter, VoteKind::Up, fixed_time())
        .expect("vote");
    assert_eq!(first.output, Some(VoteKind::Up));
    assert_eq!(paths(&first), vec!["sections.1.notes.0.votes"]);
    let board = first.apply(&board).expect("apply");

    let second = vote_note(&board, &section_id, &note_id, &voter, VoteKind::Up, fixed_time())
        .expect("vote");
    assert_eq!(second.output, None);
    let board = second.apply(&board).expect("apply");
    assert!(board.sections[1].notes[0].vote_by(&voter).is_none());
}

#[test]
fn opposite_vote_replaces_in_place() {
    let now = fixed_time();
    let votes = toggle_vote(&[], &user("a"), VoteKind::Up, now);
    let votes = toggle_vote(&votes, &user("b"), VoteKind::Up, now);
    let votes = toggle_vote(&votes, &user("a"), VoteKind::Down, now);

    assert_eq!(votes.len(), 2);
    assert_eq!(votes[0].user_id, user("a"));
    assert_eq!(votes[0].kind, VoteKind::Down);
    assert_eq!(votes[1].user_id, user("b"));
}

#[test]
fn duplicate_votes_from_one_user_collapse() {
    let now = fixed_time();
    let stale = |who: &str, kind| Vote {
        user_id: user(who),
        kind,
        created_at: now,
    };
    let stored = vec![
        stale("a", VoteKind::Up),
        stale("b", VoteKind::Up),
        stale("a", VoteKind::Up),
    ];

    let replaced = toggle_vote(&stored, &user("a"), VoteKind::Down, now);
    let mine: Vec<_> = replaced.iter().filter(|v| v.user_id == user("a")).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].kind, VoteKind::Down);
    assert_eq!(replaced[0].user_id, user("a"));
    assert_eq!(replaced.len(), 2);

    let removed = toggle_vote(&stored, &user("a"), VoteKind::Up, now);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].user_id, user("b"));
}

#[test]
fn only_the_author_edits_or_deletes() {
    let (board, section_id, note_id) = board_with_note("alice");

    assert!(matches!(
        edit_note(&board, &section_id, &note_id, &user("bob"), "hijacked"),
        Err(SessionError::Forbidden(_))
    ));
    assert!(matches!(
        delete_note(&board, &section_id, &note_id, &user("carol")),
        Err(SessionError::Forbidden(_))
    ));

    let edit = edit_note(&board, &section_id, &note_id, &user("alice"), "standups run long again")
        .expect("edit");
    assert_eq!(paths(&edit), vec!["sections.1.notes.0.content"]);

    let delete = delete_note(&board, &section_id, &note_id, &user("alice")).expect("delete");
    assert_eq!(paths(&delete), vec!["sections.1.notes"]);
    let board = delete.apply(&board).expect("apply");
    assert!(board.sections[1].notes.is_empty());
}

#[test]
fn unchanged_content_writes_nothing() {
    let (board, section_id, note_id) = board_with_note("alice");
    let edit = edit_note(&board, &section_id, &note_id, &user("alice"), " standups run long ")
        .expect("edit");
    assert!(edit.is_noop());
}

#[test]
fn deleting_keeps_sibling_order() {
    let (board, section_id, first_id) = board_with_note("alice");
    let second = add_note(&board, &section_id, &user("alice"), "two", fixed_time()).expect("add");
    let board = second.apply(&board).expect("apply");
    let third = add_note(&board, &section_id, &user("alice"), "three", fixed_time()).expect("add");
    let board = third.apply(&board).expect("apply");

    let delete = delete_note(&board, &section_id, &second.output, &user("alice")).expect("delete");
    let board = delete.apply(&board).expect("apply");
    let ids: Vec<&NoteId> = board.sections[1].notes.iter().map(|note| &note.id).collect();
    assert_eq!(ids, vec![&first_id, &third.output]);
}

#[test]
fn creator_only_board_actions() {
    let board = sample_board("carol");
    let stranger = user("mallory");

    assert!(matches!(
        add_section(&board, &stranger, "Kudos"),
        Err(SessionError::Forbidden(_))
    ));
    assert!(matches!(
        rename_section(&board, &board.sections[0].id, &stranger, "Wins"),
        Err(SessionError::Forbidden(_))
    ));
    assert!(matches!(
        toggle_board_visibility(&board, &stranger),
        Err(SessionError::Forbidden(_))
    ));

    let added = add_section(&board, &user("carol"), "Kudos").expect("add section");
    assert_eq!(paths(&added), vec!["sections.3"]);
    let board = added.apply(&board).expect("apply");
    assert_eq!(board.sections[3].kind, SectionKind::Custom);
    assert_eq!(board.sections[3].title, "Kudos");

    let renamed =
        rename_section(&board, &board.sections[0].id, &user("carol"), "Wins").expect("rename");
    assert_eq!(paths(&renamed), vec!["sections.0.title"]);
}

#[test]
fn toggling_visibility_flips_the_flag() {
    let board = sample_board("carol");
    let hide = toggle_board_visibility(&board, &user("carol")).expect("toggle");
    assert_eq!(hide.output, BoardVisibility::Hidden);
    assert_eq!(paths(&hide), vec!["boardVisibility"]);
    let board = hide.apply(&board).expect("apply");
    assert_eq!(board.board_visibility, BoardVisibility::Hidden);

    let again = set_board_visibility(&board, &user("carol"), BoardVisibility::Hidden).expect("set");
    assert!(again.is_noop());
}

#[test]
fn note_status_is_moderated_by_the_creator() {
    let (board, section_id, note_id) = board_with_note("alice");
    assert!(matches!(
        set_note_status(&board, &section_id, &note_id, &user("alice"), NoteStatus::Hidden),
        Err(SessionError::Forbidden(_))
    ));
    let hide = set_note_status(&board, &section_id, &note_id, &user("carol"), NoteStatus::Hidden)
        .expect("status");
    assert_eq!(paths(&hide), vec!["sections.1.notes.0.status"]);
}

#[test]
fn new_board_validates_title() {
    assert!(new_board("", &user("carol"), fixed_time()).is_err());
    let board = new_board(" Q3 retro ", &user("carol"), fixed_time()).expect("board");
    assert_eq!(board.title, "Q3 retro");
    assert_eq!(board.sections.len(), 3);
}

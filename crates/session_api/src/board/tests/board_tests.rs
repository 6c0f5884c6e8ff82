use std::sync::{atomic::Ordering, Arc};

use super::*;
use crate::{
    mutation::MAX_WRITE_ATTEMPTS,
    test_support::{contended_context, seed_board, UnavailableStore},
    visibility::NoteBody,
};

fn uid(id: &str) -> UserId {
    UserId::from(id)
}

async fn board_with_sections(ctx: &ApiContext, creator: &str) -> (BoardId, Vec<SectionId>) {
    let board_id = create_board(ctx, &uid(creator), "Sprint 12 retro")
        .await
        .expect("create board");
    let board = get_board(ctx, &board_id).await.expect("board");
    let sections = board.sections.into_iter().map(|section| section.id).collect();
    (board_id, sections)
}

#[tokio::test]
async fn created_board_has_default_sections() {
    let ctx = ApiContext::in_memory();
    let board_id = create_board(&ctx, &uid("carol"), "  Sprint 12 retro ")
        .await
        .expect("create board");

    let board = get_board(&ctx, &board_id).await.expect("board");
    assert_eq!(board.title, "Sprint 12 retro");
    assert_eq!(board.creator_id, uid("carol"));
    assert_eq!(board.board_visibility, BoardVisibility::Visible);
    let titles: Vec<&str> = board.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["What went well", "What to improve", "Action Items"]);
}

#[tokio::test]
async fn missing_board_is_not_found() {
    let ctx = ApiContext::in_memory();
    let err = add_note(
        &ctx,
        &BoardId::from("ghost"),
        &SectionId::from("s"),
        &uid("alice"),
        "hello",
    )
    .await
    .expect_err("no such board");
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn vote_toggle_round_trip_through_the_store() {
    let ctx = ApiContext::in_memory();
    let (board_id, sections) = board_with_sections(&ctx, "carol").await;
    let note_id = add_note(&ctx, &board_id, &sections[0], &uid("alice"), "pairing helped")
        .await
        .expect("add note");

    let voter = uid("bob");
    let up = vote_note(&ctx, &board_id, &sections[0], &note_id, &voter, VoteKind::Up)
        .await
        .expect("vote up");
    assert_eq!(up, Some(VoteKind::Up));
    let down = vote_note(&ctx, &board_id, &sections[0], &note_id, &voter, VoteKind::Down)
        .await
        .expect("vote down");
    assert_eq!(down, Some(VoteKind::Down));

    let board = get_board(&ctx, &board_id).await.expect("board");
    let votes = &board.sections[0].notes[0].votes;
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].kind, VoteKind::Down);

    let withdrawn = vote_note(&ctx, &board_id, &sections[0], &note_id, &voter, VoteKind::Down)
        .await
        .expect("withdraw");
    assert_eq!(withdrawn, None);
    let board = get_board(&ctx, &board_id).await.expect("board");
    assert!(board.sections[0].notes[0].votes.is_empty());
}

#[tokio::test]
async fn rejected_edit_leaves_the_note_untouched() {
    let ctx = ApiContext::in_memory();
    let (board_id, sections) = board_with_sections(&ctx, "carol").await;
    let note_id = add_note(&ctx, &board_id, &sections[1], &uid("alice"), "flaky CI")
        .await
        .expect("add note");

    let err = edit_note(&ctx, &board_id, &sections[1], &note_id, &uid("bob"), "not flaky")
        .await
        .expect_err("not the author");
    assert!(matches!(err, SessionError::Forbidden(_)));
    let err = delete_note(&ctx, &board_id, &sections[1], &note_id, &uid("bob"))
        .await
        .expect_err("not the author");
    assert!(matches!(err, SessionError::Forbidden(_)));

    let board = get_board(&ctx, &board_id).await.expect("board");
    assert_eq!(board.sections[1].notes.len(), 1);
    assert_eq!(board.sections[1].notes[0].content, "flaky CI");
}

#[tokio::test]
async fn hidden_board_view_redacts_for_other_viewers() {
    let ctx = ApiContext::in_memory();
    let (board_id, sections) = board_with_sections(&ctx, "carol").await;
    add_note(&ctx, &board_id, &sections[0], &uid("alice"), "mine")
        .await
        .expect("add");
    add_note(&ctx, &board_id, &sections[0], &uid("bob"), "theirs")
        .await
        .expect("add");

    let hidden = toggle_board_visibility(&ctx, &board_id, &uid("carol"))
        .await
        .expect("toggle");
    assert_eq!(hidden, BoardVisibility::Hidden);

    let view = board_view(&ctx, &board_id, &uid("alice")).await.expect("view");
    let notes = &view.sections[0].notes;
    assert!(matches!(&notes[0].body, NoteBody::Shown { content, .. } if content == "mine"));
    assert_eq!(notes[1].body, NoteBody::Redacted);
    assert_eq!(view.sections[0].note_count, 2);
}

#[tokio::test]
async fn sections_are_added_and_renamed_by_the_creator() {
    let ctx = ApiContext::in_memory();
    let (board_id, _) = board_with_sections(&ctx, "carol").await;

    let err = add_section(&ctx, &board_id, &uid("bob"), "Kudos")
        .await
        .expect_err("not the creator");
    assert!(matches!(err, SessionError::Forbidden(_)));

    let section_id = add_section(&ctx, &board_id, &uid("carol"), "Kudos")
        .await
        .expect("add section");
    rename_section(&ctx, &board_id, &section_id, &uid("carol"), "Shout-outs")
        .await
        .expect("rename");

    let board = get_board(&ctx, &board_id).await.expect("board");
    assert_eq!(board.sections.len(), 4);
    assert_eq!(board.sections[3].title, "Shout-outs");
}

#[tokio::test]
async fn concurrent_writers_on_distinct_notes_both_land() {
    let ctx = ApiContext::in_memory();
    let (board_id, sections) = board_with_sections(&ctx, "carol").await;

    let mut tasks = Vec::new();
    for author in ["alice", "bob", "dan", "erin"] {
        let ctx = ctx.clone();
        let board_id = board_id.clone();
        let section_id = sections[0].clone();
        tasks.push(tokio::spawn(async move {
            add_note(&ctx, &board_id, &section_id, &uid(author), author).await
        }));
    }
    let mut landed = 0;
    for task in tasks {
        match task.await.expect("join") {
            Ok(_) => landed += 1,
            Err(SessionError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let board = get_board(&ctx, &board_id).await.expect("board");
    assert_eq!(board.sections[0].notes.len(), landed);
    assert!(landed >= 1);
}

#[tokio::test]
async fn interleaved_write_is_retried_against_fresh_state() {
    let (ctx, store) = contended_context(1);
    let board = crate::test_support::sample_board("carol");
    seed_board(&ctx, &board).await;

    let note_id = add_note(&ctx, &board.id, &board.sections[0].id, &uid("alice"), "retry me")
        .await
        .expect("add after one conflict");

    assert_eq!(store.updates_attempted.load(Ordering::SeqCst), 2);
    let stored = get_board(&ctx, &board.id).await.expect("board");
    assert_eq!(stored.sections[0].notes[0].id, note_id);
}

#[tokio::test]
async fn persistent_contention_surfaces_conflict() {
    let (ctx, store) = contended_context(usize::MAX);
    let board = crate::test_support::sample_board("carol");
    seed_board(&ctx, &board).await;

    let err = toggle_board_visibility(&ctx, &board.id, &uid("carol"))
        .await
        .expect_err("never wins the race");
    assert!(matches!(err, SessionError::Conflict(_)));
    assert!(err.is_retryable());
    assert_eq!(
        store.updates_attempted.load(Ordering::SeqCst),
        MAX_WRITE_ATTEMPTS
    );
}

#[tokio::test]
async fn store_outage_propagates_as_unavailable() {
    let ctx = ApiContext::new(Arc::new(UnavailableStore));
    let err = create_board(&ctx, &uid("carol"), "retro")
        .await
        .expect_err("store offline");
    assert!(matches!(err, SessionError::StoreUnavailable(_)));

    let err = board_view(&ctx, &BoardId::from("any"), &uid("carol"))
        .await
        .expect_err("store offline");
    assert!(matches!(err, SessionError::StoreUnavailable(_)));
    assert!(err.is_retryable());
}

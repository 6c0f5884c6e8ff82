//! Viewer-side wrappers that turn each snapshot into a fresh board or room view.

use std::sync::{Arc, Mutex};

use session_api::{
    board_key, poker, room_key,
    visibility::{self, BoardView, RoomView},
    ApiContext,
};
use shared::{
    domain::{Board, BoardId, PokerRoom, RoomId, UserId, VoteValue},
    error::SessionError,
};
use tracing::warn;

use crate::{
    dispatcher::{lock, Subscription, SubscriptionDispatcher, Versioned},
    speculative::Speculative,
};

/// Streams `viewer`'s view of a board. Every update is derived from a whole snapshot.
pub fn watch_board<F, E>(
    dispatcher: &SubscriptionDispatcher,
    board_id: &BoardId,
    viewer: &UserId,
    mut on_view: F,
    on_error: E,
) -> Subscription
where
    F: FnMut(BoardView) + Send + 'static,
    E: FnOnce(SessionError) + Send + 'static,
{
    let viewer = viewer.clone();
    dispatcher.subscribe(
        board_key(board_id),
        move |update: Versioned<Board>| on_view(visibility::board_view(&update.value, &viewer)),
        on_error,
    )
}

/// One player's seat in a room: the live view plus their own vote, shown optimistically.
pub struct RoomSession {
    ctx: ApiContext,
    room_id: RoomId,
    viewer: UserId,
    my_vote: Arc<Mutex<Speculative<Option<VoteValue>>>>,
    subscription: Option<Subscription>,
}

impl RoomSession {
    pub fn new(ctx: ApiContext, room_id: RoomId, viewer: UserId) -> Self {
        Self {
            ctx,
            room_id,
            viewer,
            my_vote: Arc::new(Mutex::new(Speculative::new(None))),
            subscription: None,
        }
    }

    /// Subscribes to the room; calling it again replaces the previous listener.
    pub fn open<F, E>(&mut self, dispatcher: &SubscriptionDispatcher, mut on_view: F, on_error: E)
    where
        F: FnMut(RoomView) + Send + 'static,
        E: FnOnce(SessionError) + Send + 'static,
    {
        let viewer = self.viewer.clone();
        let my_vote = self.my_vote.clone();
        let subscription = dispatcher.subscribe(
            room_key(&self.room_id),
            move |update: Versioned<PokerRoom>| {
                let view = visibility::room_view(&update.value, &viewer);
                lock(&my_vote).observe(view.my_vote);
                on_view(view);
            },
            on_error,
        );
        self.subscription = Some(subscription);
    }

    /// The vote to show for this player, including one still in flight.
    pub fn displayed_vote(&self) -> Option<VoteValue> {
        *lock(&self.my_vote).current()
    }

    /// Shows `value` immediately and writes it. Snapshots arriving meanwhile do not hide
    /// it. On failure the display falls back to the last vote a snapshot confirmed.
    pub async fn cast_vote(&self, value: VoteValue) -> Result<(), SessionError> {
        lock(&self.my_vote).propose(Some(value));
        let result = poker::cast_vote(&self.ctx, &self.room_id, &self.viewer, value).await;
        match &result {
            Ok(()) => lock(&self.my_vote).settle(),
            Err(err) => {
                warn!(room_id = %self.room_id, error = %err, "vote rejected; reverting");
                lock(&self.my_vote).revert();
            }
        }
        result
    }

    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;

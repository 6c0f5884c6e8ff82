use std::sync::Arc;

use shared::domain::{BoardId, RoomId};
use storage::{DocumentKey, DocumentStore, MemoryStore};

pub mod aggregation;
pub mod board;
pub mod listing;
pub mod mutation;
pub mod poker;
pub mod validation;
pub mod visibility;

pub use mutation::store_error;

/// Collection holding retro boards.
pub const BOARDS: &str = "boards";
/// Collection holding planning-poker rooms.
pub const ROOMS: &str = "planning_poker";

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn DocumentStore>,
}

impl ApiContext {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Context over a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

pub fn board_key(board_id: &BoardId) -> DocumentKey {
    DocumentKey::new(BOARDS, board_id.as_str())
}

pub fn room_key(room_id: &RoomId) -> DocumentKey {
    DocumentKey::new(ROOMS, room_id.as_str())
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

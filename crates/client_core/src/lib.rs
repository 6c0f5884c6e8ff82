pub mod dispatcher;
pub mod session;
pub mod speculative;

pub use dispatcher::{Subscription, SubscriptionDispatcher, SubscriptionState, Versioned};
pub use session::{watch_board, RoomSession};
pub use speculative::Speculative;

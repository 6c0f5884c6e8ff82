use std::collections::HashMap;

use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::{DocumentKey, Snapshot};

pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Per-document broadcast channels shared by the store implementations.
pub(crate) struct FeedRegistry {
    capacity: usize,
    senders: Mutex<HashMap<DocumentKey, broadcast::Sender<Snapshot>>>,
}

impl FeedRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            senders: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn subscribe(&self, key: &DocumentKey) -> broadcast::Receiver<Snapshot> {
        let mut senders = self.senders.lock().await;
        senders
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drops the channel for `key` once nobody listens to it.
    pub(crate) async fn release(&self, key: &DocumentKey) {
        let mut senders = self.senders.lock().await;
        if senders
            .get(key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            senders.remove(key);
        }
    }

    #[cfg(test)]
    pub(crate) async fn channel_count(&self) -> usize {
        self.senders.lock().await.len()
    }

    pub(crate) async fn publish(&self, snapshot: &Snapshot) {
        let mut senders = self.senders.lock().await;
        let Some(sender) = senders.get(&snapshot.key) else {
            return;
        };
        if sender.send(snapshot.clone()).is_err() {
            debug!(key = %snapshot.key, "no listeners left; dropping feed");
            senders.remove(&snapshot.key);
        }
    }
}

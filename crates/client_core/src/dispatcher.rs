//! Live document subscriptions for one client.
//!
//! Each document key has at most one listener per dispatcher. A listener moves through
//! `Idle -> Subscribing -> Active` and ends in `Error` or `Unsubscribed`. Every delivery
//! is a full decoded document; callers rebuild their view state from it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::de::DeserializeOwned;
use session_api::store_error;
use shared::error::SessionError;
use storage::{DocumentKey, DocumentStore, Snapshot};
use tokio::{
    sync::broadcast::{self, error::RecvError, error::TryRecvError},
    task::AbortHandle,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Active,
    Error,
    Unsubscribed,
}

/// A decoded document together with the store version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<D> {
    pub version: u64,
    pub value: D,
}

struct Slot {
    generation: u64,
    state: SubscriptionState,
    gate: Arc<Mutex<bool>>,
    task: Option<AbortHandle>,
}

impl Slot {
    fn close(&self) {
        *lock(&self.gate) = false;
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

type Slots = Arc<Mutex<HashMap<DocumentKey, Slot>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct SubscriptionDispatcher {
    store: Arc<dyn DocumentStore>,
    slots: Slots,
    next_generation: Arc<Mutex<u64>>,
}

impl SubscriptionDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(Mutex::new(0)),
        }
    }

    /// State of the current listener for `key`; `Idle` when there is none.
    pub fn state(&self, key: &DocumentKey) -> SubscriptionState {
        lock(&self.slots)
            .get(key)
            .map(|slot| slot.state)
            .unwrap_or(SubscriptionState::Idle)
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        lock(&self.slots).len()
    }

    /// Starts delivering `key` to `on_update`, replacing any listener this dispatcher
    /// already has for the same key.
    ///
    /// `on_error` runs at most once, after which the subscription stays in `Error` until
    /// disposed. Neither callback runs once the returned [`Subscription`] is disposed or
    /// replaced. Disposing and replacing wait for a running callback to return, so neither
    /// may be called from inside one.
    pub fn subscribe<D, F, E>(&self, key: DocumentKey, on_update: F, on_error: E) -> Subscription
    where
        D: DeserializeOwned + Send + 'static,
        F: FnMut(Versioned<D>) + Send + 'static,
        E: FnOnce(SessionError) + Send + 'static,
    {
        let generation = {
            let mut next = lock(&self.next_generation);
            *next += 1;
            *next
        };
        let gate = Arc::new(Mutex::new(true));
        let replaced = lock(&self.slots).insert(
            key.clone(),
            Slot {
                generation,
                state: SubscriptionState::Subscribing,
                gate: gate.clone(),
                task: None,
            },
        );
        if let Some(previous) = replaced {
            debug!(%key, generation, "replacing existing listener");
            previous.close();
        }

        let listener = Listener {
            key: key.clone(),
            generation,
            slots: self.slots.clone(),
            gate: gate.clone(),
        };
        let task = tokio::spawn(listener.run(self.store.clone(), on_update, on_error));
        let abort = task.abort_handle();
        if let Some(slot) = lock(&self.slots).get_mut(&key) {
            if slot.generation == generation {
                slot.task = Some(abort.clone());
            }
        }

        Subscription {
            key,
            generation,
            slots: self.slots.clone(),
            gate,
            task: abort,
        }
    }
}

struct Listener {
    key: DocumentKey,
    generation: u64,
    slots: Slots,
    /// `true` while deliveries are allowed. Held for the duration of each callback.
    gate: Arc<Mutex<bool>>,
}

impl Listener {
    async fn run<D, F, E>(self, store: Arc<dyn DocumentStore>, mut on_update: F, on_error: E)
    where
        D: DeserializeOwned,
        F: FnMut(Versioned<D>),
        E: FnOnce(SessionError),
    {
        let feed = match store.subscribe(&self.key).await {
            Ok(feed) => feed,
            Err(err) => return self.fail(store_error(err), on_error),
        };
        let mut receiver = feed.receiver;
        self.set_state(SubscriptionState::Active);
        info!(key = %self.key, version = feed.initial.version, "subscription active");

        let mut last_version = 0;
        let mut next = Some(feed.initial);
        loop {
            if let Some(snapshot) = next.take() {
                if snapshot.version > last_version {
                    last_version = snapshot.version;
                    match decode::<D>(snapshot) {
                        Ok(update) => {
                            if !self.deliver(|| on_update(update)) {
                                return;
                            }
                        }
                        Err(err) => return self.fail(err, on_error),
                    }
                }
            }

            next = match receiver.recv().await {
                Ok(snapshot) => Some(snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "listener fell behind; skipping to newest snapshot");
                    newest(&mut receiver)
                }
                Err(RecvError::Closed) => {
                    let err = SessionError::StoreUnavailable(format!(
                        "change feed for {} closed",
                        self.key
                    ));
                    return self.fail(err, on_error);
                }
            };
        }
    }

    /// Runs `callback` unless the subscription was disposed. Returns whether it ran.
    fn deliver(&self, callback: impl FnOnce()) -> bool {
        let open = lock(&self.gate);
        if !*open {
            return false;
        }
        callback();
        true
    }

    fn fail<E: FnOnce(SessionError)>(&self, err: SessionError, on_error: E) {
        warn!(key = %self.key, error = %err, "subscription failed");
        self.set_state(SubscriptionState::Error);
        self.deliver(|| on_error(err));
    }

    fn set_state(&self, state: SubscriptionState) {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get_mut(&self.key) {
            if slot.generation == self.generation {
                slot.state = state;
            }
        }
    }
}

/// Drains whatever is buffered and keeps only the newest snapshot.
fn newest(receiver: &mut broadcast::Receiver<Snapshot>) -> Option<Snapshot> {
    let mut latest = None;
    loop {
        match receiver.try_recv() {
            Ok(snapshot) => latest = Some(snapshot),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
        }
    }
}

fn decode<D: DeserializeOwned>(snapshot: Snapshot) -> Result<Versioned<D>, SessionError> {
    let value = serde_json::from_value(snapshot.data).map_err(|err| {
        SessionError::Internal(format!("{} does not decode: {err}", snapshot.key))
    })?;
    Ok(Versioned {
        version: snapshot.version,
        value,
    })
}

/// Handle returned by [`SubscriptionDispatcher::subscribe`]. Dropping it disposes it.
pub struct Subscription {
    key: DocumentKey,
    generation: u64,
    slots: Slots,
    gate: Arc<Mutex<bool>>,
    task: AbortHandle,
}

impl Subscription {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Stops delivery. Safe to call repeatedly and after an error.
    pub fn dispose(&self) {
        {
            let mut open = lock(&self.gate);
            if !*open {
                return;
            }
            *open = false;
        }
        self.task.abort();

        let mut slots = lock(&self.slots);
        if slots
            .get(&self.key)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            slots.remove(&self.key);
        }
        debug!(key = %self.key, generation = self.generation, "subscription disposed");
    }

    pub fn is_disposed(&self) -> bool {
        !*lock(&self.gate)
    }

    /// `Unsubscribed` once disposed or replaced by a newer listener for the same key.
    pub fn state(&self) -> SubscriptionState {
        if self.is_disposed() {
            return SubscriptionState::Unsubscribed;
        }
        lock(&self.slots)
            .get(&self.key)
            .filter(|slot| slot.generation == self.generation)
            .map_or(SubscriptionState::Unsubscribed, |slot| slot.state)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;

/// A value the user changed locally before the store confirmed it.
///
/// `confirmed` mirrors the last snapshot. The provisional value survives unrelated
/// snapshots and is settled either by a snapshot carrying it or by the write succeeding.
/// A failed write drops it and shows `confirmed` again, never an earlier guess.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Speculative<T> {
    confirmed: T,
    provisional: Option<T>,
}

impl<T> Speculative<T> {
    pub fn new(confirmed: T) -> Self {
        Self {
            confirmed,
            provisional: None,
        }
    }

    /// What the UI should show right now.
    pub fn current(&self) -> &T {
        self.provisional.as_ref().unwrap_or(&self.confirmed)
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        self.provisional.is_some()
    }

    pub fn propose(&mut self, value: T) {
        self.provisional = Some(value);
    }

    pub fn revert(&mut self) {
        self.provisional = None;
    }

    /// The write behind the provisional value landed.
    pub fn settle(&mut self) {
        if let Some(value) = self.provisional.take() {
            self.confirmed = value;
        }
    }
}

impl<T: PartialEq> Speculative<T> {
    /// Records what a snapshot says. A pending value it matches is no longer pending.
    pub fn observe(&mut self, value: T) {
        if self.provisional.as_ref() == Some(&value) {
            self.provisional = None;
        }
        self.confirmed = value;
    }
}

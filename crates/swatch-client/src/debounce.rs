//! Debounced writes.
//!
//! Each key moves `Clean -> Pending -> Writing -> Clean`. Edits reset one
//! shared quiet-period timer; when it fires every pending key is handed out
//! once with its latest value. A key edited while its write is in flight
//! stays pending and re-arms the timer when the write finishes.

use std::collections::HashSet;
use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

/// Write state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing to write.
    Clean,
    /// Waiting for the quiet period to pass.
    Pending,
    /// A write is in flight.
    Writing,
}

/// One shared quiet-period timer over the latest value of each key.
#[derive(Debug, Clone)]
pub struct Debouncer<K, V> {
    delay: Duration,
    deadline: Option<Instant>,
    pending: IndexMap<K, V>,
    writing: HashSet<K>,
}

impl<K: Hash + Eq + Clone, V> Debouncer<K, V> {
    /// Debouncer with a quiet period of `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            pending: IndexMap::new(),
            writing: HashSet::new(),
        }
    }

    /// Configured quiet period.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records `value` as the latest for `key` and restarts the timer.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) {
        self.pending.insert(key, value);
        self.deadline = Some(now + self.delay);
    }

    /// Drops a pending value; an in-flight write is unaffected.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        let value = self.pending.shift_remove(key);
        if self.pending.is_empty() {
            self.deadline = None;
        }
        value
    }

    /// Pending values whose quiet period has elapsed, now marked writing.
    pub fn due(&mut self, now: Instant) -> Vec<(K, V)> {
        if !self.deadline.is_some_and(|deadline| now >= deadline) {
            return Vec::new();
        }
        self.deadline = None;
        let mut ready = Vec::new();
        let mut blocked = IndexMap::new();
        for (key, value) in self.pending.drain(..) {
            if self.writing.contains(&key) {
                blocked.insert(key, value);
            } else {
                ready.push((key, value));
            }
        }
        self.pending = blocked;
        for (key, _) in &ready {
            self.writing.insert(key.clone());
        }
        ready
    }

    /// Marks the write of `key` done, successful or not.
    pub fn finished(&mut self, key: &K, now: Instant) {
        self.writing.remove(key);
        if self.pending.contains_key(key) && self.deadline.is_none() {
            self.deadline = Some(now + self.delay);
        }
    }

    /// Every pending value regardless of the timer, marked writing.
    pub fn flush(&mut self) -> Vec<(K, V)> {
        self.deadline = None;
        let ready: Vec<_> = self.pending.drain(..).collect();
        for (key, _) in &ready {
            self.writing.insert(key.clone());
        }
        ready
    }

    /// Forgets all pending values and in-flight writes.
    pub fn reset(&mut self) {
        self.deadline = None;
        self.pending.clear();
        self.writing.clear();
    }

    /// Write state of `key`.
    #[must_use]
    pub fn state(&self, key: &K) -> DebounceState {
        if self.pending.contains_key(key) {
            DebounceState::Pending
        } else if self.writing.contains(key) {
            DebounceState::Writing
        } else {
            DebounceState::Clean
        }
    }

    /// When the earliest pending value becomes due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether nothing is pending or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.writing.is_empty()
    }
}

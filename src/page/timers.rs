//! Virtual-clock timer queue.
//!
//! Stands in for the page's `setTimeout`. Time only moves when the owner
//! advances it, so polling loops can be driven deterministically. Several
//! engines can share one queue; each pops only the tasks it owns.

use std::collections::BTreeMap;

/// Opaque handle returned by [`TimerQueue::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Timers ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    now_ms: u64,
    next_seq: u64,
    pending: BTreeMap<(u64, TimerHandle), T>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_seq: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Current virtual time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_seq);
        self.next_seq += 1;
        self.pending.insert((self.now_ms + delay_ms, handle), task);
        handle
    }

    /// Pop the earliest timer accepted by `owns` that is due at or before
    /// `deadline_ms`, moving the clock forward to its due time.
    pub fn pop_due<F>(&mut self, deadline_ms: u64, owns: F) -> Option<(TimerHandle, T)>
    where
        F: Fn(&T) -> bool,
    {
        let key = self
            .pending
            .iter()
            .take_while(|((due, _), _)| *due <= deadline_ms)
            .find(|(_, task)| owns(*task))
            .map(|(key, _)| *key)?;
        let task = self.pending.remove(&key)?;
        self.now_ms = self.now_ms.max(key.0);
        Some((key.1, task))
    }

    /// Move the clock to `deadline_ms` once nothing earlier is pending.
    pub fn settle(&mut self, deadline_ms: u64) {
        self.now_ms = self.now_ms.max(deadline_ms);
    }

    /// Due time of the earliest pending timer accepted by `owns`.
    pub fn next_due<F>(&self, owns: F) -> Option<u64>
    where
        F: Fn(&T) -> bool,
    {
        self.pending
            .iter()
            .find(|(_, task)| owns(*task))
            .map(|((due, _), _)| *due)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

//! Bounded log of already-applied event ids
//!
//! Reconnects and replays can deliver the same event more than once. The log
//! remembers the most recent ids up to a fixed capacity and evicts the oldest
//! first, so a long-running session does not grow without bound.

use std::collections::{HashSet, VecDeque};

use uuid::Uuid;

/// Default number of ids remembered per log
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 10_000;

/// Processed-id set with FIFO eviction
#[derive(Debug, Clone)]
pub struct EventLog {
    seen: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl EventLog {
    /// Create a log holding at most `capacity` ids (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashSet::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Whether the id has already been applied
    pub fn contains(&self, id: &Uuid) -> bool {
        self.seen.contains(id)
    }

    /// Record an id. Returns false if it was already present.
    pub fn record(&mut self, id: Uuid) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

//! Recognition of the application's own clipboard writes
//!
//! Every write the application makes registers the exact counter value it
//! produced. The monitor consumes a value the first time it observes it, so a
//! later external change is never mistaken for one of ours, however many writes
//! happen back to back or however many polls are skipped.

use std::collections::BTreeSet;

#[derive(Debug)]
pub struct InternalOperationTracker {
    pending: BTreeSet<u64>,
    capacity: usize,
}

impl InternalOperationTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: BTreeSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a counter value produced by one of our own writes
    pub fn expect(&mut self, counter: u64) {
        self.pending.insert(counter);
        while self.pending.len() > self.capacity {
            self.pending.pop_first();
        }
    }

    /// Returns true if `counter` was one of our writes, removing it.
    ///
    /// Counters are monotonic, so pending values below an observed counter can
    /// never be observed again and are dropped as well.
    pub fn consume(&mut self, counter: u64) -> bool {
        let hit = self.pending.remove(&counter);
        self.pending = self.pending.split_off(&counter.saturating_add(1));
        hit
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, counter: u64) -> bool {
        self.pending.contains(&counter)
    }
}

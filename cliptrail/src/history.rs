//! In-memory authoritative history
//!
//! Entries are kept most-recent-first. Pinning never moves an entry; only
//! insertion and recopy put an entry at the front. Unpinned and pinned entries
//! have separate caps, see `HistoryLimits`.

use std::sync::Arc;

use crate::config::{HistoryLimits, PinOverflowPolicy};
use crate::models::{ClipEntry, EntryId, Fingerprint};

/// Immutable copy of the history handed to persistence and readers
pub type Snapshot = Arc<[ClipEntry]>;

/// Result of `HistoryStore::toggle_pin`
#[derive(Debug, Clone, PartialEq)]
pub enum PinToggle {
    Pinned {
        /// Oldest pin demoted to make room (`EvictOldest` policy only)
        demoted: Option<EntryId>,
    },
    Unpinned {
        /// Entries evicted because the unpinned set grew past its cap
        evicted: Vec<ClipEntry>,
    },
    /// Pinned set is full and the policy is `RejectNew`
    Rejected,
    NotFound,
}

impl PinToggle {
    pub fn is_applied(&self) -> bool {
        matches!(self, PinToggle::Pinned { .. } | PinToggle::Unpinned { .. })
    }
}

/// Entries removed or demoted while enforcing limits
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LimitEnforcement {
    pub evicted: Vec<ClipEntry>,
    pub demoted: Vec<EntryId>,
}

impl LimitEnforcement {
    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty() && self.demoted.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: Vec<ClipEntry>,
    limits: HistoryLimits,
}

impl HistoryStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            entries: Vec::new(),
            limits,
        }
    }

    /// Seed from persisted entries (most-recent-first), dropping duplicate ids
    /// and content, then enforcing the limits.
    pub fn from_entries(entries: Vec<ClipEntry>, limits: HistoryLimits) -> (Self, LimitEnforcement) {
        let mut store = Self::new(limits);
        for entry in entries {
            let duplicate = store
                .entries
                .iter()
                .any(|e| e.id() == entry.id() || e.fingerprint() == entry.fingerprint());
            if !duplicate {
                store.entries.push(entry);
            }
        }
        let enforcement = store.enforce_limits();
        (store, enforcement)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read
    // ─────────────────────────────────────────────────────────────────────────

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn entries(&self) -> &[ClipEntry] {
        &self.entries
    }

    pub fn snapshot(&self) -> Snapshot {
        Arc::from(self.entries.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<&ClipEntry> {
        self.entries.first()
    }

    pub fn get(&self, id: EntryId) -> Option<&ClipEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn find_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<&ClipEntry> {
        self.entries.iter().find(|e| e.fingerprint() == fingerprint)
    }

    pub fn pinned_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pinned()).count()
    }

    pub fn unpinned_count(&self) -> usize {
        self.entries.len() - self.pinned_count()
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Prepend a new entry and evict the oldest unpinned entries over the cap
    pub fn insert(&mut self, entry: ClipEntry) -> LimitEnforcement {
        self.entries.insert(0, entry);
        self.enforce_limits()
    }

    pub fn toggle_pin(&mut self, id: EntryId) -> PinToggle {
        let Some(index) = self.position(id) else {
            return PinToggle::NotFound;
        };

        if self.entries[index].is_pinned() {
            self.entries[index].set_pinned(false);
            return PinToggle::Unpinned {
                evicted: self.evict_unpinned_overflow(),
            };
        }

        let mut demoted = None;
        if self.pinned_count() >= self.limits.max_pinned_items {
            match self.limits.pin_overflow {
                PinOverflowPolicy::RejectNew => return PinToggle::Rejected,
                PinOverflowPolicy::EvictOldest => demoted = self.demote_oldest_pin(),
            }
        }
        self.entries[index].set_pinned(true);
        PinToggle::Pinned { demoted }
    }

    /// Remove an entry regardless of its pin state
    pub fn delete(&mut self, id: EntryId) -> Option<ClipEntry> {
        let index = self.position(id)?;
        Some(self.entries.remove(index))
    }

    /// Remove unpinned entries, or everything (pins included) when
    /// `keep_pinned` is false. Returns the removed entries.
    pub fn clear(&mut self, keep_pinned: bool) -> Vec<ClipEntry> {
        if !keep_pinned {
            return std::mem::take(&mut self.entries);
        }
        let (kept, removed): (Vec<ClipEntry>, Vec<ClipEntry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.is_pinned());
        self.entries = kept;
        removed
    }

    /// Move an existing entry to the front with its identity and metadata
    /// intact. Any other entry holding the same content is dropped. The length
    /// never grows.
    pub fn recopy(&mut self, id: EntryId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = self.entries.remove(index);
        let fingerprint = entry.fingerprint();
        self.entries.retain(|e| e.fingerprint() != fingerprint);
        self.entries.insert(0, entry);
        true
    }

    /// Replace the limits and re-apply them immediately
    pub fn reconfigure(&mut self, limits: HistoryLimits) -> LimitEnforcement {
        self.limits = limits;
        self.enforce_limits()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Limits
    // ─────────────────────────────────────────────────────────────────────────

    fn enforce_limits(&mut self) -> LimitEnforcement {
        let mut enforcement = LimitEnforcement::default();
        while self.pinned_count() > self.limits.max_pinned_items {
            match self.demote_oldest_pin() {
                Some(id) => enforcement.demoted.push(id),
                None => break,
            }
        }
        enforcement.evicted = self.evict_unpinned_overflow();
        enforcement
    }

    /// Oldest means farthest from the front
    fn demote_oldest_pin(&mut self) -> Option<EntryId> {
        let entry = self.entries.iter_mut().rev().find(|e| e.is_pinned())?;
        entry.set_pinned(false);
        Some(entry.id())
    }

    fn evict_unpinned_overflow(&mut self) -> Vec<ClipEntry> {
        let mut evicted = Vec::new();
        let mut unpinned = self.unpinned_count();
        while unpinned > self.limits.max_history_items {
            let Some(index) = self.entries.iter().rposition(|e| !e.is_pinned()) else {
                break;
            };
            evicted.push(self.entries.remove(index));
            unpinned -= 1;
        }
        evicted
    }
}

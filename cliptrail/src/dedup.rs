//! Recently-seen content fingerprints
//!
//! Holds the fingerprints of content that is live in history, most recent
//! first, so repeated copies of the same text are recognized without scanning
//! the store. Bounded by count; the least recently seen fingerprint is dropped
//! when the cap is reached.

use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use lru::LruCache;

use crate::models::Fingerprint;

pub struct DedupGuard {
    seen: LruCache<Fingerprint, DateTime<Utc>>,
}

impl DedupGuard {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
        }
    }

    /// False when the content was seen and has not been forgotten since
    pub fn should_insert(&self, fingerprint: Fingerprint) -> bool {
        !self.seen.contains(&fingerprint)
    }

    pub fn remember(&mut self, fingerprint: Fingerprint) {
        self.seen.put(fingerprint, Utc::now());
    }

    pub fn forget(&mut self, fingerprint: Fingerprint) {
        self.seen.pop(&fingerprint);
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Most recently remembered fingerprint
    pub fn latest(&self) -> Option<Fingerprint> {
        self.seen.iter().next().map(|(fingerprint, _)| *fingerprint)
    }

    pub fn last_seen(&self, fingerprint: Fingerprint) -> Option<DateTime<Utc>> {
        self.seen.peek(&fingerprint).copied()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Rebuild from history ordered most-recent-first
    pub fn seed<I>(&mut self, newest_first: I)
    where
        I: IntoIterator<Item = Fingerprint>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.seen.clear();
        for fingerprint in newest_first.into_iter().rev() {
            self.remember(fingerprint);
        }
    }
}

impl std::fmt::Debug for DedupGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupGuard")
            .field("len", &self.seen.len())
            .field("capacity", &self.seen.cap())
            .finish()
    }
}

//! Serialized execution context shared by the monitor and the façade
//!
//! History, dedup guard, write tracker and last observed counter live behind a
//! single mutex, so no two mutations interleave. Every committed mutation bumps
//! the revision, hands a snapshot to persistence and emits a `HistoryEvent`.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::clipboard::ClipboardPort;
use crate::config::HistoryConfig;
use crate::content_detection::CategoryClassifier;
use crate::dedup::DedupGuard;
use crate::history::{HistoryStore, LimitEnforcement};
use crate::interface::{HistoryChange, HistoryEvent};
use crate::models::{ClipEntry, ClipOrigin, EntryId, Fingerprint, Provenance};
use crate::persistence::{PersistenceGateway, Removal};
use crate::tracker::InternalOperationTracker;

/// Global fallback runtime for callers outside any tokio context
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("cliptrail-worker")
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// The ambient runtime if there is one, otherwise the shared fallback
pub(crate) fn runtime_handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub(crate) struct CoreState {
    pub history: HistoryStore,
    pub dedup: DedupGuard,
    pub tracker: InternalOperationTracker,
    /// Counter seen by the most recent successful poll
    pub last_counter: Option<u64>,
    pub revision: u64,
}

/// How content ended up in history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recorded {
    Inserted(EntryId),
    Promoted(EntryId),
    /// Already the most recent entry; nothing changed
    AlreadyHead(EntryId),
}

impl Recorded {
    pub fn id(self) -> EntryId {
        match self {
            Recorded::Inserted(id) | Recorded::Promoted(id) | Recorded::AlreadyHead(id) => id,
        }
    }
}

pub(crate) struct Engine {
    state: Mutex<CoreState>,
    pub port: Arc<dyn ClipboardPort>,
    pub classifier: CategoryClassifier,
    pub persistence: PersistenceGateway,
    events: broadcast::Sender<HistoryEvent>,
    pub runtime: Handle,
    pub max_content_bytes: usize,
}

impl Engine {
    pub fn new(
        config: &HistoryConfig,
        history: HistoryStore,
        port: Arc<dyn ClipboardPort>,
        persistence: PersistenceGateway,
        runtime: Handle,
    ) -> Self {
        let mut dedup = DedupGuard::new(config.dedup_capacity);
        dedup.seed(
            history
                .entries()
                .iter()
                .map(ClipEntry::fingerprint)
                .collect::<Vec<_>>(),
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            state: Mutex::new(CoreState {
                history,
                dedup,
                tracker: InternalOperationTracker::new(config.pending_write_capacity),
                last_counter: None,
                revision: 0,
            }),
            port,
            classifier: CategoryClassifier::new(config.classifier_cache_capacity),
            persistence,
            events,
            runtime,
            max_content_bytes: config.max_content_bytes,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Publish a mutation: persist the new state and notify subscribers
    pub fn commit(&self, state: &mut CoreState, change: HistoryChange) {
        state.revision += 1;
        self.persistence.schedule(state.history.snapshot());
        // No subscribers is fine
        let _ = self.events.send(HistoryEvent {
            revision: state.revision,
            change,
        });
    }

    /// `commit` preceded by a targeted repository removal
    pub fn commit_removal(&self, state: &mut CoreState, removal: Removal, change: HistoryChange) {
        self.persistence.record_removal(removal);
        self.commit(state, change);
    }

    /// Drop fingerprints of entries that left the history
    pub fn forget_all<'a>(state: &mut CoreState, removed: impl IntoIterator<Item = &'a ClipEntry>) {
        for entry in removed {
            state.dedup.forget(entry.fingerprint());
        }
    }

    pub fn forget_enforced(state: &mut CoreState, enforcement: &LimitEnforcement) {
        Self::forget_all(state, &enforcement.evicted);
    }

    /// Existing entry holding this content, if any.
    ///
    /// The guard only ever holds fingerprints of live entries, so once it is
    /// at least as large as the history a miss proves the content is new.
    fn lookup(state: &CoreState, fingerprint: Fingerprint, content: &str) -> Option<EntryId> {
        let guard_covers_history = state.dedup.len() >= state.history.len();
        if guard_covers_history && state.dedup.should_insert(fingerprint) {
            return None;
        }
        state
            .history
            .find_by_fingerprint(fingerprint)
            .filter(|entry| entry.content() == content)
            .map(ClipEntry::id)
    }

    /// Put `content` at the front of history, reusing an existing entry with
    /// the same content. Does not commit.
    pub fn record(
        &self,
        state: &mut CoreState,
        content: String,
        origin: ClipOrigin,
        provenance: Provenance,
    ) -> Recorded {
        let fingerprint = Fingerprint::of(&content);

        if let Some(id) = Self::lookup(state, fingerprint, &content) {
            state.dedup.remember(fingerprint);
            if state.history.head().map(ClipEntry::id) == Some(id) {
                return Recorded::AlreadyHead(id);
            }
            state.history.recopy(id);
            return Recorded::Promoted(id);
        }

        let entry = ClipEntry::new(content, origin, provenance);
        let id = entry.id();
        let enforcement = state.history.insert(entry);
        Self::forget_enforced(state, &enforcement);
        state.dedup.remember(fingerprint);
        Recorded::Inserted(id)
    }
}

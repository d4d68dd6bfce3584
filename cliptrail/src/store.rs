//! Façade over the history engine
//!
//! `ClipboardHistory` wires a clipboard port, a repository and the
//! configuration into one engine and exposes the operations collaborators
//! need.
//!
//! Architecture:
//! - All history state sits behind one mutex in `Engine`; every operation here
//!   takes it once and releases it before returning
//! - Application writes register their clipboard counter while still holding
//!   that lock, so the monitor can never see them as external
//! - Saves are debounced by `PersistenceGateway` and never block callers
//! - Uses the shared fallback runtime when constructed outside any tokio context

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::debug;

use crate::clipboard::ClipboardPort;
use crate::config::{HistoryConfig, HistoryLimits};
use crate::content_detection::Category;
use crate::engine::{runtime_handle, Engine, Recorded};
use crate::history::{HistoryStore, LimitEnforcement, PinToggle, Snapshot};
use crate::interface::{CliptrailError, HistoryApi, HistoryChange, HistoryEvent};
use crate::models::{ClipEntry, ClipOrigin, EntryId, Fingerprint, Provenance};
use crate::monitor::ClipboardMonitor;
use crate::persistence::{HistoryRepository, MemoryRepository, PersistenceGateway, Removal};

pub struct ClipboardHistory {
    engine: Arc<Engine>,
    monitor: ClipboardMonitor,
    shutdown_flush_timeout: Duration,
}

impl ClipboardHistory {
    /// Start with an empty history. Nothing is loaded from `repository`.
    pub fn new(
        config: HistoryConfig,
        port: Arc<dyn ClipboardPort>,
        repository: Arc<dyn HistoryRepository>,
    ) -> Result<Self, CliptrailError> {
        config.validate()?;
        let runtime = runtime_handle();
        let persistence = PersistenceGateway::new(repository, config.save_debounce(), runtime.clone());
        Ok(Self::assemble(config, port, persistence, runtime, Vec::new()))
    }

    /// Seed the history from `repository`. An unavailable repository yields an
    /// empty history rather than an error.
    pub async fn open(
        config: HistoryConfig,
        port: Arc<dyn ClipboardPort>,
        repository: Arc<dyn HistoryRepository>,
    ) -> Result<Self, CliptrailError> {
        config.validate()?;
        let runtime = runtime_handle();
        let persistence = PersistenceGateway::new(repository, config.save_debounce(), runtime.clone());
        let loaded = persistence.load(config.limits.max_history_items).await;
        Ok(Self::assemble(config, port, persistence, runtime, loaded))
    }

    /// History kept only in memory
    pub fn ephemeral(config: HistoryConfig, port: Arc<dyn ClipboardPort>) -> Result<Self, CliptrailError> {
        Self::new(config, port, Arc::new(MemoryRepository::new()))
    }

    fn assemble(
        config: HistoryConfig,
        port: Arc<dyn ClipboardPort>,
        persistence: PersistenceGateway,
        runtime: Handle,
        loaded: Vec<ClipEntry>,
    ) -> Self {
        let loaded_len = loaded.len();
        let (history, enforcement) = HistoryStore::from_entries(loaded, config.limits);
        if !enforcement.is_empty() || history.len() != loaded_len {
            // Stored state broke the current limits or held duplicates
            debug!(
                loaded = loaded_len,
                kept = history.len(),
                "normalized stored history"
            );
            persistence.schedule(history.snapshot());
        }

        let engine = Arc::new(Engine::new(&config, history, port, persistence, runtime));
        let monitor = ClipboardMonitor::new(
            Arc::clone(&engine),
            config.poll_interval(),
            config.capture_on_start,
        );

        Self {
            engine,
            monitor,
            shutdown_flush_timeout: config.shutdown_flush_timeout(),
        }
    }

    fn check_content(&self, content: &str) -> Result<(), CliptrailError> {
        if content.trim().is_empty() {
            return Err(CliptrailError::InvalidInput("content is empty".into()));
        }
        if content.len() > self.engine.max_content_bytes {
            return Err(CliptrailError::InvalidInput(format!(
                "content exceeds {} bytes",
                self.engine.max_content_bytes
            )));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// `copy` with explicit provenance
    pub fn copy_with_provenance(
        &self,
        content: String,
        origin: ClipOrigin,
        provenance: Provenance,
    ) -> Result<EntryId, CliptrailError> {
        self.check_content(&content)?;

        let mut state = self.engine.lock();
        let counter = self.engine.port.write(&content)?;
        state.tracker.expect(counter);

        let recorded = self.engine.record(&mut state, content, origin, provenance);
        let id = recorded.id();
        if !matches!(recorded, Recorded::AlreadyHead(_)) {
            self.engine.commit(&mut state, HistoryChange::Copied { id });
        }
        debug!(%id, counter, "copied to clipboard");
        Ok(id)
    }

    /// Replace the history limits and apply them immediately
    pub fn reconfigure(&self, limits: HistoryLimits) -> Result<LimitEnforcement, CliptrailError> {
        limits.validate()?;

        let mut state = self.engine.lock();
        let enforcement = state.history.reconfigure(limits);
        Engine::forget_enforced(&mut state, &enforcement);
        self.engine.commit(
            &mut state,
            HistoryChange::Reconfigured {
                evicted: enforcement.evicted.len(),
                demoted: enforcement.demoted.len(),
            },
        );
        Ok(enforcement)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    /// Shared immutable view of the current history
    pub fn snapshot(&self) -> Snapshot {
        self.engine.lock().history.snapshot()
    }

    pub fn get(&self, id: EntryId) -> Option<ClipEntry> {
        self.engine.lock().history.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.engine.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limits(&self) -> HistoryLimits {
        self.engine.lock().history.limits()
    }

    /// Number of committed mutations so far
    pub fn revision(&self) -> u64 {
        self.engine.lock().revision
    }

    pub fn category_of(&self, entry: &ClipEntry) -> Category {
        self.engine.classifier.category_for(entry)
    }

    /// Entries of one category, most-recent-first
    pub fn history_by_category(&self, category: Category) -> Vec<ClipEntry> {
        let snapshot = self.snapshot();
        snapshot
            .iter()
            .filter(|entry| self.engine.classifier.category_for(entry) == category)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.engine.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn monitor(&self) -> &ClipboardMonitor {
        &self.monitor
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_running()
    }

    /// Stop polling and flush, waiting at most the configured timeout.
    /// Returns whether everything reached the repository.
    pub async fn shutdown(&self) -> bool {
        self.monitor.stop();
        self.engine
            .persistence
            .flush_with_timeout(self.shutdown_flush_timeout)
            .await
    }
}

#[async_trait::async_trait]
impl HistoryApi for ClipboardHistory {
    fn copy(&self, content: String, origin: ClipOrigin) -> Result<EntryId, CliptrailError> {
        self.copy_with_provenance(content, origin, Provenance::default())
    }

    fn recopy(&self, id: EntryId) -> Result<(), CliptrailError> {
        let mut state = self.engine.lock();
        let content = state
            .history
            .get(id)
            .map(|entry| entry.content().to_string())
            .ok_or(CliptrailError::NotFound(id))?;

        let counter = self.engine.port.write(&content)?;
        state.tracker.expect(counter);
        state.history.recopy(id);
        state.dedup.remember(Fingerprint::of(&content));
        self.engine.commit(&mut state, HistoryChange::Recopied { id });
        debug!(%id, counter, "recopied entry");
        Ok(())
    }

    fn toggle_pin(&self, id: EntryId) -> bool {
        let mut state = self.engine.lock();
        match state.history.toggle_pin(id) {
            PinToggle::Pinned { demoted } => {
                if let Some(demoted) = demoted {
                    debug!(%demoted, "pin limit reached, demoted oldest pin");
                }
                self.engine
                    .commit(&mut state, HistoryChange::PinToggled { id, pinned: true });
                true
            }
            PinToggle::Unpinned { evicted } => {
                Engine::forget_all(&mut state, &evicted);
                self.engine
                    .commit(&mut state, HistoryChange::PinToggled { id, pinned: false });
                true
            }
            PinToggle::Rejected => {
                debug!(%id, "pin limit reached, pin rejected");
                false
            }
            PinToggle::NotFound => false,
        }
    }

    fn delete(&self, id: EntryId) -> bool {
        let mut state = self.engine.lock();
        let Some(removed) = state.history.delete(id) else {
            return false;
        };
        state.dedup.forget(removed.fingerprint());
        self.engine
            .commit_removal(&mut state, Removal::Entry(id), HistoryChange::Deleted { id });
        true
    }

    fn clear_history(&self, keep_pinned: bool) -> usize {
        let mut state = self.engine.lock();
        let removed = state.history.clear(keep_pinned).len();
        // Cleared content must be capturable again
        state.dedup.clear();

        let removal = if keep_pinned {
            Removal::Unpinned
        } else {
            Removal::All
        };
        self.engine.commit_removal(
            &mut state,
            removal,
            HistoryChange::Cleared {
                keep_pinned,
                removed,
            },
        );
        debug!(removed, keep_pinned, "history cleared");
        removed
    }

    fn current_history(&self) -> Vec<ClipEntry> {
        self.engine.lock().history.entries().to_vec()
    }

    fn start_monitoring(&self) {
        self.monitor.start();
    }

    fn stop_monitoring(&self) {
        self.monitor.stop();
    }

    async fn flush_pending_saves(&self) -> Result<(), CliptrailError> {
        self.engine.persistence.flush().await?;
        Ok(())
    }
}

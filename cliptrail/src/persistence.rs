//! Debounced bridge from the in-memory history to a durable repository
//!
//! Every mutation hands the gateway an immutable snapshot. Snapshots that
//! arrive within the debounce window replace each other, so a burst of
//! mutations becomes a single save once the history has been quiet for the
//! window. Saves never hold the history lock; `flush` is the only point where
//! callers wait on storage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::history::Snapshot;
use crate::models::{ClipEntry, EntryId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Durable storage contract. The storage layout is the implementor's own.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Replace the stored history with `snapshot` (most-recent-first)
    async fn save(&self, snapshot: Snapshot) -> Result<(), RepositoryError>;

    /// Every pinned entry plus the first `max_unpinned` unpinned entries,
    /// most-recent-first
    async fn load(&self, max_unpinned: usize) -> Result<Vec<ClipEntry>, RepositoryError>;

    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError>;

    async fn clear_all(&self) -> Result<(), RepositoryError>;

    async fn clear_unpinned(&self) -> Result<(), RepositoryError>;
}

/// Removal applied to the repository ahead of the next snapshot save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Entry(EntryId),
    All,
    Unpinned,
}

#[derive(Default)]
struct PendingSave {
    snapshot: Option<Snapshot>,
    removals: Vec<Removal>,
    generation: u64,
    /// Bumped by `cancel` so an in-flight write leaves later removals alone
    epoch: u64,
    timer_active: bool,
}

struct GatewayInner {
    repository: Arc<dyn HistoryRepository>,
    debounce: Duration,
    pending: Mutex<PendingSave>,
    /// Serializes repository writes so flush observes in-flight saves
    write_lock: tokio::sync::Mutex<()>,
}

impl GatewayInner {
    async fn run_timer(self: Arc<Self>) {
        loop {
            // Wait until no new snapshot arrived for a full window
            let mut seen = self.pending.lock().generation;
            loop {
                tokio::time::sleep(self.debounce).await;
                let current = self.pending.lock().generation;
                if current == seen {
                    break;
                }
                seen = current;
            }

            let _ = self.write_pending().await;

            let mut pending = self.pending.lock();
            let newer = pending.generation != seen;
            if !(newer && (pending.snapshot.is_some() || !pending.removals.is_empty())) {
                pending.timer_active = false;
                return;
            }
        }
    }

    /// Pending state stays queued until the repository accepts it, so a write
    /// abandoned mid-await (a timed-out flush) is retried by the next one.
    async fn write_pending(&self) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let (snapshot, removals, generation, epoch) = {
            let pending = self.pending.lock();
            (
                pending.snapshot.clone(),
                pending.removals.clone(),
                pending.generation,
                pending.epoch,
            )
        };

        for &removal in &removals {
            let result = match removal {
                Removal::Entry(id) => self.repository.delete(id).await,
                Removal::All => self.repository.clear_all().await,
                Removal::Unpinned => self.repository.clear_unpinned().await,
            };
            if let Err(e) = result {
                // The snapshot save below still converges the stored state
                warn!(error = %e, ?removal, "repository removal failed");
            }
        }
        {
            let mut pending = self.pending.lock();
            if pending.epoch == epoch {
                pending.removals.drain(..removals.len());
            }
        }

        let Some(snapshot) = snapshot else {
            return Ok(());
        };

        match self.repository.save(Arc::clone(&snapshot)).await {
            Ok(()) => {
                debug!(entries = snapshot.len(), "history saved");
                let mut pending = self.pending.lock();
                if pending.generation == generation {
                    pending.snapshot = None;
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "history save failed, keeping snapshot for retry");
                Err(e)
            }
        }
    }
}

pub struct PersistenceGateway {
    inner: Arc<GatewayInner>,
    runtime: Handle,
}

impl PersistenceGateway {
    pub fn new(repository: Arc<dyn HistoryRepository>, debounce: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                repository,
                debounce,
                pending: Mutex::new(PendingSave::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
            runtime,
        }
    }

    /// Queue `snapshot` as the next state to persist and (re)start the quiet
    /// period.
    pub fn schedule(&self, snapshot: Snapshot) {
        let mut pending = self.inner.pending.lock();
        pending.snapshot = Some(snapshot);
        pending.generation += 1;
        if !pending.timer_active {
            pending.timer_active = true;
            let inner = Arc::clone(&self.inner);
            self.runtime.spawn(inner.run_timer());
        }
    }

    /// Queue a targeted removal; it is applied before the next save
    pub fn record_removal(&self, removal: Removal) {
        self.inner.pending.lock().removals.push(removal);
    }

    pub fn has_pending(&self) -> bool {
        let pending = self.inner.pending.lock();
        pending.snapshot.is_some() || !pending.removals.is_empty()
    }

    /// Write any pending state now, waiting for in-flight saves first
    pub async fn flush(&self) -> Result<(), RepositoryError> {
        self.inner.write_pending().await
    }

    /// `flush` bounded by `timeout`; returns whether it completed successfully
    pub async fn flush_with_timeout(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.flush()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "flush failed");
                false
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "flush timed out");
                false
            }
        }
    }

    /// Drop pending state without writing it
    pub fn cancel(&self) {
        let mut pending = self.inner.pending.lock();
        pending.snapshot = None;
        pending.removals.clear();
        pending.epoch += 1;
    }

    /// Load the startup history. Repository failures degrade to empty.
    pub async fn load(&self, max_unpinned: usize) -> Vec<ClipEntry> {
        match self.inner.repository.load(max_unpinned).await {
            Ok(entries) => {
                info!(count = entries.len(), "history loaded");
                entries
            }
            Err(e) => {
                warn!(error = %e, "history unavailable at startup, starting empty");
                Vec::new()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IN-MEMORY REPOSITORY
// ─────────────────────────────────────────────────────────────────────────────

/// Volatile repository for ephemeral sessions and tests.
///
/// `set_failing(true)` makes every call fail, modelling an unavailable backend.
#[derive(Default)]
pub struct MemoryRepository {
    entries: Mutex<Vec<ClipEntry>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<ClipEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<ClipEntry> {
        self.entries.lock().clone()
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("memory repository set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for MemoryRepository {
    async fn save(&self, snapshot: Snapshot) -> Result<(), RepositoryError> {
        self.check()?;
        *self.entries.lock() = snapshot.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, max_unpinned: usize) -> Result<Vec<ClipEntry>, RepositoryError> {
        self.check()?;
        let mut unpinned = 0;
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| {
                if e.is_pinned() {
                    return true;
                }
                unpinned += 1;
                unpinned <= max_unpinned
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, id: EntryId) -> Result<(), RepositoryError> {
        self.check()?;
        self.entries.lock().retain(|e| e.id() != id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), RepositoryError> {
        self.check()?;
        self.entries.lock().clear();
        Ok(())
    }

    async fn clear_unpinned(&self) -> Result<(), RepositoryError> {
        self.check()?;
        self.entries.lock().retain(|e| e.is_pinned());
        Ok(())
    }
}

//! Public interface of the history engine
//!
//! Shared records, the façade error type and the `HistoryApi` trait consumed by
//! presentation, hotkey and OCR collaborators.

use serde::Serialize;
use thiserror::Error;

use crate::content_detection::Category;
use crate::models::{ClipEntry, ClipOrigin, EntryId};

// ═══════════════════════════════════════════════════════════════════════════════
// CHANGE NOTIFICATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// What a mutation did to the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryChange {
    /// New entry from an external copy
    Captured { id: EntryId, category: Category },
    /// Existing entry moved to the front by an external copy of its content
    Promoted { id: EntryId },
    /// Application-initiated copy, new or promoted
    Copied { id: EntryId },
    Recopied { id: EntryId },
    PinToggled { id: EntryId, pinned: bool },
    Deleted { id: EntryId },
    Cleared { keep_pinned: bool, removed: usize },
    Reconfigured { evicted: usize, demoted: usize },
}

/// Emitted after every committed mutation. `revision` increases by one per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub revision: u64,
    pub change: HistoryChange,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliptrailError {
    #[error("Clipboard error: {0}")]
    Clipboard(String),
    #[error("Repository error: {0}")]
    Repository(String),
    #[error("Entry not found: {0}")]
    NotFound(EntryId),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<crate::clipboard::ClipboardError> for CliptrailError {
    fn from(e: crate::clipboard::ClipboardError) -> Self {
        CliptrailError::Clipboard(e.to_string())
    }
}

impl From<crate::persistence::RepositoryError> for CliptrailError {
    fn from(e: crate::persistence::RepositoryError) -> Self {
        CliptrailError::Repository(e.to_string())
    }
}

impl From<crate::database::DatabaseError> for CliptrailError {
    fn from(e: crate::database::DatabaseError) -> Self {
        CliptrailError::Repository(e.to_string())
    }
}

impl From<crate::config::ConfigError> for CliptrailError {
    fn from(e: crate::config::ConfigError) -> Self {
        CliptrailError::Config(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// Operations offered to the collaborators around the engine.
/// Implemented by `ClipboardHistory`.
#[async_trait::async_trait]
pub trait HistoryApi: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Clipboard Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Write `content` to the clipboard and record it in history immediately.
    /// Returns the id of the new or promoted entry.
    fn copy(&self, content: String, origin: ClipOrigin) -> Result<EntryId, CliptrailError>;

    /// Put an existing entry back on the clipboard and move it to the front
    fn recopy(&self, id: EntryId) -> Result<(), CliptrailError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // History Edits
    // ─────────────────────────────────────────────────────────────────────────────

    /// False when the id is unknown or the pin limit refuses the change
    fn toggle_pin(&self, id: EntryId) -> bool;

    /// False when the id is unknown
    fn delete(&self, id: EntryId) -> bool;

    /// Returns the number of removed entries
    fn clear_history(&self, keep_pinned: bool) -> usize;

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    /// Most-recent-first copy of the history
    fn current_history(&self) -> Vec<ClipEntry>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    fn start_monitoring(&self);

    /// Stops polling only; pending saves keep their schedule
    fn stop_monitoring(&self);

    async fn flush_pending_saves(&self) -> Result<(), CliptrailError>;
}

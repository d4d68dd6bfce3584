//! cliptrail - clipboard history engine
//!
//! Watches a shared clipboard through a change counter, keeps a deduplicated
//! and size-bounded history, tells the application's own writes apart from
//! external copies, and persists the history with debounced saves.

pub mod clipboard;
pub mod config;
pub mod content_detection;
pub mod database;
pub mod dedup;
mod engine;
pub mod history;
pub mod interface;
pub mod models;
pub mod monitor;
pub mod persistence;
mod store;
pub mod tracker;

pub use clipboard::{ClipboardError, ClipboardPort, ClipboardSnapshot, MemoryClipboard};
#[cfg(feature = "system-clipboard")]
pub use clipboard::SystemClipboard;
pub use config::{HistoryConfig, HistoryLimits, PinOverflowPolicy};
pub use content_detection::Category;
pub use database::Database;
pub use interface::*;
pub use models::{ClipEntry, ClipOrigin, EntryId, Fingerprint, Provenance};
pub use monitor::{ClipboardMonitor, MonitorState, TickOutcome};
pub use persistence::{HistoryRepository, MemoryRepository, RepositoryError};
pub use store::ClipboardHistory;

//! Access to the shared system clipboard
//!
//! The only change signal a clipboard offers is a monotonically increasing
//! counter. `ClipboardPort::write` returns the counter its own write produced so
//! the caller can register it before the next poll can observe it.

use parking_lot::Mutex;
use thiserror::Error;

use crate::models::Provenance;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
}

/// What a single read of the clipboard observed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipboardSnapshot {
    pub counter: u64,
    /// Textual payload, `None` when the clipboard holds no text
    pub content: Option<String>,
    pub provenance: Provenance,
}

/// Read/write accessor over a shared clipboard
pub trait ClipboardPort: Send + Sync {
    fn read(&self) -> Result<ClipboardSnapshot, ClipboardError>;

    /// Replace the clipboard text, returning the counter value of this write
    fn write(&self, content: &str) -> Result<u64, ClipboardError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// IN-MEMORY CLIPBOARD
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    counter: u64,
    content: Option<String>,
    provenance: Provenance,
    unavailable: bool,
}

/// Process-local clipboard with a real change counter.
///
/// Other "processes" are simulated with `simulate_external_copy`.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    state: Mutex<MemoryState>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write as if another application copied `content`
    pub fn simulate_external_copy(&self, content: impl Into<String>, provenance: Provenance) -> u64 {
        let mut state = self.state.lock();
        state.counter += 1;
        state.content = Some(content.into());
        state.provenance = provenance;
        state.counter
    }

    /// Toggle transient unavailability; reads and writes fail while unavailable
    pub fn set_available(&self, available: bool) {
        self.state.lock().unavailable = !available;
    }

    pub fn counter(&self) -> u64 {
        self.state.lock().counter
    }

    pub fn content(&self) -> Option<String> {
        self.state.lock().content.clone()
    }
}

impl ClipboardPort for MemoryClipboard {
    fn read(&self) -> Result<ClipboardSnapshot, ClipboardError> {
        let state = self.state.lock();
        if state.unavailable {
            return Err(ClipboardError::Unavailable("clipboard is locked".into()));
        }
        Ok(ClipboardSnapshot {
            counter: state.counter,
            content: state.content.clone(),
            provenance: state.provenance.clone(),
        })
    }

    fn write(&self, content: &str) -> Result<u64, ClipboardError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(ClipboardError::Unavailable("clipboard is locked".into()));
        }
        state.counter += 1;
        state.content = Some(content.to_string());
        state.provenance = Provenance::default();
        Ok(state.counter)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SYSTEM CLIPBOARD
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "system-clipboard")]
pub use system::SystemClipboard;

#[cfg(feature = "system-clipboard")]
mod system {
    use parking_lot::Mutex;

    use super::{ClipboardError, ClipboardPort, ClipboardSnapshot};
    use crate::models::{Fingerprint, Provenance};

    struct SystemState {
        clipboard: arboard::Clipboard,
        counter: u64,
        last_seen: Option<Fingerprint>,
    }

    /// Clipboard backed by the OS via `arboard`.
    ///
    /// arboard exposes no change counter, so one is synthesized: it advances on
    /// every write made through this port and whenever a read sees text that
    /// differs from the previous read. An external copy of text identical to
    /// the current clipboard is therefore invisible.
    pub struct SystemClipboard {
        state: Mutex<SystemState>,
    }

    impl SystemClipboard {
        pub fn new() -> Result<Self, ClipboardError> {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            Ok(Self {
                state: Mutex::new(SystemState {
                    clipboard,
                    counter: 0,
                    last_seen: None,
                }),
            })
        }
    }

    impl ClipboardPort for SystemClipboard {
        fn read(&self) -> Result<ClipboardSnapshot, ClipboardError> {
            let mut state = self.state.lock();
            let content = match state.clipboard.get_text() {
                Ok(text) => Some(text),
                Err(arboard::Error::ContentNotAvailable) => None,
                Err(e) => return Err(ClipboardError::Unavailable(e.to_string())),
            };

            let seen = content.as_deref().map(Fingerprint::of);
            if seen != state.last_seen {
                state.counter += 1;
                state.last_seen = seen;
            }

            Ok(ClipboardSnapshot {
                counter: state.counter,
                content,
                provenance: Provenance::default(),
            })
        }

        fn write(&self, content: &str) -> Result<u64, ClipboardError> {
            let mut state = self.state.lock();
            state
                .clipboard
                .set_text(content.to_string())
                .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
            state.counter += 1;
            state.last_seen = Some(Fingerprint::of(content));
            Ok(state.counter)
        }
    }
}

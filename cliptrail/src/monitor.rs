//! Clipboard polling loop
//!
//! Each tick reads the clipboard port once under the engine lock, so a poll
//! can never interleave with an application write between reading and
//! recording. Writes the application made itself are recognized by their
//! change counter and skipped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::engine::{Engine, Recorded};
use crate::interface::HistoryChange;
use crate::models::{ClipOrigin, EntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// What a single poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Counter unchanged since the last poll
    Unchanged,
    /// Clipboard temporarily unreadable
    ReadFailed,
    /// The change was one of the application's own writes
    SelfWrite,
    /// Blank, non-text or oversized content
    Ignored,
    /// Same content as the most recent entry
    Duplicate(EntryId),
    Captured(EntryId),
    /// Known content moved back to the front
    Promoted(EntryId),
}

/// Run one poll against the engine
pub(crate) fn poll(engine: &Engine) -> TickOutcome {
    let mut state = engine.lock();

    let snapshot = match engine.port.read() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(error = %e, "clipboard unreadable, skipping tick");
            return TickOutcome::ReadFailed;
        }
    };

    if state.last_counter == Some(snapshot.counter) {
        trace!(counter = snapshot.counter, "clipboard unchanged");
        return TickOutcome::Unchanged;
    }
    state.last_counter = Some(snapshot.counter);

    if state.tracker.consume(snapshot.counter) {
        debug!(counter = snapshot.counter, "skipping own clipboard write");
        return TickOutcome::SelfWrite;
    }

    let Some(content) = snapshot.content.filter(|c| !c.trim().is_empty()) else {
        return TickOutcome::Ignored;
    };
    if content.len() > engine.max_content_bytes {
        debug!(bytes = content.len(), "clipboard content too large, ignoring");
        return TickOutcome::Ignored;
    }

    let category = engine.classifier.classify(&content);
    match engine.record(&mut state, content, ClipOrigin::ExternalApp, snapshot.provenance) {
        Recorded::Inserted(id) => {
            debug!(%id, category = category.label(), "captured clipboard change");
            engine.commit(&mut state, HistoryChange::Captured { id, category });
            TickOutcome::Captured(id)
        }
        Recorded::Promoted(id) => {
            debug!(%id, "known content copied again, promoting");
            engine.commit(&mut state, HistoryChange::Promoted { id });
            TickOutcome::Promoted(id)
        }
        Recorded::AlreadyHead(id) => TickOutcome::Duplicate(id),
    }
}

/// Periodic poller over the shared engine.
///
/// Stopping cancels polling only; scheduled saves keep running.
pub struct ClipboardMonitor {
    engine: Arc<Engine>,
    poll_interval: Duration,
    capture_on_start: bool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ClipboardMonitor {
    pub(crate) fn new(engine: Arc<Engine>, poll_interval: Duration, capture_on_start: bool) -> Self {
        Self {
            engine,
            poll_interval,
            capture_on_start,
            cancel: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.cancel.lock().is_some() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Begin polling. A no-op when already running.
    ///
    /// Unless `capture_on_start` is set, whatever is on the clipboard right now
    /// is treated as already seen.
    pub fn start(&self) {
        let mut cancel = self.cancel.lock();
        if cancel.is_some() {
            return;
        }

        if !self.capture_on_start {
            self.prime();
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let engine = Arc::clone(&self.engine);
        let period = self.poll_interval;

        self.engine.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        poll(&engine);
                    }
                }
            }
            debug!("polling loop exited");
        });

        *cancel = Some(token);
        info!(interval_ms = period.as_millis() as u64, "clipboard monitoring started");
    }

    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
            info!("clipboard monitoring stopped");
        }
    }

    /// Run one poll immediately, whether or not the loop is running
    pub fn tick(&self) -> TickOutcome {
        poll(&self.engine)
    }

    fn prime(&self) {
        let mut state = self.engine.lock();
        match self.engine.port.read() {
            Ok(snapshot) => state.last_counter = Some(snapshot.counter),
            Err(e) => debug!(error = %e, "clipboard unreadable at start"),
        }
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        if let Some(token) = self.cancel.get_mut().take() {
            token.cancel();
        }
    }
}

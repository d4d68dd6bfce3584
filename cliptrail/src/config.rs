//! Runtime configuration
//!
//! Capacity limits live in `HistoryLimits` and are owned by the history store;
//! they only change through `ClipboardHistory::reconfigure`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What `toggle_pin` does when the pinned set is already full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinOverflowPolicy {
    /// Refuse the new pin; existing pins win
    #[default]
    RejectNew,
    /// Demote the oldest pinned entry to unpinned to make room
    EvictOldest,
}

/// Capacity limits enforced by `HistoryStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    pub max_history_items: usize,
    pub max_pinned_items: usize,
    pub pin_overflow: PinOverflowPolicy,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_history_items: 200,
            max_pinned_items: 50,
            pin_overflow: PinOverflowPolicy::RejectNew,
        }
    }
}

impl HistoryLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history_items == 0 {
            return Err(ConfigError::Invalid("max_history_items must be at least 1".into()));
        }
        if self.max_pinned_items == 0 {
            return Err(ConfigError::Invalid("max_pinned_items must be at least 1".into()));
        }
        Ok(())
    }
}

/// Full engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub limits: HistoryLimits,
    /// Clipboard polling period
    pub poll_interval_ms: u64,
    /// Quiet period before a coalesced save is written
    pub save_debounce_ms: u64,
    /// Upper bound on the shutdown flush
    pub shutdown_flush_timeout_ms: u64,
    pub dedup_capacity: usize,
    pub classifier_cache_capacity: usize,
    /// Maximum number of unobserved self-write counters kept at once
    pub pending_write_capacity: usize,
    /// Clipboard text larger than this is not captured
    pub max_content_bytes: usize,
    /// Capture whatever is on the clipboard when monitoring starts
    pub capture_on_start: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limits: HistoryLimits::default(),
            poll_interval_ms: 500,
            save_debounce_ms: 750,
            shutdown_flush_timeout_ms: 3_000,
            dedup_capacity: 256,
            classifier_cache_capacity: 512,
            pending_write_capacity: 64,
            max_content_bytes: 1_048_576,
            capture_on_start: false,
        }
    }
}

impl HistoryConfig {
    /// Load a JSON config file; missing keys take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        let positive = [
            ("poll_interval_ms", self.poll_interval_ms as usize),
            ("save_debounce_ms", self.save_debounce_ms as usize),
            ("shutdown_flush_timeout_ms", self.shutdown_flush_timeout_ms as usize),
            ("dedup_capacity", self.dedup_capacity),
            ("classifier_cache_capacity", self.classifier_cache_capacity),
            ("pending_write_capacity", self.pending_write_capacity),
            ("max_content_bytes", self.max_content_bytes),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn shutdown_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_flush_timeout_ms)
    }
}

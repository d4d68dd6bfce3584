//! Core data models for cliptrail
//!
//! `ClipEntry` is the unit of history. Its category is never stored on the
//! entry; `content_detection` derives it on demand.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// IDENTIFIERS
// ─────────────────────────────────────────────────────────────────────────────

/// Entry identifier, assigned at creation and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Content hash used for cheap equality and dedup checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hash a string using Rust's default hasher
    pub fn of(content: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PROVENANCE
// ─────────────────────────────────────────────────────────────────────────────

/// Where an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipOrigin {
    /// Captured by the monitor from another process
    ExternalApp,
    /// Inserted through the application's own editor
    EditorInsert,
}

impl ClipOrigin {
    pub fn to_database_str(&self) -> &'static str {
        match self {
            ClipOrigin::ExternalApp => "external_app",
            ClipOrigin::EditorInsert => "editor_insert",
        }
    }

    pub fn from_database(value: &str) -> Option<Self> {
        match value {
            "external_app" => Some(ClipOrigin::ExternalApp),
            "editor_insert" => Some(ClipOrigin::EditorInsert),
            _ => None,
        }
    }
}

/// Best-effort metadata about the copying process, set once at creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_app: Option<String>,
    pub window_title: Option<String>,
    pub process_id: Option<u32>,
}

impl Provenance {
    pub fn is_empty(&self) -> bool {
        self.source_app.is_none() && self.window_title.is_none() && self.process_id.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ENTRY
// ─────────────────────────────────────────────────────────────────────────────

/// One historical clipboard value.
///
/// Everything except the pin flag is fixed at creation. Recopy moves the entry
/// within the history but never touches its fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipEntry {
    id: EntryId,
    content: String,
    #[serde(skip)]
    fingerprint: Fingerprint,
    created_at: DateTime<Utc>,
    is_pinned: bool,
    origin: ClipOrigin,
    provenance: Provenance,
}

impl ClipEntry {
    /// Create a fresh, unpinned entry stamped with the current time
    pub fn new(content: impl Into<String>, origin: ClipOrigin, provenance: Provenance) -> Self {
        let content = content.into();
        Self {
            id: EntryId::new(),
            fingerprint: Fingerprint::of(&content),
            content,
            created_at: Utc::now(),
            is_pinned: false,
            origin,
            provenance,
        }
    }

    /// Rebuild an entry from durable storage
    pub fn restore(
        id: EntryId,
        content: String,
        created_at: DateTime<Utc>,
        is_pinned: bool,
        origin: ClipOrigin,
        provenance: Provenance,
    ) -> Self {
        Self {
            id,
            fingerprint: Fingerprint::of(&content),
            content,
            created_at,
            is_pinned,
            origin,
            provenance,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    pub fn origin(&self) -> ClipOrigin {
        self.origin
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub(crate) fn set_pinned(&mut self, pinned: bool) {
        self.is_pinned = pinned;
    }

    /// Single-line preview with whitespace collapsed, for list display
    pub fn preview(&self, max_chars: usize) -> String {
        let collapsed = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(max_chars).collect()
    }
}

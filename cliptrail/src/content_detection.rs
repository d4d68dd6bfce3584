//! Content category detection for clipboard entries
//!
//! Rules are tried in priority order on the trimmed text, first match wins:
//! URL, email, filesystem path, code, then a length bucket.
//!
//! A dotted token whose last segment is 2-6 letters counts as a URL even
//! without a scheme. This also catches file names like `main.rs` and version
//! tags like `v1.beta`; that imprecision is accepted.

use std::num::NonZeroUsize;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{ClipEntry, ClipOrigin};

/// Upper bound (in chars) of the short-text bucket
pub const SHORT_TEXT_MAX_CHARS: usize = 50;
/// Upper bound (in chars) of the general-text bucket
pub const TEXT_MAX_CHARS: usize = 500;

/// Display/filter category of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Url,
    Email,
    Path,
    Code,
    ShortText,
    Text,
    LongText,
    /// Fixed tag for editor-inserted entries, regardless of their content
    Editor,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Url => "url",
            Category::Email => "email",
            Category::Path => "path",
            Category::Code => "code",
            Category::ShortText => "short",
            Category::Text => "text",
            Category::LongText => "long",
            Category::Editor => "editor",
        }
    }
}

/// host.tld with optional port and path; no scheme, no `@`
static SCHEMELESS_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*\.[A-Za-z]{2,6}(?::\d{1,5})?(?:[/?#]\S*)?$")
        .unwrap()
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

/// Unix absolute/home/relative-dot paths, Windows drive paths and UNC shares
static PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:~|\.{1,2})?/[^\n]*|[A-Za-z]:[\\/][^\n]*|\\\\[^\n\\]+\\[^\n]*)$").unwrap()
});

/// Bare relative path such as `src/main.rs` or `assets/icons/`
static RELATIVE_PATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.-]+(?:/[\w.-]+)+(?:\.\w+|/)$").unwrap()
});

static CODE_KEYWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)^\s*(?:",
        r"(?:pub\s+)?(?:async\s+)?fn\s+\w+\s*[(<]",
        r"|def\s+\w+\s*\(",
        r"|class\s+[A-Z]\w*",
        r"|function\s*\w*\s*\(",
        r"|(?:let|const|var)\s+\w+\s*=",
        r"|#include\s*[<\x22]",
        r"|import\s+[\w.]+;?$",
        r"|from\s+[\w.]+\s+import\s",
        r"|package\s+[\w.]+;?$",
        r"|SELECT\s.+\sFROM\s",
        r")"
    ))
    .unwrap()
});

/// Structural symbols; two distinct ones are enough to call it code
const CODE_SYMBOLS: &[&str] = &[
    "{", ";", "=>", "->", "::", "==", "!=", "&&", "||", "()", "</", "/>", "+=", ":=", "*/",
];

/// Only common schemes written with `://` count as explicit URLs
fn is_explicit_url(text: &str) -> bool {
    if text.len() > 2000 || text.chars().any(char::is_whitespace) {
        return false;
    }
    text.contains("://") && url::Url::parse(text).is_ok()
}

fn is_url(text: &str) -> bool {
    is_explicit_url(text) || (!text.contains('@') && SCHEMELESS_URL_REGEX.is_match(text))
}

fn is_email(text: &str) -> bool {
    let address = match text.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => {
            text[7..].split('?').next().unwrap_or_default()
        }
        _ => text,
    };
    EMAIL_REGEX.is_match(address)
}

fn is_path(text: &str) -> bool {
    // Comment openers are code, not the filesystem root
    if text.contains('\n') || text.starts_with("//") || text.starts_with("/*") {
        return false;
    }
    PATH_REGEX.is_match(text) || RELATIVE_PATH_REGEX.is_match(text)
}

fn is_code(text: &str) -> bool {
    let symbols = CODE_SYMBOLS.iter().filter(|symbol| text.contains(*symbol)).count();
    symbols >= 2 || CODE_KEYWORD_REGEX.is_match(text)
}

/// Classify raw content (no caching, no origin override)
pub fn detect_category(text: &str) -> Category {
    let trimmed = text.trim();

    if is_url(trimmed) {
        return Category::Url;
    }
    if is_email(trimmed) {
        return Category::Email;
    }
    if is_path(trimmed) {
        return Category::Path;
    }
    if is_code(trimmed) {
        return Category::Code;
    }

    match trimmed.chars().count() {
        n if n <= SHORT_TEXT_MAX_CHARS => Category::ShortText,
        n if n <= TEXT_MAX_CHARS => Category::Text,
        _ => Category::LongText,
    }
}

/// `detect_category` behind a bounded LRU memo keyed by the exact content
pub struct CategoryClassifier {
    cache: Mutex<LruCache<String, Category>>,
}

impl CategoryClassifier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn classify(&self, content: &str) -> Category {
        if let Some(category) = self.cache.lock().get(content) {
            return *category;
        }
        let category = detect_category(content);
        self.cache.lock().put(content.to_string(), category);
        category
    }

    /// Category of a history entry. Editor inserts skip the cache entirely.
    pub fn category_for(&self, entry: &ClipEntry) -> Category {
        match entry.origin() {
            ClipOrigin::EditorInsert => Category::Editor,
            ClipOrigin::ExternalApp => self.classify(entry.content()),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }
}

impl std::fmt::Debug for CategoryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryClassifier")
            .field("cached", &self.cached_len())
            .finish()
    }
}

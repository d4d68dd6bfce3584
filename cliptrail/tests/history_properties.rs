//! End-to-end behaviour of the history engine through the public façade

use std::sync::Arc;

use cliptrail::content_detection::detect_category;
use cliptrail::dedup::DedupGuard;
use cliptrail::{
    Category, ClipEntry, ClipOrigin, ClipboardHistory, EntryId, Fingerprint, HistoryApi, HistoryChange,
    HistoryConfig, HistoryLimits, MemoryClipboard, MemoryRepository, PinOverflowPolicy,
    Provenance, TickOutcome,
};

struct Fixture {
    history: ClipboardHistory,
    clipboard: Arc<MemoryClipboard>,
    repository: Arc<MemoryRepository>,
}

fn fixture(config: HistoryConfig) -> Fixture {
    let clipboard = Arc::new(MemoryClipboard::new());
    let repository = Arc::new(MemoryRepository::new());
    let history = ClipboardHistory::new(config, clipboard.clone(), repository.clone()).unwrap();
    Fixture {
        history,
        clipboard,
        repository,
    }
}

fn limits(max_history_items: usize, max_pinned_items: usize, pin_overflow: PinOverflowPolicy) -> HistoryConfig {
    HistoryConfig {
        limits: HistoryLimits {
            max_history_items,
            max_pinned_items,
            pin_overflow,
        },
        ..HistoryConfig::default()
    }
}

fn contents(history: &ClipboardHistory) -> Vec<String> {
    history
        .current_history()
        .iter()
        .map(|e| e.content().to_string())
        .collect()
}

fn external(f: &Fixture, content: &str) -> TickOutcome {
    f.clipboard.simulate_external_copy(content, Provenance::default());
    f.history.monitor().tick()
}

/// Drain ticks until the clipboard is fully observed
fn settle(history: &ClipboardHistory) {
    while !matches!(history.monitor().tick(), TickOutcome::Unchanged | TickOutcome::ReadFailed) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Self-write suppression
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_self_writes_never_hide_external_copies() {
    for n in 1..=4 {
        for m in 1..=4 {
            let f = fixture(HistoryConfig::default());

            for i in 0..n {
                f.history
                    .copy(format!("internal {}", i), ClipOrigin::EditorInsert)
                    .unwrap();
            }
            let before = f.history.len();

            // External copies land before the monitor polls at all
            for j in 0..m {
                f.clipboard
                    .simulate_external_copy(format!("external {}", j), Provenance::default());
            }
            settle(&f.history);

            // Only the last external value is visible to a poller that
            // missed the intermediate ones
            assert_eq!(f.history.len(), before + 1, "n={} m={}", n, m);
            assert_eq!(contents(&f.history)[0], format!("external {}", m - 1));
        }
    }
}

#[test]
fn test_each_polled_external_copy_is_captured_after_self_writes() {
    for n in 1..=3 {
        for m in 1..=3 {
            let f = fixture(HistoryConfig::default());

            for i in 0..n {
                f.history
                    .copy(format!("internal {}", i), ClipOrigin::EditorInsert)
                    .unwrap();
            }
            for j in 0..m {
                let outcome = external(&f, &format!("external {}", j));
                assert!(matches!(outcome, TickOutcome::Captured(_)), "n={} m={} j={}", n, m, j);
            }
            settle(&f.history);

            let externals = f
                .history
                .current_history()
                .iter()
                .filter(|e| e.origin() == ClipOrigin::ExternalApp)
                .count();
            assert_eq!(externals, m);
            assert_eq!(f.history.len(), n + m);
        }
    }
}

#[test]
fn test_first_external_copy_after_clear_is_captured() {
    let f = fixture(HistoryConfig::default());
    f.history.copy("draft".to_string(), ClipOrigin::EditorInsert).unwrap();
    f.history.clear_history(false);

    assert!(matches!(external(&f, "after clear"), TickOutcome::Captured(_)));
    assert_eq!(contents(&f.history), vec!["after clear"]);
}

#[test]
fn test_self_write_interleaved_with_polls() {
    let f = fixture(HistoryConfig::default());
    f.history.copy("mine".to_string(), ClipOrigin::EditorInsert).unwrap();
    assert_eq!(f.history.monitor().tick(), TickOutcome::SelfWrite);
    assert_eq!(f.history.monitor().tick(), TickOutcome::Unchanged);

    assert!(matches!(external(&f, "theirs"), TickOutcome::Captured(_)));
    assert_eq!(contents(&f.history), vec!["theirs", "mine"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Recopy
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_recopy_moves_entry_without_growing_history() {
    let f = fixture(HistoryConfig::default());
    for c in ["a", "b", "c"] {
        external(&f, c);
    }
    let a = f.history.current_history()[2].clone();

    f.history.recopy(a.id()).unwrap();

    let after = f.history.current_history();
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], a);
    assert_eq!(after[0].created_at(), a.created_at());
    assert_eq!(contents(&f.history), vec!["a", "c", "b"]);
    assert_eq!(f.clipboard.content().as_deref(), Some("a"));

    // The clipboard write is ours and must not show up as a capture
    assert_eq!(f.history.monitor().tick(), TickOutcome::SelfWrite);
    assert_eq!(f.history.len(), 3);
}

#[test]
fn test_recopy_at_capacity_evicts_nothing() {
    let f = fixture(limits(3, 5, PinOverflowPolicy::RejectNew));
    for c in ["a", "b", "c"] {
        external(&f, c);
    }
    let oldest = f.history.current_history()[2].id();

    f.history.recopy(oldest).unwrap();
    assert_eq!(contents(&f.history), vec!["a", "c", "b"]);
}

#[test]
fn test_external_copy_of_known_content_promotes() {
    let f = fixture(HistoryConfig::default());
    external(&f, "a");
    external(&f, "b");
    let a = f.history.current_history()[1].id();

    assert_eq!(external(&f, "a"), TickOutcome::Promoted(a));
    assert_eq!(contents(&f.history), vec!["a", "b"]);

    // Copying the head again changes nothing
    assert_eq!(external(&f, "a"), TickOutcome::Duplicate(a));
    assert_eq!(f.history.len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Clearing
// ─────────────────────────────────────────────────────────────────────────────

/// History [A(pinned), B, C(pinned), D], most recent first
fn mixed_history() -> Fixture {
    let f = fixture(HistoryConfig::default());
    for c in ["D", "C", "B", "A"] {
        external(&f, c);
    }
    let entries = f.history.current_history();
    assert!(f.history.toggle_pin(entries[0].id()));
    assert!(f.history.toggle_pin(entries[2].id()));
    f
}

#[test]
fn test_clear_all_removes_pinned_entries() {
    let f = mixed_history();
    assert_eq!(f.history.clear_history(false), 4);
    assert!(f.history.current_history().is_empty());
}

#[test]
fn test_clear_keep_pinned_preserves_only_pins_in_order() {
    let f = mixed_history();
    assert_eq!(f.history.clear_history(true), 2);
    assert_eq!(contents(&f.history), vec!["A", "C"]);
    assert!(f.history.current_history().iter().all(|e| e.is_pinned()));
}

#[test]
fn test_cleared_content_can_be_captured_again() {
    let f = mixed_history();
    f.history.clear_history(true);

    assert!(matches!(external(&f, "B"), TickOutcome::Captured(_)));
    assert_eq!(contents(&f.history), vec!["B", "A", "C"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Capacity and pins
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_capacity_evicts_oldest_unpinned_never_pinned() {
    let f = fixture(limits(3, 5, PinOverflowPolicy::RejectNew));
    external(&f, "oldest");
    let oldest = f.history.current_history()[0].id();
    assert!(f.history.toggle_pin(oldest));

    for c in ["u1", "u2", "u3", "u4", "u5"] {
        external(&f, c);
    }

    assert_eq!(contents(&f.history), vec!["u5", "u4", "u3", "oldest"]);
    assert!(f.history.get(oldest).unwrap().is_pinned());
}

#[test]
fn test_pin_limit_reject_new() {
    let f = fixture(limits(10, 1, PinOverflowPolicy::RejectNew));
    external(&f, "first");
    external(&f, "second");
    let entries = f.history.current_history();

    assert!(f.history.toggle_pin(entries[1].id()));
    assert!(!f.history.toggle_pin(entries[0].id()));
    assert!(f.history.get(entries[1].id()).unwrap().is_pinned());
    assert!(!f.history.get(entries[0].id()).unwrap().is_pinned());
}

#[test]
fn test_pin_limit_evict_oldest() {
    let f = fixture(limits(10, 1, PinOverflowPolicy::EvictOldest));
    external(&f, "first");
    external(&f, "second");
    let entries = f.history.current_history();

    assert!(f.history.toggle_pin(entries[1].id()));
    assert!(f.history.toggle_pin(entries[0].id()));
    assert!(f.history.get(entries[0].id()).unwrap().is_pinned());
    assert!(!f.history.get(entries[1].id()).unwrap().is_pinned());
}

#[test]
fn test_toggle_pin_unknown_id_is_false() {
    let f = fixture(HistoryConfig::default());
    assert!(!f.history.toggle_pin(EntryId::new()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification and dedup guard
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_classification_length_boundaries() {
    assert_eq!(detect_category(&"x".repeat(50)), Category::ShortText);
    assert_eq!(detect_category(&"x".repeat(51)), Category::Text);
    assert_eq!(detect_category(&"x".repeat(500)), Category::Text);
    assert_eq!(detect_category(&"x".repeat(501)), Category::LongText);
}

#[test]
fn test_dedup_guard_remembers_until_forget_or_clear() {
    let mut guard = DedupGuard::new(8);
    let f = Fingerprint::of("payload");

    guard.remember(f);
    for _ in 0..3 {
        assert!(!guard.should_insert(f));
    }
    guard.forget(f);
    assert!(guard.should_insert(f));

    guard.remember(f);
    guard.clear();
    assert!(guard.should_insert(f));
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors, notifications and persistence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_unreadable_clipboard_is_a_quiet_tick() {
    let f = fixture(HistoryConfig::default());
    f.clipboard.simulate_external_copy("waiting", Provenance::default());
    f.clipboard.set_available(false);
    assert_eq!(f.history.monitor().tick(), TickOutcome::ReadFailed);
    assert!(f.history.is_empty());

    f.clipboard.set_available(true);
    assert!(matches!(f.history.monitor().tick(), TickOutcome::Captured(_)));
}

#[test]
fn test_blank_and_oversized_clipboard_is_ignored() {
    let f = fixture(HistoryConfig {
        max_content_bytes: 16,
        ..HistoryConfig::default()
    });
    assert_eq!(external(&f, "   \n\t"), TickOutcome::Ignored);
    assert_eq!(external(&f, &"x".repeat(17)), TickOutcome::Ignored);
    assert!(f.history.is_empty());
}

#[test]
fn test_capture_keeps_provenance() {
    let f = fixture(HistoryConfig::default());
    f.clipboard.simulate_external_copy(
        "from terminal",
        Provenance {
            source_app: Some("Terminal".into()),
            window_title: Some("zsh".into()),
            process_id: Some(311),
        },
    );
    f.history.monitor().tick();

    let entry = &f.history.current_history()[0];
    assert_eq!(entry.provenance().source_app.as_deref(), Some("Terminal"));
    assert_eq!(entry.provenance().process_id, Some(311));
}

#[test]
fn test_every_mutation_emits_an_event() {
    let f = fixture(HistoryConfig::default());
    let mut events = f.history.subscribe();

    let TickOutcome::Captured(id) = external(&f, "https://example.com") else {
        panic!("expected capture");
    };
    f.history.toggle_pin(id);
    f.history.recopy(id).unwrap();
    f.history.delete(id);
    f.history.clear_history(true);

    let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    let changes: Vec<_> = received.iter().map(|e| e.change.clone()).collect();
    assert_eq!(
        changes,
        vec![
            HistoryChange::Captured {
                id,
                category: Category::Url
            },
            HistoryChange::PinToggled { id, pinned: true },
            HistoryChange::Recopied { id },
            HistoryChange::Deleted { id },
            HistoryChange::Cleared {
                keep_pinned: true,
                removed: 0
            },
        ]
    );
    let revisions: Vec<_> = received.iter().map(|e| e.revision).collect();
    assert_eq!(revisions, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_flush_persists_current_history() {
    let f = fixture(HistoryConfig::default());
    external(&f, "one");
    external(&f, "two");
    let pinned = f.history.current_history()[1].id();
    f.history.toggle_pin(pinned);

    f.history.flush_pending_saves().await.unwrap();

    let stored = f.repository.stored();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].content(), "two");
    assert!(stored[1].is_pinned());
}

#[tokio::test]
async fn test_persistence_failure_keeps_memory_authoritative() {
    let f = fixture(HistoryConfig::default());
    f.repository.set_failing(true);

    external(&f, "survives");
    assert!(f.history.flush_pending_saves().await.is_err());
    assert_eq!(contents(&f.history), vec!["survives"]);

    // The failed snapshot is retried on the next flush
    f.repository.set_failing(false);
    f.history.flush_pending_saves().await.unwrap();
    assert_eq!(f.repository.stored().len(), 1);
}

#[tokio::test]
async fn test_unavailable_repository_at_startup_starts_empty() {
    let repository = Arc::new(MemoryRepository::new());
    repository.set_failing(true);

    let history = ClipboardHistory::open(
        HistoryConfig::default(),
        Arc::new(MemoryClipboard::new()),
        repository,
    )
    .await
    .unwrap();
    assert!(history.is_empty());
    history.copy("still works".to_string(), ClipOrigin::EditorInsert).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_reopen_restores_history_and_dedup() {
    let repository = Arc::new(MemoryRepository::new());
    {
        let history = ClipboardHistory::new(
            HistoryConfig::default(),
            Arc::new(MemoryClipboard::new()),
            repository.clone(),
        )
        .unwrap();
        history.copy("kept".to_string(), ClipOrigin::ExternalApp).unwrap();
        history.flush_pending_saves().await.unwrap();
    }

    let clipboard = Arc::new(MemoryClipboard::new());
    let history = ClipboardHistory::open(HistoryConfig::default(), clipboard.clone(), repository)
        .await
        .unwrap();
    assert_eq!(contents(&history), vec!["kept"]);

    clipboard.simulate_external_copy("kept", Provenance::default());
    assert!(matches!(history.monitor().tick(), TickOutcome::Duplicate(_)));
    assert_eq!(history.len(), 1);
}

fn stored_entry(content: &str, pinned: bool) -> ClipEntry {
    let fresh = ClipEntry::new(content, ClipOrigin::ExternalApp, Provenance::default());
    ClipEntry::restore(
        fresh.id(),
        content.to_string(),
        fresh.created_at(),
        pinned,
        fresh.origin(),
        fresh.provenance().clone(),
    )
}

#[tokio::test]
async fn test_reopen_with_smaller_limits_keeps_deep_pin() {
    let mut stored: Vec<_> = (0..5).map(|i| stored_entry(&format!("u{}", i), false)).collect();
    stored.push(stored_entry("pinned", true));
    let repository = Arc::new(MemoryRepository::with_entries(stored));

    let history = ClipboardHistory::open(
        limits(2, 1, PinOverflowPolicy::RejectNew),
        Arc::new(MemoryClipboard::new()),
        repository.clone(),
    )
    .await
    .unwrap();
    assert_eq!(contents(&history), vec!["u0", "u1", "pinned"]);

    history.flush_pending_saves().await.unwrap();
    let persisted = repository.stored();
    assert_eq!(persisted.len(), 3);
    assert_eq!(persisted.iter().filter(|e| e.is_pinned()).count(), 1);
    assert_eq!(persisted[2].content(), "pinned");
}

#[tokio::test]
async fn test_reopen_with_fewer_pin_slots_demotes_oldest_pin() {
    let stored = vec![
        stored_entry("u0", false),
        stored_entry("newer pin", true),
        stored_entry("u1", false),
        stored_entry("u2", false),
        stored_entry("older pin", true),
    ];
    let repository = Arc::new(MemoryRepository::with_entries(stored));

    let history = ClipboardHistory::open(
        limits(3, 1, PinOverflowPolicy::RejectNew),
        Arc::new(MemoryClipboard::new()),
        repository,
    )
    .await
    .unwrap();

    let entries = history.current_history();
    let pinned: Vec<_> = entries.iter().filter(|e| e.is_pinned()).map(|e| e.content()).collect();
    assert_eq!(pinned, vec!["newer pin"]);
    // The demoted pin is now the oldest unpinned entry and falls off the end
    assert_eq!(contents(&history), vec!["u0", "newer pin", "u1", "u2"]);
}

//! Unit tests for the cursor and state store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::error::StoreError;
use crate::store::{list_tenants, Store, CURSOR_START};

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Sample {
    names: BTreeSet<String>,
    count: u32,
}

/// Creates a store rooted in a fresh temporary directory.
fn test_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let store = Store::open(dir.path(), "discover.example");
    (dir, store)
}

// ── Cursor tests ─────────────────────────────────────────────────────

#[test]
fn unset_cursor_is_log_start() {
    let (_dir, store) = test_store();

    let position = store.get_cursor("followers").expect("read should succeed");
    assert_eq!(position, CURSOR_START);
    assert!(store.cursor_entry("followers").unwrap().is_none());
    assert!(!store.root().exists(), "reads must not create directories");
}

#[test]
fn set_cursor_persists_position_and_timestamp() {
    let (_dir, store) = test_store();

    let entry = store.set_cursor("followers", "41").expect("write should succeed");
    assert_eq!(entry.position, "41");
    assert!(entry.last_updated.ends_with('Z'));

    assert_eq!(store.get_cursor("followers").unwrap(), "41");
    assert_eq!(store.get_cursor("blessings").unwrap(), CURSOR_START);
    assert!(store.state_dir().join("cursors.json").exists());
}

#[test]
fn numeric_cursor_never_regresses() {
    let (_dir, store) = test_store();

    store.set_cursor("feed", "100").unwrap();
    let entry = store.set_cursor("feed", "90").unwrap();
    assert_eq!(entry.position, "100");

    let entry = store.set_cursor("feed", "").unwrap();
    assert_eq!(entry.position, "100");

    let entry = store.set_cursor("feed", "101").unwrap();
    assert_eq!(entry.position, "101");
}

#[test]
fn opaque_cursor_is_trusted() {
    let (_dir, store) = test_store();

    store.set_cursor("feed", "zzz-token").unwrap();
    let entry = store.set_cursor("feed", "aaa-token").unwrap();
    assert_eq!(entry.position, "aaa-token");
}

#[test]
fn cursors_are_independent_per_projection() {
    let (_dir, store) = test_store();

    store.set_cursor("followers", "5").unwrap();
    store.set_cursor("notifications", "9").unwrap();

    let all = store.cursors().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["followers"].position, "5");
    assert_eq!(all["notifications"].position, "9");
}

// ── State tests ──────────────────────────────────────────────────────

#[test]
fn load_state_before_write_is_default() {
    let (_dir, store) = test_store();

    let state: Sample = store.load_state("followers").expect("read should succeed");
    assert_eq!(state, Sample::default());
}

#[test]
fn save_state_replaces_whole_value() {
    let (_dir, store) = test_store();

    let first = Sample {
        names: ["alice.com".to_string(), "carol.net".to_string()].into(),
        count: 2,
    };
    store.save_state("followers", &first).unwrap();

    let second = Sample {
        names: ["dave.org".to_string()].into(),
        count: 1,
    };
    store.save_state("followers", &second).unwrap();

    let loaded: Sample = store.load_state("followers").unwrap();
    assert_eq!(loaded, second);
    assert!(!store.state_dir().join("followers.json.tmp").exists());
}

#[test]
fn corrupt_state_is_a_serialization_error() {
    let (_dir, store) = test_store();

    std::fs::create_dir_all(store.state_dir()).unwrap();
    std::fs::write(store.state_dir().join("followers.json"), b"{not json").unwrap();

    let err = store.load_state::<Sample>("followers").unwrap_err();
    match err {
        StoreError::Serialization { path, .. } => {
            assert!(path.ends_with("state/followers.json"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ── Tenant isolation and reset ───────────────────────────────────────

#[test]
fn tenants_do_not_share_state() {
    let dir = tempfile::tempdir().unwrap();
    let a = Store::open(dir.path(), "discover-a.example");
    let b = Store::open(dir.path(), "https://Discover-B.example/");

    a.set_cursor("followers", "10").unwrap();
    a.save_state("followers", &Sample { names: BTreeSet::new(), count: 3 }).unwrap();

    assert_eq!(b.get_cursor("followers").unwrap(), CURSOR_START);
    assert_eq!(b.load_state::<Sample>("followers").unwrap().count, 0);
    assert_eq!(b.tenant(), "discover-b.example");
}

#[test]
fn reset_state_keeps_config() {
    let (_dir, store) = test_store();

    store.set_cursor("feed", "3").unwrap();
    store.save_state("feed", &Sample { names: BTreeSet::new(), count: 7 }).unwrap();
    store.save_config("feed", &Sample { names: BTreeSet::new(), count: 42 }).unwrap();

    store.reset_state().expect("reset should succeed");

    assert_eq!(store.get_cursor("feed").unwrap(), CURSOR_START);
    assert_eq!(store.load_state::<Sample>("feed").unwrap().count, 0);
    assert_eq!(store.load_config::<Sample>("feed").unwrap().count, 42);

    // Resetting an already-empty store is a no-op.
    store.reset_state().expect("second reset should succeed");
}

#[test]
fn config_defaults_are_not_written() {
    let (_dir, store) = test_store();

    let config: Sample = store.load_config("notifications").unwrap();
    assert_eq!(config, Sample::default());
    assert!(!store.config_dir().exists());
}

#[test]
fn list_tenants_finds_initialized_stores() {
    let dir = tempfile::tempdir().unwrap();
    assert!(list_tenants(dir.path().join("missing")).unwrap().is_empty());

    Store::open(dir.path(), "b.example").set_cursor("feed", "1").unwrap();
    Store::open(dir.path(), "a.example")
        .save_config("feed", &Sample::default())
        .unwrap();
    // Opened but never written: not a tenant yet.
    let _ = Store::open(dir.path(), "c.example");

    assert_eq!(
        list_tenants(dir.path()).unwrap(),
        vec!["a.example".to_string(), "b.example".to_string()]
    );
}

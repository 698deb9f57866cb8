mod addon_support;

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use snapaddon::error::AddonError;
use snapaddon::installation::InstallationRecord;
use snapaddon::store::{FileInstallationStore, InstallationStore, MemoryInstallationStore};
use tempfile::TempDir;

use addon_support::record;

fn tenant(id: &str) -> InstallationRecord {
    InstallationRecord::new(id, "https://p/cap", "secret", "https://p/token", "https://p/v2/")
        .with_room_id("7")
        .with_group_id("1")
}

#[test]
fn file_store_survives_restart() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state.json");

    {
        let store = FileInstallationStore::open(&path).expect("open");
        store.add(tenant("a")).expect("add a");
        store.add(tenant("b")).expect("add b");
        store.delete("a").expect("delete a");
    }

    let reopened = FileInstallationStore::open(&path).expect("reopen");
    assert_eq!(reopened.get("a"), None);
    assert_eq!(reopened.get("b"), Some(tenant("b")));
    assert_eq!(reopened.len(), 1);
}

#[test]
fn persisted_state_never_contains_tokens() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state.json");
    let store = FileInstallationStore::open(&path).expect("open");
    store.add(record("https://p")).expect("add");

    let raw = fs::read_to_string(&path).expect("read state");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("state is json");
    let entry = &value["installations"]["acme"];
    assert_eq!(entry["oauthSecret"], "s3cr3t");
    assert_eq!(entry["roomId"], "42");
    assert!(entry.get("token").is_none());
}

#[test]
fn missing_and_empty_files_open_as_empty_stores() {
    let dir = TempDir::new().expect("temp dir");
    let missing = FileInstallationStore::open(dir.path().join("nested/state.json")).expect("missing");
    assert!(missing.is_empty());

    let empty_path = dir.path().join("empty.json");
    fs::write(&empty_path, b"").expect("write empty");
    let empty = FileInstallationStore::open(&empty_path).expect("empty");
    assert!(empty.is_empty());
}

#[test]
fn corrupt_state_file_is_fatal() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state.json");
    fs::write(&path, b"{\"version\": 1, \"installations\": ").expect("write corrupt");

    let err = FileInstallationStore::open(&path).unwrap_err();
    assert!(matches!(err, AddonError::PersistenceFatal(_)), "got {err:?}");
}

#[test]
fn replacing_a_tenant_keeps_one_entry() {
    let store = MemoryInstallationStore::new();
    store.add(tenant("a")).expect("add");
    store.add(tenant("a").with_room_id("8")).expect("replace");

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("a").and_then(|r| r.room_id), Some("8".to_string()));
}

#[test]
fn concurrent_readers_and_writers_see_whole_records() {
    let store: Arc<dyn InstallationStore> = Arc::new(MemoryInstallationStore::new());
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 0..50 {
                    store.add(tenant(&format!("t{i}-{n}"))).expect("add");
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    for (id, record) in store.get_all() {
                        assert_eq!(record.tenant_id(), id);
                        assert_eq!(record.room_id.as_deref(), Some("7"));
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("thread panicked");
    }
    assert_eq!(store.len(), 200);
}

#[test]
fn concurrent_file_writers_leave_one_consistent_snapshot() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("state.json");
    let store = Arc::new(FileInstallationStore::open(&path).expect("open"));

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for n in 0..10 {
                    store.add(tenant(&format!("t{i}-{n}"))).expect("add");
                }
                for n in (1..10).step_by(2) {
                    store.delete(&format!("t{i}-{n}")).expect("delete");
                }
            })
        })
        .collect();
    for handle in writers {
        handle.join().expect("thread panicked");
    }

    let leftovers: Vec<String> = fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".tmp-"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");

    let expected: BTreeSet<String> = (0..4)
        .flat_map(|i| (0..10).step_by(2).map(move |n| format!("t{i}-{n}")))
        .collect();
    let reopened = FileInstallationStore::open(&path).expect("reopen");
    let keys: BTreeSet<String> = reopened.get_all().into_keys().collect();
    assert_eq!(keys, expected);
    assert_eq!(reopened.get("t3-8"), Some(tenant("t3-8")));
}

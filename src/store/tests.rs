use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::tempdir;

use super::*;
use crate::error::StoreError;

fn staged(store: &TrackStore, id: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = store.staging_path(id);
    fs::write(&path, contents).unwrap();
    path
}

fn add(store: &TrackStore, id: &str) -> Track {
    let track = Track::new(id, format!("https://example.com/{id}"), format!("Title {id}"));
    let path = staged(store, id, b"audio");
    store.create(&track, &path).unwrap();
    track
}

#[test]
fn create_moves_staged_file_and_lookup_returns_record() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();

    let track = Track::new("id-a", "https://example.com/a", "A");
    let path = staged(&store, "id-a", b"pcm");
    store.create(&track, &path).unwrap();

    assert!(!path.exists());
    assert_eq!(fs::read(store.path_for("id-a")).unwrap(), b"pcm");
    assert_eq!(store.lookup("id-a").unwrap(), track);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn lookup_unknown_id_is_not_found() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    assert!(matches!(store.lookup("nope"), Err(StoreError::NotFound(_))));
}

#[test]
fn second_create_for_same_id_reports_already_exists_and_keeps_winner_file() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();

    let track = Track::new("id-a", "https://example.com/a", "A");
    let first = staged(&store, "id-a", b"winner");
    store.create(&track, &first).unwrap();

    let second = staged(&store, "id-a", b"loser");
    let err = store.create(&track, &second).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(ref id) if id == "id-a"));

    // The losing file is untouched for the caller to discard.
    assert_eq!(fs::read(&second).unwrap(), b"loser");
    assert_eq!(fs::read(store.path_for("id-a")).unwrap(), b"winner");
}

#[test]
fn concurrent_creates_for_one_id_have_exactly_one_winner() {
    let dir = tempdir().unwrap();
    let store = Arc::new(TrackStore::open_in_memory(dir.path()).unwrap());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let track = Track::new("id-race", "https://example.com/race", "Race");
                let path = staged(&store, "id-race", b"audio");
                barrier.wait();
                let result = store.create(&track, &path);
                if result.is_err() {
                    fs::remove_file(&path).unwrap();
                }
                result.is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
    assert!(store.path_for("id-race").is_file());
    assert!(store.verify().unwrap().is_empty());
}

#[test]
fn delete_removes_record_and_file() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    add(&store, "id-a");
    add(&store, "id-b");

    let removed = store.delete("id-a").unwrap();
    assert_eq!(removed.id, "id-a");
    assert!(!store.path_for("id-a").exists());
    assert!(matches!(store.lookup("id-a"), Err(StoreError::NotFound(_))));

    for _ in 0..20 {
        let picks = store.random(10).unwrap();
        assert!(picks.iter().all(|t| t.id != "id-a"));
    }
}

#[test]
fn delete_unknown_id_is_not_found() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    assert!(matches!(store.delete("nope"), Err(StoreError::NotFound(_))));
}

#[test]
fn record_without_file_is_an_integrity_fault_and_delete_fails_closed() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    add(&store, "id-a");
    fs::remove_file(store.path_for("id-a")).unwrap();

    assert!(matches!(
        store.lookup("id-a"),
        Err(StoreError::Integrity { .. })
    ));
    assert!(matches!(
        store.delete("id-a"),
        Err(StoreError::Integrity { .. })
    ));
    // The record survives for inspection.
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn random_tolerates_n_larger_than_store_and_never_repeats() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    for id in ["id-a", "id-b", "id-c"] {
        add(&store, id);
    }

    let picks = store.random(10).unwrap();
    assert_eq!(picks.len(), 3);
    let ids: HashSet<_> = picks.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids.len(), 3);

    assert_eq!(store.random(2).unwrap().len(), 2);
    assert!(store.random(0).unwrap().is_empty());
}

#[test]
fn random_on_empty_store_is_empty() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    assert!(store.random(1).unwrap().is_empty());
}

#[test]
fn verify_reports_orphan_files_and_missing_files() {
    let dir = tempdir().unwrap();
    let store = TrackStore::open_in_memory(dir.path()).unwrap();
    add(&store, "id-a");
    add(&store, "id-b");
    fs::remove_file(store.path_for("id-b")).unwrap();
    fs::write(dir.path().join("stray"), b"x").unwrap();

    let faults = store.verify().unwrap();
    let mut ids: Vec<String> = faults
        .into_iter()
        .map(|f| match f {
            StoreError::Integrity { id, .. } => id,
            other => panic!("unexpected fault {other:?}"),
        })
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["id-b".to_string(), "stray".to_string()]);
}

#[test]
fn opening_clears_stale_staged_downloads() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join(STAGING_DIR);
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("half-done.1234"), b"partial").unwrap();

    let db = dir.path().join("tracks.db");
    let _store = TrackStore::open(&db, &dir.path().join("files")).unwrap();
    // Different files dir: the first staging dir is untouched.
    assert!(staging.join("half-done.1234").exists());

    let _store = TrackStore::open(&db, dir.path()).unwrap();
    assert!(!staging.join("half-done.1234").exists());
}

#[test]
fn records_survive_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("tracks.db");
    let files = dir.path().join("files");
    {
        let store = TrackStore::open(&db, &files).unwrap();
        add(&store, "id-a");
    }
    let store = TrackStore::open(&db, &files).unwrap();
    assert_eq!(store.lookup("id-a").unwrap().title, "Title id-a");
}

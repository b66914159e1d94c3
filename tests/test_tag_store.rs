//! Integration tests for the tag store.
//!
//! Run with:
//!   cargo test --test test_tag_store

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

use rusqlite::Connection;
use tempfile::TempDir;

use lft_tags::groups::{ExclusiveGroups, RATING_TYPE};
use lft_tags::models::File;
use lft_tags::{AppError, TagStore};

// ── helpers ──────────────────────────────────────────────────────────────────

fn write_file(dir: &Path, rel: &str, body: &[u8]) -> PathBuf {
    let p = dir.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&p, body).expect("write file");
    p
}

fn filenames(files: &[File]) -> Vec<&str> {
    files.iter().map(|f| f.filename.as_str()).collect()
}

fn tag_count(store: &TagStore, tag_id: i64) -> i64 {
    store.get_tag(tag_id).unwrap().expect("tag exists").count
}

/// Count of distinct files linked to the tag, straight from the join table.
fn linked_files(store: &TagStore, tag_id: i64) -> i64 {
    store.files_for(tag_id).unwrap().len() as i64
}

// ── scenarios ────────────────────────────────────────────────────────────────

#[test]
fn sunset_scenario() {
    let tmp = TempDir::new().unwrap();
    let a = write_file(tmp.path(), "album/a.jpg", b"A-bytes");
    let b = write_file(tmp.path(), "album/b.jpg", b"B-bytes");
    let store = TagStore::open_in_memory().unwrap();

    let sunset = store.get_or_create_tag("image", "sunset").unwrap();
    assert!(store.link(&a, sunset).unwrap());
    assert!(store.link(&b, sunset).unwrap());
    assert_eq!(filenames(&store.files_for(sunset).unwrap()), vec!["a.jpg", "b.jpg"]);
    assert_eq!(tag_count(&store, sunset), 2);

    assert!(store.unlink(&a, sunset).unwrap());
    assert_eq!(tag_count(&store, sunset), 1);
    assert_eq!(filenames(&store.files_for(sunset).unwrap()), vec!["b.jpg"]);

    assert!(store.delete_tag(sunset).unwrap());
    assert!(store.tags_for(&a).unwrap().iter().all(|t| t.id != sunset));
    assert!(store.tags_for(&b).unwrap().iter().all(|t| t.id != sunset));
    assert!(store.files_for(sunset).unwrap().is_empty());
}

#[test]
fn rating_exclusivity_is_the_callers_job() {
    let tmp = TempDir::new().unwrap();
    let a = write_file(tmp.path(), "a.jpg", b"A");
    let store = TagStore::open_in_memory().unwrap();
    let three = store.get_or_create_tag(RATING_TYPE, "3").unwrap();
    let five = store.get_or_create_tag(RATING_TYPE, "5").unwrap();

    // The core stores ratings as ordinary tags and happily stacks them.
    store.link(&a, three).unwrap();
    store.link(&a, five).unwrap();
    assert_eq!(store.tags_for(&a).unwrap().len(), 2);
    store.unlink_all(&a).unwrap();

    // The calling layer enforces one rating: remove the old one, then add.
    store.link(&a, three).unwrap();
    assert!(store.unlink(&a, three).unwrap());
    store.link(&a, five).unwrap();
    let labels: Vec<_> = store.tags_for(&a).unwrap().into_iter().map(|t| t.label).collect();
    assert_eq!(labels, vec!["5"]);

    // ExclusiveGroups packages the same convention atomically.
    let groups = ExclusiveGroups::new(&store, [RATING_TYPE]);
    groups.set_rating(&a, 3).unwrap();
    let labels: Vec<_> = store.tags_for(&a).unwrap().into_iter().map(|t| t.label).collect();
    assert_eq!(labels, vec!["3"]);
    assert_eq!(tag_count(&store, five), 0);
}

#[test]
fn tags_follow_content_across_moves() {
    let tmp = TempDir::new().unwrap();
    let old = write_file(tmp.path(), "inbox/cat.png", b"meow");
    let store = TagStore::open_in_memory().unwrap();
    let cat = store.get_or_create_tag("image", "cat").unwrap();
    store.link(&old, cat).unwrap();

    let new = tmp.path().join("archive").join("kitty.png");
    fs::create_dir_all(new.parent().unwrap()).unwrap();
    fs::rename(&old, &new).unwrap();

    let tags = store.tags_for(&new).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].label, "cat");
    // Location is as first recorded.
    assert_eq!(store.files_for(cat).unwrap()[0].filename, "cat.png");
    // Editing the content changes identity.
    fs::write(&new, b"woof").unwrap();
    assert!(store.tags_for(&new).unwrap().is_empty());
}

#[test]
fn unreadable_paths_still_taggable() {
    let store = TagStore::open_in_memory().unwrap();
    let ghost = Path::new("/nowhere/ghost.txt");
    let t = store.get_or_create_tag("text", "ghost").unwrap();
    assert!(store.link(ghost, t).unwrap());
    assert_eq!(store.tags_for(ghost).unwrap().len(), 1);
    let file = store.get_file_by_path(ghost).unwrap().unwrap();
    assert_eq!(file.folder, "/nowhere");
    assert_eq!(file.filename, "ghost.txt");
}

#[test]
fn counters_match_links_after_mixed_mutations() {
    let tmp = TempDir::new().unwrap();
    let paths: Vec<_> = (0..6)
        .map(|i| write_file(tmp.path(), &format!("f{i}.txt"), format!("body {i}").as_bytes()))
        .collect();
    let store = TagStore::open_in_memory().unwrap();
    let tags: Vec<_> = ["red", "green", "blue"]
        .iter()
        .map(|l| store.get_or_create_tag("color", l).unwrap())
        .collect();

    for (i, p) in paths.iter().enumerate() {
        for (j, t) in tags.iter().enumerate() {
            if (i + j) % 2 == 0 {
                store.link(p, *t).unwrap();
            }
        }
    }
    store.link(&paths[0], tags[0]).unwrap();
    store.unlink(&paths[2], tags[0]).unwrap();
    store.unlink(&paths[5], tags[2]).unwrap();
    store.unlink_all(&paths[4]).unwrap();
    let f1 = store.get_file_by_path(&paths[1]).unwrap().unwrap();
    store.delete_file(f1.id).unwrap();

    for t in &tags {
        assert_eq!(tag_count(&store, *t), linked_files(&store, *t));
    }
}

#[test]
fn intersection_matches_pairwise_filter() {
    let tmp = TempDir::new().unwrap();
    let store = TagStore::open_in_memory().unwrap();
    let t1 = store.get_or_create_tag("image", "one").unwrap();
    let t2 = store.get_or_create_tag("image", "two").unwrap();
    for i in 0..8 {
        let p = write_file(tmp.path(), &format!("d{}/x{i}.bin", i % 3), &[i as u8; 4]);
        if i % 2 == 0 {
            store.link(&p, t1).unwrap();
        }
        if i % 3 == 0 {
            store.link(&p, t2).unwrap();
        }
    }

    let in_t2: Vec<_> = store.files_for(t2).unwrap().into_iter().map(|f| f.id).collect();
    let expected: Vec<_> = store
        .files_for(t1)
        .unwrap()
        .into_iter()
        .filter(|f| in_t2.contains(&f.id))
        .collect();
    assert_eq!(store.files_for_all(&[t1, t2]).unwrap(), expected);
    assert!(!expected.is_empty());
}

#[test]
fn rename_conflict_is_reported() {
    let store = TagStore::open_in_memory().unwrap();
    let a = store.get_or_create_tag("image", "dog").unwrap();
    store.get_or_create_tag("image", "puppy").unwrap();
    let err = store.rename_tag(a, "puppy").unwrap_err();
    assert!(matches!(err, AppError::LabelConflict { .. }));
    assert_eq!(store.list_tags(Some("image")).unwrap().len(), 2);
}

// ── persistence ──────────────────────────────────────────────────────────────

#[test]
fn schema_bootstrap_is_idempotent_on_disk() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("data").join("tags.db");
    let file = write_file(tmp.path(), "a.txt", b"a");
    {
        let store = TagStore::open(&db).unwrap();
        let t = store.get_or_create_tag("text", "note").unwrap();
        store.link(&file, t).unwrap();
    }
    let store = TagStore::open(&db).unwrap();
    let tags = store.tags_for(&file).unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].count, 1);
}

#[test]
fn legacy_database_without_count_is_upgraded() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("tags.db");
    let file = write_file(tmp.path(), "a.txt", b"legacy");
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE tags (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 type TEXT NOT NULL,
                 label TEXT NOT NULL,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                 UNIQUE(type, label)
             );
             CREATE TABLE files (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 hash TEXT NOT NULL UNIQUE,
                 folder TEXT NOT NULL,
                 filename TEXT NOT NULL,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE files_tags (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 fileId INTEGER NOT NULL,
                 tagId INTEGER NOT NULL,
                 created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                 FOREIGN KEY (fileId) REFERENCES files(id) ON DELETE CASCADE,
                 FOREIGN KEY (tagId) REFERENCES tags(id) ON DELETE CASCADE,
                 UNIQUE(fileId, tagId)
             );
             INSERT INTO tags (type, label) VALUES ('text', 'old');
             INSERT INTO files (hash, folder, filename) VALUES ('legacy-hash', '/x', 'a.txt');
             INSERT INTO files_tags (fileId, tagId) VALUES (1, 1);",
        )
        .unwrap();
    }

    let store = TagStore::open(&db).unwrap();
    let old = store.list_tags(Some("text")).unwrap();
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].label, "old");
    assert_eq!(old[0].count, 1);
    assert!(old[0].created_at.contains('T') && old[0].created_at.ends_with('Z'));

    // Legacy rows keep working with new links.
    assert!(store.link(&file, old[0].id).unwrap());
    assert_eq!(tag_count(&store, old[0].id), 2);
}

#[cfg(unix)]
#[test]
fn unreadable_non_utf8_paths_stay_separate_files() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let store = TagStore::open_in_memory().unwrap();
    let a = Path::new(OsStr::from_bytes(b"/nowhere/\xff.png"));
    let b = Path::new(OsStr::from_bytes(b"/nowhere/\xfe.png"));
    let x = store.get_or_create_tag("image", "x").unwrap();

    assert!(store.link(a, x).unwrap());
    assert!(store.tags_for(b).unwrap().is_empty());
    assert_ne!(
        store.get_or_create_file(a).unwrap(),
        store.get_or_create_file(b).unwrap()
    );
}

// ── concurrency ──────────────────────────────────────────────────────────────

#[test]
fn racing_get_or_create_converges_on_one_row() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("tags.db");
    let file = write_file(tmp.path(), "shared.jpg", b"shared");
    TagStore::open(&db).unwrap();

    const WORKERS: usize = 8;
    let barrier = Arc::new(Barrier::new(WORKERS));
    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let db = db.clone();
            let file = file.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Separate connections so the database arbitrates.
                let store = TagStore::open(&db).unwrap();
                barrier.wait();
                let tag = store.get_or_create_tag("image", "race").unwrap();
                let file_id = store.get_or_create_file(&file).unwrap();
                let linked = store.link(&file, tag).unwrap();
                (tag, file_id, linked)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let (tag, file_id, _) = results[0];
    assert!(results.iter().all(|(t, f, _)| *t == tag && *f == file_id));
    assert_eq!(results.iter().filter(|(_, _, linked)| *linked).count(), 1);

    let store = TagStore::open(&db).unwrap();
    assert_eq!(store.list_tags(None).unwrap().len(), 1);
    assert_eq!(store.list_files().unwrap().len(), 1);
    assert_eq!(tag_count(&store, tag), 1);
}

#[test]
fn shared_handle_serializes_link_and_unlink() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(TagStore::open(&tmp.path().join("tags.db")).unwrap());
    let tag = store.get_or_create_tag("image", "busy").unwrap();
    let paths: Vec<_> = (0..16)
        .map(|i| write_file(tmp.path(), &format!("p{i}.raw"), format!("{i}").as_bytes()))
        .collect();

    let handles: Vec<_> = paths
        .chunks(4)
        .map(|chunk| {
            let store = Arc::clone(&store);
            let chunk = chunk.to_vec();
            thread::spawn(move || {
                for p in &chunk {
                    store.link(p, tag).unwrap();
                }
                store.unlink(&chunk[0], tag).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(tag_count(&store, tag), 12);
    assert_eq!(linked_files(&store, tag), 12);
}

//! Tests for ShardStore
//!
//! These tests verify:
//! - Lazy shard file creation on first append
//! - Reading back entries in insertion order for both codecs
//! - Missing shard files read as empty
//! - Malformed entries are skipped and counted
//! - Atomic replacement leaves no temp files behind
//! - Writer handles are flushed on close and on drop

use std::fs;
use std::path::PathBuf;

use hashdex::shard::{ShardId, ShardStore};
use hashdex::{CodecKind, Config, Entry, HashdexError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store(codec: CodecKind) -> (TempDir, PathBuf, ShardStore) {
    let temp_dir = TempDir::new().unwrap();
    let index_dir = temp_dir.path().join("index");
    fs::create_dir_all(&index_dir).unwrap();
    let config = Config::builder()
        .index_dir(&index_dir)
        .codec(codec)
        .build()
        .unwrap();
    let store = ShardStore::new(&config);
    (temp_dir, index_dir, store)
}

fn delimited() -> CodecKind {
    CodecKind::Delimited { delimiter: ';' }
}

fn append_all(store: &ShardStore, shard: &ShardId, entries: &[Entry]) {
    let mut writers = store.writers();
    for entry in entries {
        store.append(&mut writers, shard, entry).unwrap();
    }
    writers.close_all().unwrap();
}

fn sample_entries() -> Vec<Entry> {
    vec![
        Entry::new("a@x.com", "p1"),
        Entry::new("b@x.com", "p2"),
        Entry::new("a@x.com", "p1"),
    ]
}

// =============================================================================
// Append / Read Tests
// =============================================================================

#[test]
fn test_shard_file_created_lazily() {
    let (_temp, index_dir, store) = setup_temp_store(delimited());
    let shard = ShardId::from("ab");

    let writers = store.writers();
    assert!(writers.is_empty());
    assert!(!index_dir.join("ab.csv").exists());
    drop(writers);

    append_all(&store, &shard, &[Entry::new("k", "v")]);
    assert!(index_dir.join("ab.csv").exists());
}

#[test]
fn test_delimited_file_format() {
    let (_temp, index_dir, store) = setup_temp_store(delimited());
    let shard = ShardId::from("ab");

    append_all(&store, &shard, &sample_entries());

    let contents = fs::read_to_string(index_dir.join("ab.csv")).unwrap();
    assert_eq!(contents, "a@x.com;p1\nb@x.com;p2\na@x.com;p1\n");
}

#[test]
fn test_read_all_preserves_insertion_order() {
    for codec in [delimited(), CodecKind::StructuredList] {
        let (_temp, _dir, store) = setup_temp_store(codec);
        let shard = ShardId::from("0f");

        append_all(&store, &shard, &sample_entries());

        let outcome = store.read_all(&shard).unwrap();
        assert_eq!(outcome.entries, sample_entries(), "{:?}", codec);
        assert_eq!(outcome.skipped, 0);
    }
}

#[test]
fn test_appends_across_runs_accumulate() {
    let (_temp, _dir, store) = setup_temp_store(delimited());
    let shard = ShardId::from("0f");

    append_all(&store, &shard, &[Entry::new("a", "1")]);
    append_all(&store, &shard, &[Entry::new("a", "2")]);

    let outcome = store.read_all(&shard).unwrap();
    assert_eq!(outcome.entries, vec![Entry::new("a", "1"), Entry::new("a", "2")]);
}

#[test]
fn test_missing_shard_reads_empty() {
    for codec in [delimited(), CodecKind::StructuredList] {
        let (_temp, _dir, store) = setup_temp_store(codec);
        let shard = ShardId::from("ee");

        let outcome = store.read_all(&shard).unwrap();
        assert!(outcome.entries.is_empty());
        assert!(store.read_raw(&shard).unwrap().is_empty());
    }
}

#[test]
fn test_structured_list_file_is_json_array() {
    let (_temp, index_dir, store) = setup_temp_store(CodecKind::StructuredList);
    let shard = ShardId::from("ab");

    append_all(&store, &shard, &sample_entries()[..2]);

    let text = fs::read_to_string(index_dir.join("ab.json")).unwrap();
    let parsed: Vec<Entry> = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, sample_entries()[..2].to_vec());
    assert!(!index_dir.join("ab.json.tmp").exists());
}

// =============================================================================
// Malformed Entry Tests
// =============================================================================

#[test]
fn test_malformed_rows_are_skipped() {
    let (_temp, index_dir, store) = setup_temp_store(delimited());
    fs::write(
        index_dir.join("ab.csv"),
        "a@x.com;p1\ngarbage\nx;y;z\n\na@x.com;p2\n",
    )
    .unwrap();

    let outcome = store.read_all(&ShardId::from("ab")).unwrap();
    assert_eq!(
        outcome.entries,
        vec![Entry::new("a@x.com", "p1"), Entry::new("a@x.com", "p2")]
    );
    assert_eq!(outcome.skipped, 3);
}

#[test]
fn test_malformed_list_elements_are_skipped() {
    let (_temp, index_dir, store) = setup_temp_store(CodecKind::StructuredList);
    fs::write(
        index_dir.join("ab.json"),
        r#"[{"key":"a","value":"1"}, {"key":"a"}, 7, {"key":"b","value":"2"}]"#,
    )
    .unwrap();

    let outcome = store.read_all(&ShardId::from("ab")).unwrap();
    assert_eq!(outcome.entries, vec![Entry::new("a", "1"), Entry::new("b", "2")]);
    assert_eq!(outcome.skipped, 2);
}

#[test]
fn test_non_array_structured_shard_is_corrupt() {
    let (_temp, index_dir, store) = setup_temp_store(CodecKind::StructuredList);
    fs::write(index_dir.join("ab.json"), r#"{"key":"a","value":"1"}"#).unwrap();

    let err = store.read_all(&ShardId::from("ab")).unwrap_err();
    assert!(matches!(err, HashdexError::CorruptShard { .. }));
}

// =============================================================================
// Replacement Tests
// =============================================================================

#[test]
fn test_write_replaces_contents() {
    for codec in [delimited(), CodecKind::StructuredList] {
        let (_temp, index_dir, store) = setup_temp_store(codec);
        let shard = ShardId::from("ab");

        append_all(&store, &shard, &sample_entries());
        store.write(&shard, &[Entry::new("z", "9")]).unwrap();

        let outcome = store.read_all(&shard).unwrap();
        assert_eq!(outcome.entries, vec![Entry::new("z", "9")]);

        let leftovers: Vec<_> = fs::read_dir(&index_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }
}

#[test]
fn test_write_into_missing_directory_fails_cleanly() {
    let (temp, _dir, _store) = setup_temp_store(delimited());
    let config = Config::builder()
        .index_dir(temp.path().join("absent"))
        .build()
        .unwrap();
    let store = ShardStore::new(&config);

    let err = store.write(&ShardId::from("ab"), &[Entry::new("a", "1")]).unwrap_err();
    assert!(matches!(err, HashdexError::Io(_)));
}

// =============================================================================
// Handle Lifecycle Tests
// =============================================================================

#[test]
fn test_writers_reuse_one_handle_per_shard() {
    let (_temp, _dir, store) = setup_temp_store(delimited());
    let mut writers = store.writers();

    for i in 0..10 {
        let shard = ShardId::from(if i % 2 == 0 { "aa" } else { "bb" });
        store.append(&mut writers, &shard, &Entry::new("k", "v")).unwrap();
    }

    assert_eq!(writers.len(), 2);
    writers.close_all().unwrap();
    assert!(writers.is_empty());
}

#[test]
fn test_dropped_writers_flush_buffered_rows() {
    let (_temp, _dir, store) = setup_temp_store(delimited());
    let shard = ShardId::from("ab");

    {
        let mut writers = store.writers();
        store.append(&mut writers, &shard, &Entry::new("a", "1")).unwrap();
        // dropped without close_all
    }

    let outcome = store.read_all(&shard).unwrap();
    assert_eq!(outcome.entries, vec![Entry::new("a", "1")]);
}

#[test]
fn test_shard_ids_lists_only_shard_files() {
    let (_temp, index_dir, store) = setup_temp_store(delimited());
    append_all(&store, &ShardId::from("0a"), &[Entry::new("a", "1")]);
    append_all(&store, &ShardId::from("ff"), &[Entry::new("b", "2")]);
    fs::write(index_dir.join("notes.txt"), "x").unwrap();
    fs::write(index_dir.join("0b.csv.tmp"), "x").unwrap();
    fs::create_dir(index_dir.join("cc.csv")).unwrap();

    let shards = store.shard_ids().unwrap();
    assert_eq!(shards, vec![ShardId::from("0a"), ShardId::from("ff")]);
}

//! Tests for the hashdex binary
//!
//! These tests verify:
//! - Ingest from a file followed by a lookup on stdout
//! - Errors exit with status 1
//! - Ctrl-C during ingest flushes every read entry and exits 0

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn hashdex(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hashdex"));
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn records(count: usize) -> String {
    (0..count)
        .map(|i| format!("{{\"email\":\"user{i}@x.com\",\"password\":\"p{i}\"}}\n"))
        .collect()
}

/// Rows stored across every delimited shard of the default index directory
fn stored_rows(dir: &Path) -> usize {
    fs::read_dir(dir.join("email-hashes"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "csv"))
        .map(|p| fs::read_to_string(p).unwrap().lines().count())
        .sum()
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_ingest_file_then_search_one() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("in.jsonl"), records(3)).unwrap();

    let status = hashdex(temp.path())
        .args(["ingest", "--input", "in.jsonl"])
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
    assert!(temp.path().join("hashdex-config.json").is_file());
    assert_eq!(stored_rows(temp.path()), 3);

    let mut child = hashdex(temp.path())
        .arg("search-one")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"user1@x.com\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record, serde_json::json!({ "email": "user1@x.com", "password": "p1" }));
}

#[test]
fn test_search_without_index_exits_with_error() {
    let temp = TempDir::new().unwrap();

    let output = hashdex(temp.path())
        .arg("search-all")
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR"));
}

#[cfg(unix)]
#[test]
fn test_ctrl_c_during_ingest_keeps_entries_and_exits_cleanly() {
    let temp = TempDir::new().unwrap();
    let mut child = hashdex(temp.path())
        .arg("ingest")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Stdin stays open, so the run only ends through the interrupt
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(records(50).as_bytes()).unwrap();
    stdin.flush().unwrap();

    let mut stderr = BufReader::new(child.stderr.take().unwrap());
    let mut log = String::new();
    loop {
        let mut line = String::new();
        if stderr.read_line(&mut line).unwrap() == 0 {
            break;
        }
        log.push_str(&line);
        if line.contains("Starting ingestion") {
            break;
        }
    }
    thread::sleep(Duration::from_millis(500));

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(killed.success());

    stderr.read_to_string(&mut log).unwrap();
    let status = child.wait().unwrap();
    drop(stdin);

    assert!(status.success(), "{}", log);
    assert!(log.contains("Canceled by user"), "{}", log);
    assert_eq!(stored_rows(temp.path()), 50);
}

//! Shard Store
//!
//! Reads and writes shard files through the configured codec.
//!
//! ## Handle ownership
//! Append-mode handles live in a [`ShardWriters`] scoped to one ingestion
//! run. They are opened lazily per shard, reused for the rest of the run,
//! and flushed and closed by `close_all` or, on early exit, by `Drop`.
//! Reads and replacements open and close their file per call.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{HashdexError, Result};

use super::{codec_for, Entry, RawEntry, ScanOutcome, ShardCodec, ShardId, ShardRouter};

/// Per-run cache of buffered append handles, keyed by shard
pub struct ShardWriters {
    handles: HashMap<ShardId, BufWriter<File>>,
    buffer_size: usize,
}

impl ShardWriters {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            handles: HashMap::new(),
            buffer_size,
        }
    }

    /// Get the handle for `shard`, opening `path` in append mode on first use
    fn get_or_open(&mut self, shard: &ShardId, path: &Path) -> Result<&mut BufWriter<File>> {
        match self.handles.entry(shard.clone()) {
            MapEntry::Occupied(slot) => Ok(slot.into_mut()),
            MapEntry::Vacant(slot) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                debug!(shard = %shard, path = %path.display(), "Opened shard for append");
                Ok(slot.insert(BufWriter::with_capacity(self.buffer_size, file)))
            }
        }
    }

    /// Number of open handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Flush, sync and close every handle.
    ///
    /// All handles are closed even if one fails; the first error is returned.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first_err = None;
        for (shard, mut writer) in self.handles.drain() {
            let closed = writer
                .flush()
                .and_then(|_| writer.get_ref().sync_all());
            if let Err(e) = closed {
                warn!(shard = %shard, error = %e, "Failed to close shard");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Drop for ShardWriters {
    fn drop(&mut self) {
        for writer in self.handles.values_mut() {
            let _ = writer.flush();
        }
    }
}

/// Codec-aware access to the shard files of one index directory
#[derive(Debug)]
pub struct ShardStore {
    router: ShardRouter,
    codec: Box<dyn ShardCodec>,
    buffer_size: usize,
}

impl ShardStore {
    /// Create a store for a validated config. Touches no files.
    pub fn new(config: &Config) -> Self {
        Self {
            router: ShardRouter::new(config),
            codec: codec_for(config.codec),
            buffer_size: config.buffer_size,
        }
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn codec(&self) -> &dyn ShardCodec {
        self.codec.as_ref()
    }

    pub fn index_dir(&self) -> &Path {
        self.router.index_dir()
    }

    /// Start a new handle cache for an ingestion run
    pub fn writers(&self) -> ShardWriters {
        ShardWriters::new(self.buffer_size)
    }

    /// Append one entry to a shard, creating the file if needed
    pub fn append(&self, writers: &mut ShardWriters, shard: &ShardId, entry: &Entry) -> Result<()> {
        let path = self.router.shard_path(shard);
        let raw = self.codec.encode_entry(entry);

        if self.codec.appends_in_place() {
            let writer = writers.get_or_open(shard, &path)?;
            return self.codec.write_raw(std::slice::from_ref(&raw), writer);
        }

        let mut existing = self.read_raw(shard)?;
        existing.push(raw);
        self.replace(&path, &existing)
    }

    /// Decode every entry of a shard in file order.
    ///
    /// A missing shard file yields no entries. Malformed entries are counted
    /// in `skipped` and otherwise ignored.
    pub fn read_all(&self, shard: &ShardId) -> Result<ScanOutcome> {
        let mut entries = Vec::new();
        let skipped = self.scan(shard, |entry| {
            entries.push(entry);
            ControlFlow::Continue(())
        })?;
        Ok(ScanOutcome { entries, skipped })
    }

    /// Visit decoded entries in file order until `visit` breaks.
    ///
    /// Returns the number of malformed entries passed over.
    pub fn scan<F>(&self, shard: &ShardId, mut visit: F) -> Result<u64>
    where
        F: FnMut(Entry) -> ControlFlow<()>,
    {
        let path = self.router.shard_path(shard);
        let Some(mut reader) = self.open_reader(&path)? else {
            return Ok(0);
        };

        let mut skipped = 0u64;
        self.codec.scan(&path, &mut reader, &mut |raw| {
            match self.codec.decode_entry(&raw) {
                Some(entry) => visit(entry),
                None => {
                    skipped += 1;
                    ControlFlow::Continue(())
                }
            }
        })?;

        if skipped > 0 {
            warn!(shard = %shard, skipped, "Skipped malformed shard entries");
        }
        Ok(skipped)
    }

    /// Raw entries of a shard in file order, undecoded
    pub fn read_raw(&self, shard: &ShardId) -> Result<Vec<RawEntry>> {
        let path = self.router.shard_path(shard);
        let Some(mut reader) = self.open_reader(&path)? else {
            return Ok(Vec::new());
        };

        let mut raw = Vec::new();
        self.codec.scan(&path, &mut reader, &mut |entry| {
            raw.push(entry);
            ControlFlow::Continue(())
        })?;
        Ok(raw)
    }

    /// Atomically replace a shard's contents with `entries`
    pub fn write(&self, shard: &ShardId, entries: &[Entry]) -> Result<()> {
        let raw: Vec<RawEntry> = entries.iter().map(|e| self.codec.encode_entry(e)).collect();
        self.write_raw(shard, &raw)
    }

    /// Atomically replace a shard's contents with already-encoded entries
    pub fn write_raw(&self, shard: &ShardId, raw: &[RawEntry]) -> Result<()> {
        self.replace(&self.router.shard_path(shard), raw)
    }

    /// Shards present in the index directory, sorted
    pub fn shard_ids(&self) -> Result<Vec<ShardId>> {
        let mut shards = Vec::new();
        for dir_entry in fs::read_dir(self.index_dir())? {
            let path = dir_entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(shard) = self.router.shard_id_from_path(&path) {
                shards.push(shard);
            }
        }
        shards.sort();
        Ok(shards)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_reader(&self, path: &Path) -> Result<Option<BufReader<File>>> {
        match File::open(path) {
            Ok(file) => Ok(Some(BufReader::with_capacity(self.buffer_size, file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to `<path>.tmp` in the same directory, sync, then rename over
    /// `path`. The original stays intact until the rename; the temp file is
    /// removed if anything before it fails.
    fn replace(&self, path: &Path, raw: &[RawEntry]) -> Result<()> {
        let tmp = temp_path(path);
        let written = self
            .write_synced(&tmp, raw)
            .and_then(|_| fs::rename(&tmp, path).map_err(HashdexError::from));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn write_synced(&self, path: &Path, raw: &[RawEntry]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        self.codec.write_raw(raw, &mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

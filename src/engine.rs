//! Engine Module
//!
//! `HashIndex` ties the three operations to one validated config.
//!
//! ## Responsibilities
//! - Validate configuration once, before any I/O
//! - Hand the same config to ingestion, search and compaction
//!
//! Each call is independent: no handles or caches survive between calls,
//! only the shard files themselves.
//!
//! ## Concurrency
//! A single process is assumed to own the index directory at a time.
//! Nothing locks shard files, so running ingest, search or compact
//! concurrently against the same directory is unsupported.

use std::io::{BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::compact::{CompactionReport, Compactor, ShardCompaction};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{IngestReport, Ingestor};
use crate::search::{QueryResult, SearchEngine};
use crate::shard::{ShardId, ShardRouter};
use crate::source::RecordSource;

/// A hash-partitioned index rooted at `config.index_dir`
pub struct HashIndex {
    config: Config,
    router: ShardRouter,
    cancel: Arc<AtomicBool>,
}

impl HashIndex {
    /// Validate `config` and bind an index to it. Touches no files.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let router = ShardRouter::new(&config);
        Ok(Self {
            config,
            router,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops a running ingestion at its next page boundary.
    /// It stays set until the caller clears it.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Build or extend the index from `source`
    pub fn ingest(&self, source: &mut dyn RecordSource) -> Result<IngestReport> {
        self.ingest_with_progress(source, |_| {})
    }

    /// Like `ingest`, reporting the running count of records read
    pub fn ingest_with_progress<F>(&self, source: &mut dyn RecordSource, progress: F) -> Result<IngestReport>
    where
        F: FnMut(u64),
    {
        Ingestor::new(self.config.clone())?
            .with_cancel_flag(self.cancel_flag())
            .run_with_progress(source, progress)
    }

    /// Look up one key
    pub fn search(&self, query: &str, exactly_one: bool) -> Result<QueryResult> {
        SearchEngine::open(self.config.clone())?.search(query, exactly_one)
    }

    /// Answer newline-separated queries from `input` as JSON records on `output`
    pub fn search_lines<R: BufRead, W: Write>(&self, input: R, output: W, exactly_one: bool) -> Result<u64> {
        SearchEngine::open(self.config.clone())?.search_lines(input, output, exactly_one)
    }

    /// Remove byte-identical duplicates from every shard
    pub fn compact(&self) -> Result<CompactionReport> {
        Compactor::open(self.config.clone())?.compact_all()
    }

    /// Remove byte-identical duplicates from one shard
    pub fn compact_shard(&self, shard: &ShardId) -> Result<ShardCompaction> {
        Compactor::open(self.config.clone())?.compact_shard(shard)
    }

    /// Shard that `key` is stored in
    pub fn shard_of(&self, key: &str) -> ShardId {
        self.router.route(key)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

//! Ingestion Pipeline
//!
//! Pages through a record source, turns each usable record into an entry
//! and appends it to the shard its key digest routes to.
//!
//! ## Failure model
//! - Records missing the key or value field are dropped and counted.
//! - A failed append aborts the run. Entries already flushed stay on disk;
//!   nothing is rolled back and no resume point is kept.
//! - Cancellation is checked between pages and ends the run cleanly. A
//!   source that stops its page early on cancel ends the run the same way.
//!
//! Shard handles are released on every exit path: `close_all` runs after
//! the page loop whether it succeeded or not.

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{CodecKind, Config};
use crate::error::Result;
use crate::shard::{DelimitedCodec, Entry, ShardId, ShardStore, ShardWriters};
use crate::source::{Record, RecordSource};

/// Outcome of one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Records pulled from the source
    pub read: u64,
    /// Entries appended to shards
    pub written: u64,
    /// Records missing the key or value field
    pub dropped: u64,
    /// Delimited entries whose key or value contains the delimiter or a newline
    pub unescaped: u64,
    /// Distinct shards written to
    pub shards_touched: usize,
    /// Whether the run stopped on the cancel flag
    pub cancelled: bool,
}

/// Mutable state of one run
struct RunState {
    writers: ShardWriters,
    shards: HashSet<ShardId>,
    report: IngestReport,
}

/// Builds the index from a record source
pub struct Ingestor {
    config: Config,
    store: ShardStore,
    cancel: Arc<AtomicBool>,
}

impl Ingestor {
    /// Validate the config and prepare a pipeline. Touches no files.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = ShardStore::new(&config);
        Ok(Self {
            config,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Share an existing cancel flag instead of the pipeline's own
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Flag that stops the run at the next page boundary when set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ingest the whole source
    pub fn run(&self, source: &mut dyn RecordSource) -> Result<IngestReport> {
        self.run_with_progress(source, |_| {})
    }

    /// Ingest the whole source, reporting the running count of records read
    pub fn run_with_progress<F>(&self, source: &mut dyn RecordSource, mut progress: F) -> Result<IngestReport>
    where
        F: FnMut(u64),
    {
        fs::create_dir_all(&self.config.index_dir)?;
        info!(
            index_dir = %self.config.index_dir.display(),
            algorithm = %self.config.hash_algorithm,
            prefix_len = self.config.prefix_len,
            chunk_size = self.config.chunk_size,
            "Starting ingestion"
        );

        let mut state = RunState {
            writers: self.store.writers(),
            shards: HashSet::new(),
            report: IngestReport::default(),
        };

        let pumped = self.pump(source, &mut state, &mut progress);
        let closed = state.writers.close_all();
        pumped?;
        closed?;

        let mut report = state.report;
        report.shards_touched = state.shards.len();
        if report.unescaped > 0 {
            warn!(
                count = report.unescaped,
                "Entries contain the delimiter or a newline and will not read back intact"
            );
        }
        info!(
            read = report.read,
            written = report.written,
            dropped = report.dropped,
            shards = report.shards_touched,
            cancelled = report.cancelled,
            "Ingestion finished"
        );
        Ok(report)
    }

    fn pump(
        &self,
        source: &mut dyn RecordSource,
        state: &mut RunState,
        progress: &mut dyn FnMut(u64),
    ) -> Result<()> {
        loop {
            if self.observe_cancel(state) {
                return Ok(());
            }

            let page = source.next_page(self.config.chunk_size)?;
            if page.is_empty() {
                // A source may end its page early once the flag is set
                self.observe_cancel(state);
                return Ok(());
            }

            for record in &page {
                self.ingest_record(record, state)?;
                progress(state.report.read);
            }
            debug!(page = page.len(), read = state.report.read, "Ingested page");
        }
    }

    fn observe_cancel(&self, state: &mut RunState) -> bool {
        if !self.cancel.load(Ordering::Relaxed) {
            return false;
        }
        if !state.report.cancelled {
            info!(read = state.report.read, "Ingestion cancelled");
            state.report.cancelled = true;
        }
        true
    }

    fn ingest_record(&self, record: &Record, state: &mut RunState) -> Result<()> {
        state.report.read += 1;

        let key = record.field(&self.config.key_field);
        let value = record.field(&self.config.value_field);
        let (Some(key), Some(value)) = (key, value) else {
            state.report.dropped += 1;
            return Ok(());
        };

        let entry = Entry::new(key, value);
        if let CodecKind::Delimited { delimiter } = self.config.codec {
            if DelimitedCodec::new(delimiter).is_ambiguous(&entry) {
                state.report.unescaped += 1;
            }
        }

        let shard = self.store.router().route(&entry.key);
        self.store.append(&mut state.writers, &shard, &entry)?;
        state.report.written += 1;
        state.shards.insert(shard);
        Ok(())
    }
}

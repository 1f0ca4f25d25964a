//! Compactor
//!
//! Rewrites shards without byte-identical duplicate entries.
//!
//! Each raw entry is hashed as a whole with the index's hash algorithm and
//! only the first occurrence of every content digest survives, in original
//! order. Entries sharing a key but differing in value are all kept.
//! Replacement goes through a temp file and a rename, so a shard is either
//! fully compacted or untouched.
//!
//! Compacting an already compacted shard rewrites the same bytes.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::Config;
use crate::digest::HashAlgorithm;
use crate::error::{HashdexError, Result};
use crate::shard::{RawEntry, ShardId, ShardStore};

/// Before/after entry counts for one shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCompaction {
    pub shard: ShardId,
    pub before: usize,
    pub after: usize,
}

impl ShardCompaction {
    /// Duplicates removed
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// Result of compacting a whole index
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompactionReport {
    pub shards: Vec<ShardCompaction>,
}

impl CompactionReport {
    pub fn entries_before(&self) -> usize {
        self.shards.iter().map(|s| s.before).sum()
    }

    pub fn entries_after(&self) -> usize {
        self.shards.iter().map(|s| s.after).sum()
    }

    pub fn removed(&self) -> usize {
        self.entries_before() - self.entries_after()
    }
}

/// Offline duplicate removal over an existing index
pub struct Compactor {
    store: ShardStore,
    algorithm: HashAlgorithm,
}

impl Compactor {
    /// Open the index described by `config`.
    ///
    /// Fails with `MissingIndex` when the index directory does not exist.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        if !config.index_dir.is_dir() {
            return Err(HashdexError::MissingIndex(config.index_dir));
        }
        Ok(Self {
            store: ShardStore::new(&config),
            algorithm: config.hash_algorithm,
        })
    }

    /// Compact one shard. A shard without a file is left alone.
    pub fn compact_shard(&self, shard: &ShardId) -> Result<ShardCompaction> {
        let path = self.store.router().shard_path(shard);
        if !path.is_file() {
            return Ok(ShardCompaction {
                shard: shard.clone(),
                before: 0,
                after: 0,
            });
        }

        let raw = self.store.read_raw(shard)?;
        let before = raw.len();
        let kept = dedup_raw(self.algorithm, raw);
        self.store.write_raw(shard, &kept)?;

        let result = ShardCompaction {
            shard: shard.clone(),
            before,
            after: kept.len(),
        };
        debug!(shard = %shard, before, after = result.after, "Compacted shard");
        Ok(result)
    }

    /// Compact every shard file in the index directory, in name order
    pub fn compact_all(&self) -> Result<CompactionReport> {
        let shards = self.store.shard_ids()?;
        info!(
            index_dir = %self.store.index_dir().display(),
            shards = shards.len(),
            "Starting compaction"
        );

        let mut report = CompactionReport::default();
        for shard in &shards {
            report.shards.push(self.compact_shard(shard)?);
        }

        info!(
            before = report.entries_before(),
            after = report.entries_after(),
            removed = report.removed(),
            "Compaction finished"
        );
        Ok(report)
    }
}

/// Keep the first occurrence of every distinct raw entry, in order
fn dedup_raw(algorithm: HashAlgorithm, raw: Vec<RawEntry>) -> Vec<RawEntry> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .filter(|entry| seen.insert(algorithm.digest(entry)))
        .collect()
}

//! Shard Router
//!
//! Maps a key digest to the shard it belongs to and a shard to its file.
//! Routing depends on the digest alone: no rebalancing, no rehash on growth.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::digest::HashAlgorithm;

/// Shard identifier: the leading `prefix_len` hex characters of a digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(String);

impl ShardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(s: &str) -> Self {
        ShardId(s.to_string())
    }
}

/// Resolves keys and digests to shard identifiers and file paths
#[derive(Debug, Clone)]
pub struct ShardRouter {
    index_dir: PathBuf,
    algorithm: HashAlgorithm,
    prefix_len: usize,
    extension: &'static str,
}

impl ShardRouter {
    /// Build a router from a validated config
    pub fn new(config: &Config) -> Self {
        Self {
            index_dir: config.index_dir.clone(),
            algorithm: config.hash_algorithm,
            prefix_len: config.prefix_len,
            extension: config.codec.extension(),
        }
    }

    /// Digest of a key under the configured algorithm
    pub fn digest(&self, key: &str) -> String {
        self.algorithm.digest(key)
    }

    /// Shard holding entries whose key hashes to `digest`
    pub fn shard_id(&self, digest: &str) -> ShardId {
        // Digests are ASCII hex, so any byte offset is a char boundary.
        let end = self.prefix_len.min(digest.len());
        ShardId(digest[..end].to_string())
    }

    /// Digest a key and route it in one step
    pub fn route(&self, key: &str) -> ShardId {
        self.shard_id(&self.digest(key))
    }

    /// `<index_dir>/<shard_id>.<ext>`
    pub fn shard_path(&self, shard: &ShardId) -> PathBuf {
        self.index_dir
            .join(format!("{}.{}", shard.as_str(), self.extension))
    }

    /// Inverse of `shard_path` for directory listings.
    ///
    /// Only names of the form `<prefix>.<ext>` with a lowercase hex prefix
    /// of the configured length are recognised.
    pub fn shard_id_from_path(&self, path: &Path) -> Option<ShardId> {
        if path.extension()?.to_str()? != self.extension {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let is_prefix = stem.len() == self.prefix_len
            && stem.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        is_prefix.then(|| ShardId(stem.to_string()))
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

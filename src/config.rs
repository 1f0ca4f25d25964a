//! Configuration for hashdex
//!
//! Centralized configuration with sensible defaults. A `Config` is passed
//! explicitly to every component; nothing reads ambient state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::HashAlgorithm;
use crate::error::{HashdexError, Result};

/// Main configuration for one index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Index Layout
    // -------------------------------------------------------------------------
    /// Directory holding one file per shard:
    ///   {index_dir}/
    ///     ├── 00.csv
    ///     ├── 01.csv
    ///     └── ...
    pub index_dir: PathBuf,

    /// Algorithm for key digests and compaction content digests
    pub hash_algorithm: HashAlgorithm,

    /// Number of leading digest hex characters naming a shard (1 or 2)
    pub prefix_len: usize,

    /// Persisted entry encoding
    pub codec: CodecKind,

    // -------------------------------------------------------------------------
    // Record Fields
    // -------------------------------------------------------------------------
    /// Field whose value is hashed and searched for
    pub key_field: String,

    /// Field whose value is returned by searches
    pub value_field: String,

    // -------------------------------------------------------------------------
    // I/O Tuning
    // -------------------------------------------------------------------------
    /// Records requested from the source per page
    pub chunk_size: usize,

    /// Capacity of each buffered shard reader/writer (in bytes)
    pub buffer_size: usize,
}

/// Shard file encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodecKind {
    /// One `<key><delimiter><value>\n` line per entry, appended in place.
    /// Neither the delimiter nor newlines are escaped.
    Delimited { delimiter: char },

    /// The whole shard is one JSON array of entries, rewritten on every
    /// append. Cost grows with shard size; suited to small indexes only.
    StructuredList,
}

impl CodecKind {
    /// File extension for shards written with this codec
    pub fn extension(&self) -> &'static str {
        match self {
            CodecKind::Delimited { .. } => "csv",
            CodecKind::StructuredList => "json",
        }
    }
}

impl Default for CodecKind {
    fn default() -> Self {
        CodecKind::Delimited { delimiter: ';' }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./email-hashes"),
            hash_algorithm: HashAlgorithm::Md5,
            prefix_len: 2,
            codec: CodecKind::default(),
            key_field: "email".to_string(),
            value_field: "password".to_string(),
            chunk_size: 10_000,
            buffer_size: 1024 * 1024, // 1 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check every setting before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.prefix_len) {
            return Err(HashdexError::Config(format!(
                "prefix_len must be 1 or 2, got {}",
                self.prefix_len
            )));
        }
        if self.prefix_len > self.hash_algorithm.hex_len() {
            return Err(HashdexError::Config(format!(
                "prefix_len {} exceeds {} digest length {}",
                self.prefix_len,
                self.hash_algorithm,
                self.hash_algorithm.hex_len()
            )));
        }
        if self.key_field.is_empty() || self.value_field.is_empty() {
            return Err(HashdexError::Config(
                "key_field and value_field must not be empty".to_string(),
            ));
        }
        if self.key_field == self.value_field {
            return Err(HashdexError::Config(format!(
                "key_field and value_field must be different, both are \"{}\"",
                self.key_field
            )));
        }
        if self.chunk_size == 0 {
            return Err(HashdexError::Config("chunk_size must be positive".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(HashdexError::Config("buffer_size must be positive".to_string()));
        }
        if let CodecKind::Delimited { delimiter } = self.codec {
            if delimiter == '\n' || delimiter == '\r' {
                return Err(HashdexError::Config(
                    "delimiter must not be a line terminator".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Load a JSON config file layered over the defaults.
    ///
    /// A missing file is created holding the current defaults so the
    /// operator has something to edit. The result is validated either way.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let text = fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&text).map_err(|e| {
                HashdexError::Config(format!("{}: {}", path.display(), e))
            })?
        } else {
            let config = Config::default();
            fs::write(path, serde_json::to_string_pretty(&config)?)?;
            tracing::info!(path = %path.display(), "Wrote default configuration");
            config
        };

        config.validate()?;
        Ok(config)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the index directory
    pub fn index_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_dir = path.into();
        self
    }

    /// Set the digest algorithm
    pub fn hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.config.hash_algorithm = algorithm;
        self
    }

    /// Set the shard prefix length (1 or 2)
    pub fn prefix_len(mut self, len: usize) -> Self {
        self.config.prefix_len = len;
        self
    }

    /// Set the shard codec
    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.config.codec = codec;
        self
    }

    /// Use the delimited-row codec with the given delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.codec = CodecKind::Delimited { delimiter };
        self
    }

    /// Set the key and value field names
    pub fn fields(mut self, key_field: impl Into<String>, value_field: impl Into<String>) -> Self {
        self.config.key_field = key_field.into();
        self.config.value_field = value_field.into();
        self
    }

    /// Set the source page size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the buffer size (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Validate and return the config
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

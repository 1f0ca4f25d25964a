//! # hashdex
//!
//! A hash-partitioned, append-only index:
//! - Records are ingested once from a paginated source
//! - Each entry lands in the shard named by a prefix of its key digest
//! - Point queries read a single shard and never touch the source again
//! - Offline compaction drops byte-identical duplicate entries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//! │ RecordSource │        │ query lines  │        │   operator   │
//! └──────┬───────┘        └──────┬───────┘        └──────┬───────┘
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//! ┌──────────────┐        ┌──────────────┐        ┌──────────────┐
//! │   Ingestor   │        │ SearchEngine │        │  Compactor   │
//! └──────┬───────┘        └──────┬───────┘        └──────┬───────┘
//!        │   digest → prefix     │                       │
//!        ▼                       ▼                       │
//! ┌─────────────────────────────────────┐                │
//! │             ShardRouter             │                │
//! └─────────────────┬───────────────────┘                │
//!                   ▼                                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │         ShardStore  (delimited rows | structured list)       │
//! │         {index_dir}/00.csv  01.csv  ...  ff.csv               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod digest;
pub mod source;
pub mod shard;
pub mod ingest;
pub mod search;
pub mod compact;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use compact::{CompactionReport, Compactor, ShardCompaction};
pub use config::{CodecKind, Config};
pub use digest::HashAlgorithm;
pub use engine::HashIndex;
pub use error::{HashdexError, Result};
pub use ingest::{IngestReport, Ingestor};
pub use search::{Matches, QueryResult, SearchEngine};
pub use shard::{Entry, ShardId};
pub use source::{BackgroundLinesSource, JsonLinesSource, MemorySource, Record, RecordSource};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hashdex
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Shard Module
//!
//! The index is split into shards addressed by a digest prefix. Each shard
//! is exactly one file under the index directory.
//!
//! ## Responsibilities
//! - Route key digests to shards (`router`)
//! - Encode and decode entries (`delimited`, `structured`)
//! - Own shard file handles and atomic replacement (`store`)
//!
//! ## File Formats
//! ```text
//! Delimited rows (`<prefix>.csv`), appended in place:
//! ┌──────────────────────────────────────┐
//! │ a@x.com;p1\n                         │
//! │ a@x.com;p1\n                         │
//! │ b@x.com;p2\n                         │
//! └──────────────────────────────────────┘
//!
//! Structured list (`<prefix>.json`), rewritten per append:
//! ┌──────────────────────────────────────┐
//! │ [                                    │
//! │   {"key":"a@x.com","value":"p1"},    │
//! │   {"key":"b@x.com","value":"p2"}     │
//! │ ]                                    │
//! └──────────────────────────────────────┘
//! ```

mod codec;
mod delimited;
mod router;
mod store;
mod structured;

use serde::{Deserialize, Serialize};

pub use codec::{codec_for, RawEntry, ScanOutcome, ShardCodec};
pub use delimited::DelimitedCodec;
pub use router::{ShardId, ShardRouter};
pub use store::{ShardStore, ShardWriters};
pub use structured::StructuredListCodec;

/// A persisted (key, value) pair derived from one source record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

//! Shard codec interface
//!
//! A codec turns entries into the raw byte units stored in a shard file and
//! back. Raw entries are what compaction deduplicates, so a codec must
//! produce identical bytes for identical entries.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;

use crate::config::CodecKind;
use crate::error::Result;

use super::{DelimitedCodec, Entry, StructuredListCodec};

/// One serialized entry exactly as it sits in the shard file
pub type RawEntry = Vec<u8>;

/// Entries decoded from one shard plus the count of malformed ones
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanOutcome {
    pub entries: Vec<Entry>,
    pub skipped: u64,
}

/// Encoding of a shard file
pub trait ShardCodec: std::fmt::Debug + Send + Sync {
    /// Which configured codec this is
    fn kind(&self) -> CodecKind;

    /// Whether new entries can be appended to the end of an existing file.
    ///
    /// When true, `write_raw` output for consecutive slices concatenates
    /// into a valid shard. When false, every append rewrites the file.
    fn appends_in_place(&self) -> bool;

    /// Serialize one entry
    fn encode_entry(&self, entry: &Entry) -> RawEntry;

    /// Decode one raw entry; `None` when it does not have the entry shape
    fn decode_entry(&self, raw: &[u8]) -> Option<Entry>;

    /// Feed raw entries to `visit` in file order until it breaks.
    ///
    /// `path` only labels errors.
    fn scan(
        &self,
        path: &Path,
        reader: &mut dyn BufRead,
        visit: &mut dyn FnMut(RawEntry) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Write `raw` as a shard file body
    fn write_raw(&self, raw: &[RawEntry], writer: &mut dyn Write) -> Result<()>;

    /// Extension of shard files using this codec
    fn extension(&self) -> &'static str {
        self.kind().extension()
    }
}

/// Instantiate the codec for a configured kind
pub fn codec_for(kind: CodecKind) -> Box<dyn ShardCodec> {
    match kind {
        CodecKind::Delimited { delimiter } => Box::new(DelimitedCodec::new(delimiter)),
        CodecKind::StructuredList => Box::new(StructuredListCodec),
    }
}

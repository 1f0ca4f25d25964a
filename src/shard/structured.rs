//! Structured-list codec
//!
//! The shard file is a single JSON array of `{"key": ..., "value": ...}`
//! objects. Appending means reading, decoding and rewriting the whole
//! array, so each write costs O(shard size). It is the weaker strategy and
//! only worth picking for small indexes or low ingestion volume.
//!
//! Raw entries are array elements in compact JSON with sorted object keys.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;

use serde_json::Value;

use crate::config::CodecKind;
use crate::error::{HashdexError, Result};

use super::{Entry, RawEntry, ShardCodec};

/// Whole-file JSON array codec
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredListCodec;

impl ShardCodec for StructuredListCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::StructuredList
    }

    fn appends_in_place(&self) -> bool {
        false
    }

    fn encode_entry(&self, entry: &Entry) -> RawEntry {
        serde_json::json!({ "key": entry.key, "value": entry.value })
            .to_string()
            .into_bytes()
    }

    fn decode_entry(&self, raw: &[u8]) -> Option<Entry> {
        serde_json::from_slice(raw).ok()
    }

    fn scan(
        &self,
        path: &Path,
        reader: &mut dyn BufRead,
        visit: &mut dyn FnMut(RawEntry) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut body = Vec::new();
        reader.read_to_end(&mut body)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let corrupt = |reason: String| HashdexError::CorruptShard {
            path: path.to_path_buf(),
            reason,
        };
        let items = match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Array(items)) => items,
            Ok(_) => return Err(corrupt("top level is not an array".to_string())),
            Err(e) => return Err(corrupt(e.to_string())),
        };

        for item in items {
            if visit(item.to_string().into_bytes()).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn write_raw(&self, raw: &[RawEntry], writer: &mut dyn Write) -> Result<()> {
        writer.write_all(b"[")?;
        for (i, element) in raw.iter().enumerate() {
            if i > 0 {
                writer.write_all(b",")?;
            }
            writer.write_all(b"\n  ")?;
            writer.write_all(element)?;
        }
        if !raw.is_empty() {
            writer.write_all(b"\n")?;
        }
        writer.write_all(b"]\n")?;
        Ok(())
    }
}

//! Delimited-row codec
//!
//! Each entry is one line: `<key><delimiter><value>\n`.
//!
//! Known limitation: neither the delimiter nor newlines are escaped. A key
//! or value containing either one corrupts entry boundaries, and the row is
//! later skipped by searches. Pick a delimiter that never occurs in the
//! data.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;

use crate::config::CodecKind;
use crate::error::Result;

use super::{Entry, RawEntry, ShardCodec};

/// Append-only line codec
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    delimiter: char,
}

impl DelimitedCodec {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Whether writing `entry` would produce a row that cannot be split
    /// back into the same key and value
    pub fn is_ambiguous(&self, entry: &Entry) -> bool {
        let bad = |s: &str| s.contains(self.delimiter) || s.contains('\n');
        bad(&entry.key) || bad(&entry.value)
    }
}

impl ShardCodec for DelimitedCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Delimited {
            delimiter: self.delimiter,
        }
    }

    fn appends_in_place(&self) -> bool {
        true
    }

    fn encode_entry(&self, entry: &Entry) -> RawEntry {
        format!("{}{}{}", entry.key, self.delimiter, entry.value).into_bytes()
    }

    fn decode_entry(&self, raw: &[u8]) -> Option<Entry> {
        let line = std::str::from_utf8(raw).ok()?;
        let mut fields = line.split(self.delimiter);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(value), None) => Some(Entry::new(key, value)),
            _ => None,
        }
    }

    fn scan(
        &self,
        _path: &Path,
        reader: &mut dyn BufRead,
        visit: &mut dyn FnMut(RawEntry) -> ControlFlow<()>,
    ) -> Result<()> {
        loop {
            let mut line = Vec::new();
            if reader.read_until(b'\n', &mut line)? == 0 {
                return Ok(());
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }
            if visit(line).is_break() {
                return Ok(());
            }
        }
    }

    fn write_raw(&self, raw: &[RawEntry], writer: &mut dyn Write) -> Result<()> {
        for row in raw {
            writer.write_all(row)?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}

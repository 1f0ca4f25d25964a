//! Record Sources
//!
//! The ingestion pipeline consumes records page by page from anything that
//! implements [`RecordSource`]. An empty page ends the stream.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use serde_json::{Map, Value};

use crate::error::{HashdexError, Result};

/// One source document: field name → JSON value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Wrap an existing JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from string pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), Value::String(v.into())))
            .collect();
        Self { fields }
    }

    /// Text of a field, or `None` when it is missing or null.
    ///
    /// Strings come back verbatim; every other value is rendered as
    /// compact JSON (`42`, `true`, `["a","b"]`).
    pub fn field(&self, name: &str) -> Option<Cow<'_, str>> {
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Number of fields in the record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// A paginated stream of records
pub trait RecordSource {
    /// Fetch up to `limit` records. An empty page means end of stream.
    fn next_page(&mut self, limit: usize) -> Result<Vec<Record>>;
}

/// Records held in memory, handed out in pages
#[derive(Debug, Default)]
pub struct MemorySource {
    records: VecDeque<Record>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    /// Records not yet handed out
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for MemorySource {
    fn next_page(&mut self, limit: usize) -> Result<Vec<Record>> {
        let take = limit.min(self.records.len());
        Ok(self.records.drain(..take).collect())
    }
}

/// Newline-delimited JSON objects read from any buffered reader
pub struct JsonLinesSource<R: BufRead> {
    reader: R,
    line_no: u64,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Lines consumed so far, blank lines included
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            if let Some(record) = parse_line(self.line_no, &self.buf)? {
                return Ok(Some(record));
            }
        }
    }
}

impl<R: BufRead> RecordSource for JsonLinesSource<R> {
    fn next_page(&mut self, limit: usize) -> Result<Vec<Record>> {
        let mut page = Vec::with_capacity(limit.min(1024));
        while page.len() < limit {
            match self.next_record()? {
                Some(record) => page.push(record),
                None => break,
            }
        }
        Ok(page)
    }
}

/// Newline-delimited JSON read on a background thread.
///
/// The reading thread forwards raw lines over a bounded channel while
/// `next_page` waits on it in short slices, checking the cancel flag in
/// between. A read that blocks (an idle pipe, a terminal) therefore never
/// hides cancellation: the page ends early and the pipeline stops at the
/// page boundary.
pub struct BackgroundLinesSource {
    lines: Receiver<io::Result<String>>,
    cancel: Arc<AtomicBool>,
    poll_interval: Duration,
    line_no: u64,
}

impl BackgroundLinesSource {
    /// Lines buffered between the reading thread and the pipeline
    const CHANNEL_CAPACITY: usize = 1024;

    /// Start reading `reader` on its own thread
    pub fn spawn<R>(reader: R, cancel: Arc<AtomicBool>) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = channel::bounded(Self::CHANNEL_CAPACITY);
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        Self {
            lines: rx,
            cancel,
            poll_interval: Duration::from_millis(100),
            line_no: 0,
        }
    }

    /// How long `next_page` waits for a line before rechecking the flag
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Lines consumed so far, blank lines included
    pub fn lines_read(&self) -> u64 {
        self.line_no
    }
}

impl RecordSource for BackgroundLinesSource {
    fn next_page(&mut self, limit: usize) -> Result<Vec<Record>> {
        let mut page = Vec::with_capacity(limit.min(1024));
        while page.len() < limit && !self.cancel.load(Ordering::Relaxed) {
            let line = match self.lines.recv_timeout(self.poll_interval) {
                Ok(line) => line?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.line_no += 1;
            if let Some(record) = parse_line(self.line_no, &line)? {
                page.push(record);
            }
        }
        Ok(page)
    }
}

/// Parse one NDJSON line; blank lines yield `None`
fn parse_line(line_no: u64, line: &str) -> Result<Option<Record>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(fields)) => Ok(Some(Record::new(fields))),
        Ok(_) => Err(HashdexError::Source(format!(
            "line {}: expected a JSON object",
            line_no
        ))),
        Err(e) => Err(HashdexError::Source(format!("line {}: {}", line_no, e))),
    }
}

//! Search Engine
//!
//! Answers "which values were stored for key X". A query digests the key,
//! loads the one shard it routes to and keeps entries whose key equals the
//! query byte for byte.
//!
//! Queries share no state. A missing shard file is not an error; it simply
//! means there are no matches.

use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{HashdexError, Result};
use crate::shard::ShardStore;

/// Values matched by one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matches {
    /// No entry carried the key
    None,
    /// First match in file order (earliest ingested)
    One(String),
    /// Distinct matches in first-seen order
    Many(Vec<String>),
}

impl Matches {
    pub fn is_empty(&self) -> bool {
        matches!(self, Matches::None)
    }

    /// Number of matched values
    pub fn len(&self) -> usize {
        match self {
            Matches::None => 0,
            Matches::One(_) => 1,
            Matches::Many(vs) => vs.len(),
        }
    }

    /// Matched values in result order
    pub fn values(&self) -> Vec<&str> {
        match self {
            Matches::None => Vec::new(),
            Matches::One(v) => vec![v.as_str()],
            Matches::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Result of one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub key: String,
    pub matches: Matches,
    /// Malformed entries passed over in the scanned shard
    pub skipped: u64,
}

impl QueryResult {
    /// Output record: `{key_field: key, value_field: value-or-list}`.
    /// The value field is left out when nothing matched.
    pub fn to_json(&self, key_field: &str, value_field: &str) -> Value {
        let mut record = Map::new();
        record.insert(key_field.to_string(), Value::String(self.key.clone()));
        match &self.matches {
            Matches::None => {}
            Matches::One(v) => {
                record.insert(value_field.to_string(), Value::String(v.clone()));
            }
            Matches::Many(vs) => {
                let list = vs.iter().cloned().map(Value::String).collect();
                record.insert(value_field.to_string(), Value::Array(list));
            }
        }
        Value::Object(record)
    }
}

/// Point lookups against a populated index
pub struct SearchEngine {
    config: Config,
    store: ShardStore,
}

impl SearchEngine {
    /// Open the index described by `config`.
    ///
    /// Fails with `MissingIndex` when the index directory does not exist.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        if !config.index_dir.is_dir() {
            return Err(HashdexError::MissingIndex(config.index_dir.clone()));
        }
        let store = ShardStore::new(&config);
        Ok(Self { config, store })
    }

    /// Look up `query`; with `exactly_one`, stop at the first match
    pub fn search(&self, query: &str, exactly_one: bool) -> Result<QueryResult> {
        let shard = self.store.router().route(query);

        let mut first = None;
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        let skipped = self.store.scan(&shard, |entry| {
            if entry.key != query {
                return ControlFlow::Continue(());
            }
            if exactly_one {
                first = Some(entry.value);
                return ControlFlow::Break(());
            }
            if seen.insert(entry.value.clone()) {
                distinct.push(entry.value);
            }
            ControlFlow::Continue(())
        })?;

        let matches = match (first, distinct.is_empty()) {
            (Some(value), _) => Matches::One(value),
            (None, false) => Matches::Many(distinct),
            (None, true) => Matches::None,
        };
        debug!(shard = %shard, hits = matches.len(), "Query resolved");

        Ok(QueryResult {
            key: query.to_string(),
            matches,
            skipped,
        })
    }

    /// All distinct values stored for `query`
    pub fn search_all(&self, query: &str) -> Result<QueryResult> {
        self.search(query, false)
    }

    /// The earliest-ingested value stored for `query`
    pub fn search_first(&self, query: &str) -> Result<QueryResult> {
        self.search(query, true)
    }

    /// Resolve one query per input line and write one JSON record per query.
    ///
    /// A query whose shard is corrupt is answered without a value and the
    /// stream carries on. Returns the number of queries answered.
    pub fn search_lines<R, W>(&self, input: R, mut output: W, exactly_one: bool) -> Result<u64>
    where
        R: BufRead,
        W: Write,
    {
        let mut answered = 0;
        for line in input.lines() {
            let query = line?;
            let result = match self.search(&query, exactly_one) {
                Ok(result) => result,
                Err(HashdexError::CorruptShard { path, reason }) => {
                    warn!(path = %path.display(), %reason, "Unreadable shard, answering without a value");
                    QueryResult {
                        key: query,
                        matches: Matches::None,
                        skipped: 0,
                    }
                }
                Err(e) => return Err(e),
            };
            let record = result.to_json(&self.config.key_field, &self.config.value_field);
            serde_json::to_writer_pretty(&mut output, &record)?;
            output.write_all(b"\n")?;
            output.flush()?;
            answered += 1;
        }
        Ok(answered)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

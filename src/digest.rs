//! Digest Function
//!
//! Deterministic one-way hashing of key strings into fixed-length lowercase
//! hex. The same algorithm hashes keys for routing and raw entries for
//! compaction.
//!
//! The algorithm is picked once per index. Data written under one algorithm
//! is unreachable under another, and nothing on disk records which one was
//! used.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::{HashdexError, Result};

/// Supported one-way hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    /// 128-bit, 32 hex characters
    Md5,
    /// 160-bit, 40 hex characters
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// All supported algorithms
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    /// Canonical lowercase name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the hex string produced by `digest`
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha224 => 56,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Hash `data` and return the lowercase hex digest
    pub fn digest(&self, data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        match self {
            HashAlgorithm::Md5 => hex_digest::<Md5>(data),
            HashAlgorithm::Sha1 => hex_digest::<Sha1>(data),
            HashAlgorithm::Sha224 => hex_digest::<Sha224>(data),
            HashAlgorithm::Sha256 => hex_digest::<Sha256>(data),
            HashAlgorithm::Sha384 => hex_digest::<Sha384>(data),
            HashAlgorithm::Sha512 => hex_digest::<Sha512>(data),
        }
    }
}

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    hex::encode(D::digest(data))
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Md5
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashdexError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "");
        HashAlgorithm::ALL
            .into_iter()
            .find(|algo| algo.name() == wanted)
            .ok_or_else(|| HashdexError::UnsupportedAlgorithm(s.to_string()))
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = HashdexError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(algo: HashAlgorithm) -> Self {
        algo.name().to_string()
    }
}

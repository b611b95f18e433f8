//! Domain layer for the content store
//!
//! Blobs are immutable and addressed by the SHA-256 digest of their bytes,
//! so writing the same bytes twice yields the same key and one entry.
//!
//! # Domain Models
//!
//! - `ContentKey`: lowercase hex SHA-256 digest
//! - `BlobKind`: what a blob encodes (state, predicate, term, type)
//! - `StoredBlob`: bytes plus kind and insertion time
//!
//! # Port Trait
//!
//! - `ContentStore`: put/get/contains/remove over content keys
//!
//! # Examples
//!
//! ```rust
//! use symstate_storage::{BlobKind, ContentStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let key = store.put(BlobKind::State, b"state bytes").unwrap();
//! assert!(store.contains(&key).unwrap());
//! assert_eq!(store.get(&key).unwrap().unwrap().bytes, b"state bytes");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{Result, StorageError};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// SHA-256 content address, 64 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentKey(String);

impl ContentKey {
    /// Key of `bytes`
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(64);
        for b in digest.iter() {
            hex.push_str(&format!("{:02x}", b));
        }
        ContentKey(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `bytes` hash to this key
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::of(bytes) == *self
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        let well_formed = s.len() == 64
            && s.bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(ContentKey(s.to_string()))
        } else {
            Err(StorageError::invalid_key(s))
        }
    }
}

impl TryFrom<String> for ContentKey {
    type Error = StorageError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ContentKey> for String {
    fn from(key: ContentKey) -> String {
        key.0
    }
}

/// What a stored blob encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobKind {
    State,
    Predicate,
    Term,
    Type,
}

impl BlobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKind::State => "state",
            BlobKind::Predicate => "predicate",
            BlobKind::Term => "term",
            BlobKind::Type => "type",
        }
    }
}

impl FromStr for BlobKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "state" => Ok(BlobKind::State),
            "predicate" => Ok(BlobKind::Predicate),
            "term" => Ok(BlobKind::Term),
            "type" => Ok(BlobKind::Type),
            other => Err(StorageError::corrupt(format!("unknown blob kind: {}", other))),
        }
    }
}

/// Immutable stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub key: ContentKey,
    pub kind: BlobKind,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl StoredBlob {
    pub fn new(kind: BlobKind, bytes: Vec<u8>) -> Self {
        Self {
            key: ContentKey::of(&bytes),
            kind,
            bytes,
            created_at: Utc::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait
// ═══════════════════════════════════════════════════════════════════════════

/// Content-addressed blob store
///
/// Implementations are shared across analysis threads, so every method
/// takes `&self`.
pub trait ContentStore: Send + Sync {
    /// Stores `bytes` and returns their key. Storing bytes that are already
    /// present keeps the existing entry.
    fn put(&self, kind: BlobKind, bytes: &[u8]) -> Result<ContentKey>;

    fn get(&self, key: &ContentKey) -> Result<Option<StoredBlob>>;

    fn contains(&self, key: &ContentKey) -> Result<bool>;

    /// Returns whether an entry was removed
    fn remove(&self, key: &ContentKey) -> Result<bool>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Like `get`, but a missing key is an error and the bytes are verified
    fn fetch(&self, key: &ContentKey) -> Result<StoredBlob> {
        let blob = self
            .get(key)?
            .ok_or_else(|| StorageError::not_found(key))?;
        if !key.matches(&blob.bytes) {
            return Err(StorageError::integrity(key));
        }
        Ok(blob)
    }
}

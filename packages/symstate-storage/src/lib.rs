//! Content-addressed persistence for serialized analysis artifacts
//!
//! Predicate states, predicates, terms and types are persisted as opaque
//! byte blobs keyed by the SHA-256 digest of those bytes. The engine owns
//! the wire format; this crate only stores and verifies bytes.
//!
//! ## Usage
//!
//! ```rust
//! use symstate_storage::{BlobKind, ContentKey, ContentStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let key = store.put(BlobKind::State, b"encoded state").unwrap();
//! assert_eq!(key, ContentKey::of(b"encoded state"));
//! let blob = store.fetch(&key).unwrap();
//! assert_eq!(blob.bytes, b"encoded state");
//! ```
//!
//! With the `sqlite` feature (default), `SqliteStore` keeps blobs in a
//! single-table database file.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{BlobKind, ContentKey, ContentStore, StoredBlob};
pub use infrastructure::MemoryStore;

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteStore;

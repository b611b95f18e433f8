//! In-memory content store

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::domain::{BlobKind, ContentKey, ContentStore, StoredBlob};
use crate::Result;

/// `HashMap` behind a read-write lock; contents die with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<ContentKey, StoredBlob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored bytes
    pub fn total_size(&self) -> usize {
        self.blobs.read().values().map(StoredBlob::size).sum()
    }

    pub fn keys(&self) -> Vec<ContentKey> {
        let mut keys: Vec<ContentKey> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl ContentStore for MemoryStore {
    fn put(&self, kind: BlobKind, bytes: &[u8]) -> Result<ContentKey> {
        let key = ContentKey::of(bytes);
        self.blobs
            .write()
            .entry(key.clone())
            .or_insert_with(|| StoredBlob::new(kind, bytes.to_vec()));
        Ok(key)
    }

    fn get(&self, key: &ContentKey) -> Result<Option<StoredBlob>> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn contains(&self, key: &ContentKey) -> Result<bool> {
        Ok(self.blobs.read().contains_key(key))
    }

    fn remove(&self, key: &ContentKey) -> Result<bool> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.blobs.read().len())
    }
}

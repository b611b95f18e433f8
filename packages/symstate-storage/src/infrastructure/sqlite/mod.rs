//! SQLite content store
//!
//! One table of immutable blobs keyed by content hash. Timestamps are
//! stored as Unix milliseconds.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::domain::{BlobKind, ContentKey, ContentStore, StoredBlob};
use crate::{Result, StorageError};

/// SQLite-backed `ContentStore`
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at `db_path`
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// In-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                content_key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                bytes BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_blobs_kind ON blobs(kind)",
            [],
        )?;
        Ok(())
    }

    /// Keys of every blob of `kind`, sorted
    pub fn keys_of_kind(&self, kind: BlobKind) -> Result<Vec<ContentKey>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT content_key FROM blobs WHERE kind = ?1 ORDER BY content_key")?;
        let rows = stmt.query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?.parse()?);
        }
        Ok(keys)
    }
}

impl ContentStore for SqliteStore {
    fn put(&self, kind: BlobKind, bytes: &[u8]) -> Result<ContentKey> {
        let blob = StoredBlob::new(kind, bytes.to_vec());
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO blobs (content_key, kind, bytes, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                blob.key.as_str(),
                kind.as_str(),
                &blob.bytes,
                blob.created_at.timestamp_millis()
            ],
        )?;
        Ok(blob.key)
    }

    fn get(&self, key: &ContentKey) -> Result<Option<StoredBlob>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT kind, bytes, created_at FROM blobs WHERE content_key = ?1",
                params![key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((kind, bytes, millis)) = row else {
            return Ok(None);
        };
        let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::database(format!("Bad timestamp {} for {}", millis, key)))?;
        Ok(Some(StoredBlob {
            key: key.clone(),
            kind: kind.parse()?,
            bytes,
            created_at,
        }))
    }

    fn contains(&self, key: &ContentKey) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM blobs WHERE content_key = ?1",
                params![key.as_str()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn remove(&self, key: &ContentKey) -> Result<bool> {
        let conn = self.conn.lock();
        let n = conn.execute(
            "DELETE FROM blobs WHERE content_key = ?1",
            params![key.as_str()],
        )?;
        Ok(n > 0)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

//! Error types for symstate-storage

use std::fmt;
use thiserror::Error;

/// What went wrong, independent of the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// SQLite failure
    Database,
    /// A stored row or tag cannot be interpreted
    Corrupt,
    /// No blob under the requested key
    NotFound,
    /// Stored bytes do not hash to their key
    Integrity,
    /// Malformed content key
    InvalidKey,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Corrupt => "corrupt",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Integrity => "integrity",
            ErrorKind::InvalidKey => "invalid_key",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage error: a kind, a message and an optional cause
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corrupt, message)
    }

    pub fn not_found(key: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("No blob stored under {}", key))
    }

    pub fn integrity(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::Integrity,
            format!("Stored bytes do not match key {}", key),
        )
    }

    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::InvalidKey,
            format!("Not a SHA-256 hex digest: {}", key.into()),
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

//! Error types for symstate-engine
//!
//! Provides unified error handling across the crate. Expected analysis
//! outcomes (missing states, solver verdicts, ill-typed terms) are values,
//! not errors; `EngineError` is reserved for conditions that abort a pass.

use crate::config::ConfigError;
use crate::features::serialization::WireError;
use symstate_storage::StorageError;
use thiserror::Error;

/// Main error type for symstate-engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Broken internal invariant: aborts the running pass
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Wire schema error
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Persistence side-channel error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        EngineError::Invariant(msg.into())
    }

    /// Whether the error came from a broken invariant rather than the environment
    pub fn is_invariant(&self) -> bool {
        matches!(self, EngineError::Invariant(_))
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Bail out of the current pass with an invariant violation.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            let msg = format!($($arg)+);
            tracing::warn!(target: "symstate::invariant", "{}", msg);
            return Err($crate::errors::EngineError::Invariant(msg));
        }
    };
}

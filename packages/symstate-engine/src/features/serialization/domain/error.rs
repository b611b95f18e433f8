//! Wire errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    /// The declared extension id does not match the populated extension
    #[error("{node} envelope declares extension {declared} but carries {found}")]
    ExtensionMismatch {
        node: &'static str,
        declared: u32,
        found: u32,
    },

    #[error("unsupported wire version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    /// Stored blob holds a different node family
    #[error("expected a {expected} blob, found {found}")]
    BlobKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack encode: {0}")]
    MessagePackEncode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decode: {0}")]
    MessagePackDecode(#[from] rmp_serde::decode::Error),
}

impl WireError {
    pub fn mismatch(node: &'static str, declared: u32, found: u32) -> Self {
        WireError::ExtensionMismatch {
            node,
            declared,
            found,
        }
    }
}

pub type WireResult<T> = std::result::Result<T, WireError>;

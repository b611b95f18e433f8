//! Envelope codec and byte formats

pub mod codec;
pub mod format;

pub use codec::{WireDecoder, WireEncoder};
pub use format::{deserialize, from_document, serialize, to_document, WireFormat, WireNode};

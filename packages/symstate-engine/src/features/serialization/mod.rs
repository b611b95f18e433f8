//! Serialization
//!
//! Field-tagged wire schema for Types, Terms, Predicates and
//! PredicateStates, plus the content-addressed persistence side-channel.
//!
//! ```text
//! serialization
//! ├── domain/           # envelopes, extension ids, WireError
//! ├── infrastructure/   # WireEncoder / WireDecoder, JSON and MessagePack
//! └── application/      # persist / load through a ContentStore
//! ```
//!
//! ## Usage
//!
//! ```text
//! let bytes = serialize(&nest, &state, WireFormat::Json)?;
//! let back: PredicateState = deserialize(&mut other_nest, &bytes, WireFormat::Json)?;
//!
//! let key = persist_state(&store, &nest, &state)?;
//! let again = load_state(&store, &mut other_nest, &key)?;
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{load, load_state, persist, persist_state};
pub use domain::{WireDocument, WireError, WireResult, WIRE_VERSION};
pub use infrastructure::{deserialize, serialize, WireDecoder, WireEncoder, WireFormat, WireNode};

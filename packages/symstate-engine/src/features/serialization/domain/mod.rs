//! Wire schema and its errors

pub mod error;
pub mod schema;

pub use error::{WireError, WireResult};
pub use schema::{
    PredicateEnvelope, PredicateExt, RecordEnvelope, StateEnvelope, StateExt, TermEnvelope,
    TermExt, TypeEnvelope, TypeExt, WireDocument, WIRE_VERSION,
};

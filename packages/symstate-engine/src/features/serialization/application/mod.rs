//! Persistence use cases

mod persistence;

pub use persistence::{load, load_state, persist, persist_state};

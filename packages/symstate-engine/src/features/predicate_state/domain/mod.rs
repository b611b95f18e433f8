//! PredicateState tree and builder

pub mod builder;
pub mod state;

pub use builder::PredicateStateBuilder;
pub use state::{PredicateState, StateNode};

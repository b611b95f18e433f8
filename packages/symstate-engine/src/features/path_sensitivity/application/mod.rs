//! Path-sensitivity Application Layer (UseCase)
//!
//! Drivers pick an algorithm from the configuration here instead of naming
//! the infrastructure types directly.
//!
//! # Key UseCases
//! - `analysis_for`: configured `PredicateStateAnalysis`
//! - `analyze_function`: run it over one function and collect every state

mod psa_usecase;

pub use psa_usecase::{analysis_for, analyze_function, FunctionStates};

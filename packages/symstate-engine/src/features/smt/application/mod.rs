//! SMT Application Layer (UseCase)
//!
//! # Key UseCases
//! - `Solver`: violation / path checks, interpolants, summaries, contracts
//! - `SolverOracle`: solver-backed `ReachabilityOracle`
//! - `EncodingCache`: state encodings shared across solvers

mod cache;
mod interpolation;
mod oracle;
mod probe;
mod solver;

pub use cache::{CacheKey, EncodedState, EncodingCache};
pub use interpolation::{Interpolation, Interpolator};
pub use oracle::SolverOracle;
pub use probe::{ProbedModel, Prober};
pub use solver::{Interpolant, Solver};

//! SMT layer
//!
//! Predicate states are encoded into a hash-consed expression DAG and
//! discharged to a pluggable backend.
//!
//! ```text
//! smt
//! ├── domain/              # ExprContext, typed values, MemArray, SmtResult
//! ├── infrastructure/      # ExprFactory, ExecutionContext, Encoder, Unlogic
//! │   └── solvers/         # SmtBackend port, builtin (bit-blasting) and z3
//! └── application/         # Solver, interpolation, probing, cache, oracle
//! ```
//!
//! ## Usage
//!
//! ```text
//! let solver = Solver::new(&config.smt, memory_start, memory_end);
//! match solver.is_violated(&nest, &query, &state) {
//!     SmtResult::Unsat => { /* holds */ }
//!     SmtResult::Sat(cex) => { /* violated, cex.model has the witness */ }
//!     SmtResult::Unknown(reason) => { /* undecided */ }
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{EncodingCache, Interpolant, Solver, SolverOracle};
pub use domain::{ExprContext, ExprId, MemoryShape, ModelValue, SatResult, SmtResult};
pub use infrastructure::{backend_for, CheckOutcome, SmtBackend};

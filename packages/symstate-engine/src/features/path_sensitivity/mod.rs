//! Path sensitivity
//!
//! Folds the predicate maps of a function into one `PredicateState` per
//! instruction. Three algorithms trade precision for size:
//!
//! - `OneForOne`: every acyclic path kept apart, merged per instruction
//!   into a Choice at the end (exponential in path count)
//! - `OneForAll`: one state per block, predecessors merged once at the
//!   immediate dominator
//! - `OneForAllTd`: one function-wide state built top-down over the
//!   post-dominator tree; instruction states are cropped out on demand
//!
//! ```text
//! path_sensitivity
//! ├── ports/            # PredicateStateAnalysis, ReachabilityOracle
//! ├── domain/           # PsaInputs
//! ├── infrastructure/   # the three algorithms + shared helpers
//! └── application/      # analysis_for(config)
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{analysis_for, analyze_function, FunctionStates};
pub use domain::PsaInputs;
pub use infrastructure::{OneForAll, OneForAllTd, OneForOne, StructuralOracle};
pub use ports::{PredicateStateAnalysis, ReachabilityOracle};

//! IR Ports - Interface Layer
//!
//! What the path-sensitivity algorithms consume from the outside world:
//! predicate maps produced by predicate analyses over the IR, and function
//! summaries managed across the module.
//!
//! ## Usage
//! ```rust,ignore
//! use symstate_engine::features::ir::ports::{FunctionManager, PredicateAnalysis};
//!
//! fn effects<A: PredicateAnalysis>(analysis: &A, inst: InstId) -> &[PredicateId] {
//!     analysis.instruction_predicates(inst)
//! }
//! ```

pub mod function_manager;
pub mod predicate_analysis;

pub use function_manager::{FunctionManager, InMemoryFunctionManager, SummaryKind, MEMORY_SPAN};
pub use predicate_analysis::{PredicateAnalysis, PredicateMaps};

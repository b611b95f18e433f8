//! IR input model
//!
//! The slice of a compiled function the path-sensitivity algorithms need:
//! blocks, instructions with their source loci, terminator successors and
//! call sites. IR ingestion itself lives outside this crate; drivers and
//! tests assemble functions with `FunctionBuilder`.
//!
//! ```text
//! ir
//! ├── domain/
//! │   └── function        # Function / BasicBlock / Instruction, builder
//! ├── ports/
//! │   ├── predicate_analysis   # per-instruction / edge / phi predicate maps
//! │   └── function_manager     # REQUIRES / BODY / ENSURES per function
//! └── infrastructure/
//!     └── graph           # petgraph CFG, dominators, topological order
//! ```

pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use domain::{BasicBlock, Function, FunctionArgument, FunctionBuilder, InstKind, Instruction};
pub use infrastructure::{CfgGraph, DominatorTree, TopologicalSorter};
pub use ports::{
    FunctionManager, InMemoryFunctionManager, PredicateAnalysis, PredicateMaps, SummaryKind,
};

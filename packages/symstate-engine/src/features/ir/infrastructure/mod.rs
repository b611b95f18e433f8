//! Graph utilities over the IR

pub mod graph;

pub use graph::{CfgGraph, DominatorTree, TopologicalSorter};

//! Common test utilities for symstate-engine
//!
//! Shared CFG fixtures, builders and assertions for the integration tests
//! and the benchmarks.

#![allow(dead_code)]

pub mod assertions;
pub mod builders;
pub mod fixtures;

// Re-export all utilities
pub use assertions::*;
pub use builders::*;
pub use fixtures::*;

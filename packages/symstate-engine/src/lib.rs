/*
 * symstate - path-sensitive symbolic state engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Locus, ids)
 * - features/    : Vertical slices (term algebra → predicate state → path sensitivity → smt)
 * - config/      : Explicit analysis configuration
 *
 * Data flow:
 * - External predicate analyses produce Predicate maps over an IR function
 * - Path-sensitivity algorithms fold them into per-instruction PredicateStates
 * - The SMT layer encodes states and queries and discharges them to a backend
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Encoders thread factory + context + config
#![allow(clippy::type_complexity)] // Memo tables keyed by tuples
#![allow(clippy::new_without_default)] // Default impl not always meaningful
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::upper_case_acronyms)] // PATH, STATE, CNF naming
#![allow(clippy::should_implement_trait)] // Operator-like helpers on SMT values

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and utilities
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{AnalysisConfig, Preset};
pub use errors::{EngineError, Result};
pub use features::path_sensitivity::{analysis_for, PredicateStateAnalysis};
pub use features::predicate_state::{PredicateState, PredicateStateBuilder};
pub use features::serialization::{load_state, persist_state, WireFormat};
pub use features::smt::{SmtResult, Solver};
pub use features::term_algebra::{FactoryNest, PredicateId, TermId, TypeId};
pub use shared::models::Locus;

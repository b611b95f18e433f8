//! Term / Predicate / Type algebra
//!
//! Immutable typed nodes interned in per-analysis arenas.
//!
//! ## Architecture
//!
//! ```text
//! term_algebra
//! ├── domain/               # Node definitions
//! │   ├── types             # Type lattice
//! │   ├── ops               # Arithmetic / comparison opcodes
//! │   ├── term              # Term kinds
//! │   └── predicate         # Predicate kinds and PredicateType tags
//! └── infrastructure/       # Content-addressed arenas
//!     ├── interner          # insert-or-get by structural hash
//!     ├── type_factory
//!     ├── term_factory
//!     ├── predicate_factory
//!     └── nest              # FactoryNest bundling the three factories
//! ```
//!
//! ## Usage
//!
//! ```text
//! let mut nest = FactoryNest::new();
//! let int = nest.types().integer(32, Signedness::Signed);
//! let x = nest.terms().value(int, "x");
//! let one = nest.terms().int(1, 32, Signedness::Signed);
//! let sum = nest.terms().binary(ArithType::Add, x, one);
//! let p = nest.predicates().equality(x, sum, Locus::unknown(), PredicateType::State);
//! ```
//!
//! Handles are `Copy` and only meaningful for the nest that produced them.
//! Creating the same node twice returns the same handle.

pub mod domain;
pub mod infrastructure;

pub use domain::{
    ArgumentKind, ArithType, ConditionType, Predicate, PredicateKind, PredicateType, Signedness,
    Term, TermKind, Type, UnaryArithType,
};
pub use infrastructure::{
    FactoryNest, PredicateFactory, PredicateId, TermFactory, TermId, TypeFactory, TypeId,
};

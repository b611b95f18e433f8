//! Node definitions for the term algebra

pub mod handles;
pub mod ops;
pub mod predicate;
pub mod term;
pub mod types;

pub use handles::{PredicateId, TermId, TypeId};
pub use ops::{ArithType, ConditionType, UnaryArithType};
pub use predicate::{Predicate, PredicateKind, PredicateType};
pub use term::{ArgumentKind, Term, TermKind};
pub use types::{Signedness, Type};

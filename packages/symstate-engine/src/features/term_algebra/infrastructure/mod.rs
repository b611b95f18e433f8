//! Content-addressed arenas and the factories built on them

pub mod interner;
pub mod nest;
pub mod predicate_factory;
pub mod term_factory;
pub mod type_factory;

pub use crate::features::term_algebra::domain::{PredicateId, TermId, TypeId};
pub use nest::FactoryNest;
pub use predicate_factory::PredicateFactory;
pub use term_factory::TermFactory;
pub use type_factory::TypeFactory;

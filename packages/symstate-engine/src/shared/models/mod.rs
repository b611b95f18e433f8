//! Common models
//!
//! - `Locus`: source position attached to predicates and instructions
//! - block / instruction identifiers used by the IR input model

pub mod ids;
pub mod locus;

pub use ids::{BlockId, InstId};
pub use locus::{Locus, Loci};

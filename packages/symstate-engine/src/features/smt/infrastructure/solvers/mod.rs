//! Solver backends
//!
//! A backend opens sessions over an `ExprContext`; a session accumulates
//! assertions and answers satisfiability checks under assumptions.
//!
//! - `builtin`: array elimination + bit-blasting onto an in-crate CDCL solver
//! - `z3_backend`: Z3 through the `z3` cargo feature

pub mod arrays;
pub mod bitblast;
pub mod builtin;
pub mod eval;
pub mod sat;
#[cfg(feature = "z3")]
pub mod z3_backend;

pub use builtin::BuiltinBackend;
pub use eval::{ArrayValue, Model, Value};

use crate::config::{BackendKind, SmtConfig};
use crate::features::smt::domain::expr::{ExprContext, ExprId};
use std::sync::Arc;

/// Answer of one satisfiability check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Sat,
    /// Assumptions that suffice for unsatisfiability
    Unsat(Vec<ExprId>),
    Unknown(String),
}

impl CheckOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, CheckOutcome::Sat)
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, CheckOutcome::Unsat(_))
    }
}

pub trait SmtSession {
    fn assert(&mut self, formula: ExprId);

    /// Check the assertions conjoined with `assumptions`
    fn check(&mut self, assumptions: &[ExprId]) -> CheckOutcome;

    /// Value of `expr` in the model of the last `Sat` check
    fn eval(&self, expr: ExprId) -> Option<Value>;
}

pub trait SmtBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn session<'s>(&'s self, ctx: &'s ExprContext) -> Box<dyn SmtSession + 's>;
}

/// Backend selected by `config`
pub fn backend_for(config: &SmtConfig) -> Arc<dyn SmtBackend> {
    match config.backend {
        BackendKind::Builtin => Arc::new(BuiltinBackend::from_config(config)),
        #[cfg(feature = "z3")]
        BackendKind::Z3 => Arc::new(z3_backend::Z3Backend::from_config(config)),
        #[cfg(not(feature = "z3"))]
        BackendKind::Z3 => {
            tracing::warn!(
                target: "symstate::smt",
                "z3 backend requested without the z3 feature, using builtin"
            );
            Arc::new(BuiltinBackend::from_config(config))
        }
    }
}

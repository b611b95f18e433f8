//! Path-sensitivity ports
//!
//! `PredicateStateAnalysis` is what drivers and checkers program against;
//! `ReachabilityOracle` lets the SMT layer (or a cheaper structural check)
//! prune states that cannot be reached.

use super::domain::PsaInputs;
use crate::errors::Result;
use crate::features::ir::Function;
use crate::features::predicate_state::PredicateState;
use crate::features::term_algebra::FactoryNest;
use crate::shared::models::InstId;
use std::collections::BTreeMap;

/// Per-instruction predicate states of one function
///
/// `run` resets every memo table, so one analysis object can be reused
/// across functions. It is not meant to be shared between threads while
/// running.
pub trait PredicateStateAnalysis {
    /// Algorithm name for logging
    fn name(&self) -> &'static str;

    fn run(
        &mut self,
        nest: &mut FactoryNest,
        function: &Function,
        inputs: &PsaInputs<'_>,
    ) -> Result<()>;

    /// State the function starts in (globals, REQUIRES, argument loci)
    fn initial_state(&self) -> Option<&PredicateState>;

    /// State right after `inst`'s own effects, before any callee effects
    ///
    /// `None` when the instruction was never reached.
    fn instruction_state(&mut self, nest: &mut FactoryNest, inst: InstId)
        -> Option<PredicateState>;

    /// Every known instruction state
    fn states(&mut self, nest: &mut FactoryNest) -> BTreeMap<InstId, PredicateState>;
}

/// Decides whether a state can be dropped as unreachable
pub trait ReachabilityOracle {
    /// `memory` is the `[start, end)` local pointer range of the function
    fn is_unreachable(&self, nest: &FactoryNest, state: &PredicateState, memory: (u64, u64))
        -> bool;
}

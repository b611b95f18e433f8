//! SolverOracle
//!
//! Reachability through the solver: a state is unreachable when its
//! encoding is UNSAT. The structural check runs first and an UNKNOWN
//! answer keeps the state.

use super::cache::EncodingCache;
use super::solver::Solver;
use crate::config::SmtConfig;
use crate::features::path_sensitivity::{ReachabilityOracle, StructuralOracle};
use crate::features::predicate_state::PredicateState;
use crate::features::term_algebra::FactoryNest;
use std::sync::Arc;
use tracing::debug;

pub struct SolverOracle {
    config: SmtConfig,
    cache: Option<Arc<EncodingCache>>,
}

impl SolverOracle {
    pub fn new(config: &SmtConfig) -> Self {
        Self {
            config: config.clone(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<EncodingCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

impl ReachabilityOracle for SolverOracle {
    fn is_unreachable(&self, nest: &FactoryNest, state: &PredicateState, memory: (u64, u64)) -> bool {
        if StructuralOracle.is_unreachable(nest, state, memory) {
            return true;
        }
        let mut solver = Solver::new(&self.config, memory.0, memory.1);
        if let Some(cache) = &self.cache {
            solver = solver.with_cache(Arc::clone(cache));
        }
        let res = solver.is_path_impossible(nest, &PredicateState::empty(), state);
        if let Some(reason) = res.unknown_reason() {
            debug!(target: "symstate::smt", %reason, "reachability unknown, keeping state");
        }
        res.is_unsat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::{ConditionType, Signedness};
    use crate::shared::models::Locus;

    #[test]
    fn test_contradicting_paths_are_unreachable() {
        let mut nest = FactoryNest::new();
        let int = nest.types().default_integer();
        let x = nest.terms().value(int, "x");
        let zero = nest.terms().int(0, 32, Signedness::Signed);
        let gt = nest.terms().cmp(ConditionType::Gt, x, zero);
        let lt = nest.terms().cmp(ConditionType::Lt, x, zero);
        let p1 = nest.predicates().boolean(gt, true, Locus::unknown());
        let p2 = nest.predicates().boolean(lt, true, Locus::unknown());

        let oracle = SolverOracle::new(&SmtConfig::default());
        let dead = PredicateState::basic(vec![p1, p2]);
        let live = PredicateState::basic(vec![p1]);
        assert!(oracle.is_unreachable(&nest, &dead, (1 << 24, 2 << 24)));
        assert!(!oracle.is_unreachable(&nest, &live, (1 << 24, 2 << 24)));
    }
}

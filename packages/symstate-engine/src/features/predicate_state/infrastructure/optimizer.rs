//! StateOptimizer
//!
//! Size reduction that keeps the meaning of a state: alternatives sharing a
//! leading run of predicates get it hoisted in front of the choice, and
//! Basic runs split across chain links are merged. Results are memoized per
//! shared node, so one optimizer can be reused across the states of a
//! function.

use crate::features::predicate_state::domain::{PredicateState, StateNode};
use crate::features::term_algebra::PredicateId;
use rustc_hash::FxHashMap;

#[derive(Default)]
pub struct StateOptimizer {
    memo: FxHashMap<usize, (PredicateState, PredicateState)>,
}

impl StateOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize(&mut self, state: &PredicateState) -> PredicateState {
        if let Some((_, done)) = self.memo.get(&state.addr()) {
            return done.clone();
        }
        let res = match state.node() {
            StateNode::Basic { .. } => state.clone(),
            StateNode::Chain { base, curr } => {
                let b = self.optimize(base);
                let c = self.optimize(curr);
                PredicateState::chain(&b, &c)
            }
            StateNode::Choice { choices } => {
                let optimized: Vec<PredicateState> =
                    choices.iter().map(|c| self.optimize(c)).collect();
                Self::hoist_common_prefix(&PredicateState::choice(optimized))
            }
        }
        .simplify();
        self.memo.insert(state.addr(), (state.clone(), res.clone()));
        res
    }

    /// `Choice(P+a, P+b)` becomes `P + Choice(a, b)`
    pub fn hoist_common_prefix(state: &PredicateState) -> PredicateState {
        let StateNode::Choice { choices } = state.node() else {
            return state.clone();
        };
        let heads: Vec<&[PredicateId]> = choices.iter().map(leading_basic).collect();
        let mut common = heads.first().map(|h| h.len()).unwrap_or(0);
        for h in &heads[1..] {
            common = common.min(h.len());
            let first = heads[0];
            common = first[..common]
                .iter()
                .zip(h.iter())
                .take_while(|(a, b)| a == b)
                .count();
        }
        if common == 0 {
            return state.clone();
        }
        let prefix = PredicateState::basic(heads[0][..common].to_vec());
        let rests: Vec<PredicateState> = choices
            .iter()
            .map(|c| c.slice_on(&prefix).unwrap_or_else(|| c.clone()))
            .collect();
        PredicateState::chain(&prefix, &PredicateState::choice(rests))
    }
}

/// Predicates at the very start of `state`
fn leading_basic(state: &PredicateState) -> &[PredicateId] {
    match state.node() {
        StateNode::Basic { data, .. } => data,
        StateNode::Chain { base, .. } => leading_basic(base),
        StateNode::Choice { .. } => &[],
    }
}

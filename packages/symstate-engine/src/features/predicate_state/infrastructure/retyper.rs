//! Retyper
//!
//! Re-derives the type of every composite term, picking up type information
//! that became available after the term was built (record bodies).

use super::transformer::Transformer;
use crate::features::predicate_state::domain::PredicateState;
use crate::features::term_algebra::{FactoryNest, TermId};
use rustc_hash::FxHashMap;

pub struct Retyper<'n> {
    nest: &'n mut FactoryNest,
    terms: FxHashMap<TermId, TermId>,
    states: FxHashMap<usize, (PredicateState, PredicateState)>,
}

impl<'n> Retyper<'n> {
    pub fn new(nest: &'n mut FactoryNest) -> Self {
        Self {
            nest,
            terms: FxHashMap::default(),
            states: FxHashMap::default(),
        }
    }
}

impl<'n> Transformer for Retyper<'n> {
    fn nest(&mut self) -> &mut FactoryNest {
        self.nest
    }

    fn transform_state(&mut self, state: &PredicateState) -> PredicateState {
        if let Some((_, done)) = self.states.get(&state.addr()) {
            return done.clone();
        }
        let res = super::transformer::walk_state(self, state);
        // keep the key alive so its address is not reused
        self.states.insert(state.addr(), (state.clone(), res.clone()));
        res
    }

    fn transform_term(&mut self, term: TermId) -> TermId {
        if let Some(done) = self.terms.get(&term) {
            return *done;
        }
        let res = self.nest.terms().retype(term);
        self.terms.insert(term, res);
        res
    }
}

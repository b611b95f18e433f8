//! Transformer
//!
//! Bottom-up rewriting of a state tree. Implementors override the hooks they
//! care about; the default walk rebuilds only what changed, so untouched
//! subtrees keep sharing their nodes.

use crate::features::predicate_state::domain::{PredicateState, StateNode};
use crate::features::term_algebra::{FactoryNest, PredicateId, TermId};

pub trait Transformer {
    fn nest(&mut self) -> &mut FactoryNest;

    /// Entry point
    fn transform(&mut self, state: &PredicateState) -> PredicateState {
        self.transform_state(state)
    }

    fn transform_state(&mut self, state: &PredicateState) -> PredicateState {
        walk_state(self, state)
    }

    fn transform_chain(&mut self, base: &PredicateState, curr: &PredicateState) -> PredicateState {
        let b = self.transform_state(base);
        let c = self.transform_state(curr);
        PredicateState::chain(&b, &c)
    }

    fn transform_choice(&mut self, choices: &[PredicateState]) -> PredicateState {
        let mapped = choices.iter().map(|c| self.transform_state(c)).collect();
        PredicateState::choice(mapped)
    }

    /// `None` drops the predicate
    fn transform_predicate(&mut self, pred: PredicateId) -> Option<PredicateId> {
        Some(walk_predicate(self, pred))
    }

    fn transform_term(&mut self, term: TermId) -> TermId {
        walk_term(self, term)
    }
}

pub fn walk_state<T: Transformer + ?Sized>(t: &mut T, state: &PredicateState) -> PredicateState {
    match state.node() {
        StateNode::Basic { data, loci } => {
            let mut changed = false;
            let mut out = Vec::with_capacity(data.len());
            for p in data {
                match t.transform_predicate(*p) {
                    Some(np) => {
                        changed |= np != *p;
                        out.push(np);
                    }
                    None => changed = true,
                }
            }
            if !changed {
                return state.clone();
            }
            PredicateState::basic_with_loci(out, loci.clone())
        }
        StateNode::Chain { base, curr } => {
            let res = t.transform_chain(base, curr);
            if res == *state {
                state.clone()
            } else {
                res
            }
        }
        StateNode::Choice { choices } => {
            let res = t.transform_choice(choices);
            if res == *state {
                state.clone()
            } else {
                res
            }
        }
    }
}

pub fn walk_predicate<T: Transformer + ?Sized>(t: &mut T, pred: PredicateId) -> PredicateId {
    let operands = t.nest().predicate(pred).kind.operands();
    let mapped: Vec<TermId> = operands.iter().map(|o| t.transform_term(*o)).collect();
    if mapped == operands {
        return pred;
    }
    t.nest().predicates().with_operands(pred, &mapped)
}

pub fn walk_term<T: Transformer + ?Sized>(t: &mut T, term: TermId) -> TermId {
    let children = t.nest().term(term).kind.subterms();
    if children.is_empty() {
        return term;
    }
    let mapped: Vec<TermId> = children.iter().map(|c| t.transform_term(*c)).collect();
    if mapped == children {
        return term;
    }
    t.nest().terms().with_subterms(term, &mapped)
}

//! PredicateStateBuilder
//!
//! Mutable scratch state for one construction. `+=` appends a predicate or a
//! state, `<<=` marks a locus visited; `apply` returns the raw tree and
//! `build` additionally retypes it against the nest.

use super::state::PredicateState;
use crate::features::predicate_state::infrastructure::{Retyper, Transformer};
use crate::features::term_algebra::{FactoryNest, PredicateId};
use crate::shared::models::Locus;
use std::ops::{AddAssign, ShlAssign};

#[derive(Debug, Clone, Default)]
pub struct PredicateStateBuilder {
    state: PredicateState,
}

impl PredicateStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: PredicateState) -> Self {
        Self { state }
    }

    pub fn add_predicate(&mut self, pred: PredicateId) -> &mut Self {
        self.state = self.state.add_predicate(pred);
        self
    }

    pub fn add_state(&mut self, other: &PredicateState) -> &mut Self {
        self.state = self.state.add_state(other);
        self
    }

    pub fn add_visited(&mut self, locus: Locus) -> &mut Self {
        self.state = self.state.add_visited(locus);
        self
    }

    /// The tree as built so far
    pub fn apply(&self) -> PredicateState {
        self.state.clone()
    }

    /// The tree with every term retyped against `nest`
    pub fn build(&self, nest: &mut FactoryNest) -> PredicateState {
        Retyper::new(nest).transform(&self.state)
    }
}

impl AddAssign<PredicateId> for PredicateStateBuilder {
    fn add_assign(&mut self, pred: PredicateId) {
        self.add_predicate(pred);
    }
}

impl AddAssign<&PredicateState> for PredicateStateBuilder {
    fn add_assign(&mut self, other: &PredicateState) {
        self.add_state(other);
    }
}

impl AddAssign<PredicateState> for PredicateStateBuilder {
    fn add_assign(&mut self, other: PredicateState) {
        self.add_state(&other);
    }
}

impl ShlAssign<Locus> for PredicateStateBuilder {
    fn shl_assign(&mut self, locus: Locus) {
        self.add_visited(locus);
    }
}

impl From<PredicateState> for PredicateStateBuilder {
    fn from(state: PredicateState) -> Self {
        Self::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::{PredicateType, Signedness};

    #[test]
    fn test_operators_fold_into_state() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let x = nest.terms().value(int, "x");
        let one = nest.terms().int(1, 32, Signedness::Signed);
        let p = nest
            .predicates()
            .equality(x, one, Locus::unknown(), PredicateType::State);
        let q = nest
            .predicates()
            .inequality(x, one, Locus::unknown(), PredicateType::Path);

        let mut builder = PredicateStateBuilder::new();
        builder += p;
        builder += PredicateState::basic(vec![q]);
        builder <<= Locus::new("f.c", 2, 3);

        let raw = builder.apply();
        assert_eq!(raw.predicates(), vec![p, q]);
        assert!(raw.has_visited(&Locus::new("f.c", 2, 3)));

        let built = builder.build(&mut nest);
        assert_eq!(built, raw);
    }

    #[test]
    fn test_build_fixes_forward_record_types() {
        let mut nest = FactoryNest::new();
        let int = nest.types().default_integer();
        let rec = nest.types().record("node");
        let prec = nest.types().pointer_to(rec);
        let base = nest.terms().value(prec, "n");
        let zero = nest.terms().int64(0);
        let one = nest.terms().int64(1);
        let gep = nest.terms().gep(base, vec![zero, one], false);
        let before = nest.term(gep).ty;
        assert!(nest.type_factory().is_error(before));

        let loaded = nest.terms().value(int, "v");
        let pred = nest
            .predicates()
            .load(loaded, gep, Locus::unknown(), PredicateType::State);
        let mut builder = PredicateStateBuilder::new();
        builder += pred;

        // body becomes known after the predicate was built
        nest.types().define_record("node", vec![int, int]);
        let built = builder.build(&mut nest);
        let retyped = built.predicates()[0];
        assert_ne!(retyped, pred);
        assert_eq!(nest.typecheck(retyped), None);
    }
}

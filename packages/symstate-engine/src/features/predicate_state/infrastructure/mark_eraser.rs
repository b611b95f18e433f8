//! Drops Mark predicates

use super::transformer::Transformer;
use crate::features::term_algebra::{FactoryNest, PredicateId};

pub struct MarkEraser<'n> {
    nest: &'n mut FactoryNest,
}

impl<'n> MarkEraser<'n> {
    pub fn new(nest: &'n mut FactoryNest) -> Self {
        Self { nest }
    }
}

impl<'n> Transformer for MarkEraser<'n> {
    fn nest(&mut self) -> &mut FactoryNest {
        self.nest
    }

    fn transform_predicate(&mut self, pred: PredicateId) -> Option<PredicateId> {
        if self.nest.predicate(pred).kind.is_mark() {
            None
        } else {
            Some(pred)
        }
    }
}

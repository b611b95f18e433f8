//! Predicate analysis port
//!
//! A predicate analysis describes one aspect of the IR (values, memory,
//! bounds, ...) as predicate maps keyed by program point. Several analyses
//! are combined by concatenating their entries in registration order.

use crate::features::term_algebra::PredicateId;
use crate::shared::models::{BlockId, InstId};
use rustc_hash::FxHashMap;

/// Source of predicate maps for one function
pub trait PredicateAnalysis {
    /// Analysis name for logging
    fn name(&self) -> &str;

    /// Effects of an instruction
    fn instruction_predicates(&self, inst: InstId) -> &[PredicateId];

    /// Path condition of the edge `terminator -> successor`
    fn terminator_predicates(&self, terminator: InstId, successor: BlockId) -> &[PredicateId];

    /// Value of `phi` when entered from `predecessor`
    fn phi_predicates(&self, predecessor: BlockId, phi: InstId) -> &[PredicateId];

    /// Facts holding after an instruction executed without a defect
    fn post_predicates(&self, _inst: InstId) -> &[PredicateId] {
        &[]
    }
}

/// Plain in-memory predicate maps
#[derive(Debug, Clone, Default)]
pub struct PredicateMaps {
    name: String,
    instructions: FxHashMap<InstId, Vec<PredicateId>>,
    terminators: FxHashMap<(InstId, BlockId), Vec<PredicateId>>,
    phis: FxHashMap<(BlockId, InstId), Vec<PredicateId>>,
    posts: FxHashMap<InstId, Vec<PredicateId>>,
}

impl PredicateMaps {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_instruction(&mut self, inst: InstId, pred: PredicateId) -> &mut Self {
        self.instructions.entry(inst).or_default().push(pred);
        self
    }

    pub fn add_terminator(
        &mut self,
        terminator: InstId,
        successor: BlockId,
        pred: PredicateId,
    ) -> &mut Self {
        self.terminators
            .entry((terminator, successor))
            .or_default()
            .push(pred);
        self
    }

    pub fn add_phi(&mut self, predecessor: BlockId, phi: InstId, pred: PredicateId) -> &mut Self {
        self.phis.entry((predecessor, phi)).or_default().push(pred);
        self
    }

    pub fn add_post(&mut self, inst: InstId, pred: PredicateId) -> &mut Self {
        self.posts.entry(inst).or_default().push(pred);
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len() + self.terminators.len() + self.phis.len() + self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredicateAnalysis for PredicateMaps {
    fn name(&self) -> &str {
        &self.name
    }

    fn instruction_predicates(&self, inst: InstId) -> &[PredicateId] {
        self.instructions.get(&inst).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn terminator_predicates(&self, terminator: InstId, successor: BlockId) -> &[PredicateId] {
        self.terminators
            .get(&(terminator, successor))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn phi_predicates(&self, predecessor: BlockId, phi: InstId) -> &[PredicateId] {
        self.phis
            .get(&(predecessor, phi))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn post_predicates(&self, inst: InstId) -> &[PredicateId] {
        self.posts.get(&inst).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::{FactoryNest, PredicateType};
    use crate::shared::models::Locus;

    #[test]
    fn test_missing_keys_yield_empty_slices() {
        let mut nest = FactoryNest::new();
        let t = nest.terms().true_term();
        let p = nest.predicates().boolean(t, true, Locus::unknown());
        let q = nest
            .predicates()
            .equality(t, t, Locus::unknown(), PredicateType::State);

        let mut maps = PredicateMaps::new("values");
        maps.add_instruction(InstId(0), q)
            .add_instruction(InstId(0), p)
            .add_terminator(InstId(1), BlockId(2), p);

        assert_eq!(maps.instruction_predicates(InstId(0)), &[q, p]);
        assert!(maps.instruction_predicates(InstId(5)).is_empty());
        assert_eq!(maps.terminator_predicates(InstId(1), BlockId(2)), &[p]);
        assert!(maps.terminator_predicates(InstId(1), BlockId(3)).is_empty());
        assert!(maps.phi_predicates(BlockId(0), InstId(0)).is_empty());
        assert_eq!(maps.name(), "values");
        assert_eq!(maps.len(), 2);
    }
}

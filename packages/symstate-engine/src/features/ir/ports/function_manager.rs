//! Function summary port
//!
//! Keeps the (REQUIRES, BODY, ENSURES) triple per function so call sites can
//! be instantiated without re-analyzing the callee, and hands out a disjoint
//! local memory range per function.

use crate::features::predicate_state::PredicateState;
use crate::features::term_algebra::{FactoryNest, PredicateType};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Size of the local memory range assigned to each function
pub const MEMORY_SPAN: u64 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryKind {
    Requires,
    Body,
    Ensures,
}

pub trait FunctionManager {
    fn requires(&self, function: &str) -> Option<PredicateState>;

    fn body(&self, function: &str) -> Option<PredicateState>;

    fn ensures(&self, function: &str) -> Option<PredicateState>;

    /// Number of named parameters; variadic actuals follow them
    fn fixed_params(&self, function: &str) -> Option<usize>;

    /// `[start, end)` of the pointers allocated locally by `function`
    fn memory_bounds(&self, function: &str) -> (u64, u64);

    /// Merge `state` into the summary of `function`
    ///
    /// REQUIRES and ENSURES predicates are split out by type; the rest
    /// extends the body.
    fn update(&mut self, nest: &FactoryNest, function: &str, state: &PredicateState);
}

#[derive(Debug, Clone, Default)]
struct FunctionDesc {
    id: u64,
    fixed_params: Option<usize>,
    requires: Option<PredicateState>,
    body: Option<PredicateState>,
    ensures: Option<PredicateState>,
}

fn merge(old: &Option<PredicateState>, new: PredicateState) -> Option<PredicateState> {
    if new.is_empty() {
        return old.clone();
    }
    Some(match old {
        Some(o) => PredicateState::chain(o, &new),
        None => new,
    })
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFunctionManager {
    functions: FxHashMap<String, FunctionDesc>,
}

impl InMemoryFunctionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function`, assigning its memory range on first sight
    pub fn register(&mut self, function: &str, fixed_params: usize) -> &mut Self {
        let next = self.functions.len() as u64 + 1;
        let desc = self
            .functions
            .entry(function.to_string())
            .or_insert_with(|| FunctionDesc {
                id: next,
                ..Default::default()
            });
        desc.fixed_params = Some(fixed_params);
        self
    }

    /// Set one part of the summary directly
    pub fn put(&mut self, function: &str, kind: SummaryKind, state: PredicateState) -> &mut Self {
        let next = self.functions.len() as u64 + 1;
        let desc = self
            .functions
            .entry(function.to_string())
            .or_insert_with(|| FunctionDesc {
                id: next,
                ..Default::default()
            });
        match kind {
            SummaryKind::Requires => desc.requires = Some(state),
            SummaryKind::Body => desc.body = Some(state),
            SummaryKind::Ensures => desc.ensures = Some(state),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionManager for InMemoryFunctionManager {
    fn requires(&self, function: &str) -> Option<PredicateState> {
        self.functions.get(function).and_then(|d| d.requires.clone())
    }

    fn body(&self, function: &str) -> Option<PredicateState> {
        self.functions.get(function).and_then(|d| d.body.clone())
    }

    fn ensures(&self, function: &str) -> Option<PredicateState> {
        self.functions.get(function).and_then(|d| d.ensures.clone())
    }

    fn fixed_params(&self, function: &str) -> Option<usize> {
        self.functions.get(function).and_then(|d| d.fixed_params)
    }

    fn memory_bounds(&self, function: &str) -> (u64, u64) {
        // id 0 is reserved for functions nobody registered
        let id = self.functions.get(function).map(|d| d.id).unwrap_or(0);
        let start = (id + 1) * MEMORY_SPAN;
        (start, start + MEMORY_SPAN)
    }

    fn update(&mut self, nest: &FactoryNest, function: &str, state: &PredicateState) {
        let (requires, rest) = state.split_by_types(nest, &[PredicateType::Requires]);
        let (ensures, body) = rest.split_by_types(nest, &[PredicateType::Ensures]);

        let next = self.functions.len() as u64 + 1;
        let desc = self
            .functions
            .entry(function.to_string())
            .or_insert_with(|| FunctionDesc {
                id: next,
                ..Default::default()
            });
        desc.requires = merge(&desc.requires, requires);
        desc.ensures = merge(&desc.ensures, ensures);
        desc.body = merge(&desc.body, body);
        debug!(target: "symstate::fm", function, "summary updated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::Signedness;
    use crate::shared::models::Locus;

    #[test]
    fn test_update_splits_by_type() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let x = nest.terms().value(int, "x");
        let zero = nest.terms().int(0, 32, Signedness::Signed);
        let req = nest
            .predicates()
            .inequality(x, zero, Locus::unknown(), PredicateType::Requires);
        let ens = nest
            .predicates()
            .equality(x, zero, Locus::unknown(), PredicateType::Ensures);
        let st = nest
            .predicates()
            .equality(x, x, Locus::unknown(), PredicateType::State);

        let mut fm = InMemoryFunctionManager::new();
        fm.register("f", 1);
        fm.update(&nest, "f", &PredicateState::basic(vec![req, st, ens]));

        assert_eq!(fm.requires("f"), Some(PredicateState::basic(vec![req])));
        assert_eq!(fm.ensures("f"), Some(PredicateState::basic(vec![ens])));
        assert_eq!(fm.body("f"), Some(PredicateState::basic(vec![st])));
        assert_eq!(fm.requires("g"), None);
        assert_eq!(fm.fixed_params("f"), Some(1));
    }

    #[test]
    fn test_memory_ranges_are_disjoint() {
        let mut fm = InMemoryFunctionManager::new();
        fm.register("f", 0).register("g", 0);
        let (fs, fe) = fm.memory_bounds("f");
        let (gs, ge) = fm.memory_bounds("g");
        assert!(fe <= gs || ge <= fs);
        assert_eq!(fe - fs, MEMORY_SPAN);
        // re-registering keeps the range
        fm.register("f", 2);
        assert_eq!(fm.memory_bounds("f"), (fs, fe));
    }
}

//! Custom assertions for test verification

use std::collections::BTreeMap;
use symstate_engine::features::predicate_state::PredicateState;
use symstate_engine::features::term_algebra::{FactoryNest, PredicateId, PredicateKind, TermId};
use symstate_engine::shared::models::InstId;

/// Predicates of `state` as a sorted, duplicate-free list
pub fn predicate_set(state: &PredicateState) -> Vec<PredicateId> {
    let mut preds = state.predicates();
    preds.sort();
    preds.dedup();
    preds
}

/// Assert that two states mention the same predicates, whatever their shape
pub fn assert_same_predicates(nest: &FactoryNest, a: &PredicateState, b: &PredicateState) {
    assert_eq!(
        predicate_set(a),
        predicate_set(b),
        "states differ:\n{}\nvs\n{}",
        a.display(nest),
        b.display(nest)
    );
}

/// First `lhv == rhv` equality in `state`, whatever its type and locus
pub fn find_equality(
    nest: &FactoryNest,
    state: &PredicateState,
    lhv: TermId,
    rhv: TermId,
) -> Option<PredicateId> {
    state.predicates().into_iter().find(|p| {
        matches!(
            &nest.predicate(*p).kind,
            PredicateKind::Equality { lhv: l, rhv: r } if *l == lhv && *r == rhv
        )
    })
}

/// Assert that `inst` has a state
pub fn assert_reached(states: &BTreeMap<InstId, PredicateState>, inst: InstId) {
    assert!(
        states.contains_key(&inst),
        "expected {:?} to be reached, reached: {:?}",
        inst,
        states.keys().collect::<Vec<_>>()
    );
}

/// Assert that `inst` has no state
pub fn assert_unreached(states: &BTreeMap<InstId, PredicateState>, inst: InstId) {
    assert!(
        !states.contains_key(&inst),
        "expected {:?} to be pruned, got state {:?}",
        inst,
        states.get(&inst)
    );
}

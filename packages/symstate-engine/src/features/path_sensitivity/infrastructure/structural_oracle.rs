//! StructuralOracle
//!
//! Cheap reachability check without a solver: a state is unreachable when
//! every path through it carries a PATH condition that is false on its face
//! (two distinct literals compared equal, a constant comparison that does
//! not hold).

use crate::features::path_sensitivity::ports::ReachabilityOracle;
use crate::features::predicate_state::{PredicateState, StateNode};
use crate::features::term_algebra::{
    ConditionType, FactoryNest, PredicateId, PredicateKind, PredicateType, TermId, TermKind,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOracle;

/// Constant value of a literal term, booleans as 0/1
fn literal(nest: &FactoryNest, term: TermId) -> Option<i64> {
    match nest.term(term).kind {
        TermKind::OpaqueBool(b) => Some(b as i64),
        TermKind::OpaqueInt(v) => Some(v),
        TermKind::OpaqueNullPtr => Some(0),
        _ => None,
    }
}

/// Truth value of a term that folds to a constant
fn fold(nest: &FactoryNest, term: TermId) -> Option<i64> {
    if let Some(v) = literal(nest, term) {
        return Some(v);
    }
    match &nest.term(term).kind {
        TermKind::Cmp { op, lhv, rhv } => {
            let holds = match op {
                ConditionType::True => true,
                ConditionType::False => false,
                _ => {
                    let (l, r) = (fold(nest, *lhv)?, fold(nest, *rhv)?);
                    match op {
                        ConditionType::Eq => l == r,
                        ConditionType::Neq => l != r,
                        ConditionType::Gt => l > r,
                        ConditionType::Ge => l >= r,
                        ConditionType::Lt => l < r,
                        ConditionType::Le => l <= r,
                        ConditionType::Ugt => (l as u64) > (r as u64),
                        ConditionType::Uge => (l as u64) >= (r as u64),
                        ConditionType::Ult => (l as u64) < (r as u64),
                        ConditionType::Ule => (l as u64) <= (r as u64),
                        ConditionType::True | ConditionType::False => return None,
                    }
                }
            };
            Some(holds as i64)
        }
        _ => None,
    }
}

fn is_false_path(nest: &FactoryNest, pred: PredicateId) -> bool {
    let pred = nest.predicate(pred);
    if pred.ptype != PredicateType::Path {
        return false;
    }
    match &pred.kind {
        PredicateKind::Equality { lhv, rhv } => {
            matches!((fold(nest, *lhv), fold(nest, *rhv)), (Some(l), Some(r)) if l != r)
        }
        PredicateKind::Inequality { lhv, rhv } => {
            matches!((fold(nest, *lhv), fold(nest, *rhv)), (Some(l), Some(r)) if l == r)
        }
        PredicateKind::DefaultSwitchCase { cond, cases } => match fold(nest, *cond) {
            Some(c) => cases.iter().any(|k| fold(nest, *k) == Some(c)),
            None => false,
        },
        _ => false,
    }
}

fn dead(nest: &FactoryNest, state: &PredicateState) -> bool {
    match state.node() {
        StateNode::Basic { data, .. } => data.iter().any(|p| is_false_path(nest, *p)),
        StateNode::Chain { base, curr } => dead(nest, base) || dead(nest, curr),
        StateNode::Choice { choices } => choices.iter().all(|c| dead(nest, c)),
    }
}

impl ReachabilityOracle for StructuralOracle {
    fn is_unreachable(
        &self,
        nest: &FactoryNest,
        state: &PredicateState,
        _memory: (u64, u64),
    ) -> bool {
        dead(nest, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::Signedness;
    use crate::shared::models::Locus;

    #[test]
    fn test_contradictory_path_is_unreachable() {
        let mut nest = FactoryNest::new();
        let one = nest.terms().int(1, 32, Signedness::Signed);
        let two = nest.terms().int(2, 32, Signedness::Signed);
        let cmp = nest.terms().cmp(ConditionType::Gt, one, two);
        let never = nest.predicates().boolean(cmp, true, Locus::unknown());

        let int = nest.types().default_integer();
        let x = nest.terms().value(int, "x");
        let xcmp = nest.terms().cmp(ConditionType::Gt, x, two);
        let maybe = nest.predicates().boolean(xcmp, true, Locus::unknown());

        let oracle = StructuralOracle;
        let dead_state = PredicateState::basic(vec![maybe, never]);
        let live_state = PredicateState::basic(vec![maybe]);
        assert!(oracle.is_unreachable(&nest, &dead_state, (0, 0)));
        assert!(!oracle.is_unreachable(&nest, &live_state, (0, 0)));

        // one live alternative keeps the merge reachable
        let merged = PredicateState::choice(vec![dead_state.clone(), live_state.clone()]);
        assert!(!oracle.is_unreachable(&nest, &merged, (0, 0)));
        // a dead prefix kills everything after it
        let after = PredicateState::chain(&dead_state, &merged);
        assert!(oracle.is_unreachable(&nest, &after, (0, 0)));
    }

    #[test]
    fn test_state_facts_are_ignored() {
        let mut nest = FactoryNest::new();
        let t = nest.terms().true_term();
        let f = nest.terms().false_term();
        let fact = nest
            .predicates()
            .equality(t, f, Locus::unknown(), PredicateType::State);
        let state = PredicateState::basic(vec![fact]);
        assert!(!StructuralOracle.is_unreachable(&nest, &state, (0, 0)));
    }
}

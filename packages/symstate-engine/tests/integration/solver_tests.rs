//! SMT integration tests
//!
//! Queries against predicate states built by hand and by the path-sensitive
//! analyses, on the builtin backend (and on Z3 when the feature is on).

#[path = "../common/mod.rs"]
mod common;
use common::*;

use std::sync::Arc;
use symstate_engine::config::{CacheConfig, PsaConfig, SmtConfig};
use symstate_engine::features::path_sensitivity::{OneForAll, PredicateStateAnalysis};
use symstate_engine::features::predicate_state::{PredicateState, StateNode};
use symstate_engine::features::smt::{EncodingCache, SmtResult, Solver};
use symstate_engine::features::term_algebra::{
    ArgumentKind, ConditionType, FactoryNest, PredicateKind, PredicateType, Signedness, TermId,
    TermKind,
};
use symstate_engine::shared::models::Locus;

const MEMORY: (u64, u64) = (1 << 24, 2 << 24);

fn solver() -> Solver {
    Solver::new(&SmtConfig::default(), MEMORY.0, MEMORY.1)
}

fn holds(nest: &mut FactoryNest, term: TermId) -> PredicateState {
    let pred = nest.predicates().boolean(term, true, Locus::unknown());
    let pred = nest.predicates().with_type(pred, PredicateType::State);
    PredicateState::basic(vec![pred])
}

fn int_var(nest: &mut FactoryNest, name: &str) -> TermId {
    let int = int32(nest);
    nest.terms().value(int, name)
}

// ═══════════════════════════════════════════════════════════════════════════
// Violation checks
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn query_implied_by_state_is_not_violated() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let five = lit(&mut nest, 5);
    let zero = lit(&mut nest, 0);
    let ten = lit(&mut nest, 10);
    let def = nest
        .predicates()
        .equality(x, five, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![def]);

    let positive = nest.terms().cmp(ConditionType::Gt, x, zero);
    let query = holds(&mut nest, positive);
    assert_eq!(solver().is_violated(&nest, &query, &state), SmtResult::Unsat);

    let large = nest.terms().cmp(ConditionType::Gt, x, ten);
    let query = holds(&mut nest, large);
    let res = solver().is_violated(&nest, &query, &state);
    let sat = res.sat().expect("x > 10 should be violated");
    assert_eq!(sat.value_of("x"), Some(5));
}

#[test]
fn constant_queries_on_a_satisfiable_state() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let def = nest
        .predicates()
        .inequality(x, zero, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![def]);

    let t = nest.terms().true_term();
    let f = nest.terms().false_term();
    let always = holds(&mut nest, t);
    let never = holds(&mut nest, f);
    assert!(solver().is_violated(&nest, &always, &state).is_unsat());
    assert!(solver().is_violated(&nest, &never, &state).is_sat());
}

#[test]
fn empty_state_violates_any_non_trivial_query() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let eq = nest.terms().cmp(ConditionType::Eq, x, zero);
    let query = holds(&mut nest, eq);
    assert!(solver()
        .is_violated(&nest, &query, &PredicateState::empty())
        .is_sat());
    assert!(solver()
        .is_violated(&nest, &PredicateState::empty(), &PredicateState::empty())
        .is_unsat());
}

#[test]
fn merged_states_are_checked_per_path() {
    let mut d = fixture_diamond();
    let mut psa = OneForAll::new(PsaConfig::default());
    d.fx.run(&mut psa);
    let state = psa.instruction_state(&mut d.fx.nest, d.use_y).unwrap();
    let nest = &mut d.fx.nest;

    let three = lit(nest, 3);
    let not_three = nest
        .predicates()
        .inequality(d.y, three, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![not_three]);
    assert!(solver().is_violated(nest, &query, &state).is_unsat());

    let one = lit(nest, 1);
    let is_one = nest
        .predicates()
        .equality(d.y, one, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![is_one]);
    let res = solver().is_violated(nest, &query, &state);
    let sat = res.sat().expect("the else path sets y to 2");
    assert!(sat.counterexample.contains(&d.on_false));
    assert!(!sat.counterexample.contains(&d.on_true));
    assert!(sat.value_of("x").is_some_and(|x| x <= 0));
}

#[test]
fn impossible_paths_are_unsat() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let gt = nest.terms().cmp(ConditionType::Gt, x, zero);
    let lt = nest.terms().cmp(ConditionType::Lt, x, zero);
    let pos = nest.predicates().boolean(gt, true, Locus::unknown());
    let neg = nest.predicates().boolean(lt, true, Locus::unknown());

    let state = PredicateState::basic(vec![pos]);
    let path = PredicateState::basic(vec![neg]);
    assert!(solver().is_path_impossible(&nest, &path, &state).is_unsat());
    assert!(solver()
        .is_path_impossible(&nest, &state, &PredicateState::empty())
        .is_sat());
}

#[test]
fn encoding_failures_come_back_as_unknown() {
    let mut nest = FactoryNest::new();
    let int = nest.types().integer(64, Signedness::Signed);
    let ptr = nest.types().pointer_to(int);
    let p = nest.terms().value(ptr, "p");
    let n = nest.terms().value(int, "n");
    let alloc = nest
        .predicates()
        .alloca(p, n, n, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![alloc]);

    let res = solver().is_violated(&nest, &PredicateState::empty(), &state);
    assert!(res.is_unknown());
    assert!(res.unknown_reason().is_some_and(|r| !r.is_empty()));
}

#[test]
fn integers_wider_than_the_encoding_are_unknown() {
    let mut nest = FactoryNest::new();
    let wide = nest.types().integer(256, Signedness::Signed);
    let x = nest.terms().value(wide, "x");
    let one = nest.terms().int(1, 256, Signedness::Signed);
    let def = nest
        .predicates()
        .equality(x, one, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![def]);
    let eq = nest.terms().cmp(ConditionType::Eq, x, one);
    let query = holds(&mut nest, eq);

    let res = solver().is_violated(&nest, &query, &state);
    assert!(res.is_unknown());
    assert!(res.unknown_reason().is_some_and(|r| r.contains("256-bit")));
}

// ═══════════════════════════════════════════════════════════════════════════
// Memory
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn gep_past_the_allocation_is_invalid() {
    let mut nest = FactoryNest::new();
    let int = nest.types().integer(64, Signedness::Signed);
    let ptr = nest.types().pointer_to(int);
    let p = nest.terms().value(ptr, "p");
    let four = nest.terms().int64(4);
    let alloc = nest
        .predicates()
        .alloca(p, four, four, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![alloc]);
    let invalid = nest.terms().invalid_ptr(ptr);

    let five = nest.terms().int64(5);
    let past = nest.terms().gep(p, vec![five], false);
    let is_invalid = nest
        .predicates()
        .equality(past, invalid, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![is_invalid]);
    assert!(solver().is_violated(&nest, &query, &state).is_unsat());

    let two = nest.terms().int64(2);
    let inside = nest.terms().gep(p, vec![two], false);
    let is_valid = nest
        .predicates()
        .inequality(inside, invalid, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![is_valid]);
    assert!(solver().is_violated(&nest, &query, &state).is_unsat());
}

#[test]
fn later_store_wins() {
    let mut nest = FactoryNest::new();
    let int = nest.types().integer(64, Signedness::Signed);
    let ptr = nest.types().pointer_to(int);
    let p = nest.terms().value(ptr, "p");
    let one = nest.terms().int(1, 64, Signedness::Signed);
    let two = nest.terms().int(2, 64, Signedness::Signed);
    let size = nest.terms().int64(1);
    let alloc = nest
        .predicates()
        .alloca(p, size, size, Locus::unknown(), PredicateType::State);
    let first = nest
        .predicates()
        .store(p, one, Locus::unknown(), PredicateType::State);
    let second = nest
        .predicates()
        .store(p, two, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![alloc, first, second]);
    let loaded = nest.terms().load(p);

    let reads_two = nest
        .predicates()
        .equality(loaded, two, Locus::unknown(), PredicateType::State);
    assert!(solver()
        .is_violated(&nest, &PredicateState::basic(vec![reads_two]), &state)
        .is_unsat());

    let reads_one = nest
        .predicates()
        .equality(loaded, one, Locus::unknown(), PredicateType::State);
    assert!(solver()
        .is_violated(&nest, &PredicateState::basic(vec![reads_one]), &state)
        .is_sat());
}

// ═══════════════════════════════════════════════════════════════════════════
// Interpolants, summaries and contracts
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn interpolant_separates_body_from_violation() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let three = lit(&mut nest, 3);
    let zero = lit(&mut nest, 0);
    let def = nest
        .predicates()
        .equality(x, three, Locus::unknown(), PredicateType::State);
    let body = PredicateState::basic(vec![def]);
    let positive = nest.terms().cmp(ConditionType::Gt, x, zero);
    let query = holds(&mut nest, positive);

    let solver = solver();
    let itp = solver.get_interpolant(&nest, &query, &body);
    assert!(!itp.is_identity());
    let ctx = solver.ctx();
    assert!(solver.check(&[itp.body, ctx.not(itp.formula)]).is_unsat());
    assert!(solver.check(&[itp.formula, itp.negated_query]).is_unsat());
}

#[test]
fn satisfiable_pair_yields_identity_interpolant() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let five = lit(&mut nest, 5);
    let gt0 = nest.terms().cmp(ConditionType::Gt, x, zero);
    let gt5 = nest.terms().cmp(ConditionType::Gt, x, five);
    let body = holds(&mut nest, gt0);
    let query = holds(&mut nest, gt5);
    assert!(solver().get_interpolant(&nest, &query, &body).is_identity());
}

#[test]
fn summary_is_an_ensures_state_that_implies_the_query() {
    let mut nest = FactoryNest::new();
    let r = int_var(&mut nest, "r");
    let five = lit(&mut nest, 5);
    let zero = lit(&mut nest, 0);
    let def = nest
        .predicates()
        .equality(r, five, Locus::unknown(), PredicateType::State);
    let body = PredicateState::basic(vec![def]);
    let positive = nest.terms().cmp(ConditionType::Gt, r, zero);
    let query = holds(&mut nest, positive);

    let summary = solver()
        .get_summary(&mut nest, &[], &query, &body)
        .expect("r == 5 guarantees r > 0");
    let preds = summary.predicates();
    assert_eq!(preds.len(), 1);
    assert_eq!(nest.predicate(preds[0]).ptype, PredicateType::Ensures);
    assert!(solver().is_violated(&nest, &query, &summary).is_unsat());
}

#[test]
fn contract_constrains_the_arguments() {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let a = nest.terms().argument(int, 0, "a", ArgumentKind::Any);
    let zero = lit(&mut nest, 0);
    let positive = nest.terms().cmp(ConditionType::Gt, a, zero);
    let query = holds(&mut nest, positive);

    let contract = solver()
        .get_contract(&mut nest, &[a], &query, &PredicateState::empty())
        .expect("a > 0 has to be required");
    let preds = contract.predicates();
    assert_eq!(preds.len(), 1);
    assert_eq!(nest.predicate(preds[0]).ptype, PredicateType::Requires);
    assert!(solver().is_violated(&nest, &query, &contract).is_unsat());
}

#[test]
fn no_contract_when_the_body_is_already_safe() {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let a = nest.terms().argument(int, 0, "a", ArgumentKind::Any);
    let r = nest.terms().value(int, "r");
    let def = nest
        .predicates()
        .equality(r, a, Locus::unknown(), PredicateType::State);
    let body = PredicateState::basic(vec![def]);
    let same = nest.terms().cmp(ConditionType::Eq, r, a);
    let query = holds(&mut nest, same);
    assert_eq!(solver().get_contract(&mut nest, &[a], &query, &body), None);
}

#[test]
fn probed_models_never_violate_the_query() {
    let mut nest = FactoryNest::new();
    let byte = nest.types().integer(8, Signedness::Unsigned);
    let x = nest.terms().value(byte, "x");
    let four = nest.terms().int(4, 8, Signedness::Unsigned);
    let two = nest.terms().int(2, 8, Signedness::Unsigned);
    let small = nest.terms().cmp(ConditionType::Ult, x, four);
    let body = holds(&mut nest, small);
    let not_two = nest
        .predicates()
        .inequality(x, two, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![not_two]);

    let models = solver().probe_models(&mut nest, &body, &query, &[x], &[x]);
    let StateNode::Choice { choices } = models.node() else {
        panic!("expected several models, got {}", models.display(&nest));
    };
    let mut values: Vec<i64> = choices
        .iter()
        .flat_map(|c| c.predicates())
        .map(|p| match &nest.predicate(p).kind {
            PredicateKind::Equality { lhv, rhv } => {
                assert_eq!(*lhv, x);
                match nest.term(*rhv).kind {
                    TermKind::OpaqueInt(v) => v,
                    ref other => panic!("model value is not a literal: {:?}", other),
                }
            }
            other => panic!("unexpected model predicate {:?}", other),
        })
        .collect();
    values.sort();
    assert_eq!(values, vec![0, 1, 3]);
}

#[test]
fn no_safe_model_is_an_unsatisfiable_state() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let one = lit(&mut nest, 1);
    let two = lit(&mut nest, 2);
    let def = nest
        .predicates()
        .equality(x, one, Locus::unknown(), PredicateType::State);
    let body = PredicateState::basic(vec![def]);
    let is_two = nest
        .predicates()
        .equality(x, two, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![is_two]);

    let models = solver().probe_models(&mut nest, &body, &query, &[x], &[x]);
    assert!(!models.is_empty());
    // Nothing follows from it, not even `false`
    let f = nest.terms().false_term();
    let never = holds(&mut nest, f);
    assert!(solver().is_violated(&nest, &never, &models).is_unsat());
    assert!(solver()
        .is_violated(&nest, &never, &PredicateState::empty())
        .is_sat());
}

// ═══════════════════════════════════════════════════════════════════════════
// Caching and backends
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn shared_cache_reuses_state_encodings() {
    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let one = lit(&mut nest, 1);
    let def = nest
        .predicates()
        .equality(x, one, Locus::unknown(), PredicateType::State);
    let state = PredicateState::basic(vec![def]);
    let gt = nest.terms().cmp(ConditionType::Gt, x, zero);
    let ge = nest.terms().cmp(ConditionType::Ge, x, zero);
    let q1 = holds(&mut nest, gt);
    let q2 = holds(&mut nest, ge);

    let cache = Arc::new(EncodingCache::new(&CacheConfig::default()));
    let first = solver().with_cache(Arc::clone(&cache));
    let second = solver().with_cache(Arc::clone(&cache));
    assert!(first.is_violated(&nest, &q1, &state).is_unsat());
    assert!(second.is_violated(&nest, &q2, &state).is_unsat());
    assert_eq!(cache.len(), 1);
    assert!(cache.hit_rate() > 0.0);
}

#[test]
fn shared_cache_keeps_nests_apart() {
    // Same interning order in both nests, so the handles coincide
    fn function(value: i64) -> (FactoryNest, PredicateState, PredicateState) {
        let mut nest = FactoryNest::new();
        let x = int_var(&mut nest, "x");
        let v = lit(&mut nest, value);
        let five = lit(&mut nest, 5);
        let def = nest
            .predicates()
            .equality(x, v, Locus::unknown(), PredicateType::State);
        let state = PredicateState::basic(vec![def]);
        let eq = nest.terms().cmp(ConditionType::Eq, x, five);
        let query = holds(&mut nest, eq);
        (nest, state, query)
    }
    let (nest_a, state_a, query_a) = function(5);
    let (nest_b, state_b, query_b) = function(7);
    assert_eq!(state_a, state_b);

    let cache = Arc::new(EncodingCache::new(&CacheConfig::default()));
    let shared = solver().with_cache(Arc::clone(&cache));
    assert!(shared.is_violated(&nest_a, &query_a, &state_a).is_unsat());
    assert!(shared.is_violated(&nest_b, &query_b, &state_b).is_sat());
    assert_eq!(cache.len(), 2);
}

#[test]
fn builtin_backend_is_the_default() {
    assert_eq!(solver().backend_name(), "builtin");
}

#[cfg(feature = "z3")]
#[test]
fn z3_backend_agrees_with_builtin() {
    use symstate_engine::config::BackendKind;

    let mut nest = FactoryNest::new();
    let x = int_var(&mut nest, "x");
    let zero = lit(&mut nest, 0);
    let gt = nest.terms().cmp(ConditionType::Gt, x, zero);
    let lt = nest.terms().cmp(ConditionType::Lt, x, zero);
    let state = holds(&mut nest, gt);
    let query = holds(&mut nest, lt);
    let config = SmtConfig::default().backend(BackendKind::Z3);
    let z3 = Solver::new(&config, MEMORY.0, MEMORY.1);
    assert_eq!(z3.backend_name(), "z3");
    assert_eq!(
        z3.is_violated(&nest, &query, &state).is_sat(),
        solver().is_violated(&nest, &query, &state).is_sat()
    );
}

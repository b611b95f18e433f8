//! Serialization integration tests
//!
//! Analysis results go through the wire formats and the content stores and
//! must come back meaning the same thing in a fresh nest.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use pretty_assertions::assert_eq;
use symstate_engine::config::{PsaConfig, SmtConfig};
use symstate_engine::features::path_sensitivity::{OneForAll, OneForOne, PredicateStateAnalysis};
use symstate_engine::features::predicate_state::PredicateState;
use symstate_engine::features::serialization::{
    deserialize, load_state, persist_state, serialize, WireFormat,
};
use symstate_engine::features::smt::Solver;
use symstate_engine::features::term_algebra::{
    ArgumentKind, ArithType, ConditionType, FactoryNest, PredicateType, Signedness,
};
use symstate_engine::shared::models::Locus;
use symstate_storage::{BlobKind, ContentStore, MemoryStore};

const FORMATS: [WireFormat; 2] = [WireFormat::Json, WireFormat::MessagePack];

/// One predicate per interesting term shape, chained and branched
fn kitchen_sink(nest: &mut FactoryNest) -> PredicateState {
    let int = nest.types().integer(32, Signedness::Signed);
    let byte = nest.types().integer(8, Signedness::Unsigned);
    let point = nest.types().define_record("point", vec![int, int]);
    let ptr = nest.types().pointer_to(point);
    let buf_ty = nest.types().array(byte, Some(16));
    let buf_ptr = nest.types().pointer_to(buf_ty);

    let p = nest.terms().argument(ptr, 0, "p", ArgumentKind::Any);
    let g = nest.terms().global(buf_ptr, "buf");
    let r = nest.terms().return_value(int, "kitchen");
    let v = nest.terms().value(int, "v");
    let one = nest.terms().int(1, 32, Signedness::Signed);
    let zero = nest.terms().int64(0);
    let idx = nest.terms().int64(1);
    let field = nest.terms().gep(p, vec![zero, idx], true);
    let loaded = nest.terms().load(field);
    let sum = nest.terms().binary(ArithType::Add, loaded, one);
    let widened = nest.terms().cast(byte, false, sum);
    let cond = nest.terms().cmp(ConditionType::Ge, v, one);
    let pick = nest.terms().ternary(cond, v, one);
    let half = nest.terms().real(0.5);
    let label = nest.terms().string("label");
    let undef = nest.terms().undef(int);
    let invalid = nest.terms().invalid_ptr(ptr);
    let null = nest.terms().null_ptr();
    let member = nest.terms().member_access(p, "x", true);

    let mut preds = nest.predicates();
    let a = preds.equality(v, sum, locus(1), PredicateType::State);
    let b = preds.store(g, widened, locus(2), PredicateType::State);
    let c = preds.equality(r, pick, locus(3), PredicateType::Ensures);
    let d = preds.inequality(p, invalid, locus(4), PredicateType::Requires);
    let e = preds.inequality(p, null, locus(4), PredicateType::Assume);
    let f = preds.equality(undef, member, Locus::unknown(), PredicateType::State);
    let h = preds.equality(label, half, Locus::unknown(), PredicateType::Invariant);
    let path = preds.boolean(cond, true, locus(5));
    let other = preds.boolean(cond, false, locus(5));

    let head = PredicateState::basic(vec![a, b]).add_visited(locus(1));
    let arms = PredicateState::choice(vec![
        PredicateState::basic(vec![path, c]),
        PredicateState::basic(vec![other, d, e]),
    ]);
    let tail = PredicateState::basic(vec![f, h]).add_visited(locus(6));
    PredicateState::chain(&PredicateState::chain(&head, &arms), &tail)
}

// ═══════════════════════════════════════════════════════════════════════════
// Wire formats
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn every_node_shape_survives_both_formats() {
    let mut nest = FactoryNest::new();
    let state = kitchen_sink(&mut nest);
    for format in FORMATS {
        let bytes = serialize(&nest, &state, format).unwrap();
        let mut fresh = FactoryNest::new();
        let back: PredicateState = deserialize(&mut fresh, &bytes, format).unwrap();

        assert_eq!(back.display(&fresh), state.display(&nest), "{:?}", format);
        assert_eq!(back.visited(), state.visited());
        assert_eq!(back.size(), state.size());
        assert_eq!(serialize(&fresh, &back, format).unwrap(), bytes);
    }
}

#[test]
fn decoding_into_the_source_nest_is_identity() {
    let mut nest = FactoryNest::new();
    let state = kitchen_sink(&mut nest);
    let bytes = serialize(&nest, &state, WireFormat::MessagePack).unwrap();
    let back: PredicateState = deserialize(&mut nest, &bytes, WireFormat::MessagePack).unwrap();
    assert_eq!(back, state);
    assert_eq!(back.predicates(), state.predicates());
}

#[test]
fn record_bodies_are_rebuilt_in_the_fresh_nest() {
    let mut nest = FactoryNest::new();
    let state = kitchen_sink(&mut nest);
    let bytes = serialize(&nest, &state, WireFormat::Json).unwrap();
    let mut fresh = FactoryNest::new();
    let _: PredicateState = deserialize(&mut fresh, &bytes, WireFormat::Json).unwrap();

    let fields = fresh
        .type_factory()
        .record_body("point")
        .expect("record body travels with the document")
        .to_vec();
    assert_eq!(fields.len(), 2);
    assert_eq!(fresh.type_factory().bitsize(fields[0]), Some(32));
}

#[test]
fn analysis_results_round_trip_per_instruction() {
    let mut d = fixture_diamond();
    let states = d.fx.run(&mut OneForOne::new(PsaConfig::default()));

    let mut fresh = FactoryNest::new();
    for (inst, state) in &states {
        let bytes = serialize(&d.fx.nest, state, WireFormat::Json).unwrap();
        let back: PredicateState = deserialize(&mut fresh, &bytes, WireFormat::Json).unwrap();
        assert_eq!(
            back.display(&fresh),
            state.display(&d.fx.nest),
            "state of {:?}",
            inst
        );
    }
}

#[test]
fn decoded_states_answer_queries_the_same_way() {
    let mut d = fixture_diamond();
    let mut psa = OneForAll::new(PsaConfig::default());
    d.fx.run(&mut psa);
    let state = psa.instruction_state(&mut d.fx.nest, d.use_y).unwrap();
    let three = lit(&mut d.fx.nest, 3);
    let safe = d
        .fx
        .nest
        .predicates()
        .inequality(d.y, three, Locus::unknown(), PredicateType::State);
    let query = PredicateState::basic(vec![safe]);

    let mut fresh = FactoryNest::new();
    let bytes = serialize(&d.fx.nest, &state, WireFormat::MessagePack).unwrap();
    let state2: PredicateState = deserialize(&mut fresh, &bytes, WireFormat::MessagePack).unwrap();
    let bytes = serialize(&d.fx.nest, &query, WireFormat::MessagePack).unwrap();
    let query2: PredicateState = deserialize(&mut fresh, &bytes, WireFormat::MessagePack).unwrap();

    let solver = Solver::new(&SmtConfig::default(), 1 << 24, 2 << 24);
    assert!(solver.is_violated(&d.fx.nest, &query, &state).is_unsat());
    assert!(solver.is_violated(&fresh, &query2, &state2).is_unsat());
}

// ═══════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn memory_store_deduplicates_equal_states() {
    let store = MemoryStore::new();
    let mut sl = fixture_straight_line(3);
    let states = sl.fx.run(&mut OneForAll::new(PsaConfig::default()));

    let mut keys = Vec::new();
    for state in states.values() {
        keys.push(persist_state(&store, &sl.fx.nest, state).unwrap());
    }
    let stored = store.len().unwrap();
    assert!(stored >= 1 && stored <= states.len());

    // a second nest producing the same states adds nothing
    let mut again = fixture_straight_line(3);
    let states2 = again.fx.run(&mut OneForAll::new(PsaConfig::default()));
    for (key, state) in keys.iter().zip(states2.values()) {
        assert_eq!(&persist_state(&store, &again.fx.nest, state).unwrap(), key);
    }
    assert_eq!(store.len().unwrap(), stored);

    let mut fresh = FactoryNest::new();
    for (key, state) in keys.iter().zip(states.values()) {
        let back = load_state(&store, &mut fresh, key).unwrap();
        assert_eq!(back.display(&fresh), state.display(&sl.fx.nest));
        assert_eq!(store.fetch(key).unwrap().kind, BlobKind::State);
    }
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_store_survives_reopening() {
    use symstate_storage::SqliteStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("states.db");
    let mut nest = FactoryNest::new();
    let state = kitchen_sink(&mut nest);

    let key = {
        let store = SqliteStore::open(&path).unwrap();
        persist_state(&store, &nest, &state).unwrap()
    };

    let store = SqliteStore::open(&path).unwrap();
    assert!(store.contains(&key).unwrap());
    assert_eq!(store.keys_of_kind(BlobKind::State).unwrap(), vec![key.clone()]);
    let mut fresh = FactoryNest::new();
    let back = load_state(&store, &mut fresh, &key).unwrap();
    assert_eq!(back.display(&fresh), state.display(&nest));
}

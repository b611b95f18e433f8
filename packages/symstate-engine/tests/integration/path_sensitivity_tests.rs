//! Path-sensitivity integration tests
//!
//! Runs the three algorithms over the shared fixtures and checks what a
//! checker downstream relies on: which predicates reach an instruction,
//! where callee effects show up, and which instructions are pruned.

#[path = "../common/mod.rs"]
mod common;
use common::*;

use pretty_assertions::assert_eq;
use symstate_engine::config::{AnalysisConfig, Preset, PsaConfig, SmtConfig};
use symstate_engine::features::ir::{FunctionBuilder, InMemoryFunctionManager, PredicateMaps, SummaryKind};
use symstate_engine::features::path_sensitivity::{
    analysis_for, analyze_function, OneForAll, OneForAllTd, OneForOne, PredicateStateAnalysis,
    PsaInputs,
};
use symstate_engine::features::predicate_state::{PredicateState, StateNode};
use symstate_engine::features::smt::SolverOracle;
use symstate_engine::features::term_algebra::{FactoryNest, PredicateType};
use symstate_engine::shared::models::{InstId, Locus};

fn algorithms(config: &PsaConfig) -> Vec<Box<dyn PredicateStateAnalysis>> {
    vec![
        Box::new(OneForOne::new(config.clone())),
        Box::new(OneForAll::new(config.clone())),
        Box::new(OneForAllTd::new(config.clone())),
    ]
}

fn has_choice(state: &PredicateState) -> bool {
    match state.node() {
        StateNode::Basic { .. } => false,
        StateNode::Chain { base, curr } => has_choice(base) || has_choice(curr),
        StateNode::Choice { .. } => true,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Straight-line code
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn straight_line_states_agree_across_algorithms() {
    let mut sl = fixture_straight_line(4);
    for mut psa in algorithms(&PsaConfig::default()) {
        let states = sl.fx.run(psa.as_mut());
        assert_eq!(states.len(), 5, "{} missed instructions", psa.name());

        for (i, inst) in sl.insts.iter().enumerate() {
            let state = &states[inst];
            assert_eq!(state.predicates(), sl.effects[..=i].to_vec(), "{}", psa.name());
            assert!(state.has_visited(&locus(i as u32 + 1)));
        }
        assert_eq!(states[&sl.ret].predicates(), sl.effects, "{}", psa.name());
    }
}

#[test]
fn analyses_concatenate_in_registration_order() {
    let mut sl = fixture_straight_line(1);
    let int = int32(&mut sl.fx.nest);
    let w = sl.fx.nest.terms().value(int, "w");
    let c = lit(&mut sl.fx.nest, 7);
    let extra = sl
        .fx
        .nest
        .predicates()
        .equality(w, c, Locus::unknown(), PredicateType::State);
    let mut second = PredicateMaps::new("second");
    second.add_instruction(sl.insts[0], extra);

    let inputs = PsaInputs::new(&sl.fx.functions)
        .with_analysis(&sl.fx.maps)
        .with_analysis(&second);
    let mut psa = OneForAll::new(PsaConfig::default());
    psa.run(&mut sl.fx.nest, &sl.fx.function, &inputs).unwrap();
    let state = psa.instruction_state(&mut sl.fx.nest, sl.insts[0]).unwrap();
    assert_eq!(state.predicates(), vec![sl.effects[0], extra]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Merging
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn diamond_merge_keeps_both_arms() {
    let mut d = fixture_diamond();
    let expected = PredicateState::basic(vec![d.on_true, d.on_false, d.phi_left, d.phi_right]);

    for mut psa in algorithms(&PsaConfig::default()) {
        let states = d.fx.run(psa.as_mut());
        let state = &states[&d.use_y];
        assert_same_predicates(&d.fx.nest, state, &expected);
        assert!(has_choice(state), "{} lost the merge", psa.name());
        assert!(state.has_visited(&locus(5)));
    }
}

#[test]
fn one_for_all_hoists_the_dominator_state() {
    let mut d = fixture_diamond();
    let mut psa = OneForAll::new(PsaConfig::default());
    d.fx.run(&mut psa);
    let state = psa.instruction_state(&mut d.fx.nest, d.use_y).unwrap();
    let expected = PredicateState::choice(vec![
        PredicateState::basic(vec![d.on_true, d.phi_left]),
        PredicateState::basic(vec![d.on_false, d.phi_right]),
    ]);
    assert_eq!(state, expected);
}

#[test]
fn ladder_state_grows_with_paths_only_for_one_for_one() {
    let mut ladder = LadderBuilder::new(3).build();

    let mut one = OneForOne::new(PsaConfig::default());
    let per_path = ladder.fx.run(&mut one)[&ladder.last].clone();
    match per_path.node() {
        StateNode::Choice { choices } => assert_eq!(choices.len(), 8),
        other => panic!("expected one alternative per path, got {:?}", other),
    }

    let mut all = OneForAll::new(PsaConfig::default());
    let merged = ladder.fx.run(&mut all)[&ladder.last].clone();
    let mut td = OneForAllTd::new(PsaConfig::default());
    let top_down = ladder.fx.run(&mut td)[&ladder.last].clone();

    for cond in &ladder.conditions {
        assert!(per_path.contains(*cond));
        assert!(merged.contains(*cond));
        assert!(top_down.contains(*cond));
    }
    assert_eq!(merged.size(), 12);
    assert!(merged.size() < per_path.size());
}

// ═══════════════════════════════════════════════════════════════════════════
// Calls
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn call_effects_start_after_the_call() {
    let mut cs = fixture_call_site();
    for mut psa in algorithms(&PsaConfig::default()) {
        let states = cs.fx.run(psa.as_mut());
        let nest = &cs.fx.nest;

        assert_eq!(
            find_equality(nest, &states[&cs.call], cs.r, cs.x),
            None,
            "{} applied the callee too early",
            psa.name()
        );
        let applied = find_equality(nest, &states[&cs.after], cs.r, cs.x)
            .unwrap_or_else(|| panic!("{} dropped the callee summary", psa.name()));
        let pred = nest.predicate(applied);
        assert_eq!(pred.ptype, PredicateType::Assume);
        assert_eq!(pred.locus, cs.call_locus);
        assert!(states[&cs.after].has_visited(&cs.call_locus));
    }
}

#[test]
fn requires_of_the_function_reach_every_instruction() {
    let mut d = fixture_diamond();
    let zero = lit(&mut d.fx.nest, 0);
    let req = d
        .fx
        .nest
        .predicates()
        .inequality(d.x, zero, Locus::unknown(), PredicateType::Requires);
    d.fx
        .functions
        .put("diamond", SummaryKind::Requires, PredicateState::basic(vec![req]));

    for mut psa in algorithms(&PsaConfig::default()) {
        let states = d.fx.run(psa.as_mut());
        assert_eq!(psa.initial_state().unwrap().predicates(), vec![req]);
        assert!(states.values().all(|s| s.contains(req)), "{}", psa.name());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Reachability
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn structural_oracle_prunes_constant_branches() {
    let mut db = fixture_dead_branch();
    let config = PsaConfig::default();
    for mut psa in [
        Box::new(OneForOne::new(config.clone())) as Box<dyn PredicateStateAnalysis>,
        Box::new(OneForAll::new(config.clone())),
    ] {
        let states = db.fx.run(psa.as_mut());
        assert_unreached(&states, db.dead);
        assert_reached(&states, db.live);
        assert_reached(&states, db.join);
    }

    // the top-down variant never prunes
    let mut td = OneForAllTd::new(config.clone());
    assert_reached(&db.fx.run(&mut td), db.dead);

    let mut unchecked = OneForAll::new(config.check_unreachable(false));
    assert_reached(&db.fx.run(&mut unchecked), db.dead);
}

#[test]
fn solver_oracle_prunes_contradicting_conditions() {
    let mut c = fixture_contradiction();
    let structural = c.fx.run(&mut OneForAll::new(PsaConfig::default()));
    assert_reached(&structural, c.dead);

    let oracle = SolverOracle::new(&SmtConfig::default());
    let Fixture {
        nest,
        function,
        maps,
        functions,
    } = &mut c.fx;
    let inputs = PsaInputs::new(&*functions)
        .with_analysis(&*maps)
        .with_oracle(&oracle);

    for preset in [Preset::Precise, Preset::Balanced] {
        let config = AnalysisConfig::preset(preset);
        let res = analyze_function(&config.psa, nest, function, &inputs).unwrap();
        assert_eq!(res.unreached(function).collect::<Vec<_>>(), vec![c.dead, InstId(c.dead.0 + 1)]);
        assert!(res.get(c.live).is_some());
        assert!(res.get(c.join).is_some());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry points
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn analyze_function_covers_every_instruction_for_each_preset() {
    for preset in [Preset::Precise, Preset::Balanced, Preset::Fast] {
        let mut d = fixture_diamond();
        let config = AnalysisConfig::preset(preset);
        let inputs = PsaInputs::new(&d.fx.functions).with_analysis(&d.fx.maps);
        let res = analyze_function(&config.psa, &mut d.fx.nest, &d.fx.function, &inputs).unwrap();
        assert_eq!(res.unreached(&d.fx.function).count(), 0, "{:?}", preset);
        assert_eq!(res.states.len(), d.fx.function.instructions().len());
        assert!(res.initial.is_empty());
    }
}

#[test]
fn cyclic_functions_are_rejected_by_every_algorithm() {
    let mut fb = FunctionBuilder::new("spin");
    let entry = fb.block("entry");
    let body = fb.block("body");
    fb.branch(entry, vec![body], Locus::unknown());
    fb.branch(body, vec![entry, body], Locus::unknown());
    let function = fb.build().unwrap();

    let functions = InMemoryFunctionManager::new();
    let inputs = PsaInputs::new(&functions);
    let mut nest = FactoryNest::new();
    for preset in [Preset::Precise, Preset::Balanced, Preset::Fast] {
        let mut psa = analysis_for(&AnalysisConfig::preset(preset).psa);
        let err = psa.run(&mut nest, &function, &inputs).unwrap_err();
        assert!(err.is_invariant(), "{}: {}", psa.name(), err);
    }
}

#[test]
fn analysis_objects_are_reusable_across_functions() {
    let mut d = fixture_diamond();
    let mut sl = fixture_straight_line(2);
    let mut psa = OneForAll::new(PsaConfig::default());

    let first = d.fx.run(&mut psa);
    assert_eq!(first.len(), d.fx.function.instructions().len());
    let second = sl.fx.run(&mut psa);
    assert_eq!(second.len(), 3);
    assert!(psa.instruction_state(&mut sl.fx.nest, d.use_y).is_none());
}

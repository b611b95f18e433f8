//! Helpers shared by the three algorithms
//!
//! Map lookups concatenate the entries of every registered analysis and
//! mark the program point as visited, the way each algorithm expects them.

use crate::errors::Result;
use crate::features::ir::{Function, InstKind, Instruction};
use crate::features::path_sensitivity::domain::PsaInputs;
use crate::features::predicate_state::{
    CallSiteInitializer, PredicateState, PredicateStateBuilder, Transformer,
};
use crate::features::term_algebra::{FactoryNest, PredicateId};
use crate::invariant;
use crate::shared::models::{BlockId, Locus};
use tracing::debug;

pub(crate) const TARGET: &str = "symstate::psa";

/// Instruction effects of every analysis
pub(crate) fn instruction_predicates(inputs: &PsaInputs<'_>, inst: &Instruction) -> Vec<PredicateId> {
    inputs
        .analyses
        .iter()
        .flat_map(|a| a.instruction_predicates(inst.id).iter().copied())
        .collect()
}

/// `PM(I)`: instruction effects with the instruction's locus visited
pub(crate) fn pm(inputs: &PsaInputs<'_>, inst: &Instruction) -> PredicateState {
    PredicateState::basic(instruction_predicates(inputs, inst)).add_visited(inst.locus.clone())
}

/// Post-map facts of `inst`
pub(crate) fn post_pm(inputs: &PsaInputs<'_>, inst: &Instruction) -> PredicateState {
    let preds = inputs
        .analyses
        .iter()
        .flat_map(|a| a.post_predicates(inst.id).iter().copied())
        .collect();
    PredicateState::basic(preds).add_visited(inst.locus.clone())
}

/// Raw path condition of `terminator -> successor`
pub(crate) fn terminator_predicates(
    inputs: &PsaInputs<'_>,
    terminator: &Instruction,
    successor: BlockId,
) -> Vec<PredicateId> {
    inputs
        .analyses
        .iter()
        .flat_map(|a| a.terminator_predicates(terminator.id, successor).iter().copied())
        .collect()
}

/// `TPM(T, S)`: edge condition with the terminator's locus visited
pub(crate) fn tpm(
    inputs: &PsaInputs<'_>,
    terminator: &Instruction,
    successor: BlockId,
) -> PredicateState {
    PredicateState::basic(terminator_predicates(inputs, terminator, successor))
        .add_visited(terminator.locus.clone())
}

/// Raw PHI value of `phi` entered from `predecessor`
pub(crate) fn phi_predicates(
    inputs: &PsaInputs<'_>,
    predecessor: BlockId,
    phi: &Instruction,
) -> Vec<PredicateId> {
    inputs
        .analyses
        .iter()
        .flat_map(|a| a.phi_predicates(predecessor, phi.id).iter().copied())
        .collect()
}

/// `PPM(P, phi)`: PHI value with the PHI's locus visited
pub(crate) fn ppm(inputs: &PsaInputs<'_>, predecessor: BlockId, phi: &Instruction) -> PredicateState {
    PredicateState::basic(phi_predicates(inputs, predecessor, phi)).add_visited(phi.locus.clone())
}

/// PHI values of every PHI of `block` that has an incoming value from `predecessor`
pub(crate) fn phi_state(
    inputs: &PsaInputs<'_>,
    function: &Function,
    predecessor: BlockId,
    block: BlockId,
) -> PredicateState {
    let mut builder = PredicateStateBuilder::new();
    for phi in function.phis(block) {
        if let InstKind::Phi { incoming } = &phi.kind {
            if incoming.contains(&predecessor) {
                builder += ppm(inputs, predecessor, phi);
            }
        }
    }
    builder.apply()
}

/// Globals, then the function's REQUIRES, then its argument loci
pub(crate) fn initial_state(
    nest: &mut FactoryNest,
    function: &Function,
    inputs: &PsaInputs<'_>,
) -> PredicateState {
    let mut builder = PredicateStateBuilder::new();
    if !function.globals.is_empty() {
        let globals = nest
            .predicates()
            .globals(function.globals.clone(), Locus::unknown());
        builder += globals;
    }
    match inputs.functions.requires(&function.name) {
        Some(requires) => builder += requires,
        None => debug!(target: TARGET, function = %function.name, "no REQUIRES registered"),
    }
    for arg in &function.arguments {
        builder <<= arg.locus.clone();
    }
    builder.build(nest)
}

/// Callee BODY + ENSURES instantiated at the call site `inst`
///
/// `Ok(None)` when `inst` is not a call or the callee has no summary.
pub(crate) fn call_state(
    nest: &mut FactoryNest,
    inputs: &PsaInputs<'_>,
    inst: &Instruction,
) -> Result<Option<PredicateState>> {
    let InstKind::Call {
        callee,
        args,
        result,
    } = &inst.kind
    else {
        return Ok(None);
    };

    let body = inputs.functions.body(callee);
    let ensures = inputs.functions.ensures(callee);
    if body.is_none() && ensures.is_none() {
        debug!(target: TARGET, %callee, at = %inst.locus, "no summary for callee");
        return Ok(None);
    }

    let fixed = inputs.functions.fixed_params(callee).unwrap_or(args.len());
    invariant!(
        args.len() >= fixed,
        "call to {} at {} passes {} arguments, {} expected",
        callee,
        inst.locus,
        args.len(),
        fixed
    );

    let mut builder = PredicateStateBuilder::new();
    if let Some(body) = body {
        builder += body;
    }
    if let Some(ensures) = ensures {
        builder += ensures;
    }
    let callee_state = builder.apply();

    let prefix = format!("{}{}", callee, inst.id);
    let mut initializer = CallSiteInitializer::new(
        nest,
        callee.clone(),
        args.clone(),
        *result,
        fixed,
        prefix,
        inst.locus.clone(),
    );
    Ok(Some(initializer.transform(&callee_state)))
}

/// `true` when `check_unreachable` is on and the oracle rejects `state`
pub(crate) fn prune(
    enabled: bool,
    nest: &FactoryNest,
    function: &Function,
    inputs: &PsaInputs<'_>,
    state: &PredicateState,
) -> bool {
    if !enabled {
        return false;
    }
    let memory = inputs.functions.memory_bounds(&function.name);
    inputs.oracle.is_unreachable(nest, state, memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::{FunctionBuilder, InMemoryFunctionManager, PredicateMaps, SummaryKind};
    use crate::features::term_algebra::{ArgumentKind, PredicateType, Signedness, TermKind};

    #[test]
    fn test_initial_state_orders_globals_before_requires() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let g = nest.terms().global(int, "g");
        let zero = nest.terms().int(0, 32, Signedness::Signed);
        let req = nest
            .predicates()
            .inequality(g, zero, Locus::unknown(), PredicateType::Requires);

        let mut fm = InMemoryFunctionManager::new();
        fm.put("f", SummaryKind::Requires, PredicateState::basic(vec![req]));

        let a = nest.terms().argument(int, 0, "a", ArgumentKind::Any);
        let mut fb = FunctionBuilder::new("f");
        let entry = fb.block("entry");
        fb.ret(entry, Locus::unknown());
        fb.global(g).argument(a, Locus::new("f.c", 1, 10));
        let f = fb.build().unwrap();

        let inputs = PsaInputs::new(&fm);
        let state = initial_state(&mut nest, &f, &inputs);
        let preds = state.predicates();
        assert_eq!(preds.len(), 2);
        assert_eq!(nest.predicate(preds[0]).kind.kind_name(), "Globals");
        assert_eq!(preds[1], req);
        assert!(state.has_visited(&Locus::new("f.c", 1, 10)));
    }

    #[test]
    fn test_call_state_substitutes_actuals() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let formal = nest.terms().argument(int, 0, "n", ArgumentKind::Any);
        let ret = nest.terms().return_value(int, "id");
        let ens = nest
            .predicates()
            .equality(ret, formal, Locus::unknown(), PredicateType::Ensures);

        let mut fm = InMemoryFunctionManager::new();
        fm.register("id", 1)
            .put("id", SummaryKind::Ensures, PredicateState::basic(vec![ens]));

        let x = nest.terms().value(int, "x");
        let r = nest.terms().value(int, "r");
        let mut fb = FunctionBuilder::new("main");
        let entry = fb.block("entry");
        let call = fb.call(entry, "id", vec![x], Some(r), Locus::new("m.c", 3, 4));
        fb.ret(entry, Locus::unknown());
        let f = fb.build().unwrap();

        let maps = PredicateMaps::new("empty");
        let inputs = PsaInputs::new(&fm).with_analysis(&maps);
        let state = call_state(&mut nest, &inputs, f.instruction(call))
            .unwrap()
            .unwrap();
        let preds = state.predicates();
        assert_eq!(preds.len(), 1);
        let pred = nest.predicate(preds[0]);
        assert_eq!(pred.ptype, PredicateType::Assume);
        assert_eq!(pred.locus, Locus::new("m.c", 3, 4));
        match &pred.kind {
            crate::features::term_algebra::PredicateKind::Equality { lhv, rhv } => {
                assert_eq!(*lhv, r);
                assert_eq!(*rhv, x);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(nest.term(x).kind, TermKind::Value { .. }));
    }

    #[test]
    fn test_call_with_too_few_actuals_is_an_invariant_violation() {
        let mut nest = FactoryNest::new();
        let t = nest.terms().true_term();
        let p = nest.predicates().boolean(t, true, Locus::unknown());
        let mut fm = InMemoryFunctionManager::new();
        fm.register("two", 2)
            .put("two", SummaryKind::Body, PredicateState::basic(vec![p]));

        let mut fb = FunctionBuilder::new("main");
        let entry = fb.block("entry");
        let call = fb.call(entry, "two", vec![], None, Locus::unknown());
        fb.ret(entry, Locus::unknown());
        let f = fb.build().unwrap();

        let inputs = PsaInputs::new(&fm);
        let err = call_state(&mut nest, &inputs, f.instruction(call)).unwrap_err();
        assert!(err.is_invariant());
    }

    #[test]
    fn test_call_without_summary_contributes_nothing() {
        let mut nest = FactoryNest::new();
        let fm = InMemoryFunctionManager::new();
        let mut fb = FunctionBuilder::new("main");
        let entry = fb.block("entry");
        let call = fb.call(entry, "unknown", vec![], None, Locus::unknown());
        fb.ret(entry, Locus::unknown());
        let f = fb.build().unwrap();
        let inputs = PsaInputs::new(&fm);
        assert_eq!(
            call_state(&mut nest, &inputs, f.instruction(call)).unwrap(),
            None
        );
    }
}

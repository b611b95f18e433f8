//! Test fixtures
//!
//! Small functions with hand-written predicate maps. Every fixture owns its
//! nest, so terms and predicates can be compared by id.

use symstate_engine::features::ir::{
    Function, FunctionBuilder, InMemoryFunctionManager, InstKind, PredicateMaps, SummaryKind,
};
use symstate_engine::features::path_sensitivity::{PredicateStateAnalysis, PsaInputs};
use symstate_engine::features::predicate_state::PredicateState;
use symstate_engine::features::term_algebra::{
    ArgumentKind, ConditionType, FactoryNest, PredicateId, PredicateType, Signedness, TermId,
    TypeId,
};
use symstate_engine::shared::models::{InstId, Locus};
use std::collections::BTreeMap;

pub const FILE: &str = "fixture.c";

pub fn locus(line: u32) -> Locus {
    Locus::new(FILE, line, 1)
}

pub fn int32(nest: &mut FactoryNest) -> TypeId {
    nest.types().integer(32, Signedness::Signed)
}

pub fn lit(nest: &mut FactoryNest, value: i64) -> TermId {
    nest.terms().int(value, 32, Signedness::Signed)
}

/// A function together with everything an analysis run needs
pub struct Fixture {
    pub nest: FactoryNest,
    pub function: Function,
    pub maps: PredicateMaps,
    pub functions: InMemoryFunctionManager,
}

impl Fixture {
    /// Run `psa` and collect every instruction state
    pub fn run(&mut self, psa: &mut dyn PredicateStateAnalysis) -> BTreeMap<InstId, PredicateState> {
        let Fixture {
            nest,
            function,
            maps,
            functions,
        } = self;
        let inputs = PsaInputs::new(&*functions).with_analysis(&*maps);
        psa.run(nest, function, &inputs).unwrap();
        psa.states(nest)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Straight line
// ═══════════════════════════════════════════════════════════════════════════

pub struct StraightLine {
    pub fx: Fixture,
    /// `v{i} == i`, one per instruction
    pub effects: Vec<PredicateId>,
    pub insts: Vec<InstId>,
    pub ret: InstId,
}

/// `n` instructions in one block, each defining its own value
pub fn fixture_straight_line(n: usize) -> StraightLine {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let mut fb = FunctionBuilder::new("straight");
    let entry = fb.block("entry");
    let mut maps = PredicateMaps::new("fixture");
    let mut effects = Vec::with_capacity(n);
    let mut insts = Vec::with_capacity(n);

    for i in 0..n {
        let v = nest.terms().value(int, format!("v{}", i));
        let c = lit(&mut nest, i as i64);
        let effect = nest
            .predicates()
            .equality(v, c, locus(i as u32 + 1), PredicateType::State);
        let inst = fb.instruction(entry, InstKind::Other, locus(i as u32 + 1));
        maps.add_instruction(inst, effect);
        effects.push(effect);
        insts.push(inst);
    }
    let ret = fb.ret(entry, locus(n as u32 + 1));

    StraightLine {
        fx: Fixture {
            nest,
            function: fb.build().unwrap(),
            maps,
            functions: InMemoryFunctionManager::new(),
        },
        effects,
        insts,
        ret,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Diamond
// ═══════════════════════════════════════════════════════════════════════════

pub struct Diamond {
    pub fx: Fixture,
    pub x: TermId,
    pub y: TermId,
    pub on_true: PredicateId,
    pub on_false: PredicateId,
    pub phi_left: PredicateId,
    pub phi_right: PredicateId,
    pub use_y: InstId,
}

/// `if (x > 0) y = 1; else y = 2; use(y);`
pub fn fixture_diamond() -> Diamond {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let x = nest.terms().value(int, "x");
    let y = nest.terms().value(int, "y");
    let zero = lit(&mut nest, 0);
    let one = lit(&mut nest, 1);
    let two = lit(&mut nest, 2);
    let cond = nest.terms().cmp(ConditionType::Gt, x, zero);
    let on_true = nest.predicates().boolean(cond, true, locus(1));
    let on_false = nest.predicates().boolean(cond, false, locus(1));
    let phi_left = nest
        .predicates()
        .equality(y, one, locus(4), PredicateType::State);
    let phi_right = nest
        .predicates()
        .equality(y, two, locus(4), PredicateType::State);

    let mut fb = FunctionBuilder::new("diamond");
    let entry = fb.block("entry");
    let left = fb.block("left");
    let right = fb.block("right");
    let exit = fb.block("exit");
    let br = fb.branch(entry, vec![left, right], locus(1));
    fb.branch(left, vec![exit], locus(2));
    fb.branch(right, vec![exit], locus(3));
    let phi = fb.phi(exit, vec![left, right], locus(4));
    let use_y = fb.instruction(exit, InstKind::Other, locus(5));
    fb.ret(exit, locus(6));

    let mut maps = PredicateMaps::new("fixture");
    maps.add_terminator(br, left, on_true)
        .add_terminator(br, right, on_false)
        .add_phi(left, phi, phi_left)
        .add_phi(right, phi, phi_right);

    Diamond {
        fx: Fixture {
            nest,
            function: fb.build().unwrap(),
            maps,
            functions: InMemoryFunctionManager::new(),
        },
        x,
        y,
        on_true,
        on_false,
        phi_left,
        phi_right,
        use_y,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Call site
// ═══════════════════════════════════════════════════════════════════════════

pub struct CallSite {
    pub fx: Fixture,
    pub x: TermId,
    pub r: TermId,
    pub call: InstId,
    pub after: InstId,
    pub call_locus: Locus,
}

/// `r = id(x); use(r);` with `id` summarized as `\result == n`
pub fn fixture_call_site() -> CallSite {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let formal = nest.terms().argument(int, 0, "n", ArgumentKind::Any);
    let ret = nest.terms().return_value(int, "id");
    let ensures = nest
        .predicates()
        .equality(ret, formal, Locus::unknown(), PredicateType::Ensures);

    let mut functions = InMemoryFunctionManager::new();
    functions
        .register("id", 1)
        .put("id", SummaryKind::Ensures, PredicateState::basic(vec![ensures]));

    let x = nest.terms().value(int, "x");
    let r = nest.terms().value(int, "r");
    let call_locus = locus(3);
    let mut fb = FunctionBuilder::new("caller");
    let entry = fb.block("entry");
    let call = fb.call(entry, "id", vec![x], Some(r), call_locus.clone());
    let after = fb.instruction(entry, InstKind::Other, locus(4));
    fb.ret(entry, locus(5));

    CallSite {
        fx: Fixture {
            nest,
            function: fb.build().unwrap(),
            maps: PredicateMaps::new("fixture"),
            functions,
        },
        x,
        r,
        call,
        after,
        call_locus,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unreachable branches
// ═══════════════════════════════════════════════════════════════════════════

pub struct DeadBranch {
    pub fx: Fixture,
    pub dead: InstId,
    pub live: InstId,
    pub join: InstId,
}

/// `if (1 > 2) dead(); else live(); join();`
pub fn fixture_dead_branch() -> DeadBranch {
    let mut nest = FactoryNest::new();
    let one = lit(&mut nest, 1);
    let two = lit(&mut nest, 2);
    let cond = nest.terms().cmp(ConditionType::Gt, one, two);
    let on_true = nest.predicates().boolean(cond, true, locus(1));
    let on_false = nest.predicates().boolean(cond, false, locus(1));

    let mut fb = FunctionBuilder::new("dead_branch");
    let entry = fb.block("entry");
    let then = fb.block("then");
    let other = fb.block("else");
    let exit = fb.block("exit");
    let br = fb.branch(entry, vec![then, other], locus(1));
    let dead = fb.instruction(then, InstKind::Other, locus(2));
    fb.branch(then, vec![exit], locus(2));
    let live = fb.instruction(other, InstKind::Other, locus(3));
    fb.branch(other, vec![exit], locus(3));
    let join = fb.instruction(exit, InstKind::Other, locus(4));
    fb.ret(exit, locus(5));

    let mut maps = PredicateMaps::new("fixture");
    maps.add_terminator(br, then, on_true)
        .add_terminator(br, other, on_false);

    DeadBranch {
        fx: Fixture {
            nest,
            function: fb.build().unwrap(),
            maps,
            functions: InMemoryFunctionManager::new(),
        },
        dead,
        live,
        join,
    }
}

/// `if (x > 0) { if (x < 0) dead(); } live();`
///
/// Only a solver sees that `dead` cannot run.
pub fn fixture_contradiction() -> DeadBranch {
    let mut nest = FactoryNest::new();
    let int = int32(&mut nest);
    let x = nest.terms().value(int, "x");
    let zero = lit(&mut nest, 0);
    let gt = nest.terms().cmp(ConditionType::Gt, x, zero);
    let lt = nest.terms().cmp(ConditionType::Lt, x, zero);
    let gt_true = nest.predicates().boolean(gt, true, locus(1));
    let gt_false = nest.predicates().boolean(gt, false, locus(1));
    let lt_true = nest.predicates().boolean(lt, true, locus(2));
    let lt_false = nest.predicates().boolean(lt, false, locus(2));

    let mut fb = FunctionBuilder::new("contradiction");
    let entry = fb.block("entry");
    let outer = fb.block("outer");
    let inner = fb.block("inner");
    let exit = fb.block("exit");
    let br1 = fb.branch(entry, vec![outer, exit], locus(1));
    let br2 = fb.branch(outer, vec![inner, exit], locus(2));
    let dead = fb.instruction(inner, InstKind::Other, locus(3));
    fb.branch(inner, vec![exit], locus(3));
    let live = fb.instruction(exit, InstKind::Other, locus(4));
    let join = fb.ret(exit, locus(5));

    let mut maps = PredicateMaps::new("fixture");
    maps.add_terminator(br1, outer, gt_true)
        .add_terminator(br1, exit, gt_false)
        .add_terminator(br2, inner, lt_true)
        .add_terminator(br2, exit, lt_false);

    DeadBranch {
        fx: Fixture {
            nest,
            function: fb.build().unwrap(),
            maps,
            functions: InMemoryFunctionManager::new(),
        },
        dead,
        live,
        join,
    }
}

//! Test data builders
//!
//! Larger CFGs for scaling tests and benchmarks.

use super::fixtures::{int32, lit, locus, Fixture};
use symstate_engine::features::ir::{
    FunctionBuilder, InMemoryFunctionManager, InstKind, PredicateMaps,
};
use symstate_engine::features::term_algebra::{ConditionType, FactoryNest, PredicateId, PredicateType};
use symstate_engine::shared::models::InstId;

/// Builder for a ladder of `rungs` diamonds placed one after another
///
/// Rung `i` branches on `x{i} > 0` and merges `y{i}` through a PHI, so the
/// number of paths doubles with every rung.
#[derive(Debug, Clone)]
pub struct LadderBuilder {
    rungs: usize,
    effects_per_block: usize,
}

/// Built ladder plus the ids tests look at
pub struct Ladder {
    pub fx: Fixture,
    /// Edge conditions, two per rung
    pub conditions: Vec<PredicateId>,
    /// Last instruction before the return
    pub last: InstId,
}

impl LadderBuilder {
    pub fn new(rungs: usize) -> Self {
        Self {
            rungs,
            effects_per_block: 0,
        }
    }

    /// Extra `Other` instructions with one effect each in every arm
    pub fn with_effects(mut self, n: usize) -> Self {
        self.effects_per_block = n;
        self
    }

    pub fn build(self) -> Ladder {
        let mut nest = FactoryNest::new();
        let int = int32(&mut nest);
        let zero = lit(&mut nest, 0);
        let one = lit(&mut nest, 1);
        let two = lit(&mut nest, 2);
        let mut fb = FunctionBuilder::new("ladder");
        let mut maps = PredicateMaps::new("fixture");
        let mut conditions = Vec::with_capacity(self.rungs * 2);
        let mut line = 0u32;
        let mut next_line = || {
            line += 1;
            locus(line)
        };

        let mut head = fb.block("entry");
        for i in 0..self.rungs {
            let x = nest.terms().value(int, format!("x{}", i));
            let y = nest.terms().value(int, format!("y{}", i));
            let cond = nest.terms().cmp(ConditionType::Gt, x, zero);
            let on_true = nest.predicates().boolean(cond, true, next_line());
            let on_false = nest.predicates().boolean(cond, false, next_line());
            let phi_left = nest
                .predicates()
                .equality(y, one, next_line(), PredicateType::State);
            let phi_right = nest
                .predicates()
                .equality(y, two, next_line(), PredicateType::State);

            let left = fb.block(format!("left{}", i));
            let right = fb.block(format!("right{}", i));
            let join = fb.block(format!("join{}", i));
            let br = fb.branch(head, vec![left, right], next_line());

            for (arm, name) in [(left, "l"), (right, "r")] {
                for k in 0..self.effects_per_block {
                    let v = nest.terms().value(int, format!("{}{}_{}", name, i, k));
                    let c = lit(&mut nest, k as i64);
                    let effect = nest
                        .predicates()
                        .equality(v, c, next_line(), PredicateType::State);
                    let inst = fb.instruction(arm, InstKind::Other, next_line());
                    maps.add_instruction(inst, effect);
                }
                fb.branch(arm, vec![join], next_line());
            }

            let phi = fb.phi(join, vec![left, right], next_line());
            maps.add_terminator(br, left, on_true)
                .add_terminator(br, right, on_false)
                .add_phi(left, phi, phi_left)
                .add_phi(right, phi, phi_right);
            conditions.push(on_true);
            conditions.push(on_false);
            head = join;
        }

        let last = fb.instruction(head, InstKind::Other, next_line());
        fb.ret(head, next_line());

        Ladder {
            fx: Fixture {
                nest,
                function: fb.build().unwrap(),
                maps,
                functions: InMemoryFunctionManager::new(),
            },
            conditions,
            last,
        }
    }
}

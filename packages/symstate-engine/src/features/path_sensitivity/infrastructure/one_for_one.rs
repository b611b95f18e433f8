//! OneForOne
//!
//! Maximal path sensitivity: a FIFO worklist of `(from, to, state)` items
//! walks every acyclic path separately, and each instruction collects one
//! state per path that reaches it. Finalization merges the collected states
//! into a single Choice.
//!
//! The Choice grows with the number of paths through the function; nothing
//! bounds it. Use `OneForAll` when that is too much.

use super::common::{self, TARGET};
use crate::config::PsaConfig;
use crate::errors::Result;
use crate::features::ir::{Function, InstKind, TopologicalSorter};
use crate::features::path_sensitivity::domain::PsaInputs;
use crate::features::path_sensitivity::ports::PredicateStateAnalysis;
use crate::features::predicate_state::{PredicateState, PredicateStateBuilder, StateOptimizer};
use crate::features::term_algebra::FactoryNest;
use crate::invariant;
use crate::shared::models::{BlockId, InstId};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

struct WorkItem {
    from: Option<BlockId>,
    to: BlockId,
    state: PredicateState,
}

pub struct OneForOne {
    config: PsaConfig,
    initial: Option<PredicateState>,
    queue: VecDeque<WorkItem>,
    accumulated: FxHashMap<InstId, Vec<PredicateState>>,
    states: FxHashMap<InstId, PredicateState>,
}

impl OneForOne {
    pub fn new(config: PsaConfig) -> Self {
        Self {
            config,
            initial: None,
            queue: VecDeque::new(),
            accumulated: FxHashMap::default(),
            states: FxHashMap::default(),
        }
    }

    fn init(&mut self) {
        self.initial = None;
        self.queue.clear();
        self.accumulated.clear();
        self.states.clear();
    }

    fn enqueue(&mut self, from: Option<BlockId>, to: BlockId, state: PredicateState) {
        self.queue.push_back(WorkItem { from, to, state });
        trace!(target: TARGET, queued = self.queue.len(), "enqueue {}", to);
    }

    fn process_block(
        &mut self,
        nest: &mut FactoryNest,
        function: &Function,
        inputs: &PsaInputs<'_>,
        item: WorkItem,
    ) -> Result<()> {
        let WorkItem {
            from,
            to: block,
            mut state,
        } = item;

        if common::prune(self.config.check_unreachable, nest, function, inputs, &state) {
            debug!(target: TARGET, function = %function.name, %block, "skipping unreachable block");
            return Ok(());
        }

        for inst in function.block_instructions(block) {
            if let InstKind::Phi { incoming } = &inst.kind {
                if let Some(pred) = from.filter(|f| incoming.contains(f)) {
                    let mut builder = PredicateStateBuilder::from_state(state);
                    builder += common::ppm(inputs, pred, inst);
                    state = builder.build(nest);
                }
                continue;
            }

            let mut builder = PredicateStateBuilder::from_state(state);
            builder += common::pm(inputs, inst);
            let mut modified = builder.build(nest);
            self.accumulated
                .entry(inst.id)
                .or_default()
                .push(modified.clone());

            if let Some(call) = common::call_state(nest, inputs, inst)? {
                let mut builder = PredicateStateBuilder::from_state(modified);
                builder += call;
                builder <<= inst.locus.clone();
                modified = builder.build(nest);
            }

            state = modified;
        }

        // unconditional jumps carry the state over untouched
        let terminator = function.terminator(block);
        let jump = matches!(&terminator.kind, InstKind::Branch { targets } if targets.len() == 1);
        for succ in function.successors(block) {
            let next = if jump {
                state.clone()
            } else {
                let mut builder = PredicateStateBuilder::from_state(state.clone());
                builder += common::tpm(inputs, terminator, succ);
                builder.build(nest)
            };
            self.enqueue(Some(block), succ, next);
        }
        Ok(())
    }

    fn finalize(&mut self) {
        let mut optimizer = StateOptimizer::new();
        for (inst, alternatives) in self.accumulated.drain() {
            let merged = PredicateState::choice(alternatives);
            let merged = if self.config.optimize_states {
                optimizer.optimize(&merged)
            } else {
                merged
            };
            self.states.insert(inst, merged);
        }
    }
}

impl PredicateStateAnalysis for OneForOne {
    fn name(&self) -> &'static str {
        "one-for-one"
    }

    fn run(
        &mut self,
        nest: &mut FactoryNest,
        function: &Function,
        inputs: &PsaInputs<'_>,
    ) -> Result<()> {
        self.init();
        invariant!(
            TopologicalSorter::new().doit(function).is_some(),
            "{} has a cyclic CFG; unroll loops before path-sensitive analysis",
            function.name
        );

        let initial = common::initial_state(nest, function, inputs);
        self.initial = Some(initial.clone());
        self.enqueue(None, function.entry(), initial);

        let mut processed = 0usize;
        while let Some(item) = self.queue.pop_front() {
            self.process_block(nest, function, inputs, item)?;
            processed += 1;
        }
        debug!(target: TARGET, function = %function.name, processed, "worklist drained");

        self.finalize();
        Ok(())
    }

    fn initial_state(&self) -> Option<&PredicateState> {
        self.initial.as_ref()
    }

    fn instruction_state(
        &mut self,
        _nest: &mut FactoryNest,
        inst: InstId,
    ) -> Option<PredicateState> {
        self.states.get(&inst).cloned()
    }

    fn states(&mut self, _nest: &mut FactoryNest) -> BTreeMap<InstId, PredicateState> {
        self.states
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::{FunctionBuilder, InMemoryFunctionManager, PredicateMaps};
    use crate::features::predicate_state::StateNode;
    use crate::features::term_algebra::{ConditionType, PredicateType, Signedness};
    use crate::shared::models::Locus;

    #[test]
    fn test_paths_are_kept_apart_until_finalization() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let x = nest.terms().value(int, "x");
        let zero = nest.terms().int(0, 32, Signedness::Signed);
        let cond = nest.terms().cmp(ConditionType::Gt, x, zero);
        let on_true = nest.predicates().boolean(cond, true, Locus::unknown());
        let on_false = nest.predicates().boolean(cond, false, Locus::unknown());
        let y = nest.terms().value(int, "y");
        let effect = nest
            .predicates()
            .equality(y, x, Locus::unknown(), PredicateType::State);

        let mut fb = FunctionBuilder::new("f");
        let entry = fb.block("entry");
        let left = fb.block("left");
        let right = fb.block("right");
        let exit = fb.block("exit");
        let br = fb.branch(entry, vec![left, right], Locus::new("f.c", 1, 1));
        fb.branch(left, vec![exit], Locus::unknown());
        fb.branch(right, vec![exit], Locus::unknown());
        let use_y = fb.instruction(exit, InstKind::Other, Locus::new("f.c", 5, 1));
        fb.ret(exit, Locus::unknown());
        let f = fb.build().unwrap();

        let mut maps = PredicateMaps::new("test");
        maps.add_terminator(br, left, on_true)
            .add_terminator(br, right, on_false)
            .add_instruction(use_y, effect);

        let fm = InMemoryFunctionManager::new();
        let inputs = PsaInputs::new(&fm).with_analysis(&maps);
        let mut psa = OneForOne::new(PsaConfig::default());
        psa.run(&mut nest, &f, &inputs).unwrap();

        let state = psa.instruction_state(&mut nest, use_y).unwrap();
        match state.node() {
            StateNode::Choice { choices } => {
                assert_eq!(choices.len(), 2);
                assert_eq!(choices[0].predicates(), vec![on_true, effect]);
                assert_eq!(choices[1].predicates(), vec![on_false, effect]);
            }
            other => panic!("expected a choice, got {:?}", other),
        }
        assert!(state.has_visited(&Locus::new("f.c", 5, 1)));
    }

    #[test]
    fn test_only_conditional_terminators_are_visited() {
        let mut nest = FactoryNest::new();
        let cond_at = Locus::new("g.c", 1, 1);
        let jump_at = Locus::new("g.c", 2, 1);

        let mut fb = FunctionBuilder::new("g");
        let entry = fb.block("entry");
        let left = fb.block("left");
        let right = fb.block("right");
        let exit = fb.block("exit");
        fb.branch(entry, vec![left, right], cond_at.clone());
        fb.branch(left, vec![exit], jump_at.clone());
        fb.branch(right, vec![exit], jump_at.clone());
        let use_at = fb.instruction(exit, InstKind::Other, Locus::new("g.c", 3, 1));
        fb.ret(exit, Locus::unknown());
        let f = fb.build().unwrap();

        let fm = InMemoryFunctionManager::new();
        let mut psa = OneForOne::new(PsaConfig::default());
        psa.run(&mut nest, &f, &PsaInputs::new(&fm)).unwrap();

        let state = psa.instruction_state(&mut nest, use_at).unwrap();
        assert!(state.has_visited(&cond_at));
        assert!(!state.has_visited(&jump_at));
    }

    #[test]
    fn test_cyclic_cfg_is_rejected() {
        let mut nest = FactoryNest::new();
        let mut fb = FunctionBuilder::new("spin");
        let entry = fb.block("entry");
        fb.branch(entry, vec![entry], Locus::unknown());
        let f = fb.build().unwrap();
        let fm = InMemoryFunctionManager::new();
        let mut psa = OneForOne::new(PsaConfig::default());
        let err = psa.run(&mut nest, &f, &PsaInputs::new(&fm)).unwrap_err();
        assert!(err.is_invariant());
    }
}

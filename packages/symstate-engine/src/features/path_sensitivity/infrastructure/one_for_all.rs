//! OneForAll
//!
//! One state per basic block, computed in topological order. A block starts
//! from its immediate dominator's final state and adds a Choice over its
//! predecessors, each predecessor's state extended with the edge condition
//! and PHI values and then sliced onto the dominator's state so the
//! alternatives only hold what differs.

use super::common::{self, TARGET};
use crate::config::PsaConfig;
use crate::errors::{EngineError, Result};
use crate::features::ir::{CfgGraph, DominatorTree, Function, TopologicalSorter};
use crate::features::path_sensitivity::domain::PsaInputs;
use crate::features::path_sensitivity::ports::PredicateStateAnalysis;
use crate::features::predicate_state::{
    PredicateState, PredicateStateBuilder, Retyper, StateNode, StateOptimizer, Transformer,
};
use crate::features::term_algebra::FactoryNest;
use crate::invariant;
use crate::shared::models::{BlockId, InstId};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, trace};

pub struct OneForAll {
    config: PsaConfig,
    initial: Option<PredicateState>,
    block_states: FxHashMap<BlockId, PredicateState>,
    states: FxHashMap<InstId, PredicateState>,
    order: Vec<BlockId>,
}

/// Leading Basic of a state; a Choice stands for itself
fn front(state: &PredicateState) -> PredicateState {
    match state.node() {
        StateNode::Chain { base, .. } => front(base),
        StateNode::Basic { .. } | StateNode::Choice { .. } => state.clone(),
    }
}

/// Group alternatives by their leading Basic and hoist it out of each group
///
/// Empty alternatives are kept as one empty alternative; alternatives that
/// cannot be sliced on their own front are kept as they are.
pub(crate) fn optimize_choices(choices: Vec<PredicateState>) -> Vec<PredicateState> {
    let has_empty = choices.iter().any(|c| c.is_empty());
    let non_empty: Vec<PredicateState> = choices.iter().filter(|c| !c.is_empty()).cloned().collect();
    if non_empty.len() < 2 {
        return choices;
    }

    let mut groups: Vec<(PredicateState, Vec<PredicateState>)> = Vec::new();
    let mut result = Vec::new();
    if has_empty {
        result.push(PredicateState::empty());
    }

    for state in non_empty {
        let candidate = front(&state);
        let rest = if candidate == state {
            PredicateState::empty()
        } else {
            match state.slice_on(&candidate) {
                Some(rest) => rest,
                None => {
                    result.push(state);
                    continue;
                }
            }
        };
        match groups.iter_mut().find(|(f, _)| *f == candidate) {
            Some((_, members)) => members.push(rest),
            None => groups.push((candidate, vec![rest])),
        }
    }

    for (candidate, members) in groups {
        if members.len() == 1 {
            let only = &members[0];
            result.push(PredicateState::chain(&candidate, only));
        } else {
            let inner = PredicateState::choice(optimize_choices(members));
            result.push(PredicateState::chain(&candidate, &inner));
        }
    }
    result
}

impl OneForAll {
    pub fn new(config: PsaConfig) -> Self {
        Self {
            config,
            initial: None,
            block_states: FxHashMap::default(),
            states: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    fn init(&mut self) {
        self.initial = None;
        self.block_states.clear();
        self.states.clear();
        self.order.clear();
    }

    /// Incoming state of `block`; `None` when no predecessor was reached
    fn bbm(
        &self,
        function: &Function,
        inputs: &PsaInputs<'_>,
        dominators: &DominatorTree,
        block: BlockId,
    ) -> Result<Option<PredicateState>> {
        let Some(idom) = dominators.immediate(block) else {
            if block == function.entry() {
                return Ok(self.initial.clone());
            }
            // not reachable from the entry
            return Ok(None);
        };
        let Some(base) = self.block_states.get(&idom) else {
            return Ok(None);
        };

        let mut choices = Vec::new();
        for pred in function.predecessors(block) {
            let Some(pred_state) = self.block_states.get(pred) else {
                continue;
            };
            let mut builder = PredicateStateBuilder::from_state(pred_state.clone());
            builder += common::tpm(inputs, function.terminator(*pred), block);
            builder += common::phi_state(inputs, function, *pred, block);
            let incoming = builder.apply();

            let Some(slice) = incoming.slice_on(base) else {
                return Err(EngineError::invariant(format!(
                    "{}: state of {} does not extend the state of its dominator {}",
                    function.name, pred, idom
                )));
            };
            choices.push(slice);
        }

        if self.config.aggressive_choice_optimization {
            choices = optimize_choices(choices);
        }

        trace!(target: TARGET, %block, alternatives = choices.len(), "merged predecessors");
        if choices.is_empty() {
            return Ok(None);
        }
        let mut builder = PredicateStateBuilder::from_state(base.clone());
        builder += PredicateState::choice(choices);
        Ok(Some(builder.apply()))
    }

    fn process_block(
        &mut self,
        nest: &mut FactoryNest,
        function: &Function,
        inputs: &PsaInputs<'_>,
        dominators: &DominatorTree,
        block: BlockId,
    ) -> Result<()> {
        let Some(mut in_state) = self.bbm(function, inputs, dominators, block)? else {
            debug!(target: TARGET, function = %function.name, %block, "block not reached");
            return Ok(());
        };
        if common::prune(self.config.check_unreachable, nest, function, inputs, &in_state) {
            debug!(target: TARGET, function = %function.name, %block, "skipping unreachable block");
            return Ok(());
        }

        for inst in function.block_instructions(block) {
            let mut builder = PredicateStateBuilder::from_state(in_state);
            builder += common::pm(inputs, inst);
            let mut inst_state = builder.apply();
            self.states.insert(inst.id, inst_state.clone());

            if let Some(call) = common::call_state(nest, inputs, inst)? {
                let mut builder = PredicateStateBuilder::from_state(inst_state);
                builder += call;
                inst_state = builder.apply();
            }

            in_state = if self.config.assume_defects_trigger_once {
                let mut builder = PredicateStateBuilder::from_state(inst_state);
                builder += common::post_pm(inputs, inst);
                builder.apply()
            } else {
                inst_state
            };
        }

        self.block_states.insert(block, in_state);
        Ok(())
    }

    fn finalize_block(&mut self, nest: &mut FactoryNest, function: &Function, block: BlockId) {
        let mut optimizer = StateOptimizer::new();
        for inst in function.block_instructions(block) {
            let Some(state) = self.states.get(&inst.id).cloned() else {
                continue;
            };
            let state = if self.config.optimize_states {
                optimizer.optimize(&state)
            } else {
                state
            };
            let state = Retyper::new(nest).transform(&state);
            self.states.insert(inst.id, state);
        }
    }
}

impl PredicateStateAnalysis for OneForAll {
    fn name(&self) -> &'static str {
        "one-for-all"
    }

    fn run(
        &mut self,
        nest: &mut FactoryNest,
        function: &Function,
        inputs: &PsaInputs<'_>,
    ) -> Result<()> {
        self.init();

        let Some(order) = TopologicalSorter::new().doit(function) else {
            return Err(EngineError::invariant(format!(
                "no topological order for {}",
                function.name
            )));
        };
        invariant!(
            order.len() == function.block_count(),
            "topological order of {} does not include all basic blocks",
            function.name
        );
        trace!(target: TARGET, function = %function.name, ?order, "topological order");

        let dominators = CfgGraph::new(function).dominators();
        self.initial = Some(common::initial_state(nest, function, inputs));

        for block in &order {
            self.process_block(nest, function, inputs, &dominators, *block)?;
            self.finalize_block(nest, function, *block);
        }
        self.order = order;
        debug!(
            target: TARGET,
            function = %function.name,
            reached = self.block_states.len(),
            blocks = function.block_count(),
            "one-for-all done"
        );
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

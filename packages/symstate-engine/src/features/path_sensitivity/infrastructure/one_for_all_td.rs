//! OneForAllTd
//!
//! Top-down variant of OneForAll. A single function-wide state is built by
//! walking the post-dominator tree from the entry: the state between a block
//! and its post-dominator is the block's own predicates followed by a Choice
//! over its successors, then whatever lies between the post-dominator and the
//! caller's bound. Every instruction leaves a unique Mark behind; an
//! instruction's state is the function state cropped at that Mark, with the
//! Marks erased again.
//!
//! Instruction states are computed lazily and cached. This variant does not
//! consult the reachability oracle.

use super::common::{self, TARGET};
use crate::config::PsaConfig;
use crate::errors::{EngineError, Result};
use crate::features::ir::{CfgGraph, DominatorTree, Function, TopologicalSorter};
use crate::features::path_sensitivity::domain::PsaInputs;
use crate::features::path_sensitivity::ports::PredicateStateAnalysis;
use crate::features::predicate_state::{
    Cropper, MarkEraser, PredicateState, PredicateStateBuilder, Retyper, StateOptimizer,
    Transformer,
};
use crate::features::term_algebra::{FactoryNest, PredicateId};
use crate::invariant;
use crate::shared::models::{BlockId, InstId, Locus};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Walk context shared by the recursive helpers of one run
struct Walk<'r, 'a> {
    function: &'r Function,
    inputs: &'r PsaInputs<'a>,
    post_dominators: DominatorTree,
}

pub struct OneForAllTd {
    config: PsaConfig,
    initial: Option<PredicateState>,
    final_state: Option<PredicateState>,
    basics: FxHashMap<BlockId, PredicateState>,
    between: FxHashMap<(BlockId, Option<BlockId>), PredicateState>,
    backmapping: FxHashMap<InstId, PredicateId>,
    states: FxHashMap<InstId, PredicateState>,
    optimizer: StateOptimizer,
}

impl OneForAllTd {
    pub fn new(config: PsaConfig) -> Self {
        Self {
            config,
            initial: None,
            final_state: None,
            basics: FxHashMap::default(),
            between: FxHashMap::default(),
            backmapping: FxHashMap::default(),
            states: FxHashMap::default(),
            optimizer: StateOptimizer::new(),
        }
    }

    fn init(&mut self) {
        self.initial = None;
        self.final_state = None;
        self.basics.clear();
        self.between.clear();
        self.backmapping.clear();
        self.states.clear();
        self.optimizer = StateOptimizer::new();
    }

    /// Effects of `block`, one Mark after each instruction
    fn basic_for(
        &mut self,
        nest: &mut FactoryNest,
        walk: &Walk<'_, '_>,
        block: BlockId,
    ) -> Result<PredicateState> {
        if let Some(done) = self.basics.get(&block) {
            return Ok(done.clone());
        }

        let mut builder = PredicateStateBuilder::new();
        for inst in walk.function.block_instructions(block) {
            builder += PredicateState::basic(common::instruction_predicates(walk.inputs, inst));
            let id = nest.mark_term(&walk.function.name, inst.id.0);
            let mark = nest.predicates().mark(id, Locus::unknown());
            builder += mark;
            builder <<= inst.locus.clone();
            self.backmapping.insert(inst.id, mark);

            if let Some(call) = common::call_state(nest, walk.inputs, inst)? {
                builder += call;
            }
            if self.config.assume_defects_trigger_once {
                builder += common::post_pm(walk.inputs, inst);
            }
        }

        let res = builder.apply();
        self.basics.insert(block, res.clone());
        Ok(res)
    }

    /// State from the start of `block` up to (not including) `bound`;
    /// `None` runs to the end of the function
    fn state_between(
        &mut self,
        nest: &mut FactoryNest,
        walk: &Walk<'_, '_>,
        block: BlockId,
        bound: Option<BlockId>,
    ) -> Result<PredicateState> {
        if Some(block) == bound {
            return Ok(PredicateState::empty());
        }
        if let Some(done) = self.between.get(&(block, bound)) {
            return Ok(done.clone());
        }

        let mut builder = PredicateStateBuilder::from_state(self.basic_for(nest, walk, block)?);
        let ipdom = walk.post_dominators.immediate(block);

        let successors = walk.function.successors(block);
        if !successors.is_empty() {
            let terminator = walk.function.terminator(block);
            let mut choices = Vec::with_capacity(successors.len());
            for succ in successors {
                let mut edge = PredicateStateBuilder::from_state(common::tpm(
                    walk.inputs,
                    terminator,
                    succ,
                ));
                edge += common::phi_state(walk.inputs, walk.function, block, succ);
                edge += self.state_between(nest, walk, succ, ipdom)?;
                choices.push(edge.apply());
            }
            builder += PredicateState::choice(choices);
        }

        if ipdom != bound {
            match ipdom {
                Some(next) => builder += self.state_between(nest, walk, next, bound)?,
                None => {
                    return Err(EngineError::invariant(format!(
                        "{}: {} reaches the exit without passing its bound {:?}",
                        walk.function.name, block, bound
                    )))
                }
            }
        }

        let res = builder.apply();
        trace!(target: TARGET, %block, ?bound, size = res.size(), "state between");
        self.between.insert((block, bound), res.clone());
        Ok(res)
    }
}

impl PredicateStateAnalysis for OneForAllTd {
    fn name(&self) -> &'static str {
        "one-for-all-td"
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

        let walk = Walk {
            function,
            inputs,
            post_dominators: CfgGraph::new(function).post_dominators(),
        };
        let initial = common::initial_state(nest, function, inputs);
        self.initial = Some(initial.clone());

        let body = self.state_between(nest, &walk, function.entry(), None)?;
        let mut builder = PredicateStateBuilder::from_state(initial);
        builder += body;
        let final_state = self.optimizer.optimize(&builder.apply());
        debug!(
            target: TARGET,
            function = %function.name,
            size = final_state.size(),
            marks = self.backmapping.len(),
            "function state built"
        );
        self.final_state = Some(final_state);
        Ok(())
    }

    fn initial_state(&self) -> Option<&PredicateState> {
        self.initial.as_ref()
    }

    fn instruction_state(
        &mut self,
        nest: &mut FactoryNest,
        inst: InstId,
    ) -> Option<PredicateState> {
        if let Some(done) = self.states.get(&inst) {
            return Some(done.clone());
        }
        let mark = *self.backmapping.get(&inst)?;
        let cropped = Cropper::new(mark).crop(self.final_state.as_ref()?)?;

        let erased = MarkEraser::new(nest).transform(&cropped);
        let erased = if self.config.optimize_states {
            self.optimizer.optimize(&erased)
        } else {
            erased
        };
        let res = Retyper::new(nest).transform(&erased);
        self.states.insert(inst, res.clone());
        Some(res)
    }

    fn states(&mut self, nest: &mut FactoryNest) -> BTreeMap<InstId, PredicateState> {
        let mut insts: Vec<InstId> = self.backmapping.keys().copied().collect();
        insts.sort();
        insts
            .into_iter()
            .filter_map(|i| self.instruction_state(nest, i).map(|s| (i, s)))
            .collect()
    }
}

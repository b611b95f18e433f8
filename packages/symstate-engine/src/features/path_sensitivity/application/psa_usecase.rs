//! Path-sensitivity UseCase

use crate::config::{PsaConfig, PsaMode};
use crate::errors::Result;
use crate::features::ir::Function;
use crate::features::path_sensitivity::domain::PsaInputs;
use crate::features::path_sensitivity::infrastructure::{OneForAll, OneForAllTd, OneForOne};
use crate::features::path_sensitivity::ports::PredicateStateAnalysis;
use crate::features::predicate_state::PredicateState;
use crate::features::term_algebra::FactoryNest;
use crate::shared::models::InstId;
use std::collections::BTreeMap;
use tracing::info;

/// Analysis selected by `config.mode`
pub fn analysis_for(config: &PsaConfig) -> Box<dyn PredicateStateAnalysis> {
    match config.mode {
        PsaMode::OneForOne => Box::new(OneForOne::new(config.clone())),
        PsaMode::OneForAll => Box::new(OneForAll::new(config.clone())),
        PsaMode::OneForAllTd => Box::new(OneForAllTd::new(config.clone())),
    }
}

/// Result of `analyze_function`
#[derive(Debug, Clone, Default)]
pub struct FunctionStates {
    pub initial: PredicateState,
    pub states: BTreeMap<InstId, PredicateState>,
}

impl FunctionStates {
    pub fn get(&self, inst: InstId) -> Option<&PredicateState> {
        self.states.get(&inst)
    }

    /// Instructions with no state (never reached)
    pub fn unreached<'f>(&'f self, function: &'f Function) -> impl Iterator<Item = InstId> + 'f {
        function
            .instructions()
            .iter()
            .map(|i| i.id)
            .filter(|id| !self.states.contains_key(id))
    }
}

/// Run the configured analysis over `function`
pub fn analyze_function(
    config: &PsaConfig,
    nest: &mut FactoryNest,
    function: &Function,
    inputs: &PsaInputs<'_>,
) -> Result<FunctionStates> {
    let mut psa = analysis_for(config);
    psa.run(nest, function, inputs)?;
    let states = psa.states(nest);
    info!(
        target: "symstate::psa",
        function = %function.name,
        algorithm = psa.name(),
        states = states.len(),
        instructions = function.instructions().len(),
        "path-sensitivity analysis finished"
    );
    Ok(FunctionStates {
        initial: psa.initial_state().cloned().unwrap_or_default(),
        states,
    })
}

//! Collaborators of a path-sensitivity run

use crate::features::ir::{FunctionManager, PredicateAnalysis};
use crate::features::path_sensitivity::infrastructure::StructuralOracle;
use crate::features::path_sensitivity::ports::ReachabilityOracle;

static STRUCTURAL: StructuralOracle = StructuralOracle;

/// Predicate analyses, function summaries and the reachability oracle
pub struct PsaInputs<'a> {
    pub analyses: Vec<&'a dyn PredicateAnalysis>,
    pub functions: &'a dyn FunctionManager,
    pub oracle: &'a dyn ReachabilityOracle,
}

impl<'a> PsaInputs<'a> {
    /// No analyses yet, structural reachability only
    pub fn new(functions: &'a dyn FunctionManager) -> Self {
        Self {
            analyses: Vec::new(),
            functions,
            oracle: &STRUCTURAL,
        }
    }

    /// Register an analysis; entries concatenate in registration order
    pub fn with_analysis(mut self, analysis: &'a dyn PredicateAnalysis) -> Self {
        self.analyses.push(analysis);
        self
    }

    pub fn with_oracle(mut self, oracle: &'a dyn ReachabilityOracle) -> Self {
        self.oracle = oracle;
        self
    }
}

//! Builtin backend
//!
//! Every check rebuilds the CNF from the accumulated assertions, so sessions
//! stay cheap to open and assumptions never leak into later checks.

use super::arrays::{ArrayEliminator, ArrayRead};
use super::bitblast::BitBlaster;
use super::eval::{ArrayValue, Model, Value};
use super::sat::{Limits, Lit, SatOutcome};
use super::{CheckOutcome, SmtBackend, SmtSession};
use crate::config::SmtConfig;
use crate::features::smt::domain::expr::{ExprContext, ExprId, Sort};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct BuiltinBackend {
    timeout_ms: u64,
    conflict_budget: u64,
}

impl BuiltinBackend {
    pub fn new(timeout_ms: u64, conflict_budget: u64) -> Self {
        Self {
            timeout_ms,
            conflict_budget,
        }
    }

    pub fn from_config(config: &SmtConfig) -> Self {
        Self::new(config.timeout_ms, config.conflict_budget)
    }
}

impl Default for BuiltinBackend {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl SmtBackend for BuiltinBackend {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn session<'s>(&'s self, ctx: &'s ExprContext) -> Box<dyn SmtSession + 's> {
        Box::new(BuiltinSession {
            backend: *self,
            ctx,
            assertions: Vec::new(),
            model: None,
        })
    }
}

pub struct BuiltinSession<'s> {
    backend: BuiltinBackend,
    ctx: &'s ExprContext,
    assertions: Vec<ExprId>,
    model: Option<Model>,
}

impl BuiltinSession<'_> {
    fn limits(&self) -> Limits {
        Limits {
            conflicts: self.backend.conflict_budget,
            deadline: (self.backend.timeout_ms > 0)
                .then(|| Instant::now() + Duration::from_millis(self.backend.timeout_ms)),
        }
    }

    fn run(&mut self, assumptions: &[ExprId]) -> Result<CheckOutcome, String> {
        let ctx = self.ctx;
        let mut elim = ArrayEliminator::new(ctx);
        let asserted = self
            .assertions
            .iter()
            .map(|a| elim.rewrite(*a))
            .collect::<Result<Vec<_>, _>>()?;
        let assumed = assumptions
            .iter()
            .map(|a| elim.rewrite(*a))
            .collect::<Result<Vec<_>, _>>()?;

        let mut blaster = BitBlaster::new(ctx);
        for a in asserted {
            blaster.assert(a)?;
        }
        for constraint in elim.ackermann() {
            blaster.assert(constraint)?;
        }
        let mut lits: Vec<(Lit, ExprId)> = Vec::with_capacity(assumed.len());
        for (lowered, original) in assumed.into_iter().zip(assumptions) {
            lits.push((blaster.literal(lowered)?, *original));
        }
        let assumption_lits: Vec<Lit> = lits.iter().map(|(l, _)| *l).collect();

        let limits = self.limits();
        let outcome = blaster.solver().solve(&assumption_lits, limits);
        debug!(
            target: "symstate::smt",
            vars = blaster.solver().num_vars(),
            clauses = blaster.solver().num_clauses(),
            conflicts = blaster.solver().conflicts(),
            "builtin check finished"
        );
        Ok(match outcome {
            SatOutcome::Sat => {
                self.model = Some(extract_model(ctx, &blaster, elim.reads()));
                CheckOutcome::Sat
            }
            SatOutcome::Unsat(failed) => {
                let mut core: Vec<ExprId> = lits
                    .iter()
                    .filter(|(l, _)| failed.contains(l))
                    .map(|(_, e)| *e)
                    .collect();
                core.dedup();
                CheckOutcome::Unsat(core)
            }
            SatOutcome::Unknown(reason) => CheckOutcome::Unknown(reason),
        })
    }
}

/// Free-variable values plus array contents rebuilt from the reads
fn extract_model(ctx: &ExprContext, blaster: &BitBlaster<'_>, reads: &[ArrayRead]) -> Model {
    let mut model = Model::new();
    for (var, bits) in blaster.variables() {
        let value = blaster.value_of(bits);
        let v = match ctx.sort(*var) {
            Sort::Bool => Value::Bool(value == 1),
            Sort::BitVec(width) => Value::BitVector { value, width },
            Sort::Array { .. } => continue,
        };
        model.assign(*var, v);
    }

    let mut arrays: FxHashMap<ExprId, ArrayValue> = FxHashMap::default();
    for read in reads {
        let index = model.eval(ctx, read.index).and_then(|v| v.as_bv());
        let element = model.eval(ctx, read.element).and_then(|v| v.as_bv());
        if let (Some(index), Some(element)) = (index, element) {
            let index_width = ctx.sort(read.array).width().unwrap_or(64);
            arrays
                .entry(read.array)
                .or_insert_with(|| ArrayValue::new(0, index_width))
                .entries
                .insert(index, element);
        }
    }
    for (array, value) in arrays {
        model.assign(array, Value::Array(value));
    }
    model
}

impl SmtSession for BuiltinSession<'_> {
    fn assert(&mut self, formula: ExprId) {
        self.assertions.push(formula);
    }

    fn check(&mut self, assumptions: &[ExprId]) -> CheckOutcome {
        self.model = None;
        match self.run(assumptions) {
            Ok(outcome) => outcome,
            Err(reason) => {
                debug!(target: "symstate::smt", %reason, "builtin backend gave up");
                CheckOutcome::Unknown(reason)
            }
        }
    }

    fn eval(&self, expr: ExprId) -> Option<Value> {
        self.model.as_ref()?.eval(self.ctx, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::smt::domain::expr::{BvBinaryOp, BvCmpOp};

    #[test]
    fn test_sat_model_satisfies_assertions() {
        let ctx = ExprContext::new();
        let backend = BuiltinBackend::default();
        let mut s = backend.session(&ctx);
        let x = ctx.var("x", Sort::BitVec(32));
        let y = ctx.var("y", Sort::BitVec(32));
        let sum = ctx.bv_binary(BvBinaryOp::Add, x, y);
        let goal = ctx.eq(sum, ctx.bv_const(100, 32));
        let small = ctx.bv_cmp(BvCmpOp::Ult, x, ctx.bv_const(10, 32));
        s.assert(goal);
        s.assert(small);
        assert_eq!(s.check(&[]), CheckOutcome::Sat);
        assert_eq!(s.eval(goal), Some(Value::Bool(true)));
        assert_eq!(s.eval(small), Some(Value::Bool(true)));
    }

    #[test]
    fn test_unsat_core_names_assumptions() {
        let ctx = ExprContext::new();
        let backend = BuiltinBackend::default();
        let mut s = backend.session(&ctx);
        let x = ctx.var("x", Sort::BitVec(8));
        let positive = ctx.bv_cmp(BvCmpOp::Sgt, x, ctx.bv_const(0, 8));
        let negative = ctx.bv_cmp(BvCmpOp::Slt, x, ctx.bv_const(0, 8));
        let unrelated = ctx.var("b", Sort::Bool);
        s.assert(positive);
        match s.check(&[unrelated, negative]) {
            CheckOutcome::Unsat(core) => assert_eq!(core, vec![negative]),
            other => panic!("expected unsat, got {:?}", other),
        }
        assert_eq!(s.check(&[unrelated]), CheckOutcome::Sat);
    }

    #[test]
    fn test_arrays_are_functionally_consistent() {
        let ctx = ExprContext::new();
        let backend = BuiltinBackend::default();
        let mut s = backend.session(&ctx);
        let mem = ctx.var(
            "mem",
            Sort::Array {
                index: 64,
                element: 64,
            },
        );
        let p = ctx.var("p", Sort::BitVec(64));
        let q = ctx.var("q", Sort::BitVec(64));
        let same = ctx.eq(p, q);
        let differ = ctx.not(ctx.eq(ctx.select(mem, p), ctx.select(mem, q)));
        s.assert(same);
        s.assert(differ);
        assert!(s.check(&[]).is_unsat());
    }

    #[test]
    fn test_model_reports_array_reads() {
        let ctx = ExprContext::new();
        let backend = BuiltinBackend::default();
        let mut s = backend.session(&ctx);
        let mem = ctx.var(
            "mem",
            Sort::Array {
                index: 64,
                element: 64,
            },
        );
        let at = ctx.bv_const(4096, 64);
        let read = ctx.select(mem, at);
        s.assert(ctx.eq(read, ctx.bv_const(7, 64)));
        assert!(s.check(&[]).is_sat());
        let contents = s.eval(mem).and_then(|v| v.as_array().cloned()).unwrap();
        assert_eq!(contents.lookup(4096), 7);
    }
}

//! Core-guided interpolation
//!
//! Given `A ∧ B` unsatisfiable, builds `I` over the variables the two groups
//! share with `A ⇒ I` and `I ∧ B` unsatisfiable. Each round takes a model of
//! `A ∧ ¬I`, projects it onto the shared variables as a cube of bit
//! literals, shrinks the cube with the unsat core of `cube ∧ B` and adds it
//! to `I`. Works on any backend that reports assumption cores.

use crate::features::smt::domain::expr::{ExprContext, ExprId, Sort};
use crate::features::smt::infrastructure::solvers::{CheckOutcome, SmtBackend, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpolation {
    Found(ExprId),
    /// `A ∧ B` is satisfiable or the answer is unknown
    NotUnsat(CheckOutcome),
    /// Gave up; the reason is for logs
    Abandoned(String),
}

/// One literal of a cube: bit `bit` of `var` (or the whole bool) is `value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BitLiteral {
    var: ExprId,
    bit: Option<u32>,
    value: bool,
}

pub struct Interpolator<'a> {
    ctx: &'a ExprContext,
    backend: &'a dyn SmtBackend,
    max_iterations: usize,
}

impl<'a> Interpolator<'a> {
    pub fn new(ctx: &'a ExprContext, backend: &'a dyn SmtBackend, max_iterations: usize) -> Self {
        Self {
            ctx,
            backend,
            max_iterations,
        }
    }

    fn check(&self, assertions: &[ExprId], assumptions: &[ExprId]) -> CheckOutcome {
        let mut session = self.backend.session(self.ctx);
        for a in assertions {
            session.assert(*a);
        }
        session.check(assumptions)
    }

    fn literal_expr(&self, lit: BitLiteral) -> ExprId {
        let ctx = self.ctx;
        let atom = match lit.bit {
            None => lit.var,
            Some(bit) => ctx.eq(ctx.extract(bit, bit, lit.var), ctx.bv_const(1, 1)),
        };
        if lit.value {
            atom
        } else {
            ctx.not(atom)
        }
    }

    /// Conjunction of `lits`, whole variables collapsed to an equality
    fn cube_expr(&self, lits: &[BitLiteral]) -> ExprId {
        let ctx = self.ctx;
        let mut by_var: FxHashMap<ExprId, Vec<BitLiteral>> = FxHashMap::default();
        let mut order = Vec::new();
        for lit in lits {
            let entry = by_var.entry(lit.var).or_default();
            if entry.is_empty() {
                order.push(lit.var);
            }
            entry.push(*lit);
        }
        let mut parts = Vec::new();
        for var in order {
            let group = &by_var[&var];
            match ctx.sort(var) {
                Sort::BitVec(width) if group.len() as u32 == width => {
                    let value = group
                        .iter()
                        .filter(|l| l.value)
                        .fold(0u128, |acc, l| acc | (1u128 << l.bit.unwrap_or(0)));
                    parts.push(ctx.eq(var, ctx.bv_const(value, width)));
                }
                _ => parts.extend(group.iter().map(|l| self.literal_expr(*l))),
            }
        }
        ctx.and(parts)
    }

    pub fn interpolate(&self, a: ExprId, b: ExprId) -> Interpolation {
        let ctx = self.ctx;
        match self.check(&[a, b], &[]) {
            CheckOutcome::Unsat(_) => {}
            other => return Interpolation::NotUnsat(other),
        }

        let vars_b: FxHashSet<ExprId> = ctx.vars_of(&[b]).into_iter().collect();
        let shared: Vec<ExprId> = ctx
            .vars_of(&[a])
            .into_iter()
            .filter(|v| vars_b.contains(v))
            .collect();
        if shared.iter().any(|v| ctx.sort(*v).is_array()) {
            return Interpolation::Abandoned("shared array variable".to_string());
        }
        if shared.is_empty() {
            return match self.check(&[a], &[]) {
                CheckOutcome::Unsat(_) => Interpolation::Found(ctx.bool_const(false)),
                _ => Interpolation::Found(ctx.bool_const(true)),
            };
        }

        let mut interpolant = ctx.bool_const(false);
        for round in 0..self.max_iterations {
            let mut session = self.backend.session(ctx);
            session.assert(a);
            session.assert(ctx.not(interpolant));
            match session.check(&[]) {
                CheckOutcome::Unsat(_) => {
                    debug!(target: "symstate::smt", rounds = round, "interpolant found");
                    return Interpolation::Found(interpolant);
                }
                CheckOutcome::Unknown(reason) => return Interpolation::Abandoned(reason),
                CheckOutcome::Sat => {}
            }

            let mut literals = Vec::new();
            for var in &shared {
                match (ctx.sort(*var), session.eval(*var)) {
                    (Sort::Bool, Some(Value::Bool(value))) => literals.push(BitLiteral {
                        var: *var,
                        bit: None,
                        value,
                    }),
                    (Sort::BitVec(width), Some(Value::BitVector { value, .. })) => {
                        literals.extend((0..width).map(|bit| BitLiteral {
                            var: *var,
                            bit: Some(bit),
                            value: (value >> bit) & 1 == 1,
                        }))
                    }
                    _ => return Interpolation::Abandoned("shared variable without a value".to_string()),
                }
            }
            let exprs: Vec<ExprId> = literals.iter().map(|l| self.literal_expr(*l)).collect();

            let core = match self.check(&[b], &exprs) {
                CheckOutcome::Unsat(core) => core,
                CheckOutcome::Sat => {
                    return Interpolation::Abandoned("model cube is consistent with B".to_string())
                }
                CheckOutcome::Unknown(reason) => return Interpolation::Abandoned(reason),
            };
            if core.is_empty() {
                // B alone is unsatisfiable
                return Interpolation::Found(ctx.bool_const(true));
            }
            let kept: Vec<BitLiteral> = literals
                .iter()
                .zip(&exprs)
                .filter(|(_, e)| core.contains(e))
                .map(|(l, _)| *l)
                .collect();
            interpolant = ctx.or2(interpolant, self.cube_expr(&kept));
        }
        Interpolation::Abandoned(format!(
            "no interpolant after {} rounds",
            self.max_iterations
        ))
    }
}

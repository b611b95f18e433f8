//! Model sampling
//!
//! Collects up to `count_limit` models of `body`, blocking each model's
//! values on the diversifiers so the next one differs, and keeps a model
//! only when it cannot re-admit the violation (`body ∧ bad ∧ model` UNSAT).

use crate::features::smt::domain::expr::{ExprContext, ExprId};
use crate::features::smt::infrastructure::solvers::{CheckOutcome, SmtBackend, Value};
use tracing::debug;

/// Collected values, one entry per collectible that had a value
pub type ProbedModel = Vec<(ExprId, Value)>;

pub struct Prober<'a> {
    ctx: &'a ExprContext,
    backend: &'a dyn SmtBackend,
    count_limit: usize,
    attempt_limit: usize,
}

impl<'a> Prober<'a> {
    pub fn new(
        ctx: &'a ExprContext,
        backend: &'a dyn SmtBackend,
        count_limit: usize,
        attempt_limit: usize,
    ) -> Self {
        Self {
            ctx,
            backend,
            count_limit,
            attempt_limit,
        }
    }

    /// `expr == value` for a scalar model value
    pub fn equals(ctx: &ExprContext, expr: ExprId, value: &Value) -> Option<ExprId> {
        match value {
            Value::Bool(true) => Some(expr),
            Value::Bool(false) => Some(ctx.not(expr)),
            Value::BitVector { value, width } => Some(ctx.eq(expr, ctx.bv_const(*value, *width))),
            Value::Array(_) => None,
        }
    }

    /// Conjunction pinning every collected value
    pub fn model_expr(ctx: &ExprContext, model: &ProbedModel) -> ExprId {
        ctx.and(
            model
                .iter()
                .filter_map(|(e, v)| Self::equals(ctx, *e, v))
                .collect(),
        )
    }

    pub fn probe(
        &self,
        body: ExprId,
        bad: ExprId,
        diversifiers: &[ExprId],
        collectibles: &[ExprId],
    ) -> Vec<ProbedModel> {
        let ctx = self.ctx;
        let mut sampler = self.backend.session(ctx);
        sampler.assert(body);

        let mut models: Vec<ProbedModel> = Vec::new();
        let mut attempts = 0;
        while models.len() < self.count_limit && attempts < self.attempt_limit {
            attempts += 1;
            match sampler.check(&[]) {
                CheckOutcome::Sat => {}
                CheckOutcome::Unsat(_) => break,
                CheckOutcome::Unknown(reason) => {
                    debug!(target: "symstate::smt", %reason, "probe stopped");
                    break;
                }
            }

            let model: ProbedModel = collectibles
                .iter()
                .filter_map(|c| sampler.eval(*c).map(|v| (*c, v)))
                .collect();
            let blocking: Vec<ExprId> = diversifiers
                .iter()
                .filter_map(|d| {
                    let v = sampler.eval(*d)?;
                    Self::equals(ctx, *d, &v).map(|eq| ctx.not(eq))
                })
                .collect();

            attempts += 1;
            let mut filter = self.backend.session(ctx);
            filter.assert(body);
            filter.assert(bad);
            filter.assert(Self::model_expr(ctx, &model));
            if filter.check(&[]).is_unsat() && !models.contains(&model) {
                models.push(model);
            }

            if blocking.is_empty() {
                break;
            }
            sampler.assert(ctx.or(blocking));
        }
        debug!(
            target: "symstate::smt",
            models = models.len(),
            attempts,
            "probe finished"
        );
        models
    }
}

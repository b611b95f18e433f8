//! Solver facade
//!
//! Encodes predicate states against the configured backend and answers the
//! questions the checkers ask: can a query be violated, is a path possible,
//! what does a body guarantee.
//!
//! Encoding failures and backend give-ups both surface as
//! `SmtResult::Unknown` with a reason; neither is an error.

use super::cache::{EncodedState, EncodingCache};
use super::interpolation::{Interpolation, Interpolator};
use super::probe::{ProbedModel, Prober};
use crate::config::SmtConfig;
use crate::features::predicate_state::PredicateState;
use crate::features::smt::domain::expr::{ExprContext, ExprId};
use crate::features::smt::domain::result::{MemoryShape, ModelValue, SatResult, SmtResult};
use crate::features::smt::infrastructure::solvers::{
    backend_for, ArrayValue, CheckOutcome, SmtBackend, SmtSession, Value,
};
use crate::features::smt::infrastructure::{
    undo_value, ArrayKey, EncodeError, Encoder, ExecutionContext, ExprFactory, Unlogic,
};
use crate::features::term_algebra::{FactoryNest, PredicateType, TermId};
use crate::shared::models::Locus;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Interpolant of a `(body, ¬query)` pair with both sides kept for checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolant {
    pub formula: ExprId,
    pub body: ExprId,
    pub negated_query: ExprId,
    /// Set when no interpolant exists or none was found
    pub identity: bool,
}

impl Interpolant {
    pub fn is_identity(&self) -> bool {
        self.identity
    }
}

/// Encoding of `query` on top of an encoded state
struct QueryEncoding {
    /// Value of the query itself
    query: ExprId,
    /// Axioms of the query value and those it added to the context
    side: ExprId,
    symbols: FxHashMap<ExprId, TermId>,
    terms: Vec<ExprId>,
}

/// One model-sampling run over a body / query pair
struct ProbeRun {
    body: ExprId,
    bad: ExprId,
    models: Vec<ProbedModel>,
    /// Encoded collectible and the term it encodes
    witnesses: Vec<(ExprId, TermId)>,
}

/// `false == true`: the state no model satisfies
fn no_models(nest: &mut FactoryNest) -> PredicateState {
    let falsity = nest.terms().boolean(false);
    let truth = nest.terms().boolean(true);
    let pred = nest
        .predicates()
        .equality(falsity, truth, Locus::unknown(), PredicateType::State);
    PredicateState::basic(vec![pred])
}

fn model_value(value: &Value) -> Option<ModelValue> {
    match value {
        Value::Bool(b) => Some(ModelValue::Bool(*b)),
        Value::BitVector { value, width } => Some(ModelValue::BitVector {
            value: *value,
            width: *width,
        }),
        Value::Array(_) => None,
    }
}

fn shape(value: &ArrayValue) -> MemoryShape {
    value
        .touched()
        .into_iter()
        .map(|ix| (ix as u64, value.lookup(ix) as u64))
        .collect()
}

pub struct Solver {
    ctx: Arc<ExprContext>,
    config: SmtConfig,
    backend: Arc<dyn SmtBackend>,
    memory_start: u64,
    memory_end: u64,
    cache: Option<Arc<EncodingCache>>,
}

impl Solver {
    /// Solver for a function whose local allocations live in
    /// `[memory_start, memory_end)`
    pub fn new(config: &SmtConfig, memory_start: u64, memory_end: u64) -> Self {
        Self {
            ctx: Arc::new(ExprContext::new()),
            config: config.clone(),
            backend: backend_for(config),
            memory_start,
            memory_end,
            cache: None,
        }
    }

    /// Share state encodings through `cache`
    pub fn with_cache(mut self, cache: Arc<EncodingCache>) -> Self {
        self.ctx = cache.ctx();
        self.cache = Some(cache);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn SmtBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn ctx(&self) -> &ExprContext {
        &self.ctx
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Check `assertions` directly against the backend
    pub fn check(&self, assertions: &[ExprId]) -> CheckOutcome {
        let mut session = self.backend.session(&self.ctx);
        for a in assertions {
            session.assert(*a);
        }
        session.check(&[])
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Encoding
    // ═══════════════════════════════════════════════════════════════════════

    fn encode_state(&self, nest: &FactoryNest, state: &PredicateState) -> Result<Arc<EncodedState>, EncodeError> {
        let key = (nest.id(), self.memory_start, self.memory_end, state.clone());
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit);
            }
        }

        let ctx: &ExprContext = &self.ctx;
        let mut ec = ExecutionContext::new(ctx, &self.config, self.memory_start, self.memory_end);
        let mut encoder = Encoder::new(nest, ExprFactory::new(ctx), &self.config);
        let value = encoder.state(state, &mut ec)?;
        let formula = ctx.and2(value.as_axiom(), ec.to_smt().expr());
        let (symbols, predicates) = encoder.into_parts();
        let encoded = Arc::new(EncodedState {
            formula,
            snapshot: ec.snapshot(),
            symbols,
            predicates,
        });
        if let Some(cache) = &self.cache {
            cache.put(key, Arc::clone(&encoded));
        }
        Ok(encoded)
    }

    /// Encode `query` (and `terms`) after `state` ran
    fn encode_query<'c>(
        &'c self,
        nest: &FactoryNest,
        state: &EncodedState,
        query: &PredicateState,
        terms: &[TermId],
    ) -> Result<(QueryEncoding, ExecutionContext<'c>), EncodeError> {
        let ctx: &ExprContext = &self.ctx;
        let mut ec = ExecutionContext::restore(ctx, &state.snapshot);
        let before = ec.axioms().len();
        let mut encoder =
            Encoder::new(nest, ExprFactory::new(ctx), &self.config).with_symbols(state.symbols.clone());
        let value = encoder.state(query, &mut ec)?;
        let terms = terms
            .iter()
            .map(|t| encoder.term(*t, &mut ec).map(|d| d.expr()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut side = ec.axioms()[before..].to_vec();
        side.push(value.axiom());
        let side = ctx.and(side);
        let (symbols, _) = encoder.into_parts();
        Ok((
            QueryEncoding {
                query: value.expr(),
                side,
                symbols,
                terms,
            },
            ec,
        ))
    }

    fn unknown(what: &str, err: EncodeError) -> SmtResult {
        warn!(target: "symstate::smt", error = %err, "{} skipped", what);
        SmtResult::Unknown(err.to_string())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Checks
    // ═══════════════════════════════════════════════════════════════════════

    /// Can `query` be false after `state`?
    ///
    /// SAT means violated and carries a counterexample.
    pub fn is_violated(&self, nest: &FactoryNest, query: &PredicateState, state: &PredicateState) -> SmtResult {
        let encoded = match self.encode_state(nest, state) {
            Ok(e) => e,
            Err(err) => return Self::unknown("violation check", err),
        };
        let (q, ec) = match self.encode_query(nest, &encoded, query, &[]) {
            Ok(res) => res,
            Err(err) => return Self::unknown("violation check", err),
        };
        let ctx: &ExprContext = &self.ctx;
        let check = ExprFactory::new(ctx).fresh_bool("$CHECK$");

        let mut session = self.backend.session(ctx);
        session.assert(encoded.formula);
        session.assert(q.side);
        session.assert(ctx.implies(check.expr(), ctx.not(q.query)));
        let outcome = session.check(&[check.expr()]);
        debug!(
            target: "symstate::smt",
            backend = self.backend.name(),
            outcome = ?outcome,
            "violation check"
        );
        match outcome {
            CheckOutcome::Unsat(_) => SmtResult::Unsat,
            CheckOutcome::Unknown(reason) => SmtResult::Unknown(reason),
            CheckOutcome::Sat => {
                let result = self.sat_result(nest, session.as_ref(), &encoded, &q.symbols, &ec);
                SmtResult::Sat(Box::new(result))
            }
        }
    }

    /// Is `path` impossible after `state`? UNSAT means impossible.
    pub fn is_path_impossible(&self, nest: &FactoryNest, path: &PredicateState, state: &PredicateState) -> SmtResult {
        let encoded = match self.encode_state(nest, state) {
            Ok(e) => e,
            Err(err) => return Self::unknown("path check", err),
        };
        let (p, ec) = match self.encode_query(nest, &encoded, path, &[]) {
            Ok(res) => res,
            Err(err) => return Self::unknown("path check", err),
        };
        let ctx: &ExprContext = &self.ctx;
        let check = ExprFactory::new(ctx).fresh_bool("$CHECK$");

        let mut session = self.backend.session(ctx);
        session.assert(encoded.formula);
        session.assert(p.side);
        session.assert(ctx.implies(check.expr(), p.query));
        match session.check(&[check.expr()]) {
            CheckOutcome::Unsat(_) => SmtResult::Unsat,
            CheckOutcome::Unknown(reason) => SmtResult::Unknown(reason),
            CheckOutcome::Sat => {
                let result = self.sat_result(nest, session.as_ref(), &encoded, &p.symbols, &ec);
                SmtResult::Sat(Box::new(result))
            }
        }
    }

    fn sat_result(
        &self,
        nest: &FactoryNest,
        session: &dyn SmtSession,
        state: &EncodedState,
        symbols: &FxHashMap<ExprId, TermId>,
        ec: &ExecutionContext<'_>,
    ) -> SatResult {
        let mut res = SatResult::default();
        for (var, term) in symbols {
            if let Some(value) = session.eval(*var).as_ref().and_then(model_value) {
                res.model.insert(nest.term(*term).name.clone(), value);
            }
        }

        let array = |e: ExprId| session.eval(e).and_then(|v| v.as_array().cloned());
        for (key, initial, current) in ec.arrays() {
            let (Some(init), Some(cur)) = (array(initial.expr()), array(current.expr())) else {
                continue;
            };
            match key {
                ArrayKey::Memory(space) => {
                    res.initial_memory.insert(space, shape(&init));
                    res.final_memory.insert(space, shape(&cur));
                }
                ArrayKey::Bounds => {
                    res.bounds.insert(0, shape(&cur));
                }
                ArrayKey::Property(name) => {
                    res.properties.insert(name, shape(&cur));
                }
            }
        }

        for (pred, expr) in &state.predicates {
            if nest.predicate(*pred).ptype != PredicateType::Path || res.counterexample.contains(pred) {
                continue;
            }
            if session.eval(*expr).and_then(|v| v.as_bool()) == Some(true) {
                res.counterexample.push(*pred);
            }
        }
        res
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Interpolation and summaries
    // ═══════════════════════════════════════════════════════════════════════

    /// Interpolant between `body` and `¬query`; identity unless UNSAT
    pub fn get_interpolant(&self, nest: &FactoryNest, query: &PredicateState, body: &PredicateState) -> Interpolant {
        let ctx: &ExprContext = &self.ctx;
        let truth = ctx.bool_const(true);
        let identity = |body: ExprId, negated_query: ExprId| Interpolant {
            formula: truth,
            body,
            negated_query,
            identity: true,
        };
        let encoded = match self.encode_state(nest, body) {
            Ok(e) => e,
            Err(err) => {
                warn!(target: "symstate::smt", error = %err, "interpolation skipped");
                return identity(truth, truth);
            }
        };
        let q = match self.encode_query(nest, &encoded, query, &[]) {
            Ok((q, _)) => q,
            Err(err) => {
                warn!(target: "symstate::smt", error = %err, "interpolation skipped");
                return identity(encoded.formula, truth);
            }
        };
        let negated = ctx.and2(q.side, ctx.not(q.query));
        match self.interpolate(encoded.formula, negated) {
            Some(formula) => Interpolant {
                formula,
                body: encoded.formula,
                negated_query: negated,
                identity: false,
            },
            None => identity(encoded.formula, negated),
        }
    }

    fn interpolate(&self, a: ExprId, b: ExprId) -> Option<ExprId> {
        let interpolator = Interpolator::new(&self.ctx, self.backend.as_ref(), self.config.interpolation_max_iterations);
        match interpolator.interpolate(a, b) {
            Interpolation::Found(i) => Some(i),
            Interpolation::NotUnsat(outcome) => {
                debug!(target: "symstate::smt", outcome = ?outcome, "no interpolant, pair is not unsat");
                None
            }
            Interpolation::Abandoned(reason) => {
                debug!(target: "symstate::smt", %reason, "interpolation abandoned");
                None
            }
        }
    }

    /// Models of `body` over `collectibles` that never violate `query`
    ///
    /// Returned as a Choice of Basic states, one equality per collectible.
    /// With no surviving model the result is a Basic state asserting `false`.
    pub fn probe_models(
        &self,
        nest: &mut FactoryNest,
        body: &PredicateState,
        query: &PredicateState,
        diversifiers: &[TermId],
        collectibles: &[TermId],
    ) -> PredicateState {
        let Some(run) = self.probe(nest, body, query, diversifiers, collectibles) else {
            return no_models(nest);
        };
        let witness: FxHashMap<ExprId, TermId> = run.witnesses.into_iter().collect();
        let mut choices = Vec::with_capacity(run.models.len());
        for model in run.models {
            let mut preds = Vec::with_capacity(model.len());
            for (expr, value) in &model {
                let Some(term) = witness.get(expr).copied() else { continue };
                if let Some(lit) = undo_value(nest, term, value) {
                    preds.push(nest.predicates().equality(term, lit, Locus::unknown(), PredicateType::State));
                }
            }
            choices.push(PredicateState::basic(preds));
        }
        if choices.is_empty() {
            return no_models(nest);
        }
        PredicateState::choice(choices)
    }

    fn probe(
        &self,
        nest: &FactoryNest,
        body: &PredicateState,
        query: &PredicateState,
        diversifiers: &[TermId],
        collectibles: &[TermId],
    ) -> Option<ProbeRun> {
        let ctx: &ExprContext = &self.ctx;
        let encoded = self.encode_state(nest, body).ok()?;
        let mut wanted: Vec<TermId> = diversifiers.to_vec();
        wanted.extend_from_slice(collectibles);
        let (q, _) = self.encode_query(nest, &encoded, query, &wanted).ok()?;
        let (div, col) = q.terms.split_at(diversifiers.len());
        let bad = ctx.and2(q.side, ctx.not(q.query));
        let prober = Prober::new(
            ctx,
            self.backend.as_ref(),
            self.config.probe_count_limit,
            self.config.probe_attempt_limit,
        );
        let models = prober.probe(encoded.formula, bad, div, col);
        Some(ProbeRun {
            body: encoded.formula,
            bad,
            models,
            witnesses: col.iter().copied().zip(collectibles.iter().copied()).collect(),
        })
    }

    /// What `body` guarantees about `query`, as an ENSURES state
    ///
    /// When `body` alone admits a violation, argument models that avoid it
    /// are sampled and their disjunction strengthens the body first.
    pub fn get_summary(
        &self,
        nest: &mut FactoryNest,
        args: &[TermId],
        query: &PredicateState,
        body: &PredicateState,
    ) -> Option<PredicateState> {
        let ctx: &ExprContext = &self.ctx;
        let encoded = self.encode_state(nest, body).ok()?;
        let (q, _) = self.encode_query(nest, &encoded, query, &[]).ok()?;
        let bad = ctx.and2(q.side, ctx.not(q.query));

        let mut a = encoded.formula;
        if !self.check(&[a, bad]).is_unsat() {
            let run = self.probe(nest, body, query, args, args)?;
            if run.models.is_empty() {
                return None;
            }
            let safe = ctx.or(run.models.iter().map(|m| Prober::model_expr(ctx, m)).collect());
            a = ctx.and2(a, safe);
        }
        let formula = self.interpolate(a, bad)?;
        let mut symbols = encoded.symbols.clone();
        symbols.extend(q.symbols);
        self.to_state(nest, formula, &symbols, PredicateType::Ensures)
    }

    /// Requirement on `args` under which `body` never violates `query`, as a
    /// REQUIRES state; `None` when no requirement is needed or none is found
    pub fn get_contract(
        &self,
        nest: &mut FactoryNest,
        args: &[TermId],
        query: &PredicateState,
        body: &PredicateState,
    ) -> Option<PredicateState> {
        let ctx: &ExprContext = &self.ctx;
        let run = self.probe(nest, body, query, args, args)?;
        let violation = ctx.and2(run.body, run.bad);
        if self.check(&[violation]).is_unsat() || run.models.is_empty() {
            return None;
        }
        let safe = ctx.or(run.models.iter().map(|m| Prober::model_expr(ctx, m)).collect());
        let formula = self.interpolate(safe, violation)?;

        let encoded = self.encode_state(nest, body).ok()?;
        let (q, _) = self.encode_query(nest, &encoded, query, &[]).ok()?;
        let mut symbols = encoded.symbols.clone();
        symbols.extend(q.symbols);
        self.to_state(nest, formula, &symbols, PredicateType::Requires)
    }

    fn to_state(
        &self,
        nest: &mut FactoryNest,
        formula: ExprId,
        symbols: &FxHashMap<ExprId, TermId>,
        ptype: PredicateType,
    ) -> Option<PredicateState> {
        if self.ctx.as_bool(formula) == Some(true) {
            return None;
        }
        let term = Unlogic::new(&self.ctx, symbols).undo(nest, formula)?;
        let truth = nest.terms().boolean(true);
        let pred = nest.predicates().equality(term, truth, Locus::unknown(), ptype);
        Some(PredicateState::basic(vec![pred]))
    }
}

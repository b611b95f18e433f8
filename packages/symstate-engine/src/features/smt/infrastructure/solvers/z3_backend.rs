//! Z3 backend
//!
//! Only available when compiled with `--features z3`.
//!
//! ```bash
//! apt-get install libz3-dev  # Linux
//! brew install z3            # macOS
//!
//! cargo build --release --features z3
//! ```
//!
//! Each check opens its own `Context`, translates the assertions and reads
//! the model back into a crate-side `Model`, so no Z3 object outlives the
//! call that created it.

#![cfg(feature = "z3")]

use super::eval::{ArrayValue, Model, Value};
use super::{CheckOutcome, SmtBackend, SmtSession};
use crate::config::SmtConfig;
use crate::features::smt::domain::expr::{BvBinaryOp, BvCmpOp, BvUnaryOp, ExprContext, ExprId, Op, Sort};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;
use z3::ast::{forall_const, Array, Ast, Bool, BV};
use z3::{Config, Context, SatResult, Solver};

#[derive(Debug, Clone, Copy)]
pub struct Z3Backend {
    timeout_ms: u64,
}

impl Z3Backend {
    pub fn new(timeout_ms: u64) -> Self {
        Self { timeout_ms }
    }

    pub fn from_config(config: &SmtConfig) -> Self {
        Self::new(config.timeout_ms)
    }
}

impl SmtBackend for Z3Backend {
    fn name(&self) -> &'static str {
        "z3"
    }

    fn session<'s>(&'s self, ctx: &'s ExprContext) -> Box<dyn SmtSession + 's> {
        Box::new(Z3Session {
            timeout_ms: self.timeout_ms,
            ctx,
            assertions: Vec::new(),
            model: None,
        })
    }
}

pub struct Z3Session<'s> {
    timeout_ms: u64,
    ctx: &'s ExprContext,
    assertions: Vec<ExprId>,
    model: Option<Model>,
}

#[derive(Clone)]
enum Term<'z> {
    B(Bool<'z>),
    V(BV<'z>),
    A(Array<'z>),
}

impl<'z> Term<'z> {
    fn bool(self) -> Result<Bool<'z>, String> {
        match self {
            Term::B(b) => Ok(b),
            _ => Err("expected a boolean term".to_string()),
        }
    }

    fn bv(self) -> Result<BV<'z>, String> {
        match self {
            Term::V(v) => Ok(v),
            _ => Err("expected a bit-vector term".to_string()),
        }
    }

    fn array(self) -> Result<Array<'z>, String> {
        match self {
            Term::A(a) => Ok(a),
            _ => Err("expected an array term".to_string()),
        }
    }
}

struct Translator<'a, 'z> {
    ctx: &'a ExprContext,
    z3: &'z Context,
    memo: FxHashMap<ExprId, Term<'z>>,
    side: Vec<Bool<'z>>,
}

impl<'a, 'z> Translator<'a, 'z> {
    fn sort(&self, sort: Sort) -> z3::Sort<'z> {
        match sort {
            Sort::Bool => z3::Sort::bool(self.z3),
            Sort::BitVec(w) => z3::Sort::bitvector(self.z3, w),
            Sort::Array { index, element } => z3::Sort::array(
                self.z3,
                &z3::Sort::bitvector(self.z3, index),
                &z3::Sort::bitvector(self.z3, element),
            ),
        }
    }

    fn bv_const(&self, value: u128, width: u32) -> BV<'z> {
        if width <= 64 {
            return BV::from_u64(self.z3, value as u64, width);
        }
        let low = BV::from_u64(self.z3, value as u64, 64);
        let high = BV::from_u64(self.z3, (value >> 64) as u64, width - 64);
        high.concat(&low)
    }

    fn translate(&mut self, e: ExprId) -> Result<Term<'z>, String> {
        if let Some(t) = self.memo.get(&e) {
            return Ok(t.clone());
        }
        let z3 = self.z3;
        let term = match self.ctx.op(e) {
            Op::BoolConst(b) => Term::B(Bool::from_bool(z3, b)),
            Op::BvConst { value, width } => Term::V(self.bv_const(value, width)),
            Op::Var { name, sort } => match sort {
                Sort::Bool => Term::B(Bool::new_const(z3, name)),
                Sort::BitVec(w) => Term::V(BV::new_const(z3, name, w)),
                Sort::Array { index, element } => Term::A(Array::new_const(
                    z3,
                    name,
                    &z3::Sort::bitvector(z3, index),
                    &z3::Sort::bitvector(z3, element),
                )),
            },
            Op::ConstArray { index, value } => {
                let value = self.translate(value)?.bv()?;
                Term::A(Array::const_array(z3, &z3::Sort::bitvector(z3, index), &value))
            }
            Op::Not(a) => Term::B(self.translate(a)?.bool()?.not()),
            Op::And(xs) => {
                let items = self.bools(xs)?;
                Term::B(Bool::and(z3, &items.iter().collect::<Vec<_>>()))
            }
            Op::Or(xs) => {
                let items = self.bools(xs)?;
                Term::B(Bool::or(z3, &items.iter().collect::<Vec<_>>()))
            }
            Op::Implies(a, b) => {
                let (a, b) = (self.translate(a)?.bool()?, self.translate(b)?.bool()?);
                Term::B(a.implies(&b))
            }
            Op::Ite(c, t, f) => {
                let c = self.translate(c)?.bool()?;
                match (self.translate(t)?, self.translate(f)?) {
                    (Term::B(t), Term::B(f)) => Term::B(c.ite(&t, &f)),
                    (Term::V(t), Term::V(f)) => Term::V(c.ite(&t, &f)),
                    (Term::A(t), Term::A(f)) => Term::A(c.ite(&t, &f)),
                    _ => return Err("ite branches of different sorts".to_string()),
                }
            }
            Op::Eq(a, b) => match (self.translate(a)?, self.translate(b)?) {
                (Term::B(a), Term::B(b)) => Term::B(a._eq(&b)),
                (Term::V(a), Term::V(b)) => Term::B(a._eq(&b)),
                (Term::A(a), Term::A(b)) => Term::B(a._eq(&b)),
                _ => return Err("equality over different sorts".to_string()),
            },
            Op::BvUnary(op, a) => {
                let a = self.translate(a)?.bv()?;
                Term::V(match op {
                    BvUnaryOp::Neg => a.bvneg(),
                    BvUnaryOp::Not => a.bvnot(),
                })
            }
            Op::BvBinary(op, a, b) => {
                let (a, b) = (self.translate(a)?.bv()?, self.translate(b)?.bv()?);
                Term::V(match op {
                    BvBinaryOp::Add => a.bvadd(&b),
                    BvBinaryOp::Sub => a.bvsub(&b),
                    BvBinaryOp::Mul => a.bvmul(&b),
                    BvBinaryOp::UDiv => a.bvudiv(&b),
                    BvBinaryOp::SDiv => a.bvsdiv(&b),
                    BvBinaryOp::URem => a.bvurem(&b),
                    BvBinaryOp::SRem => a.bvsrem(&b),
                    BvBinaryOp::Shl => a.bvshl(&b),
                    BvBinaryOp::LShr => a.bvlshr(&b),
                    BvBinaryOp::AShr => a.bvashr(&b),
                    BvBinaryOp::And => a.bvand(&b),
                    BvBinaryOp::Or => a.bvor(&b),
                    BvBinaryOp::Xor => a.bvxor(&b),
                })
            }
            Op::BvCmp(op, a, b) => {
                let (a, b) = (self.translate(a)?.bv()?, self.translate(b)?.bv()?);
                Term::B(match op {
                    BvCmpOp::Ult => a.bvult(&b),
                    BvCmpOp::Ule => a.bvule(&b),
                    BvCmpOp::Ugt => a.bvugt(&b),
                    BvCmpOp::Uge => a.bvuge(&b),
                    BvCmpOp::Slt => a.bvslt(&b),
                    BvCmpOp::Sle => a.bvsle(&b),
                    BvCmpOp::Sgt => a.bvsgt(&b),
                    BvCmpOp::Sge => a.bvsge(&b),
                })
            }
            Op::Extract { hi, lo, arg } => Term::V(self.translate(arg)?.bv()?.extract(hi, lo)),
            Op::ZeroExt { by, arg } => Term::V(self.translate(arg)?.bv()?.zero_ext(by)),
            Op::SignExt { by, arg } => Term::V(self.translate(arg)?.bv()?.sign_ext(by)),
            Op::Select { array, index } => {
                let array = self.translate(array)?.array()?;
                let index = self.translate(index)?.bv()?;
                let read = array
                    .select(&index)
                    .as_bv()
                    .ok_or_else(|| "select from a non bit-vector array".to_string())?;
                Term::V(read)
            }
            Op::Store {
                array,
                index,
                value,
            } => {
                let array = self.translate(array)?.array()?;
                let index = self.translate(index)?.bv()?;
                let value = self.translate(value)?.bv()?;
                Term::A(array.store(&index, &value))
            }
            Op::RangeStore {
                array,
                from,
                size,
                value,
            } => {
                let base = self.translate(array)?.array()?;
                let from = self.translate(from)?.bv()?;
                let value = self.translate(value)?.bv()?;
                let sort = self.ctx.sort(e);
                let index_width = sort.width().unwrap_or(64);
                let out = Array::fresh_const(z3, "range", &self.index_sort(sort), &self.element_sort(sort));
                let i = BV::fresh_const(z3, "i", index_width);
                let inside = i.bvsub(&from).bvult(&self.bv_const(size as u128, index_width));
                let (cell, old) = match (out.select(&i).as_bv(), base.select(&i).as_bv()) {
                    (Some(cell), Some(old)) => (cell, old),
                    _ => return Err("range store over a non bit-vector array".to_string()),
                };
                let body = inside.ite(&cell._eq(&value), &cell._eq(&old));
                self.side.push(forall_const(z3, &[&i], &[], &body));
                Term::A(out)
            }
            Op::ForAll { bound, body } => {
                let bound = bound
                    .into_iter()
                    .map(|b| self.translate(b).and_then(Term::bv))
                    .collect::<Result<Vec<_>, _>>()?;
                let body = self.translate(body)?.bool()?;
                let refs: Vec<&dyn Ast<'z>> = bound.iter().map(|b| b as &dyn Ast<'z>).collect();
                Term::B(forall_const(z3, &refs, &[], &body))
            }
        };
        self.memo.insert(e, term.clone());
        Ok(term)
    }

    fn bools(&mut self, xs: Vec<ExprId>) -> Result<Vec<Bool<'z>>, String> {
        xs.into_iter()
            .map(|x| self.translate(x).and_then(Term::bool))
            .collect()
    }

    fn index_sort(&self, sort: Sort) -> z3::Sort<'z> {
        match sort {
            Sort::Array { index, .. } => z3::Sort::bitvector(self.z3, index),
            other => self.sort(other),
        }
    }

    fn element_sort(&self, sort: Sort) -> z3::Sort<'z> {
        match sort {
            Sort::Array { element, .. } => z3::Sort::bitvector(self.z3, element),
            other => self.sort(other),
        }
    }
}

/// Value of a bit-vector of any width as a number
fn bv_value(model: &z3::Model<'_>, v: &BV<'_>, width: u32) -> Option<u128> {
    let mut out = 0u128;
    let mut lo = 0u32;
    while lo < width {
        let hi = (lo + 63).min(width - 1);
        let piece = if lo == 0 && hi == width - 1 {
            v.clone()
        } else {
            v.extract(hi, lo)
        };
        let bits = model.eval(&piece, true)?.as_u64()?;
        out |= (bits as u128) << lo;
        lo = hi + 1;
    }
    Some(out)
}

/// Selects from free arrays reachable from `roots`
fn array_reads(ctx: &ExprContext, roots: &[ExprId]) -> Vec<(ExprId, ExprId)> {
    let mut seen = FxHashSet::default();
    let mut stack: Vec<ExprId> = roots.to_vec();
    let mut out = Vec::new();
    while let Some(e) = stack.pop() {
        if !seen.insert(e) {
            continue;
        }
        let op = ctx.op(e);
        if let Op::Select { array, index } = &op {
            if matches!(ctx.op(*array), Op::Var { .. }) {
                out.push((*array, *index));
            }
        }
        stack.extend(op.children());
    }
    out
}

impl Z3Session<'_> {
    fn run(&mut self, assumptions: &[ExprId]) -> Result<CheckOutcome, String> {
        let mut cfg = Config::new();
        if self.timeout_ms > 0 {
            cfg.set_timeout_msec(self.timeout_ms);
        }
        let z3 = Context::new(&cfg);
        let solver = Solver::new(&z3);
        let mut tr = Translator {
            ctx: self.ctx,
            z3: &z3,
            memo: FxHashMap::default(),
            side: Vec::new(),
        };

        for a in &self.assertions {
            let f = tr.translate(*a)?.bool()?;
            solver.assert(&f);
        }
        let mut trackers: Vec<Bool<'_>> = Vec::with_capacity(assumptions.len());
        let mut by_name: FxHashMap<String, ExprId> = FxHashMap::default();
        for (k, a) in assumptions.iter().enumerate() {
            let f = tr.translate(*a)?.bool()?;
            let name = format!("assume!{}", k);
            let tracker = Bool::new_const(&z3, name.clone());
            solver.assert(&tracker.implies(&f));
            by_name.insert(name, *a);
            trackers.push(tracker);
        }
        for side in &tr.side {
            solver.assert(side);
        }

        let result = solver.check_assumptions(&trackers);
        debug!(target: "symstate::smt", ?result, "z3 check finished");
        Ok(match result {
            SatResult::Unsat => {
                let core = solver
                    .get_unsat_core()
                    .iter()
                    .filter_map(|b| by_name.get(b.to_string().trim_matches('|')).copied())
                    .collect();
                CheckOutcome::Unsat(core)
            }
            SatResult::Unknown => CheckOutcome::Unknown(
                solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            SatResult::Sat => {
                let z3_model = solver
                    .get_model()
                    .ok_or_else(|| "z3 reported sat without a model".to_string())?;
                let mut roots = self.assertions.clone();
                roots.extend_from_slice(assumptions);
                let mut model = Model::new();
                for var in self.ctx.vars_of(&roots) {
                    let value = match (self.ctx.sort(var), tr.translate(var)?) {
                        (Sort::Bool, Term::B(b)) => z3_model
                            .eval(&b, true)
                            .and_then(|b| b.as_bool())
                            .map(Value::Bool),
                        (Sort::BitVec(width), Term::V(v)) => {
                            bv_value(&z3_model, &v, width).map(|value| Value::BitVector { value, width })
                        }
                        _ => None,
                    };
                    if let Some(value) = value {
                        model.assign(var, value);
                    }
                }
                let mut arrays: FxHashMap<ExprId, ArrayValue> = FxHashMap::default();
                for (array, index) in array_reads(self.ctx, &roots) {
                    let (Term::V(idx), Term::A(arr)) = (tr.translate(index)?, tr.translate(array)?) else {
                        continue;
                    };
                    let width = self.ctx.width(index);
                    let element = self.ctx.sort(array);
                    let element_width = match element {
                        Sort::Array { element, .. } => element,
                        _ => continue,
                    };
                    let read = arr.select(&idx).as_bv();
                    if let (Some(at), Some(read)) = (bv_value(&z3_model, &idx, width), read) {
                        if let Some(cell) = bv_value(&z3_model, &read, element_width) {
                            arrays
                                .entry(array)
                                .or_insert_with(|| ArrayValue::new(0, width))
                                .entries
                                .insert(at, cell);
                        }
                    }
                }
                for (array, value) in arrays {
                    model.assign(array, Value::Array(value));
                }
                self.model = Some(model);
                CheckOutcome::Sat
            }
        })
    }
}

impl SmtSession for Z3Session<'_> {
    fn assert(&mut self, formula: ExprId) {
        self.assertions.push(formula);
    }

    fn check(&mut self, assumptions: &[ExprId]) -> CheckOutcome {
        self.model = None;
        match self.run(assumptions) {
            Ok(outcome) => outcome,
            Err(reason) => CheckOutcome::Unknown(reason),
        }
    }

    fn eval(&self, expr: ExprId) -> Option<Value> {
        self.model.as_ref()?.eval(self.ctx, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z3_agrees_on_wide_constants() {
        let ctx = ExprContext::new();
        let backend = Z3Backend::new(0);
        let mut s = backend.session(&ctx);
        let x = ctx.var("x", Sort::BitVec(128));
        let big = ctx.bv_const(u128::MAX - 5, 128);
        s.assert(ctx.eq(x, big));
        assert!(s.check(&[]).is_sat());
        assert_eq!(s.eval(x).and_then(|v| v.as_bv()), Some(u128::MAX - 5));
    }

    #[test]
    fn test_z3_range_store_reads() {
        let ctx = ExprContext::new();
        let backend = Z3Backend::new(0);
        let mut s = backend.session(&ctx);
        let ff = ctx.bv_const(0xFF, 64);
        let mem = ctx.const_array(64, ff);
        let from = ctx.var("from", Sort::BitVec(64));
        let filled = ctx.range_store(mem, from, 4, ctx.bv_const(0, 64));
        let at = ctx.bv_binary(BvBinaryOp::Add, from, ctx.bv_const(2, 64));
        let read = ctx.select(filled, at);
        s.assert(ctx.not(ctx.eq(read, ctx.bv_const(0, 64))));
        assert!(s.check(&[]).is_unsat());
    }
}

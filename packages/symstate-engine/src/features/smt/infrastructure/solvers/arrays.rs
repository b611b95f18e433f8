//! Array elimination
//!
//! Rewrites formulas over arrays into pure bit-vector formulas:
//!
//! - reads through writes become `ite(index == written, value, read(rest))`
//! - reads through a range write test the offset against the range size
//! - reads through an `ite` of arrays distribute over the branches
//! - reads of a free array become fresh element variables, and every pair of
//!   reads of the same array gets an Ackermann constraint
//!   `i == j => read_i == read_j`
//!
//! Array equality and quantifiers are outside this fragment and reported as
//! unsupported.

use crate::features::smt::domain::expr::{BvBinaryOp, BvCmpOp, ExprContext, ExprId, Op, Sort};
use rustc_hash::FxHashMap;

/// A read of a free array replaced by `element`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRead {
    pub array: ExprId,
    pub index: ExprId,
    pub element: ExprId,
}

pub struct ArrayEliminator<'a> {
    ctx: &'a ExprContext,
    memo: FxHashMap<ExprId, ExprId>,
    read_memo: FxHashMap<(ExprId, ExprId), ExprId>,
    reads: Vec<ArrayRead>,
}

impl<'a> ArrayEliminator<'a> {
    pub fn new(ctx: &'a ExprContext) -> Self {
        Self {
            ctx,
            memo: FxHashMap::default(),
            read_memo: FxHashMap::default(),
            reads: Vec::new(),
        }
    }

    /// Reads of free arrays introduced so far
    pub fn reads(&self) -> &[ArrayRead] {
        &self.reads
    }

    /// Functional consistency of the free-array reads
    pub fn ackermann(&self) -> Vec<ExprId> {
        let mut out = Vec::new();
        for (i, a) in self.reads.iter().enumerate() {
            for b in &self.reads[i + 1..] {
                if a.array != b.array {
                    continue;
                }
                let same_index = self.ctx.eq(a.index, b.index);
                let same_value = self.ctx.eq(a.element, b.element);
                out.push(self.ctx.implies(same_index, same_value));
            }
        }
        out
    }

    pub fn rewrite(&mut self, e: ExprId) -> Result<ExprId, String> {
        if let Some(done) = self.memo.get(&e) {
            return Ok(*done);
        }
        let ctx = self.ctx;
        if ctx.sort(e).is_array() {
            return Err(format!(
                "array term {} used outside of a read",
                ctx.display(e)
            ));
        }
        let out = match ctx.op(e) {
            Op::BoolConst(_) | Op::BvConst { .. } | Op::Var { .. } => e,
            Op::Select { array, index } => {
                let index = self.rewrite(index)?;
                self.read(array, index)?
            }
            Op::ForAll { .. } => {
                return Err("quantified formulas are not supported".to_string())
            }
            Op::Not(a) => {
                let a = self.rewrite(a)?;
                ctx.not(a)
            }
            Op::And(xs) => {
                let xs = xs
                    .into_iter()
                    .map(|x| self.rewrite(x))
                    .collect::<Result<Vec<_>, _>>()?;
                ctx.and(xs)
            }
            Op::Or(xs) => {
                let xs = xs
                    .into_iter()
                    .map(|x| self.rewrite(x))
                    .collect::<Result<Vec<_>, _>>()?;
                ctx.or(xs)
            }
            Op::Implies(a, b) => {
                let (a, b) = (self.rewrite(a)?, self.rewrite(b)?);
                ctx.implies(a, b)
            }
            Op::Ite(c, t, f) => {
                let (c, t, f) = (self.rewrite(c)?, self.rewrite(t)?, self.rewrite(f)?);
                ctx.ite(c, t, f)
            }
            Op::Eq(a, b) => {
                let (a, b) = (self.rewrite(a)?, self.rewrite(b)?);
                ctx.eq(a, b)
            }
            Op::BvUnary(op, a) => {
                let a = self.rewrite(a)?;
                ctx.bv_unary(op, a)
            }
            Op::BvBinary(op, a, b) => {
                let (a, b) = (self.rewrite(a)?, self.rewrite(b)?);
                ctx.bv_binary(op, a, b)
            }
            Op::BvCmp(op, a, b) => {
                let (a, b) = (self.rewrite(a)?, self.rewrite(b)?);
                ctx.bv_cmp(op, a, b)
            }
            Op::Extract { hi, lo, arg } => {
                let arg = self.rewrite(arg)?;
                ctx.extract(hi, lo, arg)
            }
            Op::ZeroExt { by, arg } => {
                let arg = self.rewrite(arg)?;
                ctx.zero_ext(by, arg)
            }
            Op::SignExt { by, arg } => {
                let arg = self.rewrite(arg)?;
                ctx.sign_ext(by, arg)
            }
            Op::ConstArray { .. } | Op::Store { .. } | Op::RangeStore { .. } => {
                return Err(format!("unexpected array term {}", ctx.display(e)))
            }
        };
        self.memo.insert(e, out);
        Ok(out)
    }

    /// Element of `array` at the already rewritten `index`
    fn read(&mut self, array: ExprId, index: ExprId) -> Result<ExprId, String> {
        if let Some(done) = self.read_memo.get(&(array, index)) {
            return Ok(*done);
        }
        let ctx = self.ctx;
        let out = match ctx.op(array) {
            Op::Var { sort, .. } => {
                let element = match sort {
                    Sort::Array { element, .. } => element,
                    other => return Err(format!("read from non-array sort {:?}", other)),
                };
                let fresh = ctx.fresh_var("read", Sort::BitVec(element));
                self.reads.push(ArrayRead {
                    array,
                    index,
                    element: fresh,
                });
                fresh
            }
            Op::ConstArray { value, .. } => self.rewrite(value)?,
            Op::Store {
                array: inner,
                index: written,
                value,
            } => {
                let written = self.rewrite(written)?;
                let value = self.rewrite(value)?;
                let rest = self.read(inner, index)?;
                let hit = ctx.eq(index, written);
                ctx.ite(hit, value, rest)
            }
            Op::RangeStore {
                array: inner,
                from,
                size,
                value,
            } => {
                let rest = self.read(inner, index)?;
                if size == 0 {
                    rest
                } else {
                    let from = self.rewrite(from)?;
                    let value = self.rewrite(value)?;
                    let width = ctx.width(index);
                    let offset = ctx.bv_binary(BvBinaryOp::Sub, index, from);
                    let bound = ctx.bv_const(size as u128, width);
                    let inside = ctx.bv_cmp(BvCmpOp::Ult, offset, bound);
                    ctx.ite(inside, value, rest)
                }
            }
            Op::Ite(c, t, f) => {
                let c = self.rewrite(c)?;
                let t = self.read(t, index)?;
                let f = self.read(f, index)?;
                ctx.ite(c, t, f)
            }
            _ => return Err(format!("unsupported array term {}", ctx.display(array))),
        };
        self.read_memo.insert((array, index), out);
        Ok(out)
    }
}

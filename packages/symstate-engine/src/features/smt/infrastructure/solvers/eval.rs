//! Concrete evaluation of expressions under a model
//!
//! Backends report models as values of the free variables; everything else
//! is computed here with the same semantics constant folding uses. Variables
//! missing from the model evaluate to false / zero.

use crate::features::smt::domain::expr::{
    eval_binary, eval_cmp, eval_extract, eval_sign_ext, eval_unary, mask, ExprContext, ExprId,
    Op, Sort,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Cells listed per written range when reporting memory shapes
const RANGE_REPORT_LIMIT: u64 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Write {
    Point(u128, u128),
    Range { from: u128, size: u64, value: u128 },
}

/// Interpretation of an array: a base map plus the writes made on top of it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayValue {
    pub default: u128,
    pub entries: BTreeMap<u128, u128>,
    writes: Vec<Write>,
    width: u32,
}

impl ArrayValue {
    pub fn new(default: u128, index_width: u32) -> Self {
        Self {
            default,
            entries: BTreeMap::new(),
            writes: Vec::new(),
            width: index_width,
        }
    }

    pub fn with_entry(mut self, index: u128, value: u128) -> Self {
        self.entries.insert(index, value);
        self
    }

    pub fn lookup(&self, index: u128) -> u128 {
        for write in self.writes.iter().rev() {
            match write {
                Write::Point(at, value) if *at == index => return *value,
                Write::Range { from, size, value } => {
                    let offset = index.wrapping_sub(*from) & mask(self.width);
                    if offset < *size as u128 {
                        return *value;
                    }
                }
                _ => {}
            }
        }
        self.entries.get(&index).copied().unwrap_or(self.default)
    }

    fn stored(mut self, index: u128, value: u128) -> Self {
        self.writes.push(Write::Point(index, value));
        self
    }

    fn range_stored(mut self, from: u128, size: u64, value: u128) -> Self {
        self.writes.push(Write::Range { from, size, value });
        self
    }

    /// Indices known to hold something other than the default
    pub fn touched(&self) -> Vec<u128> {
        let mut out: Vec<u128> = self.entries.keys().copied().collect();
        for write in &self.writes {
            match write {
                Write::Point(at, _) => out.push(*at),
                Write::Range { from, size, .. } => {
                    let shown = (*size).min(RANGE_REPORT_LIMIT);
                    out.extend((0..shown).map(|i| from.wrapping_add(i as u128) & mask(self.width)));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    BitVector { value: u128, width: u32 },
    Array(ArrayValue),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bv(&self) -> Option<u128> {
        match self {
            Value::BitVector { value, .. } => Some(*value),
            Value::Bool(b) => Some(*b as u128),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// Values of free variables
#[derive(Debug, Clone, Default)]
pub struct Model {
    values: FxHashMap<ExprId, Value>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, var: ExprId, value: Value) {
        self.values.insert(var, value);
    }

    pub fn get(&self, var: ExprId) -> Option<&Value> {
        self.values.get(&var)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `expr`; `None` for quantified formulas
    pub fn eval(&self, ctx: &ExprContext, expr: ExprId) -> Option<Value> {
        let mut memo = FxHashMap::default();
        Evaluator {
            ctx,
            model: self,
            memo: &mut memo,
        }
        .eval(expr)
    }
}

fn default_value(sort: Sort) -> Value {
    match sort {
        Sort::Bool => Value::Bool(false),
        Sort::BitVec(width) => Value::BitVector { value: 0, width },
        Sort::Array { index, .. } => Value::Array(ArrayValue::new(0, index)),
    }
}

struct Evaluator<'a> {
    ctx: &'a ExprContext,
    model: &'a Model,
    memo: &'a mut FxHashMap<ExprId, Value>,
}

impl Evaluator<'_> {
    fn bv(&mut self, e: ExprId) -> Option<u128> {
        self.eval(e)?.as_bv()
    }

    fn boolean(&mut self, e: ExprId) -> Option<bool> {
        self.eval(e)?.as_bool()
    }

    fn array(&mut self, e: ExprId) -> Option<ArrayValue> {
        match self.eval(e)? {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    fn eval(&mut self, e: ExprId) -> Option<Value> {
        if let Some(v) = self.memo.get(&e) {
            return Some(v.clone());
        }
        let sort = self.ctx.sort(e);
        let width = sort.width().unwrap_or(1);
        let bv = |value: u128| Value::BitVector {
            value: value & mask(width),
            width,
        };
        let value = match self.ctx.op(e) {
            Op::BoolConst(b) => Value::Bool(b),
            Op::BvConst { value, width } => Value::BitVector { value, width },
            Op::Var { sort, .. } => self
                .model
                .get(e)
                .cloned()
                .unwrap_or_else(|| default_value(sort)),
            Op::ConstArray { index, value } => {
                let cell = self.bv(value)?;
                Value::Array(ArrayValue::new(cell, index))
            }
            Op::Not(a) => Value::Bool(!self.boolean(a)?),
            Op::And(xs) => {
                let mut all = true;
                for x in xs {
                    all &= self.boolean(x)?;
                }
                Value::Bool(all)
            }
            Op::Or(xs) => {
                let mut any = false;
                for x in xs {
                    any |= self.boolean(x)?;
                }
                Value::Bool(any)
            }
            Op::Implies(a, b) => Value::Bool(!self.boolean(a)? || self.boolean(b)?),
            Op::Ite(c, t, f) => {
                if self.boolean(c)? {
                    self.eval(t)?
                } else {
                    self.eval(f)?
                }
            }
            Op::Eq(a, b) => {
                let (x, y) = (self.eval(a)?, self.eval(b)?);
                Value::Bool(x == y)
            }
            Op::BvUnary(op, a) => bv(eval_unary(op, self.bv(a)?, width)),
            Op::BvBinary(op, a, b) => bv(eval_binary(op, self.bv(a)?, self.bv(b)?, width)),
            Op::BvCmp(op, a, b) => {
                let w = self.ctx.width(a);
                Value::Bool(eval_cmp(op, self.bv(a)?, self.bv(b)?, w))
            }
            Op::Extract { hi, lo, arg } => bv(eval_extract(self.bv(arg)?, hi, lo)),
            Op::ZeroExt { arg, .. } => bv(self.bv(arg)?),
            Op::SignExt { by, arg } => {
                let w = self.ctx.width(arg);
                bv(eval_sign_ext(self.bv(arg)?, w, by))
            }
            Op::Select { array, index } => {
                let arr = self.array(array)?;
                bv(arr.lookup(self.bv(index)?))
            }
            Op::Store {
                array,
                index,
                value,
            } => {
                let arr = self.array(array)?;
                Value::Array(arr.stored(self.bv(index)?, self.bv(value)?))
            }
            Op::RangeStore {
                array,
                from,
                size,
                value,
            } => {
                let arr = self.array(array)?;
                Value::Array(arr.range_stored(self.bv(from)?, size, self.bv(value)?))
            }
            Op::ForAll { .. } => return None,
        };
        self.memo.insert(e, value.clone());
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::smt::domain::expr::BvBinaryOp;

    #[test]
    fn test_eval_arithmetic_under_model() {
        let ctx = ExprContext::new();
        let x = ctx.var("x", Sort::BitVec(8));
        let two = ctx.bv_const(2, 8);
        let prod = ctx.bv_binary(BvBinaryOp::Mul, x, two);
        let mut model = Model::new();
        model.assign(x, Value::BitVector { value: 200, width: 8 });
        assert_eq!(model.eval(&ctx, prod).and_then(|v| v.as_bv()), Some(144));
    }

    #[test]
    fn test_empty_memory_reads_default() {
        let ctx = ExprContext::new();
        let ff = ctx.bv_const(0xFF, 8);
        let mem = ctx.const_array(64, ff);
        let p = ctx.var("p", Sort::BitVec(64));
        let q = ctx.var("q", Sort::BitVec(64));
        let v = ctx.bv_const(1, 8);
        let written = ctx.store(mem, p, v);
        let read_q = ctx.select(written, q);
        let read_p = ctx.select(written, p);

        let mut model = Model::new();
        model.assign(p, Value::BitVector { value: 3, width: 64 });
        model.assign(q, Value::BitVector { value: 4, width: 64 });
        assert_eq!(model.eval(&ctx, read_q).and_then(|v| v.as_bv()), Some(0xFF));
        assert_eq!(model.eval(&ctx, read_p).and_then(|v| v.as_bv()), Some(1));
    }

    #[test]
    fn test_range_writes_cover_their_cells() {
        let arr = ArrayValue::new(0xFF, 64).range_stored(10, 4, 0);
        assert_eq!(arr.lookup(9), 0xFF);
        assert_eq!(arr.lookup(10), 0);
        assert_eq!(arr.lookup(13), 0);
        assert_eq!(arr.lookup(14), 0xFF);
        let arr = arr.stored(11, 5);
        assert_eq!(arr.lookup(11), 5);
        assert_eq!(arr.touched(), vec![10, 11, 12, 13]);
    }
}

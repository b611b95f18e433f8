//! SMT → term algebra
//!
//! Turns model values and interpolant formulas back into terms so results
//! can be stored in predicate states. Free variables are resolved through
//! the encoder's symbol table; array-valued expressions have no term form.

use super::solvers::Value;
use crate::features::smt::domain::expr::{BvBinaryOp, BvCmpOp, BvUnaryOp, ExprContext, ExprId, Op};
use crate::features::term_algebra::{
    ArithType, ConditionType, FactoryNest, Signedness, TermId, Type, UnaryArithType,
};
use rustc_hash::FxHashMap;

/// Two's complement reading of the low `width` bits of `value`
pub fn signed_value(value: u128, width: u32) -> i64 {
    if width == 0 {
        return 0;
    }
    let shift = 128 - width.min(128);
    (((value << shift) as i128) >> shift) as i64
}

/// Literal of the witness term's type holding `value`
pub fn undo_value(nest: &mut FactoryNest, witness: TermId, value: &Value) -> Option<TermId> {
    let ty = nest.term(witness).ty;
    match value {
        Value::Bool(b) => Some(nest.terms().boolean(*b)),
        Value::BitVector { value, width } => {
            let res = match nest.ty(ty).clone() {
                Type::Bool => nest.terms().boolean(*value != 0),
                Type::Pointer { .. } if *value == 0 => nest.terms().null_ptr(),
                Type::Integer { bitsize, signedness } => {
                    nest.terms().int(signed_value(*value, *width), bitsize, signedness)
                }
                _ => nest
                    .terms()
                    .int(signed_value(*value, *width), *width, Signedness::Unknown),
            };
            Some(res)
        }
        Value::Array(_) => None,
    }
}

pub struct Unlogic<'a> {
    ctx: &'a ExprContext,
    symbols: &'a FxHashMap<ExprId, TermId>,
    cache: FxHashMap<ExprId, Option<TermId>>,
}

impl<'a> Unlogic<'a> {
    pub fn new(ctx: &'a ExprContext, symbols: &'a FxHashMap<ExprId, TermId>) -> Self {
        Self {
            ctx,
            symbols,
            cache: FxHashMap::default(),
        }
    }

    /// Term equivalent of `expr`, or `None` if it mentions arrays,
    /// quantifiers or variables with no known term
    pub fn undo(&mut self, nest: &mut FactoryNest, expr: ExprId) -> Option<TermId> {
        if let Some(res) = self.cache.get(&expr) {
            return *res;
        }
        let res = self.undo_uncached(nest, expr);
        self.cache.insert(expr, res);
        res
    }

    fn fold(&mut self, nest: &mut FactoryNest, op: ArithType, args: &[ExprId], unit: bool) -> Option<TermId> {
        let mut acc: Option<TermId> = None;
        for a in args {
            let t = self.undo(nest, *a)?;
            acc = Some(match acc {
                None => t,
                Some(prev) => nest.terms().binary(op, prev, t),
            });
        }
        Some(acc.unwrap_or_else(|| nest.terms().boolean(unit)))
    }

    fn undo_uncached(&mut self, nest: &mut FactoryNest, expr: ExprId) -> Option<TermId> {
        let op = self.ctx.op(expr);
        match op {
            Op::BoolConst(b) => Some(nest.terms().boolean(b)),
            Op::BvConst { value, width } => Some(nest.terms().int(
                signed_value(value, width),
                width,
                Signedness::Unknown,
            )),
            Op::Var { .. } => self.symbols.get(&expr).copied(),
            Op::Not(a) => {
                let a = self.undo(nest, a)?;
                Some(nest.terms().unary(UnaryArithType::Not, a))
            }
            Op::And(args) => self.fold(nest, ArithType::LAnd, &args, true),
            Op::Or(args) => self.fold(nest, ArithType::LOr, &args, false),
            Op::Implies(a, b) => {
                let a = self.undo(nest, a)?;
                let b = self.undo(nest, b)?;
                let na = nest.terms().unary(UnaryArithType::Not, a);
                Some(nest.terms().binary(ArithType::LOr, na, b))
            }
            Op::Ite(c, t, e) => {
                let c = self.undo(nest, c)?;
                let t = self.undo(nest, t)?;
                let e = self.undo(nest, e)?;
                Some(nest.terms().ternary(c, t, e))
            }
            Op::Eq(a, b) => {
                if self.ctx.sort(a).is_array() {
                    return None;
                }
                let a = self.undo(nest, a)?;
                let b = self.undo(nest, b)?;
                Some(nest.terms().cmp(ConditionType::Eq, a, b))
            }
            Op::BvUnary(op, a) => {
                let a = self.undo(nest, a)?;
                let op = match op {
                    BvUnaryOp::Neg => UnaryArithType::Neg,
                    BvUnaryOp::Not => UnaryArithType::BNot,
                };
                Some(nest.terms().unary(op, a))
            }
            Op::BvBinary(op, a, b) => {
                let a = self.undo(nest, a)?;
                let b = self.undo(nest, b)?;
                Some(nest.terms().binary(arith_for(op), a, b))
            }
            Op::BvCmp(op, a, b) => {
                let a = self.undo(nest, a)?;
                let b = self.undo(nest, b)?;
                Some(nest.terms().cmp(condition_for(op), a, b))
            }
            Op::Extract { hi, lo, arg } => {
                let width = self.ctx.width(arg);
                let a = self.undo(nest, arg)?;
                let shifted = if lo == 0 {
                    a
                } else {
                    let by = nest.terms().int(i64::from(lo), width, Signedness::Unknown);
                    nest.terms().binary(ArithType::Lshr, a, by)
                };
                let bits = hi - lo + 1;
                let masked = if bits >= width {
                    shifted
                } else {
                    let mask = ((1u128 << bits) - 1) as i64;
                    let m = nest.terms().int(mask, width, Signedness::Unknown);
                    nest.terms().binary(ArithType::BAnd, shifted, m)
                };
                let ty = nest.types().integer(bits, Signedness::Unknown);
                Some(nest.terms().cast(ty, false, masked))
            }
            Op::ZeroExt { by, arg } | Op::SignExt { by, arg } => {
                let sext = matches!(self.ctx.op(expr), Op::SignExt { .. });
                let width = self.ctx.width(arg) + by;
                let a = self.undo(nest, arg)?;
                let ty = nest.types().integer(width, Signedness::Unknown);
                Some(nest.terms().cast(ty, sext, a))
            }
            Op::ConstArray { .. }
            | Op::Select { .. }
            | Op::Store { .. }
            | Op::RangeStore { .. }
            | Op::ForAll { .. } => None,
        }
    }
}

fn arith_for(op: BvBinaryOp) -> ArithType {
    match op {
        BvBinaryOp::Add => ArithType::Add,
        BvBinaryOp::Sub => ArithType::Sub,
        BvBinaryOp::Mul => ArithType::Mul,
        BvBinaryOp::UDiv => ArithType::UDiv,
        BvBinaryOp::SDiv => ArithType::Div,
        BvBinaryOp::URem => ArithType::URem,
        BvBinaryOp::SRem => ArithType::Rem,
        BvBinaryOp::Shl => ArithType::Shl,
        BvBinaryOp::LShr => ArithType::Lshr,
        BvBinaryOp::AShr => ArithType::Ashr,
        BvBinaryOp::And => ArithType::BAnd,
        BvBinaryOp::Or => ArithType::BOr,
        BvBinaryOp::Xor => ArithType::Xor,
    }
}

fn condition_for(op: BvCmpOp) -> ConditionType {
    match op {
        BvCmpOp::Ult => ConditionType::Ult,
        BvCmpOp::Ule => ConditionType::Ule,
        BvCmpOp::Ugt => ConditionType::Ugt,
        BvCmpOp::Uge => ConditionType::Uge,
        BvCmpOp::Slt => ConditionType::Lt,
        BvCmpOp::Sle => ConditionType::Le,
        BvCmpOp::Sgt => ConditionType::Gt,
        BvCmpOp::Sge => ConditionType::Ge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::smt::domain::expr::Sort;
    use crate::features::term_algebra::TermKind;

    #[test]
    fn test_signed_value() {
        assert_eq!(signed_value(0xFF, 8), -1);
        assert_eq!(signed_value(0x7F, 8), 127);
        assert_eq!(signed_value(u128::MAX, 64), -1);
    }

    #[test]
    fn test_undo_value_follows_witness_type() {
        let mut nest = FactoryNest::new();
        let i8t = nest.types().integer(8, Signedness::Signed);
        let x = nest.terms().value(i8t, "x");
        let lit = undo_value(&mut nest, x, &Value::BitVector { value: 0xFE, width: 8 }).unwrap();
        assert_eq!(nest.term(lit).kind, TermKind::OpaqueInt(-2));
        assert!(undo_value(&mut nest, x, &Value::Array(Default::default())).is_none());
    }

    #[test]
    fn test_formula_maps_back_through_symbols() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let x = nest.terms().value(int, "x");
        let ctx = ExprContext::new();
        let xv = ctx.var("x", Sort::BitVec(32));
        let mut symbols = FxHashMap::default();
        symbols.insert(xv, x);

        let f = ctx.bv_cmp(BvCmpOp::Sgt, xv, ctx.bv_const(3, 32));
        let mut unlogic = Unlogic::new(&ctx, &symbols);
        let t = unlogic.undo(&mut nest, f).unwrap();
        match &nest.term(t).kind {
            TermKind::Cmp { op, lhv, .. } => {
                assert_eq!(*op, ConditionType::Gt);
                assert_eq!(*lhv, x);
            }
            other => panic!("unexpected {:?}", other),
        }

        let unknown = ctx.var("y", Sort::BitVec(32));
        let g = ctx.eq(unknown, ctx.bv_const(0, 32));
        assert!(unlogic.undo(&mut nest, g).is_none());
    }
}

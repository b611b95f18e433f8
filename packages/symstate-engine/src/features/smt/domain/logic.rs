//! Typed SMT values
//!
//! Each value pairs an expression with an axiom: a side condition that must
//! hold for the expression to mean anything. Operators combine the
//! expressions and conjoin the axioms of both operands, so constraints
//! introduced deep inside a term (GEP bounds, allocation facts) travel with
//! the value until it is asserted.
//!
//! Bit-vector operands of different widths are sign-extended to the wider
//! one before combining.

use super::expr::{BvBinaryOp, BvCmpOp, BvUnaryOp, ExprContext, ExprId, Sort};
use std::ops;

fn conjoin(ctx: &ExprContext, a: ExprId, b: ExprId) -> ExprId {
    ctx.and2(a, b)
}

// ═══════════════════════════════════════════════════════════════════════════
// Bool
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct Bool<'c> {
    ctx: &'c ExprContext,
    expr: ExprId,
    axiom: ExprId,
}

impl<'c> Bool<'c> {
    pub fn new(ctx: &'c ExprContext, expr: ExprId, axiom: ExprId) -> Self {
        Self { ctx, expr, axiom }
    }

    pub fn from_expr(ctx: &'c ExprContext, expr: ExprId) -> Self {
        let axiom = ctx.bool_const(true);
        Self { ctx, expr, axiom }
    }

    pub fn constant(ctx: &'c ExprContext, value: bool) -> Self {
        Self::from_expr(ctx, ctx.bool_const(value))
    }

    pub fn var(ctx: &'c ExprContext, name: &str) -> Self {
        Self::from_expr(ctx, ctx.var(name, Sort::Bool))
    }

    pub fn fresh(ctx: &'c ExprContext, prefix: &str) -> Self {
        Self::from_expr(ctx, ctx.fresh_var(prefix, Sort::Bool))
    }

    pub fn ctx(&self) -> &'c ExprContext {
        self.ctx
    }

    pub fn expr(&self) -> ExprId {
        self.expr
    }

    pub fn axiom(&self) -> ExprId {
        self.axiom
    }

    /// Expression and axiom as one formula
    pub fn as_axiom(&self) -> ExprId {
        conjoin(self.ctx, self.expr, self.axiom)
    }

    pub fn with_axiom(self, axiom: ExprId) -> Self {
        Self {
            axiom: conjoin(self.ctx, self.axiom, axiom),
            ..self
        }
    }

    pub fn is_true(&self) -> bool {
        self.ctx.as_bool(self.expr) == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.ctx.as_bool(self.expr) == Some(false)
    }

    pub fn implies(self, other: Bool<'c>) -> Bool<'c> {
        Bool {
            ctx: self.ctx,
            expr: self.ctx.implies(self.expr, other.expr),
            axiom: conjoin(self.ctx, self.axiom, other.axiom),
        }
    }

    pub fn iff(self, other: Bool<'c>) -> Bool<'c> {
        Bool {
            ctx: self.ctx,
            expr: self.ctx.eq(self.expr, other.expr),
            axiom: conjoin(self.ctx, self.axiom, other.axiom),
        }
    }

    /// `if self { then } else { other }` over booleans
    pub fn ite(self, then: Bool<'c>, other: Bool<'c>) -> Bool<'c> {
        let ctx = self.ctx;
        Bool {
            ctx,
            expr: ctx.ite(self.expr, then.expr, other.expr),
            axiom: ctx.and(vec![self.axiom, then.axiom, other.axiom]),
        }
    }

    pub fn ite_bv(self, then: DynBitVector<'c>, other: DynBitVector<'c>) -> DynBitVector<'c> {
        let ctx = self.ctx;
        let width = then.width.max(other.width);
        let (t, e) = (then.resize(width, true), other.resize(width, true));
        DynBitVector {
            ctx,
            expr: ctx.ite(self.expr, t.expr, e.expr),
            axiom: ctx.and(vec![self.axiom, t.axiom, e.axiom]),
            width,
        }
    }

    pub fn all(ctx: &'c ExprContext, items: impl IntoIterator<Item = Bool<'c>>) -> Bool<'c> {
        let (exprs, axioms): (Vec<_>, Vec<_>) = items.into_iter().map(|b| (b.expr, b.axiom)).unzip();
        Bool {
            ctx,
            expr: ctx.and(exprs),
            axiom: ctx.and(axioms),
        }
    }

    pub fn any(ctx: &'c ExprContext, items: impl IntoIterator<Item = Bool<'c>>) -> Bool<'c> {
        let (exprs, axioms): (Vec<_>, Vec<_>) = items.into_iter().map(|b| (b.expr, b.axiom)).unzip();
        Bool {
            ctx,
            expr: ctx.or(exprs),
            axiom: ctx.and(axioms),
        }
    }

    /// 0/1 bit-vector of `width`
    pub fn to_bv(self, width: u32) -> DynBitVector<'c> {
        let one = DynBitVector::constant(self.ctx, 1, width);
        let zero = DynBitVector::constant(self.ctx, 0, width);
        self.ite_bv(one, zero)
    }
}

impl<'c> ops::BitAnd for Bool<'c> {
    type Output = Bool<'c>;

    fn bitand(self, rhs: Self) -> Self::Output {
        Bool {
            ctx: self.ctx,
            expr: self.ctx.and2(self.expr, rhs.expr),
            axiom: conjoin(self.ctx, self.axiom, rhs.axiom),
        }
    }
}

impl<'c> ops::BitOr for Bool<'c> {
    type Output = Bool<'c>;

    fn bitor(self, rhs: Self) -> Self::Output {
        Bool {
            ctx: self.ctx,
            expr: self.ctx.or2(self.expr, rhs.expr),
            axiom: conjoin(self.ctx, self.axiom, rhs.axiom),
        }
    }
}

impl<'c> ops::BitXor for Bool<'c> {
    type Output = Bool<'c>;

    fn bitxor(self, rhs: Self) -> Self::Output {
        !self.iff(rhs)
    }
}

impl<'c> ops::Not for Bool<'c> {
    type Output = Bool<'c>;

    fn not(self) -> Self::Output {
        Bool {
            ctx: self.ctx,
            expr: self.ctx.not(self.expr),
            axiom: self.axiom,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Bit-vectors
// ═══════════════════════════════════════════════════════════════════════════

/// Bit-vector whose width is only known at run time
#[derive(Debug, Clone, Copy)]
pub struct DynBitVector<'c> {
    ctx: &'c ExprContext,
    expr: ExprId,
    axiom: ExprId,
    width: u32,
}

impl<'c> DynBitVector<'c> {
    pub fn new(ctx: &'c ExprContext, expr: ExprId, axiom: ExprId) -> Self {
        let width = ctx.width(expr);
        Self {
            ctx,
            expr,
            axiom,
            width,
        }
    }

    pub fn from_expr(ctx: &'c ExprContext, expr: ExprId) -> Self {
        Self::new(ctx, expr, ctx.bool_const(true))
    }

    pub fn constant(ctx: &'c ExprContext, value: u128, width: u32) -> Self {
        Self::from_expr(ctx, ctx.bv_const(value, width))
    }

    pub fn signed(ctx: &'c ExprContext, value: i64, width: u32) -> Self {
        Self::constant(ctx, value as i128 as u128, width)
    }

    pub fn var(ctx: &'c ExprContext, name: &str, width: u32) -> Self {
        Self::from_expr(ctx, ctx.var(name, Sort::BitVec(width)))
    }

    pub fn fresh(ctx: &'c ExprContext, prefix: &str, width: u32) -> Self {
        Self::from_expr(ctx, ctx.fresh_var(prefix, Sort::BitVec(width)))
    }

    pub fn ctx(&self) -> &'c ExprContext {
        self.ctx
    }

    pub fn expr(&self) -> ExprId {
        self.expr
    }

    pub fn axiom(&self) -> ExprId {
        self.axiom
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn as_const(&self) -> Option<u128> {
        self.ctx.as_const(self.expr)
    }

    pub fn with_axiom(self, axiom: ExprId) -> Self {
        Self {
            axiom: conjoin(self.ctx, self.axiom, axiom),
            ..self
        }
    }

    /// Same value and axiom at `width`
    pub fn resize(self, width: u32, sign_extend: bool) -> Self {
        if width == self.width {
            return self;
        }
        Self {
            ctx: self.ctx,
            expr: self.ctx.resize(self.expr, width, sign_extend),
            axiom: self.axiom,
            width,
        }
    }

    pub fn extract(self, hi: u32, lo: u32) -> Self {
        Self {
            ctx: self.ctx,
            expr: self.ctx.extract(hi, lo, self.expr),
            axiom: self.axiom,
            width: hi - lo + 1,
        }
    }

    fn unify(self, other: Self) -> (Self, Self) {
        let width = self.width.max(other.width);
        (self.resize(width, true), other.resize(width, true))
    }

    fn binary(self, op: BvBinaryOp, other: Self) -> Self {
        let (a, b) = self.unify(other);
        Self {
            ctx: a.ctx,
            expr: a.ctx.bv_binary(op, a.expr, b.expr),
            axiom: conjoin(a.ctx, a.axiom, b.axiom),
            width: a.width,
        }
    }

    fn compare(self, op: BvCmpOp, other: Self) -> Bool<'c> {
        let (a, b) = self.unify(other);
        Bool::new(
            a.ctx,
            a.ctx.bv_cmp(op, a.expr, b.expr),
            conjoin(a.ctx, a.axiom, b.axiom),
        )
    }

    pub fn udiv(self, other: Self) -> Self {
        self.binary(BvBinaryOp::UDiv, other)
    }

    pub fn sdiv(self, other: Self) -> Self {
        self.binary(BvBinaryOp::SDiv, other)
    }

    pub fn urem(self, other: Self) -> Self {
        self.binary(BvBinaryOp::URem, other)
    }

    pub fn srem(self, other: Self) -> Self {
        self.binary(BvBinaryOp::SRem, other)
    }

    pub fn shl(self, other: Self) -> Self {
        self.binary(BvBinaryOp::Shl, other)
    }

    pub fn lshr(self, other: Self) -> Self {
        self.binary(BvBinaryOp::LShr, other)
    }

    pub fn ashr(self, other: Self) -> Self {
        self.binary(BvBinaryOp::AShr, other)
    }

    pub fn eq(self, other: Self) -> Bool<'c> {
        let (a, b) = self.unify(other);
        Bool::new(
            a.ctx,
            a.ctx.eq(a.expr, b.expr),
            conjoin(a.ctx, a.axiom, b.axiom),
        )
    }

    pub fn ne(self, other: Self) -> Bool<'c> {
        !self.eq(other)
    }

    pub fn slt(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Slt, other)
    }

    pub fn sle(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Sle, other)
    }

    pub fn sgt(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Sgt, other)
    }

    pub fn sge(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Sge, other)
    }

    pub fn ult(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Ult, other)
    }

    pub fn ule(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Ule, other)
    }

    pub fn ugt(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Ugt, other)
    }

    pub fn uge(self, other: Self) -> Bool<'c> {
        self.compare(BvCmpOp::Uge, other)
    }

    /// Non-zero test
    pub fn to_bool(self) -> Bool<'c> {
        let zero = Self::constant(self.ctx, 0, self.width);
        self.ne(zero)
    }
}

macro_rules! bv_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'c> ops::$trait for DynBitVector<'c> {
            type Output = DynBitVector<'c>;

            fn $method(self, rhs: Self) -> Self::Output {
                self.binary($op, rhs)
            }
        }
    };
}

bv_operator!(Add, add, BvBinaryOp::Add);
bv_operator!(Sub, sub, BvBinaryOp::Sub);
bv_operator!(Mul, mul, BvBinaryOp::Mul);
bv_operator!(BitAnd, bitand, BvBinaryOp::And);
bv_operator!(BitOr, bitor, BvBinaryOp::Or);
bv_operator!(BitXor, bitxor, BvBinaryOp::Xor);

impl<'c> ops::Neg for DynBitVector<'c> {
    type Output = DynBitVector<'c>;

    fn neg(self) -> Self::Output {
        Self {
            expr: self.ctx.bv_unary(BvUnaryOp::Neg, self.expr),
            ..self
        }
    }
}

impl<'c> ops::Not for DynBitVector<'c> {
    type Output = DynBitVector<'c>;

    fn not(self) -> Self::Output {
        Self {
            expr: self.ctx.bv_unary(BvUnaryOp::Not, self.expr),
            ..self
        }
    }
}

/// Bit-vector of a width fixed at compile time
#[derive(Debug, Clone, Copy)]
pub struct BitVector<'c, const N: u32> {
    inner: DynBitVector<'c>,
}

impl<'c, const N: u32> BitVector<'c, N> {
    pub fn constant(ctx: &'c ExprContext, value: u128) -> Self {
        Self {
            inner: DynBitVector::constant(ctx, value, N),
        }
    }

    pub fn var(ctx: &'c ExprContext, name: &str) -> Self {
        Self {
            inner: DynBitVector::var(ctx, name, N),
        }
    }

    pub fn fresh(ctx: &'c ExprContext, prefix: &str) -> Self {
        Self {
            inner: DynBitVector::fresh(ctx, prefix, N),
        }
    }

    /// Adapt any bit-vector, sign-extending or truncating to `N`
    pub fn adapt(value: DynBitVector<'c>) -> Self {
        Self {
            inner: value.resize(N, true),
        }
    }

    pub fn dynamic(self) -> DynBitVector<'c> {
        self.inner
    }

    pub fn expr(&self) -> ExprId {
        self.inner.expr()
    }

    pub fn axiom(&self) -> ExprId {
        self.inner.axiom()
    }

    pub fn eq(self, other: Self) -> Bool<'c> {
        self.inner.eq(other.inner)
    }

    pub fn ult(self, other: Self) -> Bool<'c> {
        self.inner.ult(other.inner)
    }

    pub fn uge(self, other: Self) -> Bool<'c> {
        self.inner.uge(other.inner)
    }

    pub fn sgt(self, other: Self) -> Bool<'c> {
        self.inner.sgt(other.inner)
    }

    pub fn with_axiom(self, axiom: ExprId) -> Self {
        Self {
            inner: self.inner.with_axiom(axiom),
        }
    }
}

impl<'c, const N: u32> ops::Add for BitVector<'c, N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            inner: self.inner + rhs.inner,
        }
    }
}

impl<'c, const N: u32> ops::Sub for BitVector<'c, N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            inner: self.inner - rhs.inner,
        }
    }
}

impl<'c, const N: u32> ops::Mul for BitVector<'c, N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            inner: self.inner * rhs.inner,
        }
    }
}

/// Pointers and memory cells
pub type Pointer<'c> = BitVector<'c, 64>;

// ═══════════════════════════════════════════════════════════════════════════
// Dynamic
// ═══════════════════════════════════════════════════════════════════════════

/// Encoding of a term whose sort depends on its type
#[derive(Debug, Clone, Copy)]
pub enum Dynamic<'c> {
    Bool(Bool<'c>),
    BitVector(DynBitVector<'c>),
}

impl<'c> Dynamic<'c> {
    pub fn from_expr(ctx: &'c ExprContext, expr: ExprId, axiom: ExprId) -> Self {
        if ctx.sort(expr).is_bool() {
            Dynamic::Bool(Bool::new(ctx, expr, axiom))
        } else {
            Dynamic::BitVector(DynBitVector::new(ctx, expr, axiom))
        }
    }

    pub fn expr(&self) -> ExprId {
        match self {
            Dynamic::Bool(b) => b.expr(),
            Dynamic::BitVector(v) => v.expr(),
        }
    }

    pub fn axiom(&self) -> ExprId {
        match self {
            Dynamic::Bool(b) => b.axiom(),
            Dynamic::BitVector(v) => v.axiom(),
        }
    }

    pub fn with_axiom(self, axiom: ExprId) -> Self {
        match self {
            Dynamic::Bool(b) => Dynamic::Bool(b.with_axiom(axiom)),
            Dynamic::BitVector(v) => Dynamic::BitVector(v.with_axiom(axiom)),
        }
    }

    pub fn to_bool(self) -> Bool<'c> {
        match self {
            Dynamic::Bool(b) => b,
            Dynamic::BitVector(v) => v.to_bool(),
        }
    }

    pub fn to_bv(self, width: u32, sign_extend: bool) -> DynBitVector<'c> {
        match self {
            Dynamic::Bool(b) => b.to_bv(width),
            Dynamic::BitVector(v) => v.resize(width, sign_extend),
        }
    }

    /// Equality after bringing both sides to a common sort
    pub fn eq(self, other: Dynamic<'c>) -> Bool<'c> {
        match (self, other) {
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a.iff(b),
            (Dynamic::BitVector(a), Dynamic::BitVector(b)) => a.eq(b),
            (Dynamic::Bool(a), Dynamic::BitVector(b)) => a.iff(b.to_bool()),
            (Dynamic::BitVector(a), Dynamic::Bool(b)) => a.to_bool().iff(b),
        }
    }

    pub fn ite(cond: Bool<'c>, then: Dynamic<'c>, other: Dynamic<'c>) -> Dynamic<'c> {
        match (then, other) {
            (Dynamic::Bool(t), Dynamic::Bool(e)) => Dynamic::Bool(cond.ite(t, e)),
            (t, e) => {
                let width = t.width().max(e.width());
                Dynamic::BitVector(cond.ite_bv(t.to_bv(width, true), e.to_bv(width, true)))
            }
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Dynamic::Bool(_) => 1,
            Dynamic::BitVector(v) => v.width(),
        }
    }
}

impl<'c> From<Bool<'c>> for Dynamic<'c> {
    fn from(b: Bool<'c>) -> Self {
        Dynamic::Bool(b)
    }
}

impl<'c> From<DynBitVector<'c>> for Dynamic<'c> {
    fn from(v: DynBitVector<'c>) -> Self {
        Dynamic::BitVector(v)
    }
}

impl<'c, const N: u32> From<BitVector<'c, N>> for Dynamic<'c> {
    fn from(v: BitVector<'c, N>) -> Self {
        Dynamic::BitVector(v.dynamic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axioms_travel_with_values() {
        let ctx = ExprContext::new();
        let x = DynBitVector::var(&ctx, "x", 32);
        let guard = ctx.var("g", Sort::Bool);
        let y = DynBitVector::var(&ctx, "y", 32).with_axiom(guard);
        let sum = x + y;
        assert_eq!(sum.axiom(), guard);
        let cmp = sum.sgt(x);
        assert_eq!(cmp.axiom(), guard);
        assert_eq!(cmp.as_axiom(), ctx.and2(cmp.expr(), guard));
    }

    #[test]
    fn test_mixed_widths_sign_extend() {
        let ctx = ExprContext::new();
        let small = DynBitVector::signed(&ctx, -1, 8);
        let wide = DynBitVector::constant(&ctx, 0, 32);
        let sum = small + wide;
        assert_eq!(sum.width(), 32);
        assert_eq!(sum.as_const(), Some(0xFFFF_FFFF));
    }

    #[test]
    fn test_fixed_width_adapts() {
        let ctx = ExprContext::new();
        let v = DynBitVector::constant(&ctx, 0x1_0000_0001, 40);
        let p: Pointer<'_> = BitVector::adapt(v);
        assert_eq!(p.dynamic().width(), 64);
        let narrow: BitVector<'_, 8> = BitVector::adapt(v);
        assert_eq!(narrow.dynamic().as_const(), Some(1));
    }

    #[test]
    fn test_bool_to_bv() {
        let ctx = ExprContext::new();
        let t = Bool::constant(&ctx, true);
        assert_eq!(t.to_bv(8).as_const(), Some(1));
        let f = Bool::constant(&ctx, false);
        assert_eq!(Dynamic::from(f).to_bv(8, false).as_const(), Some(0));
    }
}

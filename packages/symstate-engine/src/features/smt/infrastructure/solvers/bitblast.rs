//! Bit-blasting to CNF
//!
//! Translates array-free formulas into clauses of an owned `SatSolver`
//! with Tseitin gates. Bit-vectors are little-endian literal vectors. Gates
//! with constant inputs are simplified away instead of getting a variable.

use super::sat::{Lit, SatSolver};
use crate::features::smt::domain::expr::{
    BvBinaryOp, BvCmpOp, BvUnaryOp, ExprContext, ExprId, Op, Sort,
};
use rustc_hash::FxHashMap;

type Bits = Vec<Lit>;

pub struct BitBlaster<'a> {
    ctx: &'a ExprContext,
    sat: SatSolver,
    cache: FxHashMap<ExprId, Bits>,
    variables: Vec<(ExprId, Bits)>,
    t: Lit,
}

impl<'a> BitBlaster<'a> {
    pub fn new(ctx: &'a ExprContext) -> Self {
        let mut sat = SatSolver::new();
        let t = Lit::positive(sat.new_var());
        sat.add_clause(&[t]);
        Self {
            ctx,
            sat,
            cache: FxHashMap::default(),
            variables: Vec::new(),
            t,
        }
    }

    pub fn solver(&mut self) -> &mut SatSolver {
        &mut self.sat
    }

    /// Free variables met so far with their bits
    pub fn variables(&self) -> &[(ExprId, Vec<Lit>)] {
        &self.variables
    }

    /// Literal equivalent to a boolean formula
    pub fn literal(&mut self, e: ExprId) -> Result<Lit, String> {
        let bits = self.blast(e)?;
        match bits.as_slice() {
            [lit] => Ok(*lit),
            _ => Err(format!("expected a boolean, got {}", self.ctx.display(e))),
        }
    }

    pub fn assert(&mut self, e: ExprId) -> Result<(), String> {
        let lit = self.literal(e)?;
        self.sat.add_clause(&[lit]);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Gates
    // ═══════════════════════════════════════════════════════════════════════

    fn f(&self) -> Lit {
        !self.t
    }

    fn constant(&self, value: bool) -> Lit {
        if value {
            self.t
        } else {
            self.f()
        }
    }

    fn fresh(&mut self) -> Lit {
        Lit::positive(self.sat.new_var())
    }

    fn and(&mut self, a: Lit, b: Lit) -> Lit {
        if a == self.f() || b == self.f() || a == !b {
            return self.f();
        }
        if a == self.t || a == b {
            return b;
        }
        if b == self.t {
            return a;
        }
        let o = self.fresh();
        self.sat.add_clause(&[!o, a]);
        self.sat.add_clause(&[!o, b]);
        self.sat.add_clause(&[o, !a, !b]);
        o
    }

    fn or(&mut self, a: Lit, b: Lit) -> Lit {
        !self.and(!a, !b)
    }

    fn xor(&mut self, a: Lit, b: Lit) -> Lit {
        if a == self.f() {
            return b;
        }
        if b == self.f() {
            return a;
        }
        if a == self.t {
            return !b;
        }
        if b == self.t {
            return !a;
        }
        if a == b {
            return self.f();
        }
        if a == !b {
            return self.t;
        }
        let o = self.fresh();
        self.sat.add_clause(&[!o, a, b]);
        self.sat.add_clause(&[!o, !a, !b]);
        self.sat.add_clause(&[o, !a, b]);
        self.sat.add_clause(&[o, a, !b]);
        o
    }

    fn mux(&mut self, s: Lit, then: Lit, other: Lit) -> Lit {
        if s == self.t || then == other {
            return then;
        }
        if s == self.f() {
            return other;
        }
        let o = self.fresh();
        self.sat.add_clause(&[!s, !then, o]);
        self.sat.add_clause(&[!s, then, !o]);
        self.sat.add_clause(&[s, !other, o]);
        self.sat.add_clause(&[s, other, !o]);
        o
    }

    fn and_all(&mut self, lits: &[Lit]) -> Lit {
        let mut kept: Vec<Lit> = Vec::with_capacity(lits.len());
        for &l in lits {
            if l == self.f() || kept.contains(&!l) {
                return self.f();
            }
            if l != self.t && !kept.contains(&l) {
                kept.push(l);
            }
        }
        match kept.len() {
            0 => self.t,
            1 => kept[0],
            _ => {
                let o = self.fresh();
                let mut long = vec![o];
                for &l in &kept {
                    self.sat.add_clause(&[!o, l]);
                    long.push(!l);
                }
                self.sat.add_clause(&long);
                o
            }
        }
    }

    fn or_all(&mut self, lits: &[Lit]) -> Lit {
        let negated: Vec<Lit> = lits.iter().map(|l| !*l).collect();
        !self.and_all(&negated)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Word-level circuits
    // ═══════════════════════════════════════════════════════════════════════

    fn const_bits(&self, value: u128, width: u32) -> Bits {
        (0..width)
            .map(|i| self.constant((value >> i) & 1 == 1))
            .collect()
    }

    fn mux_bits(&mut self, s: Lit, then: &[Lit], other: &[Lit]) -> Bits {
        then.iter()
            .zip(other)
            .map(|(t, e)| self.mux(s, *t, *e))
            .collect()
    }

    fn add(&mut self, a: &[Lit], b: &[Lit], carry_in: Lit) -> Bits {
        let mut carry = carry_in;
        let mut out = Vec::with_capacity(a.len());
        for (x, y) in a.iter().zip(b) {
            let xy = self.xor(*x, *y);
            out.push(self.xor(xy, carry));
            let both = self.and(*x, *y);
            let propagated = self.and(xy, carry);
            carry = self.or(both, propagated);
        }
        out
    }

    fn negate(&mut self, a: &[Lit]) -> Bits {
        let inverted: Bits = a.iter().map(|l| !*l).collect();
        let zero = self.const_bits(0, a.len() as u32);
        self.add(&inverted, &zero, self.t)
    }

    fn sub(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let inverted: Bits = b.iter().map(|l| !*l).collect();
        self.add(a, &inverted, self.t)
    }

    fn ult(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let mut lt = self.f();
        for (x, y) in a.iter().zip(b) {
            let differ = self.xor(*x, *y);
            lt = self.mux(differ, *y, lt);
        }
        lt
    }

    fn slt(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let (mut a, mut b) = (a.to_vec(), b.to_vec());
        if let (Some(x), Some(y)) = (a.last_mut(), b.last_mut()) {
            *x = !*x;
            *y = !*y;
        }
        self.ult(&a, &b)
    }

    fn equal(&mut self, a: &[Lit], b: &[Lit]) -> Lit {
        let same: Bits = a
            .iter()
            .zip(b)
            .map(|(x, y)| !self.xor(*x, *y))
            .collect();
        self.and_all(&same)
    }

    fn mul(&mut self, a: &[Lit], b: &[Lit]) -> Bits {
        let width = a.len();
        let mut acc = self.const_bits(0, width as u32);
        for (i, bit) in b.iter().enumerate() {
            if *bit == self.f() {
                continue;
            }
            let partial: Bits = (0..width)
                .map(|j| if j >= i { self.and(a[j - i], *bit) } else { self.f() })
                .collect();
            acc = self.add(&acc, &partial, self.f());
        }
        acc
    }

    /// Restoring division; `b == 0` gives all-ones quotient and `a` remainder
    fn udivrem(&mut self, a: &[Lit], b: &[Lit]) -> (Bits, Bits) {
        let width = a.len();
        let f = self.f();
        let mut rem: Bits = vec![f; width + 1];
        let mut quot: Bits = vec![f; width];
        let mut divisor = b.to_vec();
        divisor.push(f);
        for i in (0..width).rev() {
            let mut shifted = Vec::with_capacity(width + 1);
            shifted.push(a[i]);
            shifted.extend_from_slice(&rem[..width]);
            let below = self.ult(&shifted, &divisor);
            let fits = !below;
            let diff = self.sub(&shifted, &divisor);
            rem = self.mux_bits(fits, &diff, &shifted);
            quot[i] = fits;
        }
        rem.truncate(width);
        (quot, rem)
    }

    fn abs(&mut self, a: &[Lit]) -> Bits {
        let sign = a[a.len() - 1];
        let negated = self.negate(a);
        self.mux_bits(sign, &negated, a)
    }

    fn shift(&mut self, a: &[Lit], b: &[Lit], op: BvBinaryOp) -> Bits {
        let width = a.len();
        let fill = match op {
            BvBinaryOp::AShr => a[width - 1],
            _ => self.f(),
        };
        let mut current = a.to_vec();
        let mut stage = 0usize;
        while stage < b.len() && (1usize << stage) < width {
            let amount = 1usize << stage;
            let shifted: Bits = (0..width)
                .map(|i| match op {
                    BvBinaryOp::Shl => {
                        if i >= amount {
                            current[i - amount]
                        } else {
                            self.f()
                        }
                    }
                    _ => {
                        if i + amount < width {
                            current[i + amount]
                        } else {
                            fill
                        }
                    }
                })
                .collect();
            current = self.mux_bits(b[stage], &shifted, &current);
            stage += 1;
        }
        let limit = self.const_bits(width as u128, b.len() as u32);
        let in_range = self.ult(b, &limit);
        let filled = vec![fill; width];
        self.mux_bits(in_range, &current, &filled)
    }

    fn binary(&mut self, op: BvBinaryOp, a: &[Lit], b: &[Lit]) -> Bits {
        match op {
            BvBinaryOp::Add => self.add(a, b, self.f()),
            BvBinaryOp::Sub => self.sub(a, b),
            BvBinaryOp::Mul => self.mul(a, b),
            BvBinaryOp::UDiv => self.udivrem(a, b).0,
            BvBinaryOp::URem => self.udivrem(a, b).1,
            BvBinaryOp::SDiv => {
                let (sa, sb) = (a[a.len() - 1], b[b.len() - 1]);
                let (abs_a, abs_b) = (self.abs(a), self.abs(b));
                let q = self.udivrem(&abs_a, &abs_b).0;
                let flip = self.xor(sa, sb);
                let negated = self.negate(&q);
                self.mux_bits(flip, &negated, &q)
            }
            BvBinaryOp::SRem => {
                let sa = a[a.len() - 1];
                let (abs_a, abs_b) = (self.abs(a), self.abs(b));
                let r = self.udivrem(&abs_a, &abs_b).1;
                let negated = self.negate(&r);
                self.mux_bits(sa, &negated, &r)
            }
            BvBinaryOp::Shl | BvBinaryOp::LShr | BvBinaryOp::AShr => self.shift(a, b, op),
            BvBinaryOp::And => a.iter().zip(b).map(|(x, y)| self.and(*x, *y)).collect(),
            BvBinaryOp::Or => a.iter().zip(b).map(|(x, y)| self.or(*x, *y)).collect(),
            BvBinaryOp::Xor => a.iter().zip(b).map(|(x, y)| self.xor(*x, *y)).collect(),
        }
    }

    fn compare(&mut self, op: BvCmpOp, a: &[Lit], b: &[Lit]) -> Lit {
        match op {
            BvCmpOp::Ult => self.ult(a, b),
            BvCmpOp::Ugt => self.ult(b, a),
            BvCmpOp::Ule => !self.ult(b, a),
            BvCmpOp::Uge => !self.ult(a, b),
            BvCmpOp::Slt => self.slt(a, b),
            BvCmpOp::Sgt => self.slt(b, a),
            BvCmpOp::Sle => !self.slt(b, a),
            BvCmpOp::Sge => !self.slt(a, b),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    pub fn blast(&mut self, e: ExprId) -> Result<Bits, String> {
        if let Some(bits) = self.cache.get(&e) {
            return Ok(bits.clone());
        }
        let ctx = self.ctx;
        let bits = match ctx.op(e) {
            Op::BoolConst(b) => vec![self.constant(b)],
            Op::BvConst { value, width } => self.const_bits(value, width),
            Op::Var { sort, .. } => {
                let width = match sort {
                    Sort::Bool => 1,
                    Sort::BitVec(w) => w,
                    Sort::Array { .. } => {
                        return Err(format!("array variable {} reached the bit-blaster", ctx.display(e)))
                    }
                };
                let bits: Bits = (0..width).map(|_| self.fresh()).collect();
                self.variables.push((e, bits.clone()));
                bits
            }
            Op::Not(a) => vec![!self.literal(a)?],
            Op::And(xs) => {
                let lits = xs
                    .into_iter()
                    .map(|x| self.literal(x))
                    .collect::<Result<Vec<_>, _>>()?;
                vec![self.and_all(&lits)]
            }
            Op::Or(xs) => {
                let lits = xs
                    .into_iter()
                    .map(|x| self.literal(x))
                    .collect::<Result<Vec<_>, _>>()?;
                vec![self.or_all(&lits)]
            }
            Op::Implies(a, b) => {
                let (a, b) = (self.literal(a)?, self.literal(b)?);
                vec![self.or(!a, b)]
            }
            Op::Ite(c, t, f) => {
                let c = self.literal(c)?;
                let (t, f) = (self.blast(t)?, self.blast(f)?);
                self.mux_bits(c, &t, &f)
            }
            Op::Eq(a, b) => {
                let (a, b) = (self.blast(a)?, self.blast(b)?);
                vec![self.equal(&a, &b)]
            }
            Op::BvUnary(op, a) => {
                let a = self.blast(a)?;
                match op {
                    BvUnaryOp::Neg => self.negate(&a),
                    BvUnaryOp::Not => a.iter().map(|l| !*l).collect(),
                }
            }
            Op::BvBinary(op, a, b) => {
                let (a, b) = (self.blast(a)?, self.blast(b)?);
                self.binary(op, &a, &b)
            }
            Op::BvCmp(op, a, b) => {
                let (a, b) = (self.blast(a)?, self.blast(b)?);
                vec![self.compare(op, &a, &b)]
            }
            Op::Extract { hi, lo, arg } => {
                let a = self.blast(arg)?;
                a[lo as usize..=hi as usize].to_vec()
            }
            Op::ZeroExt { by, arg } => {
                let mut a = self.blast(arg)?;
                let f = self.f();
                a.extend(std::iter::repeat(f).take(by as usize));
                a
            }
            Op::SignExt { by, arg } => {
                let mut a = self.blast(arg)?;
                let sign = a[a.len() - 1];
                a.extend(std::iter::repeat(sign).take(by as usize));
                a
            }
            Op::ConstArray { .. }
            | Op::Select { .. }
            | Op::Store { .. }
            | Op::RangeStore { .. } => {
                return Err(format!("array term {} reached the bit-blaster", ctx.display(e)))
            }
            Op::ForAll { .. } => return Err("quantified formulas are not supported".to_string()),
        };
        self.cache.insert(e, bits.clone());
        Ok(bits)
    }

    /// Value of `bits` in the last model
    pub fn value_of(&self, bits: &[Lit]) -> u128 {
        bits.iter().enumerate().fold(0u128, |acc, (i, lit)| {
            let v = self.sat.model_value(lit.var()) != lit.is_negated();
            acc | ((v as u128) << i)
        })
    }
}

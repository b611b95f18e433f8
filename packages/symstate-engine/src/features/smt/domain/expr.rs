//! Hash-consed expression DAG
//!
//! Every backend consumes the same DAG. Nodes are interned in an
//! `ExprContext`: building the same node twice returns the same `ExprId`,
//! and constant operands are folded on the way in.
//!
//! Bit-vector semantics follow SMT-LIB: division by zero yields all ones
//! (unsigned) or `±1` (signed), remainder by zero yields the dividend, and
//! shifts by at least the width yield zero or the sign fill.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;

/// Handle of an interned expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Widest bit-vector the DAG supports
pub const MAX_WIDTH: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    BitVec(u32),
    /// Bit-vector indexed array of bit-vectors
    Array { index: u32, element: u32 },
}

impl Sort {
    pub fn width(self) -> Option<u32> {
        match self {
            Sort::BitVec(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_bool(self) -> bool {
        self == Sort::Bool
    }

    pub fn is_array(self) -> bool {
        matches!(self, Sort::Array { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BvUnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BvBinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BvCmpOp {
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    BoolConst(bool),
    BvConst { value: u128, width: u32 },
    Var { name: String, sort: Sort },
    /// Array mapping every index to `value`
    ConstArray { index: u32, value: ExprId },
    Not(ExprId),
    And(Vec<ExprId>),
    Or(Vec<ExprId>),
    Implies(ExprId, ExprId),
    Ite(ExprId, ExprId, ExprId),
    Eq(ExprId, ExprId),
    BvUnary(BvUnaryOp, ExprId),
    BvBinary(BvBinaryOp, ExprId, ExprId),
    BvCmp(BvCmpOp, ExprId, ExprId),
    Extract { hi: u32, lo: u32, arg: ExprId },
    ZeroExt { by: u32, arg: ExprId },
    SignExt { by: u32, arg: ExprId },
    Select { array: ExprId, index: ExprId },
    Store { array: ExprId, index: ExprId, value: ExprId },
    /// `value` written to every index in `[from, from + size)`
    RangeStore {
        array: ExprId,
        from: ExprId,
        size: u64,
        value: ExprId,
    },
    ForAll { bound: Vec<ExprId>, body: ExprId },
}

impl Op {
    /// Direct children in a fixed order
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Op::BoolConst(_) | Op::BvConst { .. } | Op::Var { .. } => Vec::new(),
            Op::ConstArray { value, .. } => vec![*value],
            Op::Not(a) | Op::BvUnary(_, a) => vec![*a],
            Op::Extract { arg, .. } | Op::ZeroExt { arg, .. } | Op::SignExt { arg, .. } => {
                vec![*arg]
            }
            Op::And(xs) | Op::Or(xs) => xs.clone(),
            Op::Implies(a, b) | Op::Eq(a, b) | Op::BvBinary(_, a, b) | Op::BvCmp(_, a, b) => {
                vec![*a, *b]
            }
            Op::Ite(c, t, e) => vec![*c, *t, *e],
            Op::Select { array, index } => vec![*array, *index],
            Op::Store {
                array,
                index,
                value,
            } => vec![*array, *index, *value],
            Op::RangeStore {
                array, from, value, ..
            } => vec![*array, *from, *value],
            Op::ForAll { bound, body } => {
                let mut out = bound.clone();
                out.push(*body);
                out
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    op: Op,
    sort: Sort,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<Node>,
    index: FxHashMap<Op, ExprId>,
    fresh: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// Concrete bit-vector semantics (shared by folding and model evaluation)
// ═══════════════════════════════════════════════════════════════════════════

pub fn mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

pub fn sign_bit(value: u128, width: u32) -> bool {
    width > 0 && (value >> (width - 1)) & 1 == 1
}

/// Two's-complement reading of `value`
pub fn to_signed(value: u128, width: u32) -> i128 {
    let value = value & mask(width);
    if width >= 128 {
        value as i128
    } else if sign_bit(value, width) {
        (value as i128) - (1i128 << width)
    } else {
        value as i128
    }
}

pub fn from_signed(value: i128, width: u32) -> u128 {
    (value as u128) & mask(width)
}

fn negate(value: u128, width: u32) -> u128 {
    (!value).wrapping_add(1) & mask(width)
}

fn udiv(a: u128, b: u128, width: u32) -> u128 {
    if b == 0 {
        mask(width)
    } else {
        a / b
    }
}

fn urem(a: u128, b: u128) -> u128 {
    if b == 0 {
        a
    } else {
        a % b
    }
}

pub fn eval_unary(op: BvUnaryOp, a: u128, width: u32) -> u128 {
    match op {
        BvUnaryOp::Neg => negate(a, width),
        BvUnaryOp::Not => !a & mask(width),
    }
}

pub fn eval_binary(op: BvBinaryOp, a: u128, b: u128, width: u32) -> u128 {
    let m = mask(width);
    let (a, b) = (a & m, b & m);
    let (sa, sb) = (sign_bit(a, width), sign_bit(b, width));
    let abs = |v: u128, neg: bool| if neg { negate(v, width) } else { v };
    match op {
        BvBinaryOp::Add => a.wrapping_add(b) & m,
        BvBinaryOp::Sub => a.wrapping_sub(b) & m,
        BvBinaryOp::Mul => a.wrapping_mul(b) & m,
        BvBinaryOp::UDiv => udiv(a, b, width),
        BvBinaryOp::URem => urem(a, b),
        BvBinaryOp::SDiv => {
            let q = udiv(abs(a, sa), abs(b, sb), width);
            abs(q, sa != sb)
        }
        BvBinaryOp::SRem => {
            let r = urem(abs(a, sa), abs(b, sb));
            abs(r, sa)
        }
        BvBinaryOp::Shl => {
            if b >= width as u128 {
                0
            } else {
                (a << b) & m
            }
        }
        BvBinaryOp::LShr => {
            if b >= width as u128 {
                0
            } else {
                a >> b
            }
        }
        BvBinaryOp::AShr => {
            if b >= width as u128 {
                if sa {
                    m
                } else {
                    0
                }
            } else {
                from_signed(to_signed(a, width) >> b, width)
            }
        }
        BvBinaryOp::And => a & b,
        BvBinaryOp::Or => a | b,
        BvBinaryOp::Xor => a ^ b,
    }
}

pub fn eval_cmp(op: BvCmpOp, a: u128, b: u128, width: u32) -> bool {
    let (ua, ub) = (a & mask(width), b & mask(width));
    let (sa, sb) = (to_signed(a, width), to_signed(b, width));
    match op {
        BvCmpOp::Ult => ua < ub,
        BvCmpOp::Ule => ua <= ub,
        BvCmpOp::Ugt => ua > ub,
        BvCmpOp::Uge => ua >= ub,
        BvCmpOp::Slt => sa < sb,
        BvCmpOp::Sle => sa <= sb,
        BvCmpOp::Sgt => sa > sb,
        BvCmpOp::Sge => sa >= sb,
    }
}

pub fn eval_extract(value: u128, hi: u32, lo: u32) -> u128 {
    (value >> lo) & mask(hi - lo + 1)
}

pub fn eval_sign_ext(value: u128, width: u32, by: u32) -> u128 {
    from_signed(to_signed(value, width), width + by)
}

// ═══════════════════════════════════════════════════════════════════════════
// ExprContext
// ═══════════════════════════════════════════════════════════════════════════

/// Interning arena for expressions
///
/// Shared by reference between the encoder, the solver and the backends.
/// All methods take `&self`; the arena sits behind a mutex.
#[derive(Debug, Default)]
pub struct ExprContext {
    arena: Mutex<Arena>,
}

impl ExprContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn op(&self, id: ExprId) -> Op {
        self.arena.lock().nodes[id.index()].op.clone()
    }

    pub fn sort(&self, id: ExprId) -> Sort {
        self.arena.lock().nodes[id.index()].sort
    }

    /// Width of a bit-vector expression, 1 for booleans
    pub fn width(&self, id: ExprId) -> u32 {
        match self.sort(id) {
            Sort::BitVec(w) => w,
            _ => 1,
        }
    }

    /// Constant value of a literal node
    pub fn as_const(&self, id: ExprId) -> Option<u128> {
        match self.op(id) {
            Op::BvConst { value, .. } => Some(value),
            Op::BoolConst(b) => Some(b as u128),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: ExprId) -> Option<bool> {
        match self.op(id) {
            Op::BoolConst(b) => Some(b),
            _ => None,
        }
    }

    /// Intern `op`, folding constants first
    pub fn mk(&self, op: Op) -> ExprId {
        let mut arena = self.arena.lock();
        arena.mk(op)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Leaves
    // ═══════════════════════════════════════════════════════════════════════

    pub fn bool_const(&self, value: bool) -> ExprId {
        self.mk(Op::BoolConst(value))
    }

    pub fn bv_const(&self, value: u128, width: u32) -> ExprId {
        self.mk(Op::BvConst {
            value: value & mask(width),
            width,
        })
    }

    pub fn var(&self, name: impl Into<String>, sort: Sort) -> ExprId {
        self.mk(Op::Var {
            name: name.into(),
            sort,
        })
    }

    /// Variable whose name is unique in this context
    pub fn fresh_var(&self, prefix: &str, sort: Sort) -> ExprId {
        let mut arena = self.arena.lock();
        arena.fresh += 1;
        let name = format!("{}!{}", prefix, arena.fresh);
        arena.mk(Op::Var { name, sort })
    }

    pub fn const_array(&self, index: u32, value: ExprId) -> ExprId {
        self.mk(Op::ConstArray { index, value })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Boolean structure
    // ═══════════════════════════════════════════════════════════════════════

    pub fn not(&self, a: ExprId) -> ExprId {
        self.mk(Op::Not(a))
    }

    pub fn and(&self, xs: Vec<ExprId>) -> ExprId {
        self.mk(Op::And(xs))
    }

    pub fn or(&self, xs: Vec<ExprId>) -> ExprId {
        self.mk(Op::Or(xs))
    }

    pub fn and2(&self, a: ExprId, b: ExprId) -> ExprId {
        self.and(vec![a, b])
    }

    pub fn or2(&self, a: ExprId, b: ExprId) -> ExprId {
        self.or(vec![a, b])
    }

    pub fn implies(&self, a: ExprId, b: ExprId) -> ExprId {
        self.mk(Op::Implies(a, b))
    }

    pub fn ite(&self, c: ExprId, t: ExprId, e: ExprId) -> ExprId {
        self.mk(Op::Ite(c, t, e))
    }

    pub fn eq(&self, a: ExprId, b: ExprId) -> ExprId {
        self.mk(Op::Eq(a, b))
    }

    pub fn forall(&self, bound: Vec<ExprId>, body: ExprId) -> ExprId {
        self.mk(Op::ForAll { bound, body })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Bit-vectors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn bv_unary(&self, op: BvUnaryOp, a: ExprId) -> ExprId {
        self.mk(Op::BvUnary(op, a))
    }

    pub fn bv_binary(&self, op: BvBinaryOp, a: ExprId, b: ExprId) -> ExprId {
        self.mk(Op::BvBinary(op, a, b))
    }

    pub fn bv_cmp(&self, op: BvCmpOp, a: ExprId, b: ExprId) -> ExprId {
        self.mk(Op::BvCmp(op, a, b))
    }

    pub fn extract(&self, hi: u32, lo: u32, arg: ExprId) -> ExprId {
        self.mk(Op::Extract { hi, lo, arg })
    }

    pub fn zero_ext(&self, by: u32, arg: ExprId) -> ExprId {
        self.mk(Op::ZeroExt { by, arg })
    }

    pub fn sign_ext(&self, by: u32, arg: ExprId) -> ExprId {
        self.mk(Op::SignExt { by, arg })
    }

    /// Resize to `width`, extending with the sign or zeros, or truncating
    pub fn resize(&self, arg: ExprId, width: u32, sign_extend: bool) -> ExprId {
        let current = self.width(arg);
        if current == width {
            arg
        } else if current > width {
            self.extract(width - 1, 0, arg)
        } else if sign_extend {
            self.sign_ext(width - current, arg)
        } else {
            self.zero_ext(width - current, arg)
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Arrays
    // ═══════════════════════════════════════════════════════════════════════

    pub fn select(&self, array: ExprId, index: ExprId) -> ExprId {
        self.mk(Op::Select { array, index })
    }

    pub fn store(&self, array: ExprId, index: ExprId, value: ExprId) -> ExprId {
        self.mk(Op::Store {
            array,
            index,
            value,
        })
    }

    pub fn range_store(&self, array: ExprId, from: ExprId, size: u64, value: ExprId) -> ExprId {
        self.mk(Op::RangeStore {
            array,
            from,
            size,
            value,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Traversal
    // ═══════════════════════════════════════════════════════════════════════

    /// Free variables of `roots`, in first-visit order
    pub fn vars_of(&self, roots: &[ExprId]) -> Vec<ExprId> {
        let arena = self.arena.lock();
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        let mut stack: Vec<ExprId> = roots.iter().rev().copied().collect();
        while let Some(e) = stack.pop() {
            if !seen.insert(e) {
                continue;
            }
            let node = &arena.nodes[e.index()];
            match &node.op {
                Op::Var { .. } => out.push(e),
                Op::ForAll { bound, body } => {
                    // bound variables are not free
                    for b in bound {
                        seen.insert(*b);
                    }
                    stack.push(*body);
                }
                op => stack.extend(op.children().into_iter().rev()),
            }
        }
        out
    }

    /// Name of a variable node
    pub fn var_name(&self, id: ExprId) -> Option<String> {
        match self.op(id) {
            Op::Var { name, .. } => Some(name),
            _ => None,
        }
    }

    /// SMT-LIB flavoured rendering
    pub fn display(&self, id: ExprId) -> String {
        let mut out = String::new();
        self.render(id, &mut out);
        out
    }

    fn render(&self, id: ExprId, out: &mut String) {
        use std::fmt::Write as _;
        let op = self.op(id);
        let app = |name: &str, args: &[ExprId], out: &mut String| {
            let _ = write!(out, "({}", name);
            for a in args {
                out.push(' ');
                self.render(*a, out);
            }
            out.push(')');
        };
        match op {
            Op::BoolConst(b) => {
                let _ = write!(out, "{}", b);
            }
            Op::BvConst { value, width } => {
                let _ = write!(out, "(_ bv{} {})", value, width);
            }
            Op::Var { name, .. } => out.push_str(&name),
            Op::ConstArray { value, .. } => app("const", &[value], out),
            Op::Not(a) => app("not", &[a], out),
            Op::And(xs) => app("and", &xs, out),
            Op::Or(xs) => app("or", &xs, out),
            Op::Implies(a, b) => app("=>", &[a, b], out),
            Op::Ite(c, t, e) => app("ite", &[c, t, e], out),
            Op::Eq(a, b) => app("=", &[a, b], out),
            Op::BvUnary(op, a) => app(
                match op {
                    BvUnaryOp::Neg => "bvneg",
                    BvUnaryOp::Not => "bvnot",
                },
                &[a],
                out,
            ),
            Op::BvBinary(op, a, b) => app(binary_name(op), &[a, b], out),
            Op::BvCmp(op, a, b) => app(cmp_name(op), &[a, b], out),
            Op::Extract { hi, lo, arg } => app(&format!("(_ extract {} {})", hi, lo), &[arg], out),
            Op::ZeroExt { by, arg } => app(&format!("(_ zero_extend {})", by), &[arg], out),
            Op::SignExt { by, arg } => app(&format!("(_ sign_extend {})", by), &[arg], out),
            Op::Select { array, index } => app("select", &[array, index], out),
            Op::Store {
                array,
                index,
                value,
            } => app("store", &[array, index, value], out),
            Op::RangeStore {
                array,
                from,
                size,
                value,
            } => app(&format!("store-range {}", size), &[array, from, value], out),
            Op::ForAll { bound, body } => {
                let mut args = bound;
                args.push(body);
                app("forall", &args, out)
            }
        }
    }
}

fn binary_name(op: BvBinaryOp) -> &'static str {
    match op {
        BvBinaryOp::Add => "bvadd",
        BvBinaryOp::Sub => "bvsub",
        BvBinaryOp::Mul => "bvmul",
        BvBinaryOp::UDiv => "bvudiv",
        BvBinaryOp::SDiv => "bvsdiv",
        BvBinaryOp::URem => "bvurem",
        BvBinaryOp::SRem => "bvsrem",
        BvBinaryOp::Shl => "bvshl",
        BvBinaryOp::LShr => "bvlshr",
        BvBinaryOp::AShr => "bvashr",
        BvBinaryOp::And => "bvand",
        BvBinaryOp::Or => "bvor",
        BvBinaryOp::Xor => "bvxor",
    }
}

fn cmp_name(op: BvCmpOp) -> &'static str {
    match op {
        BvCmpOp::Ult => "bvult",
        BvCmpOp::Ule => "bvule",
        BvCmpOp::Ugt => "bvugt",
        BvCmpOp::Uge => "bvuge",
        BvCmpOp::Slt => "bvslt",
        BvCmpOp::Sle => "bvsle",
        BvCmpOp::Sgt => "bvsgt",
        BvCmpOp::Sge => "bvsge",
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Interning with folding
// ═══════════════════════════════════════════════════════════════════════════

impl Arena {
    fn node(&self, id: ExprId) -> &Node {
        &self.nodes[id.index()]
    }

    fn sort(&self, id: ExprId) -> Sort {
        self.node(id).sort
    }

    fn width(&self, id: ExprId) -> u32 {
        self.sort(id).width().unwrap_or(1)
    }

    fn bv(&self, id: ExprId) -> Option<u128> {
        match self.node(id).op {
            Op::BvConst { value, .. } => Some(value),
            _ => None,
        }
    }

    fn boolean(&self, id: ExprId) -> Option<bool> {
        match self.node(id).op {
            Op::BoolConst(b) => Some(b),
            _ => None,
        }
    }

    fn intern(&mut self, op: Op) -> ExprId {
        if let Some(id) = self.index.get(&op) {
            return *id;
        }
        let sort = self.sort_of(&op);
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(Node {
            op: op.clone(),
            sort,
        });
        self.index.insert(op, id);
        id
    }

    fn sort_of(&self, op: &Op) -> Sort {
        match op {
            Op::BoolConst(_)
            | Op::Not(_)
            | Op::And(_)
            | Op::Or(_)
            | Op::Implies(..)
            | Op::Eq(..)
            | Op::BvCmp(..)
            | Op::ForAll { .. } => Sort::Bool,
            Op::BvConst { width, .. } => Sort::BitVec(*width),
            Op::Var { sort, .. } => *sort,
            Op::ConstArray { index, value } => Sort::Array {
                index: *index,
                element: self.width(*value),
            },
            Op::Ite(_, t, _) => self.sort(*t),
            Op::BvUnary(_, a) | Op::BvBinary(_, a, _) => self.sort(*a),
            Op::Extract { hi, lo, .. } => Sort::BitVec(hi - lo + 1),
            Op::ZeroExt { by, arg } | Op::SignExt { by, arg } => {
                Sort::BitVec(self.width(*arg) + by)
            }
            Op::Select { array, .. } => match self.sort(*array) {
                Sort::Array { element, .. } => Sort::BitVec(element),
                other => other,
            },
            Op::Store { array, .. } | Op::RangeStore { array, .. } => self.sort(*array),
        }
    }

    fn mk(&mut self, op: Op) -> ExprId {
        match op {
            Op::Not(a) => {
                if let Some(b) = self.boolean(a) {
                    return self.intern(Op::BoolConst(!b));
                }
                if let Op::Not(inner) = self.node(a).op {
                    return inner;
                }
                self.intern(Op::Not(a))
            }
            Op::And(xs) => self.mk_junction(xs, true),
            Op::Or(xs) => self.mk_junction(xs, false),
            Op::Implies(a, b) => match (self.boolean(a), self.boolean(b)) {
                (Some(false), _) | (_, Some(true)) => self.intern(Op::BoolConst(true)),
                (Some(true), _) => b,
                (_, Some(false)) => self.mk(Op::Not(a)),
                _ if a == b => self.intern(Op::BoolConst(true)),
                _ => self.intern(Op::Implies(a, b)),
            },
            Op::Ite(c, t, e) => match self.boolean(c) {
                Some(true) => t,
                Some(false) => e,
                None if t == e => t,
                None => {
                    if self.sort(t).is_bool() {
                        match (self.boolean(t), self.boolean(e)) {
                            (Some(true), Some(false)) => return c,
                            (Some(false), Some(true)) => return self.mk(Op::Not(c)),
                            _ => {}
                        }
                    }
                    self.intern(Op::Ite(c, t, e))
                }
            },
            Op::Eq(a, b) => {
                if a == b {
                    return self.intern(Op::BoolConst(true));
                }
                let folded = match (&self.node(a).op, &self.node(b).op) {
                    (Op::BvConst { value: x, .. }, Op::BvConst { value: y, .. }) => Some(x == y),
                    (Op::BoolConst(x), Op::BoolConst(y)) => Some(x == y),
                    _ => None,
                };
                if let Some(v) = folded {
                    return self.intern(Op::BoolConst(v));
                }
                if self.sort(a).is_bool() {
                    if let Some(v) = self.boolean(b) {
                        return if v { a } else { self.mk(Op::Not(a)) };
                    }
                    if let Some(v) = self.boolean(a) {
                        return if v { b } else { self.mk(Op::Not(b)) };
                    }
                }
                let (a, b) = if a <= b { (a, b) } else { (b, a) };
                self.intern(Op::Eq(a, b))
            }
            Op::BvUnary(op, a) => match self.bv(a) {
                Some(v) => {
                    let w = self.width(a);
                    self.intern(Op::BvConst {
                        value: eval_unary(op, v, w),
                        width: w,
                    })
                }
                None => self.intern(Op::BvUnary(op, a)),
            },
            Op::BvBinary(op, a, b) => {
                let w = self.width(a);
                match (self.bv(a), self.bv(b)) {
                    (Some(x), Some(y)) => self.intern(Op::BvConst {
                        value: eval_binary(op, x, y, w),
                        width: w,
                    }),
                    (_, Some(0))
                        if matches!(
                            op,
                            BvBinaryOp::Add
                                | BvBinaryOp::Sub
                                | BvBinaryOp::Or
                                | BvBinaryOp::Xor
                                | BvBinaryOp::Shl
                                | BvBinaryOp::LShr
                                | BvBinaryOp::AShr
                        ) =>
                    {
                        a
                    }
                    (Some(0), _) if matches!(op, BvBinaryOp::Add | BvBinaryOp::Or) => b,
                    _ => self.intern(Op::BvBinary(op, a, b)),
                }
            }
            Op::BvCmp(op, a, b) => match (self.bv(a), self.bv(b)) {
                (Some(x), Some(y)) => {
                    let w = self.width(a);
                    self.intern(Op::BoolConst(eval_cmp(op, x, y, w)))
                }
                _ => self.intern(Op::BvCmp(op, a, b)),
            },
            Op::Extract { hi, lo, arg } => {
                if lo == 0 && hi + 1 == self.width(arg) {
                    return arg;
                }
                match self.bv(arg) {
                    Some(v) => self.intern(Op::BvConst {
                        value: eval_extract(v, hi, lo),
                        width: hi - lo + 1,
                    }),
                    None => self.intern(Op::Extract { hi, lo, arg }),
                }
            }
            Op::ZeroExt { by, arg } => {
                if by == 0 {
                    return arg;
                }
                match self.bv(arg) {
                    Some(v) => {
                        let w = self.width(arg) + by;
                        self.intern(Op::BvConst { value: v, width: w })
                    }
                    None => self.intern(Op::ZeroExt { by, arg }),
                }
            }
            Op::SignExt { by, arg } => {
                if by == 0 {
                    return arg;
                }
                match self.bv(arg) {
                    Some(v) => {
                        let w = self.width(arg);
                        self.intern(Op::BvConst {
                            value: eval_sign_ext(v, w, by),
                            width: w + by,
                        })
                    }
                    None => self.intern(Op::SignExt { by, arg }),
                }
            }
            Op::Select { array, index } => self.mk_select(array, index),
            other => self.intern(other),
        }
    }

    fn mk_junction(&mut self, xs: Vec<ExprId>, conjunction: bool) -> ExprId {
        let mut flat: Vec<ExprId> = Vec::with_capacity(xs.len());
        let mut stack: Vec<ExprId> = xs.into_iter().rev().collect();
        while let Some(x) = stack.pop() {
            match (self.node(x).op.clone(), conjunction) {
                (Op::And(inner), true) | (Op::Or(inner), false) => {
                    stack.extend(inner.iter().rev().copied());
                }
                (Op::BoolConst(b), _) if b == conjunction => {}
                (Op::BoolConst(_), _) => return self.intern(Op::BoolConst(!conjunction)),
                _ => {
                    if !flat.contains(&x) {
                        flat.push(x);
                    }
                }
            }
        }
        match flat.len() {
            0 => self.intern(Op::BoolConst(conjunction)),
            1 => flat[0],
            _ if conjunction => self.intern(Op::And(flat)),
            _ => self.intern(Op::Or(flat)),
        }
    }

    /// Read-over-write on literal indices
    fn mk_select(&mut self, array: ExprId, index: ExprId) -> ExprId {
        let mut current = array;
        loop {
            match self.node(current).op.clone() {
                Op::ConstArray { value, .. } => return value,
                Op::Store {
                    array: inner,
                    index: written,
                    value,
                } => {
                    if written == index {
                        return value;
                    }
                    match (self.bv(written), self.bv(index)) {
                        (Some(x), Some(y)) if x != y => current = inner,
                        _ => break,
                    }
                }
                _ => break,
            }
        }
        self.intern(Op::Select {
            array: current,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_are_hash_consed() {
        let ctx = ExprContext::new();
        let x = ctx.var("x", Sort::BitVec(32));
        let one = ctx.bv_const(1, 32);
        let a = ctx.bv_binary(BvBinaryOp::Add, x, one);
        let b = ctx.bv_binary(BvBinaryOp::Add, x, one);
        assert_eq!(a, b);
        assert_eq!(ctx.sort(a), Sort::BitVec(32));
    }

    #[test]
    fn test_constant_folding() {
        let ctx = ExprContext::new();
        let a = ctx.bv_const(7, 8);
        let b = ctx.bv_const(250, 8);
        let sum = ctx.bv_binary(BvBinaryOp::Add, a, b);
        assert_eq!(ctx.as_const(sum), Some(1));
        let lt = ctx.bv_cmp(BvCmpOp::Slt, b, a);
        assert_eq!(ctx.as_bool(lt), Some(true));
        let ult = ctx.bv_cmp(BvCmpOp::Ult, b, a);
        assert_eq!(ctx.as_bool(ult), Some(false));

        let t = ctx.bool_const(true);
        let p = ctx.var("p", Sort::Bool);
        assert_eq!(ctx.and2(t, p), p);
        let f = ctx.not(t);
        assert_eq!(ctx.or2(f, p), p);
        assert_eq!(ctx.not(ctx.not(p)), p);
    }

    #[test]
    fn test_division_by_zero_follows_smtlib() {
        assert_eq!(eval_binary(BvBinaryOp::UDiv, 5, 0, 8), 0xFF);
        assert_eq!(eval_binary(BvBinaryOp::URem, 5, 0, 8), 5);
        // -4 / 0 == 1, 4 / 0 == -1
        assert_eq!(eval_binary(BvBinaryOp::SDiv, 0xFC, 0, 8), 1);
        assert_eq!(eval_binary(BvBinaryOp::SDiv, 4, 0, 8), 0xFF);
        // -7 / 2 == -3, -7 % 2 == -1
        assert_eq!(eval_binary(BvBinaryOp::SDiv, 0xF9, 2, 8), 0xFD);
        assert_eq!(eval_binary(BvBinaryOp::SRem, 0xF9, 2, 8), 0xFF);
        assert_eq!(eval_binary(BvBinaryOp::AShr, 0x80, 9, 8), 0xFF);
        assert_eq!(eval_binary(BvBinaryOp::Shl, 1, 8, 8), 0);
    }

    #[test]
    fn test_select_reads_over_literal_writes() {
        let ctx = ExprContext::new();
        let ff = ctx.bv_const(0xFF, 64);
        let mem = ctx.const_array(64, ff);
        let p = ctx.bv_const(10, 64);
        let q = ctx.bv_const(11, 64);
        let v = ctx.bv_const(42, 64);
        let written = ctx.store(mem, p, v);
        assert_eq!(ctx.select(written, p), v);
        assert_eq!(ctx.select(written, q), ff);
    }

    #[test]
    fn test_vars_skip_quantified() {
        let ctx = ExprContext::new();
        let i = ctx.var("i", Sort::BitVec(64));
        let x = ctx.var("x", Sort::BitVec(64));
        let body = ctx.eq(i, x);
        let q = ctx.forall(vec![i], body);
        assert_eq!(ctx.vars_of(&[q]), vec![x]);
    }
}

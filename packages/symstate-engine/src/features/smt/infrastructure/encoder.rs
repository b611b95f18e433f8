//! Term / Predicate / PredicateState encoder
//!
//! Walks the algebra and produces typed SMT values against an
//! `ExecutionContext`. Reads go through the context's current arrays and
//! writes replace them, so encoding a state in order reproduces the memory
//! effects of its predicates.
//!
//! Every free variable the encoder creates is recorded with the term it
//! stands for, which is what lets models and interpolants be turned back
//! into terms.

use super::execution_context::ExecutionContext;
use super::expr_factory::ExprFactory;
use crate::config::SmtConfig;
use crate::features::predicate_state::{PredicateState, StateNode};
use crate::features::smt::domain::expr::{ExprId, MAX_WIDTH};
use crate::features::smt::domain::logic::{Bool, DynBitVector, Dynamic};
use crate::features::term_algebra::infrastructure::type_factory::POINTER_BITS;
use crate::features::term_algebra::{
    ArithType, ConditionType, FactoryNest, PredicateId, PredicateKind, TermId, TermKind, Type,
    TypeId, UnaryArithType,
};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::trace;

/// A term or predicate the encoder has no meaning for
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot encode {what}: {reason}")]
pub struct EncodeError {
    pub what: String,
    pub reason: String,
}

impl EncodeError {
    fn new(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

pub struct Encoder<'n, 'c> {
    nest: &'n FactoryNest,
    ef: ExprFactory<'c>,
    config: &'n SmtConfig,
    symbols: FxHashMap<ExprId, TermId>,
    encoded: Vec<(PredicateId, ExprId)>,
}

impl<'n, 'c> Encoder<'n, 'c> {
    pub fn new(nest: &'n FactoryNest, ef: ExprFactory<'c>, config: &'n SmtConfig) -> Self {
        Self {
            nest,
            ef,
            config,
            symbols: FxHashMap::default(),
            encoded: Vec::new(),
        }
    }

    /// Continue with the symbols of an earlier encoding
    pub fn with_symbols(mut self, symbols: FxHashMap<ExprId, TermId>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn nest(&self) -> &'n FactoryNest {
        self.nest
    }

    /// Free variables created so far and the terms they encode
    pub fn symbols(&self) -> &FxHashMap<ExprId, TermId> {
        &self.symbols
    }

    /// Every predicate encoded by `state`, in encoding order
    pub fn encoded(&self) -> &[(PredicateId, ExprId)] {
        &self.encoded
    }

    pub fn into_parts(self) -> (FxHashMap<ExprId, TermId>, Vec<(PredicateId, ExprId)>) {
        (self.symbols, self.encoded)
    }

    fn bitsize(&self, ty: TypeId) -> u32 {
        ExprFactory::size_for_type(self.nest.type_factory(), ty)
    }

    fn fail<T>(&self, term: TermId, reason: impl Into<String>) -> EncodeResult<T> {
        Err(EncodeError::new(self.nest.term(term).name.clone(), reason))
    }

    fn free_var(&mut self, term: TermId) -> Dynamic<'c> {
        let t = self.nest.term(term);
        let var = self.ef.var_for_type(self.nest.type_factory(), t.ty, &t.name);
        self.symbols.insert(var.expr(), term);
        var
    }

    fn literal_int(&self, term: TermId) -> Option<i64> {
        match self.nest.term(term).kind {
            TermKind::OpaqueInt(v) => Some(v),
            _ => None,
        }
    }

    /// Pointer-sized encoding of `term`
    fn pointer(&mut self, term: TermId, ec: &mut ExecutionContext<'c>) -> EncodeResult<DynBitVector<'c>> {
        match self.term(term, ec)? {
            Dynamic::BitVector(v) => Ok(v.resize(POINTER_BITS, false)),
            Dynamic::Bool(_) => self.fail(term, "boolean used as a pointer"),
        }
    }

    fn integer(&mut self, term: TermId, ec: &mut ExecutionContext<'c>) -> EncodeResult<DynBitVector<'c>> {
        match self.term(term, ec)? {
            Dynamic::BitVector(v) => Ok(v),
            Dynamic::Bool(b) => Ok(b.to_bv(1)),
        }
    }

    fn memspace(&self, term: TermId) -> u32 {
        self.nest.term_type(term).memspace()
    }

    /// Compile-time name of a property term
    fn property_name(&self, term: TermId) -> Option<String> {
        match &self.nest.term(term).kind {
            TermKind::OpaqueString(s) => Some(s.clone()),
            TermKind::Const { name } | TermKind::Value { name, .. } => Some(name.clone()),
            TermKind::Gep { base, .. } => self.property_name(*base),
            _ => None,
        }
    }

    /// Bring a loaded cell back to the sort of `ty`
    fn typed(&self, ty: TypeId, cell: DynBitVector<'c>) -> Dynamic<'c> {
        match self.nest.ty(ty) {
            Type::Bool => Dynamic::Bool(cell.extract(0, 0).to_bool()),
            _ => Dynamic::BitVector(cell),
        }
    }

    fn cell_width(&self, ty: TypeId) -> u32 {
        match self.nest.ty(ty) {
            Type::Bool => 1,
            _ => self.bitsize(ty),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Terms
    // ═══════════════════════════════════════════════════════════════════════

    pub fn term(&mut self, term: TermId, ec: &mut ExecutionContext<'c>) -> EncodeResult<Dynamic<'c>> {
        let ctx = self.ef.ctx();
        let t = self.nest.term(term);
        let width = self.bitsize(t.ty);
        if width > MAX_WIDTH {
            return self.fail(
                term,
                format!("{}-bit value exceeds the {}-bit encoding limit", width, MAX_WIDTH),
            );
        }
        let res = match &t.kind {
            TermKind::Value { .. }
            | TermKind::Argument { .. }
            | TermKind::ReturnValue { .. }
            | TermKind::ReturnPtr { .. }
            | TermKind::Const { .. }
            | TermKind::ArgumentCount
            | TermKind::VarArgument { .. }
            | TermKind::OpaqueFloat(_)
            | TermKind::OpaqueString(_)
            | TermKind::OpaqueUndef
            | TermKind::OpaqueVar(_)
            | TermKind::OpaqueBuiltin(_)
            | TermKind::OpaqueNamedConstant(_)
            | TermKind::OpaqueIndexing { .. }
            | TermKind::OpaqueMemberAccess { .. }
            | TermKind::OpaqueCall { .. } => self.free_var(term),

            TermKind::OpaqueBool(b) => Dynamic::Bool(self.ef.bool_const(*b)),
            TermKind::OpaqueInt(v) => Dynamic::BitVector(self.ef.int_const(*v, width)),
            TermKind::OpaqueNullPtr => Dynamic::BitVector(self.ef.null_ptr()),
            TermKind::OpaqueInvalidPtr => Dynamic::BitVector(self.ef.invalid_ptr()),

            TermKind::Binary { op, lhv, rhv } => {
                let (op, lhv, rhv) = (*op, *lhv, *rhv);
                let l = self.term(lhv, ec)?;
                let r = self.term(rhv, ec)?;
                self.binary(term, op, l, r)?
            }
            TermKind::Unary { op, rhv } => {
                let op = *op;
                match (op, self.term(*rhv, ec)?) {
                    (UnaryArithType::Not | UnaryArithType::BNot, Dynamic::Bool(b)) => Dynamic::Bool(!b),
                    (UnaryArithType::Neg, Dynamic::Bool(b)) => Dynamic::BitVector(-b.to_bv(width)),
                    (UnaryArithType::Neg, Dynamic::BitVector(v)) => Dynamic::BitVector(-v),
                    (UnaryArithType::Not, Dynamic::BitVector(v)) => Dynamic::Bool(!v.to_bool()),
                    (UnaryArithType::BNot, Dynamic::BitVector(v)) => Dynamic::BitVector(!v),
                }
            }
            TermKind::Cmp { op, lhv, rhv } => {
                let (op, lhv, rhv) = (*op, *lhv, *rhv);
                let l = self.term(lhv, ec)?;
                let r = self.term(rhv, ec)?;
                Dynamic::Bool(self.compare(op, l, r))
            }
            TermKind::Load { rhv } => {
                let rhv = *rhv;
                let p = self.pointer(rhv, ec)?;
                let cell = ec.read_memory(self.memspace(rhv), p, self.cell_width(t.ty));
                self.typed(t.ty, cell)
            }
            TermKind::Gep {
                base,
                shifts,
                trivially_inbounds,
            } => {
                let (base, shifts, inbounds) = (*base, shifts.clone(), *trivially_inbounds);
                Dynamic::BitVector(self.gep(term, base, &shifts, inbounds, ec)?)
            }
            TermKind::Ternary { cnd, tru, fls } => {
                let (cnd, tru, fls) = (*cnd, *tru, *fls);
                let c = self.term(cnd, ec)?.to_bool();
                let a = self.term(tru, ec)?;
                let b = self.term(fls, ec)?;
                Dynamic::ite(c, a, b)
            }
            TermKind::Axiom { lhv, rhv } => {
                let (lhv, rhv) = (*lhv, *rhv);
                let value = self.term(lhv, ec)?;
                let axiom = self.term(rhv, ec)?.to_bool();
                value.with_axiom(axiom.as_axiom())
            }
            TermKind::Bound { rhv } => {
                let rhv = *rhv;
                let p = self.pointer(rhv, ec)?;
                Dynamic::BitVector(ec.get_bound(p, width))
            }
            TermKind::ReadProperty { prop, rhv } => {
                let (prop, rhv) = (*prop, *rhv);
                let Some(name) = self.property_name(prop) else {
                    return self.fail(term, "property read with a non-constant property name");
                };
                let p = self.pointer(rhv, ec)?;
                let cell = ec.read_property(&name, p, self.cell_width(t.ty));
                self.typed(t.ty, cell)
            }
            TermKind::Cast { sign_extend, rhv } => {
                let (sext, rhv) = (*sign_extend, *rhv);
                let value = self.term(rhv, ec)?;
                match self.nest.ty(t.ty) {
                    Type::Bool => Dynamic::Bool(value.to_bool()),
                    _ => Dynamic::BitVector(value.to_bv(width, sext)),
                }
            }
            TermKind::Sign { rhv } => {
                let v = self.integer(*rhv, ec)?;
                let msb = v.width() - 1;
                Dynamic::BitVector(v.extract(msb, msb).resize(width, false))
            }
        };
        trace!(target: "symstate::smt", term = %self.nest.term(term).name, expr = %ctx.display(res.expr()), "encoded term");
        Ok(res)
    }

    fn binary(&self, term: TermId, op: ArithType, l: Dynamic<'c>, r: Dynamic<'c>) -> EncodeResult<Dynamic<'c>> {
        if let (Dynamic::Bool(a), Dynamic::Bool(b)) = (l, r) {
            return match op {
                ArithType::BAnd | ArithType::LAnd => Ok(Dynamic::Bool(a & b)),
                ArithType::BOr | ArithType::LOr => Ok(Dynamic::Bool(a | b)),
                ArithType::Xor => Ok(Dynamic::Bool(a ^ b)),
                _ => self.fail(term, format!("unsupported logic opcode {}", op.as_str())),
            };
        }
        if op.is_logical() {
            let (a, b) = (l.to_bool(), r.to_bool());
            return Ok(Dynamic::Bool(if op == ArithType::LAnd { a & b } else { a | b }));
        }
        let width = l.width().max(r.width());
        let (a, b) = (l.to_bv(width, true), r.to_bv(width, true));
        let v = match op {
            ArithType::Add => a + b,
            ArithType::Sub => a - b,
            ArithType::Mul => a * b,
            ArithType::Div => a.sdiv(b),
            ArithType::UDiv => a.udiv(b),
            ArithType::Rem => a.srem(b),
            ArithType::URem => a.urem(b),
            ArithType::Shl => a.shl(b),
            ArithType::Ashr => a.ashr(b),
            ArithType::Lshr => a.lshr(b),
            ArithType::BAnd => a & b,
            ArithType::BOr => a | b,
            ArithType::Xor => a ^ b,
            ArithType::LAnd | ArithType::LOr => unreachable!("logical opcodes handled above"),
        };
        Ok(Dynamic::BitVector(v))
    }

    fn compare(&self, op: ConditionType, l: Dynamic<'c>, r: Dynamic<'c>) -> Bool<'c> {
        match op {
            ConditionType::True => return self.ef.bool_const(true),
            ConditionType::False => return self.ef.bool_const(false),
            ConditionType::Eq => return l.eq(r),
            ConditionType::Neq => return !l.eq(r),
            _ => {}
        }
        let width = l.width().max(r.width());
        let (a, b) = (l.to_bv(width, true), r.to_bv(width, true));
        match op {
            ConditionType::Gt => a.sgt(b),
            ConditionType::Ge => a.sge(b),
            ConditionType::Lt => a.slt(b),
            ConditionType::Le => a.sle(b),
            ConditionType::Ugt => a.ugt(b),
            ConditionType::Uge => a.uge(b),
            ConditionType::Ult => a.ult(b),
            ConditionType::Ule => a.ule(b),
            ConditionType::Eq | ConditionType::Neq | ConditionType::True | ConditionType::False => {
                unreachable!("handled above")
            }
        }
    }

    /// Element type one aggregate level below `ty`
    fn element_type(&self, ty: TypeId, index: Option<i64>) -> Option<TypeId> {
        let types = self.nest.type_factory();
        match types.get(ty) {
            Type::Array { element, .. } => Some(*element),
            Type::Record { name } => {
                let idx = usize::try_from(index?).ok()?;
                types.record_body(name)?.get(idx).copied()
            }
            _ => None,
        }
    }

    /// `base[shifts...]` with the allocation bound check
    ///
    /// An invalid base or a shift at or past the bound yields the invalid
    /// pointer; otherwise the result inherits the remaining bound.
    fn gep(
        &mut self,
        term: TermId,
        base: TermId,
        shifts: &[TermId],
        trivially_inbounds: bool,
        ec: &mut ExecutionContext<'c>,
    ) -> EncodeResult<DynBitVector<'c>> {
        let p = self.pointer(base, ec)?;
        if shifts.iter().all(|s| self.literal_int(*s) == Some(0)) {
            return Ok(p);
        }

        let types = self.nest.type_factory();
        let mut tp = types.pointed(self.nest.term(base).ty);
        let size = |tp: Option<TypeId>| tp.map(|t| types.size_in_elems(t)).unwrap_or(1);

        let head = self.integer(shifts[0], ec)?.resize(POINTER_BITS, true);
        let mut shift = head * self.ef.int_const(size(tp) as i64, POINTER_BITS);

        for s in &shifts[1..] {
            let Some(cur) = tp else {
                return self.fail(term, "indexing into an unknown type");
            };
            match types.get(cur) {
                Type::Record { .. } => {
                    let Some(idx) = self.literal_int(*s) else {
                        return self.fail(term, "non-constant record field index");
                    };
                    let offset = usize::try_from(idx)
                        .ok()
                        .and_then(|i| types.struct_offset_in_elems(cur, i));
                    let Some(offset) = offset else {
                        return self.fail(term, format!("no field {} in {}", idx, types.display(cur)));
                    };
                    shift = shift + self.ef.int_const(offset as i64, POINTER_BITS);
                    tp = self.element_type(cur, Some(idx));
                }
                Type::Array { .. } => {
                    tp = self.element_type(cur, None);
                    let by = self.integer(*s, ec)?.resize(POINTER_BITS, true);
                    shift = shift + by * self.ef.int_const(size(tp) as i64, POINTER_BITS);
                }
                _ => {
                    return self.fail(
                        term,
                        format!("non-aggregate type {} in GEP", types.display(cur)),
                    )
                }
            }
        }

        let bound = ec.get_bound(p, POINTER_BITS);
        let shifted = p + shift;

        if self.config.craig_colton_bounds {
            if trivially_inbounds {
                return Ok(shifted);
            }
            return Ok(shifted.with_axiom((!self.ef.is_invalid_ptr(shifted)).as_axiom()));
        }

        let res = if trivially_inbounds {
            shifted
        } else {
            let outside = self.ef.is_invalid_ptr(p) | shift.uge(bound);
            outside.ite_bv(self.ef.invalid_ptr(), shifted)
        };
        ec.write_bound_if_valid(res, bound - shift);
        Ok(res)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Predicates
    // ═══════════════════════════════════════════════════════════════════════

    pub fn predicate(&mut self, pred: PredicateId, ec: &mut ExecutionContext<'c>) -> EncodeResult<Bool<'c>> {
        let p = self.nest.predicate(pred);
        let res = match &p.kind {
            PredicateKind::Equality { lhv, rhv } => {
                let (lhv, rhv) = (*lhv, *rhv);
                let l = self.term(lhv, ec)?;
                let r = self.term(rhv, ec)?;
                l.eq(r)
            }
            PredicateKind::Inequality { lhv, rhv } => {
                let (lhv, rhv) = (*lhv, *rhv);
                let l = self.term(lhv, ec)?;
                let r = self.term(rhv, ec)?;
                !l.eq(r)
            }
            PredicateKind::Store { lhv, rhv } => {
                let (lhv, rhv) = (*lhv, *rhv);
                let ptr = self.pointer(lhv, ec)?;
                let value = self.integer(rhv, ec)?;
                ec.write_memory(self.memspace(lhv), ptr, value);
                self.ef.bool_const(true).with_axiom(ptr.axiom())
            }
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            }
            | PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => {
                let nullable = matches!(p.kind, PredicateKind::Malloc { .. }) && self.config.nullable_mallocs;
                let (lhv, num_elems, orig) = (*lhv, *num_elems, *orig_num_elems);
                let l = self.pointer(lhv, ec)?;
                let Some(elems) = self.literal_int(num_elems) else {
                    return self.fail(num_elems, "allocation with a non-constant element count");
                };
                let orig = self.integer(orig, ec)?.resize(POINTER_BITS, false);
                let fresh = ec.local_ptr(elems.max(1) as u64, Some(orig));
                if nullable {
                    l.eq(self.ef.null_ptr()) | l.eq(fresh)
                } else {
                    l.eq(fresh)
                }
            }
            PredicateKind::Call { .. } | PredicateKind::Mark { .. } => self.ef.bool_const(true),
            PredicateKind::Globals { globals } => {
                let globals = globals.clone();
                let mut res = self.ef.bool_const(true);
                for g in globals {
                    let gp = self.pointer(g, ec)?;
                    let size = self
                        .nest
                        .type_factory()
                        .pointed(self.nest.term(g).ty)
                        .map(|t| self.nest.type_factory().size_in_elems(t))
                        .unwrap_or(1);
                    res = res & gp.eq(ec.global_ptr(size, None));
                }
                res
            }
            PredicateKind::SeqData { base, data } => {
                let (base, data) = (*base, data.clone());
                let l = self.pointer(base, ec)?;
                let start = ec.global_ptr(data.len() as u64, None);
                if !self.config.skip_static_init {
                    let space = self.memspace(base);
                    for (i, datum) in data.into_iter().enumerate() {
                        let d = self.integer(datum, ec)?;
                        let at = start + self.ef.ptr_const(i as u64);
                        ec.write_memory(space, at, d);
                    }
                }
                l.eq(start)
            }
            PredicateKind::SeqDataZero { base, size } => {
                let (base, size) = (*base, *size);
                let l = self.pointer(base, ec)?;
                let start = ec.global_ptr(size, None);
                if !self.config.skip_static_init && size > 0 {
                    let zero = self.ef.int_const(0, POINTER_BITS);
                    ec.write_memory_range(self.memspace(base), start, size, zero);
                }
                l.eq(start)
            }
            PredicateKind::WriteProperty { prop, lhv, rhv } => {
                let (prop, lhv, rhv) = (*prop, *lhv, *rhv);
                let Some(name) = self.property_name(prop) else {
                    return Err(EncodeError::new(
                        self.nest.display_predicate(pred),
                        "property write with a non-constant property name",
                    ));
                };
                let ptr = self.pointer(lhv, ec)?;
                let value = self.integer(rhv, ec)?;
                ec.write_property(&name, ptr, value);
                self.ef.bool_const(true).with_axiom(ptr.axiom())
            }
            PredicateKind::WriteBound { lhv, rhv } => {
                let (lhv, rhv) = (*lhv, *rhv);
                let ptr = self.pointer(lhv, ec)?;
                let bound = self.integer(rhv, ec)?.resize(POINTER_BITS, false);
                ec.write_bound(ptr, bound);
                self.ef.bool_const(true).with_axiom(ptr.axiom())
            }
            PredicateKind::DefaultSwitchCase { cond, cases } => {
                let (cond, cases) = (*cond, cases.clone());
                let c = self.term(cond, ec)?;
                let mut res = self.ef.bool_const(true);
                for case in cases {
                    let k = self.term(case, ec)?;
                    res = res & !c.eq(k);
                }
                res
            }
        };
        Ok(res)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // States
    // ═══════════════════════════════════════════════════════════════════════

    pub fn state(&mut self, state: &PredicateState, ec: &mut ExecutionContext<'c>) -> EncodeResult<Bool<'c>> {
        match state.node() {
            StateNode::Basic { data, .. } => {
                let mut res = self.ef.bool_const(true);
                for p in data {
                    let b = self.predicate(*p, ec)?;
                    self.encoded.push((*p, b.as_axiom()));
                    res = res & b;
                }
                Ok(res)
            }
            StateNode::Chain { base, curr } => {
                let b = self.state(base, ec)?;
                let c = self.state(curr, ec)?;
                Ok(b & c)
            }
            StateNode::Choice { choices } => {
                let mut res = self.ef.bool_const(false);
                let mut branches = Vec::with_capacity(choices.len());
                for choice in choices {
                    let mut local = ec.clone();
                    let guard = self.state(choice, &mut local)?;
                    res = res | Bool::from_expr(self.ef.ctx(), guard.as_axiom());
                    branches.push((guard, local));
                }
                ec.switch_on(&branches);
                Ok(res)
            }
        }
    }
}

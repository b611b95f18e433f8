//! Term factory
//!
//! Every constructor derives the result type from its operands and the
//! display name from the operand names, then interns the node. Ill-typed
//! combinations yield a term whose type is a `Type::TypeError`.

use super::interner::Interner;
use super::type_factory::{TypeFactory, POINTER_BITS};
use crate::features::term_algebra::domain::{
    ArgumentKind, ArithType, ConditionType, Signedness, Term, TermId, TermKind, Type, TypeId,
    UnaryArithType,
};

/// Mutable view over the term arena (borrowed from a `FactoryNest`)
pub struct TermFactory<'a> {
    pub(crate) types: &'a mut TypeFactory,
    pub(crate) arena: &'a mut Interner<Term>,
}

impl<'a> TermFactory<'a> {
    pub fn get(&self, id: TermId) -> &Term {
        self.arena.get(id.0)
    }

    pub fn types(&mut self) -> &mut TypeFactory {
        self.types
    }

    fn type_of(&self, id: TermId) -> TypeId {
        self.get(id).ty
    }

    fn name_of(&self, id: TermId) -> &str {
        &self.get(id).name
    }

    /// Intern a fully formed term without recomputing anything
    pub(crate) fn intern_raw(&mut self, term: Term) -> TermId {
        TermId(self.arena.intern(term))
    }

    /// Intern `kind`, deriving the type (falling back to `ty` for kinds whose
    /// type is given rather than computed) and the display name
    pub fn make(&mut self, kind: TermKind, ty: TypeId) -> TermId {
        let ty = self.derive_type(&kind, ty);
        let name = self.derive_name(&kind, ty);
        self.intern_raw(Term { kind, ty, name })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Type and name derivation
    // ═══════════════════════════════════════════════════════════════════════

    fn derive_type(&mut self, kind: &TermKind, given: TypeId) -> TypeId {
        match kind {
            TermKind::Binary { op, lhv, rhv } => {
                if op.is_logical() {
                    self.types.bool()
                } else {
                    let (l, r) = (self.type_of(*lhv), self.type_of(*rhv));
                    self.types.merge(l, r)
                }
            }
            TermKind::Unary { op, rhv } => match op {
                UnaryArithType::Not => self.types.bool(),
                _ => self.type_of(*rhv),
            },
            TermKind::Cmp { .. } => self.types.bool(),
            TermKind::Load { rhv } => {
                let ptr = self.type_of(*rhv);
                match self.types.get(ptr).clone() {
                    Type::Pointer { pointed, .. } => pointed,
                    Type::Unknown => ptr,
                    Type::TypeError { .. } => ptr,
                    _ => {
                        let shown = self.types.display(ptr);
                        self.types
                            .type_error(format!("load from non-pointer type {}", shown))
                    }
                }
            }
            TermKind::Gep { base, shifts, .. } => self.gep_type(*base, shifts),
            TermKind::Ternary { tru, fls, .. } => {
                let (t, f) = (self.type_of(*tru), self.type_of(*fls));
                self.types.merge(t, f)
            }
            TermKind::Axiom { lhv, .. } => self.type_of(*lhv),
            TermKind::Bound { .. } | TermKind::Sign { .. } => {
                self.types.integer(POINTER_BITS, Signedness::Unknown)
            }
            TermKind::OpaqueBool(_) => self.types.bool(),
            TermKind::OpaqueFloat(_) => self.types.float(),
            TermKind::OpaqueString(_) => {
                let ch = self.types.integer(8, Signedness::Unknown);
                self.types.pointer_to(ch)
            }
            TermKind::OpaqueNullPtr
            | TermKind::OpaqueVar(_)
            | TermKind::OpaqueIndexing { .. }
            | TermKind::OpaqueMemberAccess { .. }
            | TermKind::OpaqueCall { .. } => self.types.unknown(),
            TermKind::ArgumentCount => self.types.integer(POINTER_BITS, Signedness::Unknown),
            _ => given,
        }
    }

    fn gep_type(&mut self, base: TermId, shifts: &[TermId]) -> TypeId {
        let base_ty = self.type_of(base);
        let (mut current, memspace) = match self.types.get(base_ty).clone() {
            Type::Pointer { pointed, memspace } => (pointed, memspace),
            Type::Unknown | Type::TypeError { .. } => return base_ty,
            _ => {
                let shown = self.types.display(base_ty);
                return self
                    .types
                    .type_error(format!("gep over non-pointer type {}", shown));
            }
        };
        // The first shift steps over the pointer itself, the rest index into
        // the pointed aggregate.
        for shift in shifts.iter().skip(1) {
            let index = match self.get(*shift).kind {
                TermKind::OpaqueInt(v) => Some(v),
                _ => None,
            };
            current = self.types.aggregate_element(current, index);
            if self.types.is_error(current) {
                return current;
            }
        }
        self.types.pointer(current, memspace)
    }

    fn derive_name(&self, kind: &TermKind, ty: TypeId) -> String {
        match kind {
            TermKind::Value { name, .. }
            | TermKind::Argument { name, .. }
            | TermKind::Const { name }
            | TermKind::OpaqueVar(name)
            | TermKind::OpaqueNamedConstant(name) => name.clone(),
            TermKind::ReturnValue { function } => format!("\\result_{}", function),
            TermKind::ReturnPtr { function } => format!("\\rptr_{}", function),
            TermKind::ArgumentCount => "\\argc".to_string(),
            TermKind::VarArgument { index } => format!("\\vararg{}", index),
            TermKind::Binary { op, lhv, rhv } => {
                format!("({} {} {})", self.name_of(*lhv), op, self.name_of(*rhv))
            }
            TermKind::Unary { op, rhv } => format!("{}{}", op, self.name_of(*rhv)),
            TermKind::Cmp { op, lhv, rhv } => match op {
                ConditionType::True | ConditionType::False => op.as_str().to_string(),
                _ => format!("({} {} {})", self.name_of(*lhv), op, self.name_of(*rhv)),
            },
            TermKind::Load { rhv } => format!("*({})", self.name_of(*rhv)),
            TermKind::Gep { base, shifts, .. } => {
                let mut parts = vec![self.name_of(*base).to_string()];
                parts.extend(shifts.iter().map(|s| self.name_of(*s).to_string()));
                format!("gep({})", parts.join(", "))
            }
            TermKind::Ternary { cnd, tru, fls } => format!(
                "({} ? {} : {})",
                self.name_of(*cnd),
                self.name_of(*tru),
                self.name_of(*fls)
            ),
            TermKind::Axiom { lhv, rhv } => {
                format!("{} with axiom {}", self.name_of(*lhv), self.name_of(*rhv))
            }
            TermKind::Bound { rhv } => format!("bound({})", self.name_of(*rhv)),
            TermKind::ReadProperty { prop, rhv } => {
                format!("property({}, {})", self.name_of(*prop), self.name_of(*rhv))
            }
            TermKind::Cast { sign_extend, rhv } => format!(
                "({}{}) {}",
                if *sign_extend { "sext " } else { "" },
                self.types.display(ty),
                self.name_of(*rhv)
            ),
            TermKind::Sign { rhv } => format!("sign({})", self.name_of(*rhv)),
            TermKind::OpaqueBool(b) => b.to_string(),
            TermKind::OpaqueInt(v) => v.to_string(),
            TermKind::OpaqueFloat(bits) => format!("{:?}", f64::from_bits(*bits)),
            TermKind::OpaqueString(s) => format!("{:?}", s),
            TermKind::OpaqueNullPtr => "null".to_string(),
            TermKind::OpaqueInvalidPtr => "invalid".to_string(),
            TermKind::OpaqueUndef => "undef".to_string(),
            TermKind::OpaqueBuiltin(name) => format!("\\{}", name),
            TermKind::OpaqueIndexing { lhv, rhv } => {
                format!("{}[{}]", self.name_of(*lhv), self.name_of(*rhv))
            }
            TermKind::OpaqueMemberAccess {
                lhv,
                property,
                indirect,
            } => format!(
                "{}{}{}",
                self.name_of(*lhv),
                if *indirect { "->" } else { "." },
                property
            ),
            TermKind::OpaqueCall { lhv, args } => format!(
                "{}({})",
                self.name_of(*lhv),
                args.iter()
                    .map(|a| self.name_of(*a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Variables
    // ═══════════════════════════════════════════════════════════════════════

    pub fn value(&mut self, ty: TypeId, name: impl Into<String>) -> TermId {
        self.make(
            TermKind::Value {
                name: name.into(),
                global: false,
            },
            ty,
        )
    }

    pub fn global(&mut self, ty: TypeId, name: impl Into<String>) -> TermId {
        self.make(
            TermKind::Value {
                name: name.into(),
                global: true,
            },
            ty,
        )
    }

    pub fn argument(
        &mut self,
        ty: TypeId,
        index: u32,
        name: impl Into<String>,
        kind: ArgumentKind,
    ) -> TermId {
        self.make(
            TermKind::Argument {
                index,
                name: name.into(),
                kind,
            },
            ty,
        )
    }

    pub fn return_value(&mut self, ty: TypeId, function: impl Into<String>) -> TermId {
        self.make(
            TermKind::ReturnValue {
                function: function.into(),
            },
            ty,
        )
    }

    pub fn return_ptr(&mut self, ty: TypeId, function: impl Into<String>) -> TermId {
        self.make(
            TermKind::ReturnPtr {
                function: function.into(),
            },
            ty,
        )
    }

    pub fn constant(&mut self, ty: TypeId, name: impl Into<String>) -> TermId {
        self.make(TermKind::Const { name: name.into() }, ty)
    }

    pub fn argument_count(&mut self) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::ArgumentCount, ty)
    }

    pub fn var_argument(&mut self, ty: TypeId, index: u32) -> TermId {
        self.make(TermKind::VarArgument { index }, ty)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Operations
    // ═══════════════════════════════════════════════════════════════════════

    pub fn binary(&mut self, op: ArithType, lhv: TermId, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Binary { op, lhv, rhv }, ty)
    }

    pub fn unary(&mut self, op: UnaryArithType, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Unary { op, rhv }, ty)
    }

    pub fn cmp(&mut self, op: ConditionType, lhv: TermId, rhv: TermId) -> TermId {
        let ty = self.types.bool();
        self.make(TermKind::Cmp { op, lhv, rhv }, ty)
    }

    pub fn load(&mut self, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Load { rhv }, ty)
    }

    pub fn gep(&mut self, base: TermId, shifts: Vec<TermId>, trivially_inbounds: bool) -> TermId {
        let ty = self.types.unknown();
        self.make(
            TermKind::Gep {
                base,
                shifts,
                trivially_inbounds,
            },
            ty,
        )
    }

    pub fn ternary(&mut self, cnd: TermId, tru: TermId, fls: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Ternary { cnd, tru, fls }, ty)
    }

    pub fn axiom(&mut self, lhv: TermId, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Axiom { lhv, rhv }, ty)
    }

    pub fn bound(&mut self, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Bound { rhv }, ty)
    }

    pub fn read_property(&mut self, ty: TypeId, prop: TermId, rhv: TermId) -> TermId {
        self.make(TermKind::ReadProperty { prop, rhv }, ty)
    }

    pub fn cast(&mut self, ty: TypeId, sign_extend: bool, rhv: TermId) -> TermId {
        self.make(TermKind::Cast { sign_extend, rhv }, ty)
    }

    pub fn sign(&mut self, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::Sign { rhv }, ty)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Literals and placeholders
    // ═══════════════════════════════════════════════════════════════════════

    pub fn boolean(&mut self, value: bool) -> TermId {
        let ty = self.types.bool();
        self.make(TermKind::OpaqueBool(value), ty)
    }

    pub fn true_term(&mut self) -> TermId {
        self.boolean(true)
    }

    pub fn false_term(&mut self) -> TermId {
        self.boolean(false)
    }

    pub fn int(&mut self, value: i64, bitsize: u32, signedness: Signedness) -> TermId {
        let ty = self.types.integer(bitsize, signedness);
        self.make(TermKind::OpaqueInt(value), ty)
    }

    /// 64-bit integer literal
    pub fn int64(&mut self, value: i64) -> TermId {
        self.int(value, POINTER_BITS, Signedness::Unknown)
    }

    pub fn real(&mut self, value: f64) -> TermId {
        let ty = self.types.float();
        self.make(TermKind::OpaqueFloat(value.to_bits()), ty)
    }

    pub fn string(&mut self, value: impl Into<String>) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::OpaqueString(value.into()), ty)
    }

    pub fn null_ptr(&mut self) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::OpaqueNullPtr, ty)
    }

    pub fn invalid_ptr(&mut self, ty: TypeId) -> TermId {
        self.make(TermKind::OpaqueInvalidPtr, ty)
    }

    pub fn undef(&mut self, ty: TypeId) -> TermId {
        self.make(TermKind::OpaqueUndef, ty)
    }

    pub fn opaque_var(&mut self, name: impl Into<String>) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::OpaqueVar(name.into()), ty)
    }

    pub fn builtin(&mut self, ty: TypeId, name: impl Into<String>) -> TermId {
        self.make(TermKind::OpaqueBuiltin(name.into()), ty)
    }

    pub fn named_constant(&mut self, ty: TypeId, name: impl Into<String>) -> TermId {
        self.make(TermKind::OpaqueNamedConstant(name.into()), ty)
    }

    pub fn indexing(&mut self, lhv: TermId, rhv: TermId) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::OpaqueIndexing { lhv, rhv }, ty)
    }

    pub fn member_access(
        &mut self,
        lhv: TermId,
        property: impl Into<String>,
        indirect: bool,
    ) -> TermId {
        let ty = self.types.unknown();
        self.make(
            TermKind::OpaqueMemberAccess {
                lhv,
                property: property.into(),
                indirect,
            },
            ty,
        )
    }

    pub fn opaque_call(&mut self, lhv: TermId, args: Vec<TermId>) -> TermId {
        let ty = self.types.unknown();
        self.make(TermKind::OpaqueCall { lhv, args }, ty)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rewriting
    // ═══════════════════════════════════════════════════════════════════════

    /// Rebuild `id` with children replaced through `f`, re-deriving its type
    pub fn rebuild(&mut self, id: TermId, f: impl FnMut(TermId) -> TermId) -> TermId {
        let term = self.get(id).clone();
        let kind = term.kind.map_subterms(f);
        if kind == term.kind && term.kind.subterms().is_empty() {
            return id;
        }
        self.make(kind, term.ty)
    }

    /// Same term over `children`, given in `TermKind::subterms` order
    pub fn with_subterms(&mut self, id: TermId, children: &[TermId]) -> TermId {
        let mut idx = 0;
        self.rebuild(id, |old| {
            let new = children.get(idx).copied().unwrap_or(old);
            idx += 1;
            new
        })
    }

    /// Bottom-up re-derivation of every composite type under `id`
    pub fn retype(&mut self, id: TermId) -> TermId {
        let children = self.get(id).kind.subterms();
        if children.is_empty() {
            return id;
        }
        let retyped: Vec<TermId> = children.iter().map(|c| self.retype(*c)).collect();
        self.with_subterms(id, &retyped)
    }

    /// Same term under a different name, used when the display must differ
    /// (e.g. instantiating callee locals at a call site)
    pub fn renamed(&mut self, id: TermId, prefix: &str) -> TermId {
        let term = self.get(id).clone();
        let kind = match term.kind {
            TermKind::Value {
                name,
                global: false,
            } => TermKind::Value {
                name: format!("{}.{}", prefix, name),
                global: false,
            },
            other => return self.make(other, term.ty),
        };
        self.make(kind, term.ty)
    }
}

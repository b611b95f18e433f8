//! Predicate factory

use super::interner::Interner;
use super::term_factory::TermFactory;
use super::type_factory::TypeFactory;
use crate::features::term_algebra::domain::{
    Predicate, PredicateId, PredicateKind, PredicateType, Term, TermId, TermKind, Type,
};
use crate::shared::models::Locus;

/// Mutable view over the predicate arena (borrowed from a `FactoryNest`)
pub struct PredicateFactory<'a> {
    pub(crate) types: &'a mut TypeFactory,
    pub(crate) terms: &'a mut Interner<Term>,
    pub(crate) arena: &'a mut Interner<Predicate>,
}

impl<'a> PredicateFactory<'a> {
    pub fn get(&self, id: PredicateId) -> &Predicate {
        self.arena.get(id.slot())
    }

    /// Term factory sharing this view's arenas
    pub fn terms(&mut self) -> TermFactory<'_> {
        TermFactory {
            types: self.types,
            arena: self.terms,
        }
    }

    pub(crate) fn intern_raw(&mut self, predicate: Predicate) -> PredicateId {
        let effect = predicate.kind.is_memory_effect();
        PredicateId::new(self.arena.intern(predicate), effect)
    }

    pub fn make(&mut self, kind: PredicateKind, ptype: PredicateType, locus: Locus) -> PredicateId {
        self.intern_raw(Predicate { kind, ptype, locus })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn equality(
        &mut self,
        lhv: TermId,
        rhv: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::Equality { lhv, rhv }, ptype, locus)
    }

    pub fn inequality(
        &mut self,
        lhv: TermId,
        rhv: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::Inequality { lhv, rhv }, ptype, locus)
    }

    /// Path condition `term == value`
    pub fn boolean(&mut self, term: TermId, value: bool, locus: Locus) -> PredicateId {
        let rhv = self.terms().boolean(value);
        self.equality(term, rhv, locus, PredicateType::Path)
    }

    /// `lhv = *ptr`
    pub fn load(
        &mut self,
        lhv: TermId,
        ptr: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        let loaded = self.terms().load(ptr);
        self.equality(lhv, loaded, locus, ptype)
    }

    pub fn store(
        &mut self,
        lhv: TermId,
        rhv: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::Store { lhv, rhv }, ptype, locus)
    }

    pub fn alloca(
        &mut self,
        lhv: TermId,
        num_elems: TermId,
        orig_num_elems: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            },
            ptype,
            locus,
        )
    }

    pub fn malloc(
        &mut self,
        lhv: TermId,
        num_elems: TermId,
        orig_num_elems: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(
            PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            },
            ptype,
            locus,
        )
    }

    pub fn call(
        &mut self,
        lhv: Option<TermId>,
        function: TermId,
        args: Vec<TermId>,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(
            PredicateKind::Call {
                lhv,
                function,
                args,
            },
            ptype,
            locus,
        )
    }

    pub fn globals(&mut self, globals: Vec<TermId>, locus: Locus) -> PredicateId {
        self.make(PredicateKind::Globals { globals }, PredicateType::State, locus)
    }

    pub fn seq_data(
        &mut self,
        base: TermId,
        data: Vec<TermId>,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::SeqData { base, data }, ptype, locus)
    }

    pub fn seq_data_zero(
        &mut self,
        base: TermId,
        size: u64,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::SeqDataZero { base, size }, ptype, locus)
    }

    pub fn write_property(
        &mut self,
        prop: TermId,
        lhv: TermId,
        rhv: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::WriteProperty { prop, lhv, rhv }, ptype, locus)
    }

    pub fn write_bound(
        &mut self,
        lhv: TermId,
        rhv: TermId,
        locus: Locus,
        ptype: PredicateType,
    ) -> PredicateId {
        self.make(PredicateKind::WriteBound { lhv, rhv }, ptype, locus)
    }

    pub fn mark(&mut self, id: TermId, locus: Locus) -> PredicateId {
        self.make(PredicateKind::Mark { id }, PredicateType::State, locus)
    }

    /// Path condition of the default edge of a switch
    pub fn default_switch_case(
        &mut self,
        cond: TermId,
        cases: Vec<TermId>,
        locus: Locus,
    ) -> PredicateId {
        self.make(
            PredicateKind::DefaultSwitchCase { cond, cases },
            PredicateType::Path,
            locus,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rewriting
    // ═══════════════════════════════════════════════════════════════════════

    pub fn with_type(&mut self, id: PredicateId, ptype: PredicateType) -> PredicateId {
        let pred = self.get(id);
        if pred.ptype == ptype {
            return id;
        }
        let kind = pred.kind.clone();
        let locus = pred.locus.clone();
        self.make(kind, ptype, locus)
    }

    /// Same predicate over `operands`, given in `PredicateKind::operands` order
    pub fn with_operands(&mut self, id: PredicateId, operands: &[TermId]) -> PredicateId {
        let mut idx = 0;
        self.rebuild(id, |old| {
            let new = operands.get(idx).copied().unwrap_or(old);
            idx += 1;
            new
        })
    }

    pub fn with_locus(&mut self, id: PredicateId, locus: Locus) -> PredicateId {
        let pred = self.get(id);
        if pred.locus == locus {
            return id;
        }
        let kind = pred.kind.clone();
        let ptype = pred.ptype;
        self.make(kind, ptype, locus)
    }

    /// Rebuild `id` with operands replaced through `f`
    pub fn rebuild(&mut self, id: PredicateId, f: impl FnMut(TermId) -> TermId) -> PredicateId {
        let pred = self.get(id).clone();
        let kind = pred.kind.map_operands(f);
        if kind == pred.kind {
            return id;
        }
        self.make(kind, pred.ptype, pred.locus)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Type checking
    // ═══════════════════════════════════════════════════════════════════════

    fn term_type(&self, id: TermId) -> &Type {
        self.types.get(self.terms.get(id.0).ty)
    }

    fn ill_typed_operand(&self, id: PredicateId) -> Option<String> {
        self.get(id).kind.operands().into_iter().find_map(|t| {
            let term = self.terms.get(t.0);
            match self.types.get(term.ty) {
                Type::TypeError { message } => Some(format!("{}: {}", term.name, message)),
                _ => None,
            }
        })
    }

    fn expect_pointer(&self, what: &str, id: TermId) -> Option<String> {
        match self.term_type(id) {
            Type::Pointer { .. } | Type::Unknown => None,
            _ => Some(format!(
                "{} must be a pointer, got {}",
                what,
                self.types.display(self.terms.get(id.0).ty)
            )),
        }
    }

    fn expect_integer(&self, what: &str, id: TermId) -> Option<String> {
        match self.term_type(id) {
            Type::Integer { .. } | Type::Unknown => None,
            _ => Some(format!(
                "{} must be an integer, got {}",
                what,
                self.types.display(self.terms.get(id.0).ty)
            )),
        }
    }

    /// First arity/type violation of the predicate, if any
    pub fn typecheck(&self, id: PredicateId) -> Option<String> {
        if let Some(err) = self.ill_typed_operand(id) {
            return Some(err);
        }
        match &self.get(id).kind {
            PredicateKind::Store { lhv, .. }
            | PredicateKind::WriteBound { lhv, .. }
            | PredicateKind::WriteProperty { lhv, .. } => self.expect_pointer("store target", *lhv),
            PredicateKind::Alloca {
                lhv,
                num_elems,
                orig_num_elems,
            }
            | PredicateKind::Malloc {
                lhv,
                num_elems,
                orig_num_elems,
            } => self
                .expect_pointer("allocation result", *lhv)
                .or_else(|| self.expect_integer("element count", *num_elems))
                .or_else(|| self.expect_integer("element count", *orig_num_elems)),
            PredicateKind::SeqData { base, .. } | PredicateKind::SeqDataZero { base, .. } => {
                self.expect_pointer("sequence base", *base)
            }
            PredicateKind::Mark { id } => match self.terms.get(id.0).kind {
                TermKind::OpaqueNamedConstant(_) | TermKind::OpaqueInt(_) => None,
                _ => Some("mark id must be a constant".to_string()),
            },
            PredicateKind::DefaultSwitchCase { cond, .. } => {
                self.expect_integer("switch condition", *cond)
            }
            PredicateKind::Equality { .. }
            | PredicateKind::Inequality { .. }
            | PredicateKind::Call { .. }
            | PredicateKind::Globals { .. } => None,
        }
    }
}

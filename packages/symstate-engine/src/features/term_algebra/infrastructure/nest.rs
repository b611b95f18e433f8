//! FactoryNest
//!
//! Owns the type, term and predicate arenas of one analysis session and hands
//! out short-lived factory views. Views borrow the nest mutably, so bind the
//! result of one constructor before passing it to the next.

use super::interner::Interner;
use super::predicate_factory::PredicateFactory;
use super::term_factory::TermFactory;
use super::type_factory::TypeFactory;
use crate::features::term_algebra::domain::{
    Predicate, PredicateId, PredicateKind, Term, TermId, Type, TypeId,
};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_nest_id() -> u64 {
    NEXT_NEST_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct FactoryNest {
    /// Process-unique; handles from different nests never alias
    id: u64,
    types: TypeFactory,
    terms: Interner<Term>,
    predicates: Interner<Predicate>,
}

impl FactoryNest {
    pub fn new() -> Self {
        Self {
            id: next_nest_id(),
            types: TypeFactory::new(),
            terms: Interner::new(),
            predicates: Interner::new(),
        }
    }

    /// Identity of this nest's handle space
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn types(&mut self) -> &mut TypeFactory {
        &mut self.types
    }

    pub fn type_factory(&self) -> &TypeFactory {
        &self.types
    }

    pub fn terms(&mut self) -> TermFactory<'_> {
        TermFactory {
            types: &mut self.types,
            arena: &mut self.terms,
        }
    }

    pub fn predicates(&mut self) -> PredicateFactory<'_> {
        PredicateFactory {
            types: &mut self.types,
            terms: &mut self.terms,
            arena: &mut self.predicates,
        }
    }

    pub fn term(&self, id: TermId) -> &Term {
        self.terms.get(id.0)
    }

    pub fn predicate(&self, id: PredicateId) -> &Predicate {
        self.predicates.get(id.slot())
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        self.types.get(id)
    }

    pub fn term_type(&self, id: TermId) -> &Type {
        self.ty(self.term(id).ty)
    }

    /// Number of interned (types, terms, predicates)
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.types.len(), self.terms.len(), self.predicates.len())
    }

    /// Unique mark term for an instruction of `function`
    pub fn mark_term(&mut self, function: &str, inst: u32) -> TermId {
        let ty = self.types.unknown();
        self.terms()
            .named_constant(ty, format!("$mark${}${}", function, inst))
    }

    pub fn typecheck(&mut self, id: PredicateId) -> Option<String> {
        self.predicates().typecheck(id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Display
    // ═══════════════════════════════════════════════════════════════════════

    fn name(&self, id: TermId) -> &str {
        &self.term(id).name
    }

    fn names(&self, ids: &[TermId]) -> String {
        ids.iter()
            .map(|t| self.name(*t))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Human-readable predicate, prefixed with its type tag
    pub fn display_predicate(&self, id: PredicateId) -> String {
        let pred = self.predicate(id);
        let body = match &pred.kind {
            PredicateKind::Equality { lhv, rhv } => {
                format!("{} = {}", self.name(*lhv), self.name(*rhv))
            }
            PredicateKind::Inequality { lhv, rhv } => {
                format!("{} != {}", self.name(*lhv), self.name(*rhv))
            }
            PredicateKind::Store { lhv, rhv } => {
                format!("*{} = {}", self.name(*lhv), self.name(*rhv))
            }
            PredicateKind::Alloca { lhv, num_elems, .. } => {
                format!("{} = alloca({})", self.name(*lhv), self.name(*num_elems))
            }
            PredicateKind::Malloc { lhv, num_elems, .. } => {
                format!("{} = malloc({})", self.name(*lhv), self.name(*num_elems))
            }
            PredicateKind::Call {
                lhv,
                function,
                args,
            } => match lhv {
                Some(l) => format!(
                    "{} = call {}({})",
                    self.name(*l),
                    self.name(*function),
                    self.names(args)
                ),
                None => format!("call {}({})", self.name(*function), self.names(args)),
            },
            PredicateKind::Globals { globals } => format!("globals({})", self.names(globals)),
            PredicateKind::SeqData { base, data } => {
                format!("{} = {{{}}}", self.name(*base), self.names(data))
            }
            PredicateKind::SeqDataZero { base, size } => {
                format!("{} = {{0 x {}}}", self.name(*base), size)
            }
            PredicateKind::WriteProperty { prop, lhv, rhv } => format!(
                "property({}, {}) = {}",
                self.name(*prop),
                self.name(*lhv),
                self.name(*rhv)
            ),
            PredicateKind::WriteBound { lhv, rhv } => {
                format!("bound({}) = {}", self.name(*lhv), self.name(*rhv))
            }
            PredicateKind::Mark { id } => format!("mark {}", self.name(*id)),
            PredicateKind::DefaultSwitchCase { cond, cases } => {
                format!("{} not in {{{}}}", self.name(*cond), self.names(cases))
            }
        };
        format!("{}{}", pred.ptype.tag(), body)
    }
}

// A clone interns independently from here on, so it gets its own id.
impl Clone for FactoryNest {
    fn clone(&self) -> Self {
        Self {
            id: next_nest_id(),
            types: self.types.clone(),
            terms: self.terms.clone(),
            predicates: self.predicates.clone(),
        }
    }
}

impl Default for FactoryNest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::domain::{ArithType, ConditionType, PredicateType};
    use crate::shared::models::Locus;

    #[test]
    fn test_nests_and_clones_have_distinct_ids() {
        let a = FactoryNest::new();
        let b = FactoryNest::default();
        let c = a.clone();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.sizes(), c.sizes());
    }

    #[test]
    fn test_views_share_arenas() {
        let mut nest = FactoryNest::new();
        let int = nest.types().default_integer();
        let x = nest.terms().value(int, "x");
        let y = nest.terms().value(int, "y");
        let sum = nest.terms().binary(ArithType::Add, x, y);
        let cmp = nest.terms().cmp(ConditionType::Neq, sum, x);
        let p = nest.predicates().boolean(cmp, true, Locus::unknown());

        assert_eq!(nest.predicate(p).ptype, PredicateType::Path);
        assert_eq!(nest.display_predicate(p), "@P ((x + y) != x) = true");
        assert_eq!(nest.term(sum).name, "(x + y)");
    }

    #[test]
    fn test_mark_terms_are_unique_per_instruction() {
        let mut nest = FactoryNest::new();
        let a = nest.mark_term("f", 1);
        let b = nest.mark_term("f", 2);
        let c = nest.mark_term("f", 1);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_state_predicates_have_no_tag() {
        let mut nest = FactoryNest::new();
        let int = nest.types().default_integer();
        let ptr = nest.types().pointer_to(int);
        let p = nest.terms().value(ptr, "p");
        let v = nest.terms().int(7, 32, Default::default());
        let store = nest
            .predicates()
            .store(p, v, Locus::unknown(), PredicateType::State);
        assert_eq!(nest.display_predicate(store), "*p = 7");
    }
}

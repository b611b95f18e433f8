//! CallSiteInitializer
//!
//! Instantiates a callee's REQUIRES/ENSURES/BODY state at one call site:
//! formals become actuals, the callee's return value becomes the call
//! result, callee-local values are renamed under the call-site prefix, and
//! ENSURES facts turn into ASSUME facts of the caller.

use super::transformer::{walk_predicate, walk_term, Transformer};
use crate::features::term_algebra::{
    FactoryNest, PredicateId, PredicateType, TermId, TermKind,
};
use crate::shared::models::Locus;

pub struct CallSiteInitializer<'n> {
    nest: &'n mut FactoryNest,
    callee: String,
    actuals: Vec<TermId>,
    result: Option<TermId>,
    fixed_params: usize,
    prefix: String,
    locus: Locus,
}

impl<'n> CallSiteInitializer<'n> {
    pub fn new(
        nest: &'n mut FactoryNest,
        callee: impl Into<String>,
        actuals: Vec<TermId>,
        result: Option<TermId>,
        fixed_params: usize,
        prefix: impl Into<String>,
        locus: Locus,
    ) -> Self {
        Self {
            nest,
            callee: callee.into(),
            actuals,
            result,
            fixed_params,
            prefix: prefix.into(),
            locus,
        }
    }
}

impl<'n> Transformer for CallSiteInitializer<'n> {
    fn nest(&mut self) -> &mut FactoryNest {
        self.nest
    }

    fn transform_predicate(&mut self, pred: PredicateId) -> Option<PredicateId> {
        let mapped = walk_predicate(self, pred);
        let ptype = self.nest.predicate(mapped).ptype;
        let mapped = if ptype == PredicateType::Ensures {
            self.nest.predicates().with_type(mapped, PredicateType::Assume)
        } else {
            mapped
        };
        if self.locus.is_unknown() {
            return Some(mapped);
        }
        let locus = self.locus.clone();
        Some(self.nest.predicates().with_locus(mapped, locus))
    }

    fn transform_term(&mut self, term: TermId) -> TermId {
        let kind = self.nest.term(term).kind.clone();
        match kind {
            TermKind::Argument { index, .. } => self
                .actuals
                .get(index as usize)
                .copied()
                .unwrap_or(term),
            TermKind::ReturnValue { function } if function == self.callee => {
                self.result.unwrap_or(term)
            }
            TermKind::ArgumentCount => {
                let count = self.actuals.len() as i64;
                self.nest.terms().int64(count)
            }
            TermKind::VarArgument { index } => self
                .actuals
                .get(self.fixed_params + index as usize)
                .copied()
                .unwrap_or(term),
            TermKind::Value { global: false, .. } => {
                let prefix = self.prefix.clone();
                self.nest.terms().renamed(term, &prefix)
            }
            _ => walk_term(self, term),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::predicate_state::domain::PredicateState;
    use crate::features::term_algebra::{ArgumentKind, ArithType, Signedness};

    #[test]
    fn test_formals_and_result_are_substituted() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let arg0 = nest
            .terms()
            .argument(int, 0, "a", ArgumentKind::Any);
        let ret = nest.terms().return_value(int, "inc");
        let one = nest.terms().int(1, 32, Signedness::Signed);
        let plus = nest.terms().binary(ArithType::Add, arg0, one);
        let ensures = nest
            .predicates()
            .equality(ret, plus, Locus::unknown(), PredicateType::Ensures);

        let actual = nest.terms().value(int, "y");
        let res = nest.terms().value(int, "r");
        let state = PredicateState::basic(vec![ensures]);

        let site = Locus::new("main.c", 10, 5);
        let inst = CallSiteInitializer::new(
            &mut nest,
            "inc",
            vec![actual],
            Some(res),
            1,
            "inc.1",
            site.clone(),
        )
        .transform(&state);

        let p = inst.predicates()[0];
        assert_eq!(nest.predicate(p).ptype, PredicateType::Assume);
        assert_eq!(nest.predicate(p).locus, site);
        assert_eq!(nest.display_predicate(p), "@U r = (y + 1)");
    }

    #[test]
    fn test_locals_are_prefixed_and_varargs_resolved() {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let local = nest.terms().value(int, "tmp");
        let vararg = nest.terms().var_argument(int, 0);
        let argc = nest.terms().argument_count();
        let p1 = nest
            .predicates()
            .equality(local, vararg, Locus::unknown(), PredicateType::State);
        let p2 = nest
            .predicates()
            .equality(local, argc, Locus::unknown(), PredicateType::State);

        let fixed = nest.terms().value(int, "f");
        let extra = nest.terms().value(int, "e");
        let state = PredicateState::basic(vec![p1, p2]);
        let inst = CallSiteInitializer::new(
            &mut nest,
            "printf",
            vec![fixed, extra],
            None,
            1,
            "printf.7",
            Locus::unknown(),
        )
        .transform(&state);

        let shown: Vec<String> = inst
            .predicates()
            .iter()
            .map(|p| nest.display_predicate(*p))
            .collect();
        assert_eq!(shown, vec!["printf.7.tmp = e", "printf.7.tmp = 2"]);
    }
}

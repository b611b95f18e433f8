//! Cropper
//!
//! Cuts a state right after a target predicate. Alternatives that never
//! reach the target are dropped.

use crate::features::predicate_state::domain::{PredicateState, StateNode};
use crate::features::term_algebra::PredicateId;

pub struct Cropper {
    target: PredicateId,
}

impl Cropper {
    pub fn new(target: PredicateId) -> Self {
        Self { target }
    }

    /// Prefix of `state` ending at the target, `None` when it is absent
    pub fn crop(&self, state: &PredicateState) -> Option<PredicateState> {
        match state.node() {
            StateNode::Basic { data, loci } => {
                let pos = data.iter().position(|p| *p == self.target)?;
                if pos + 1 == data.len() {
                    return Some(state.clone());
                }
                Some(PredicateState::basic_with_loci(
                    data[..=pos].to_vec(),
                    loci.clone(),
                ))
            }
            StateNode::Chain { base, curr } => match self.crop(base) {
                Some(cropped) => Some(cropped),
                None => self
                    .crop(curr)
                    .map(|cropped| PredicateState::chain(base, &cropped)),
            },
            StateNode::Choice { choices } => {
                let kept: Vec<PredicateState> =
                    choices.iter().filter_map(|c| self.crop(c)).collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(PredicateState::choice(kept))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::term_algebra::{FactoryNest, PredicateType, Signedness};
    use crate::shared::models::Locus;

    fn preds(n: i64) -> (FactoryNest, Vec<PredicateId>) {
        let mut nest = FactoryNest::new();
        let int = nest.types().integer(32, Signedness::Signed);
        let x = nest.terms().value(int, "x");
        let mut out = Vec::new();
        for i in 0..n {
            let c = nest.terms().int(i, 32, Signedness::Signed);
            out.push(
                nest.predicates()
                    .equality(x, c, Locus::unknown(), PredicateType::State),
            );
        }
        (nest, out)
    }

    #[test]
    fn test_crop_basic_and_chain() {
        let (_nest, p) = preds(5);
        let choice = PredicateState::choice(vec![
            PredicateState::basic(vec![p[0]]),
            PredicateState::basic(vec![p[1]]),
        ]);
        let state = choice.add_predicate(p[2]).add_predicate(p[3]);

        let cropped = Cropper::new(p[2]).crop(&state).unwrap();
        assert_eq!(cropped, choice.add_predicate(p[2]));

        assert_eq!(Cropper::new(p[4]).crop(&state), None);
    }

    #[test]
    fn test_crop_keeps_only_alternatives_with_target() {
        let (_nest, p) = preds(4);
        let state = PredicateState::basic(vec![p[0]]).add_state(&PredicateState::choice(vec![
            PredicateState::basic(vec![p[1], p[2]]),
            PredicateState::basic(vec![p[3]]),
        ]));

        let cropped = Cropper::new(p[1]).crop(&state).unwrap();
        assert_eq!(cropped.predicates(), vec![p[0], p[1]]);
    }
}

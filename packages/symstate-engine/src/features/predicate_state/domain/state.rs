//! PredicateState tree
//!
//! An immutable, `Arc`-shared Basic/Chain/Choice tree. Every constructor
//! normalizes, so `Chain(Basic(), s)` and `s` are the same value and two
//! states built along different routes compare equal when they describe the
//! same sequence of predicates. Equality and hashing ignore visited loci.

use crate::features::term_algebra::{FactoryNest, PredicateId, PredicateType};
use crate::shared::models::{Locus, Loci};
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug)]
pub enum StateNode {
    /// Ordered predicates plus the source loci known to be reached
    Basic { data: Vec<PredicateId>, loci: Loci },
    /// `base` then `curr`
    Chain {
        base: PredicateState,
        curr: PredicateState,
    },
    /// One of the alternatives
    Choice { choices: Vec<PredicateState> },
}

#[derive(Debug, Clone)]
pub struct PredicateState(Arc<StateNode>);

impl Default for PredicateState {
    fn default() -> Self {
        Self::empty()
    }
}

/// Append `incoming` to `data`, skipping pure predicates already present.
/// Memory effects are always kept since their order is observable.
fn append_deduplicated(data: &mut Vec<PredicateId>, incoming: &[PredicateId]) {
    for p in incoming {
        if p.is_memory_effect() || !data.contains(p) {
            data.push(*p);
        }
    }
}

impl PredicateState {
    // ═══════════════════════════════════════════════════════════════════════
    // Construction
    // ═══════════════════════════════════════════════════════════════════════

    pub fn empty() -> Self {
        Self::basic_with(Vec::new(), Loci::new())
    }

    pub fn basic(data: Vec<PredicateId>) -> Self {
        let mut dedup = Vec::with_capacity(data.len());
        append_deduplicated(&mut dedup, &data);
        Self::basic_with(dedup, Loci::new())
    }

    fn basic_with(data: Vec<PredicateId>, loci: Loci) -> Self {
        PredicateState(Arc::new(StateNode::Basic { data, loci }))
    }

    /// Basic over `data` (deduplicated) carrying `loci`
    pub fn basic_with_loci(data: Vec<PredicateId>, loci: Loci) -> Self {
        let mut dedup = Vec::with_capacity(data.len());
        append_deduplicated(&mut dedup, &data);
        Self::basic_with(dedup, loci)
    }

    /// Sequential composition `base` then `curr`, normalized
    pub fn chain(base: &PredicateState, curr: &PredicateState) -> Self {
        match (base.node(), curr.node()) {
            (StateNode::Basic { data: bd, loci: bl }, _) if bd.is_empty() => {
                curr.with_extra_loci(bl)
            }
            (_, StateNode::Basic { data: cd, loci: cl }) if cd.is_empty() => {
                base.with_extra_loci(cl)
            }
            (
                StateNode::Basic { data: bd, loci: bl },
                StateNode::Basic { data: cd, loci: cl },
            ) => {
                let mut data = bd.clone();
                append_deduplicated(&mut data, cd);
                let mut loci = bl.clone();
                loci.extend(cl.iter().cloned());
                Self::basic_with(data, loci)
            }
            (StateNode::Chain { base: x, curr: tail }, StateNode::Basic { .. })
                if tail.is_basic() =>
            {
                let merged = Self::chain(tail, curr);
                Self::raw_chain(x.clone(), merged)
            }
            (_, StateNode::Chain { base: y, curr: z }) => {
                let left = Self::chain(base, y);
                Self::chain(&left, z)
            }
            _ => Self::raw_chain(base.clone(), curr.clone()),
        }
    }

    fn raw_chain(base: PredicateState, curr: PredicateState) -> Self {
        PredicateState(Arc::new(StateNode::Chain { base, curr }))
    }

    /// Disjunction over `choices`; a single (or repeated) alternative collapses
    pub fn choice(choices: Vec<PredicateState>) -> Self {
        let mut unique: Vec<PredicateState> = Vec::with_capacity(choices.len());
        for c in choices {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        match unique.len() {
            0 => Self::empty(),
            1 => unique.pop().unwrap_or_default(),
            _ => PredicateState(Arc::new(StateNode::Choice { choices: unique })),
        }
    }

    pub fn node(&self) -> &StateNode {
        &self.0
    }

    pub fn ptr_eq(&self, other: &PredicateState) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_basic(&self) -> bool {
        matches!(self.node(), StateNode::Basic { .. })
    }

    /// Identity of the shared node, for memo tables
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    fn with_extra_loci(&self, extra: &Loci) -> Self {
        if extra.is_empty() {
            return self.clone();
        }
        match self.node() {
            StateNode::Basic { data, loci } => {
                let mut loci = loci.clone();
                loci.extend(extra.iter().cloned());
                Self::basic_with(data.clone(), loci)
            }
            StateNode::Chain { base, curr } => {
                Self::raw_chain(base.clone(), curr.with_extra_loci(extra))
            }
            StateNode::Choice { choices } => PredicateState(Arc::new(StateNode::Choice {
                choices: choices.iter().map(|c| c.with_extra_loci(extra)).collect(),
            })),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Appending
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_predicate(&self, pred: PredicateId) -> Self {
        Self::chain(self, &Self::basic(vec![pred]))
    }

    pub fn add_state(&self, other: &PredicateState) -> Self {
        Self::chain(self, other)
    }

    pub fn add_visited(&self, locus: Locus) -> Self {
        if locus.is_unknown() {
            return self.clone();
        }
        let mut loci = Loci::new();
        loci.insert(locus);
        self.with_extra_loci(&loci)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_empty(&self) -> bool {
        match self.node() {
            StateNode::Basic { data, .. } => data.is_empty(),
            StateNode::Chain { base, curr } => base.is_empty() && curr.is_empty(),
            StateNode::Choice { choices } => choices.iter().all(|c| c.is_empty()),
        }
    }

    /// Number of predicates in the tree
    pub fn size(&self) -> usize {
        match self.node() {
            StateNode::Basic { data, .. } => data.len(),
            StateNode::Chain { base, curr } => base.size() + curr.size(),
            StateNode::Choice { choices } => choices.iter().map(|c| c.size()).sum(),
        }
    }

    /// Whether every path through the tree reaches `locus`
    pub fn has_visited(&self, locus: &Locus) -> bool {
        match self.node() {
            StateNode::Basic { loci, .. } => loci.contains(locus),
            StateNode::Chain { base, curr } => curr.has_visited(locus) || base.has_visited(locus),
            StateNode::Choice { choices } => choices.iter().all(|c| c.has_visited(locus)),
        }
    }

    pub fn has_visited_from<'a>(&self, loci: impl IntoIterator<Item = &'a Locus>) -> bool {
        loci.into_iter().all(|l| self.has_visited(l))
    }

    /// Loci reached along every path
    pub fn visited(&self) -> Loci {
        match self.node() {
            StateNode::Basic { loci, .. } => loci.clone(),
            StateNode::Chain { base, curr } => {
                let mut res = base.visited();
                res.extend(curr.visited());
                res
            }
            StateNode::Choice { choices } => {
                let mut iter = choices.iter();
                let mut res = iter.next().map(|c| c.visited()).unwrap_or_default();
                for c in iter {
                    let other = c.visited();
                    res.retain(|l| other.contains(l));
                }
                res
            }
        }
    }

    /// Predicates in evaluation order, alternatives flattened left to right
    pub fn predicates(&self) -> Vec<PredicateId> {
        let mut out = Vec::with_capacity(self.size());
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates(&self, out: &mut Vec<PredicateId>) {
        match self.node() {
            StateNode::Basic { data, .. } => out.extend(data.iter().copied()),
            StateNode::Chain { base, curr } => {
                base.collect_predicates(out);
                curr.collect_predicates(out);
            }
            StateNode::Choice { choices } => {
                for c in choices {
                    c.collect_predicates(out);
                }
            }
        }
    }

    pub fn contains(&self, pred: PredicateId) -> bool {
        match self.node() {
            StateNode::Basic { data, .. } => data.contains(&pred),
            StateNode::Chain { base, curr } => curr.contains(pred) || base.contains(pred),
            StateNode::Choice { choices } => choices.iter().any(|c| c.contains(pred)),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Structural transforms
    // ═══════════════════════════════════════════════════════════════════════

    /// Keep predicates satisfying `keep`
    pub fn filter(&self, keep: &mut impl FnMut(PredicateId) -> bool) -> Self {
        match self.node() {
            StateNode::Basic { data, loci } => {
                let kept: Vec<PredicateId> = data.iter().copied().filter(|p| keep(*p)).collect();
                if kept.len() == data.len() {
                    return self.clone();
                }
                Self::basic_with(kept, loci.clone())
            }
            StateNode::Chain { base, curr } => {
                let b = base.filter(keep);
                let c = curr.filter(keep);
                Self::chain(&b, &c)
            }
            StateNode::Choice { choices } => {
                Self::choice(choices.iter().map(|c| c.filter(keep)).collect())
            }
        }
    }

    pub fn filter_by_types(&self, nest: &FactoryNest, types: &[PredicateType]) -> Self {
        self.filter(&mut |p| types.contains(&nest.predicate(p).ptype))
    }

    /// Replace every predicate through `f`
    pub fn map(&self, f: &mut impl FnMut(PredicateId) -> PredicateId) -> Self {
        match self.node() {
            StateNode::Basic { data, loci } => {
                let mapped: Vec<PredicateId> = data.iter().map(|p| f(*p)).collect();
                if mapped == *data {
                    return self.clone();
                }
                let mut dedup = Vec::with_capacity(mapped.len());
                append_deduplicated(&mut dedup, &mapped);
                Self::basic_with(dedup, loci.clone())
            }
            StateNode::Chain { base, curr } => {
                let b = base.map(f);
                let c = curr.map(f);
                Self::chain(&b, &c)
            }
            StateNode::Choice { choices } => {
                Self::choice(choices.iter().map(|c| c.map(f)).collect())
            }
        }
    }

    /// Replace every Basic leaf through `f`
    pub fn fmap(&self, f: &mut impl FnMut(&PredicateState) -> PredicateState) -> Self {
        match self.node() {
            StateNode::Basic { .. } => f(self),
            StateNode::Chain { base, curr } => {
                let b = base.fmap(f);
                let c = curr.fmap(f);
                Self::chain(&b, &c)
            }
            StateNode::Choice { choices } => {
                Self::choice(choices.iter().map(|c| c.fmap(f)).collect())
            }
        }
    }

    /// Same tree with every sequence reversed
    pub fn reverse(&self) -> Self {
        match self.node() {
            StateNode::Basic { data, loci } => {
                let mut rev = data.clone();
                rev.reverse();
                Self::basic_with(rev, loci.clone())
            }
            StateNode::Chain { base, curr } => Self::chain(&curr.reverse(), &base.reverse()),
            StateNode::Choice { choices } => {
                Self::choice(choices.iter().map(|c| c.reverse()).collect())
            }
        }
    }

    /// Split into (predicates of `types`, everything else), keeping shape
    pub fn split_by_types(
        &self,
        nest: &FactoryNest,
        types: &[PredicateType],
    ) -> (PredicateState, PredicateState) {
        let selected = self.filter(&mut |p| types.contains(&nest.predicate(p).ptype));
        let rest = self.filter(&mut |p| !types.contains(&nest.predicate(p).ptype));
        (selected, rest)
    }

    /// The part of `self` that follows the prefix `on`, if `on` is a prefix
    pub fn slice_on(&self, on: &PredicateState) -> Option<PredicateState> {
        if self == on {
            return Some(Self::empty());
        }
        if on.is_empty() {
            return Some(self.clone());
        }
        match self.node() {
            StateNode::Basic { data, loci } => match on.node() {
                StateNode::Basic { data: prefix, .. } if data.starts_with(prefix) => {
                    Some(Self::basic_with(data[prefix.len()..].to_vec(), loci.clone()))
                }
                _ => None,
            },
            StateNode::Chain { base, curr } => {
                if base == on {
                    return Some(curr.clone());
                }
                if let StateNode::Chain {
                    base: on_base,
                    curr: on_curr,
                } = on.node()
                {
                    if base == on_base {
                        return curr.slice_on(on_curr);
                    }
                }
                base.slice_on(on).map(|sliced| Self::chain(&sliced, curr))
            }
            StateNode::Choice { choices } => {
                let sliced: Option<Vec<PredicateState>> =
                    choices.iter().map(|c| c.slice_on(on)).collect();
                sliced.map(Self::choice)
            }
        }
    }

    /// Drop alternatives made redundant by their siblings
    ///
    /// A Choice whose alternatives are all empty collapses to the empty
    /// state; an empty alternative next to non-empty ones is kept since it
    /// stands for the path with no effects.
    pub fn simplify(&self) -> Self {
        match self.node() {
            StateNode::Basic { .. } => self.clone(),
            StateNode::Chain { base, curr } => Self::chain(&base.simplify(), &curr.simplify()),
            StateNode::Choice { choices } => {
                let simplified: Vec<PredicateState> =
                    choices.iter().map(|c| c.simplify()).collect();
                if simplified.iter().all(|c| c.is_empty()) {
                    let loci = self.visited();
                    return Self::basic_with(Vec::new(), loci);
                }
                Self::choice(simplified)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Display
    // ═══════════════════════════════════════════════════════════════════════

    pub fn display(&self, nest: &FactoryNest) -> String {
        let mut out = String::new();
        self.write_indented(nest, 0, &mut out);
        out
    }

    fn write_indented(&self, nest: &FactoryNest, depth: usize, out: &mut String) {
        let pad = "  ".repeat(depth);
        match self.node() {
            StateNode::Basic { data, .. } => {
                let _ = writeln!(out, "{}(", pad);
                for p in data {
                    let _ = writeln!(out, "{}  {}", pad, nest.display_predicate(*p));
                }
                let _ = writeln!(out, "{})", pad);
            }
            StateNode::Chain { base, curr } => {
                base.write_indented(nest, depth, out);
                let _ = writeln!(out, "{}->", pad);
                curr.write_indented(nest, depth, out);
            }
            StateNode::Choice { choices } => {
                let _ = writeln!(out, "{}(BEGIN", pad);
                for (i, c) in choices.iter().enumerate() {
                    if i > 0 {
                        let _ = writeln!(out, "{}OR", pad);
                    }
                    c.write_indented(nest, depth + 1, out);
                }
                let _ = writeln!(out, "{}END)", pad);
            }
        }
    }
}

impl PartialEq for PredicateState {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.node(), other.node()) {
            (StateNode::Basic { data: a, .. }, StateNode::Basic { data: b, .. }) => a == b,
            (
                StateNode::Chain { base: ab, curr: ac },
                StateNode::Chain { base: bb, curr: bc },
            ) => ac == bc && ab == bb,
            (StateNode::Choice { choices: a }, StateNode::Choice { choices: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for PredicateState {}

impl Hash for PredicateState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.node() {
            StateNode::Basic { data, .. } => {
                0u8.hash(state);
                data.hash(state);
            }
            StateNode::Chain { base, curr } => {
                1u8.hash(state);
                base.hash(state);
                curr.hash(state);
            }
            StateNode::Choice { choices } => {
                2u8.hash(state);
                choices.hash(state);
            }
        }
    }
}

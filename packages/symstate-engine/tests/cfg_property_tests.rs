//! Property-based tests for control-flow graph orderings
//!
//! For any function, `TopologicalSorter::doit` yields every block exactly
//! once with predecessors first, or `None` when the CFG has a cycle.

use proptest::prelude::*;
use std::collections::BTreeSet;
use symstate_engine::features::ir::{Function, FunctionBuilder, TopologicalSorter};
use symstate_engine::shared::models::{BlockId, Locus};

const MAX_BLOCKS: usize = 10;

// ============================================================================
// Generators
// ============================================================================

/// Forward edges of a random DAG plus at most one edge pointing backwards
#[derive(Debug, Clone)]
struct Cfg {
    edges: Vec<Vec<usize>>,
    back: Option<(usize, usize)>,
}

impl Cfg {
    fn build(&self) -> Function {
        let mut fb = FunctionBuilder::new("random");
        let blocks: Vec<BlockId> = (0..self.edges.len())
            .map(|i| fb.block(format!("bb{}", i)))
            .collect();
        for (i, succs) in self.edges.iter().enumerate() {
            let targets: Vec<BlockId> = succs.iter().map(|s| blocks[*s]).collect();
            if targets.is_empty() {
                fb.ret(blocks[i], Locus::unknown());
            } else {
                fb.branch(blocks[i], targets, Locus::unknown());
            }
        }
        fb.build().unwrap()
    }

    /// `from` reaches `to` through forward edges only
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(b) = stack.pop() {
            if b == to {
                return true;
            }
            if seen.insert(b) {
                stack.extend(self.edges[b].iter().copied().filter(|s| *s > b));
            }
        }
        false
    }

    fn has_cycle(&self) -> bool {
        self.back.is_some_and(|(from, to)| self.reaches(to, from))
    }
}

fn cfg(allow_back_edge: bool) -> impl Strategy<Value = Cfg> {
    let back = if allow_back_edge {
        proptest::option::of(any::<(u8, u8)>()).boxed()
    } else {
        Just(None).boxed()
    };
    (
        1..=MAX_BLOCKS,
        prop::collection::vec((any::<u8>(), proptest::option::of(any::<u8>())), MAX_BLOCKS),
        back,
    )
        .prop_map(|(n, picks, back)| {
            let mut edges: Vec<Vec<usize>> = vec![Vec::new(); n];
            for i in 0..n.saturating_sub(1) {
                let span = n - 1 - i;
                let (first, second) = picks[i];
                let first = i + 1 + first as usize % span;
                edges[i].push(first);
                if let Some(second) = second.map(|s| i + 1 + s as usize % span) {
                    if second != first {
                        edges[i].push(second);
                    }
                }
            }
            let back = back.map(|(from, to)| {
                let from = from as usize % n;
                let to = to as usize % (from + 1);
                // at most two targets per branch
                if edges[from].len() == 2 {
                    edges[from].pop();
                }
                edges[from].push(to);
                (from, to)
            });
            Cfg { edges, back }
        })
}

fn check_order(cfg: &Cfg, order: &[BlockId]) -> Result<(), TestCaseError> {
    let n = cfg.edges.len();
    prop_assert_eq!(order.len(), n);
    let distinct: BTreeSet<BlockId> = order.iter().copied().collect();
    prop_assert_eq!(distinct.len(), n);
    let position = |b: usize| order.iter().position(|o| *o == BlockId(b as u32));
    for (from, succs) in cfg.edges.iter().enumerate() {
        for to in succs {
            prop_assert!(position(from) < position(*to), "bb{} after bb{}", from, to);
        }
    }
    Ok(())
}

// ============================================================================
// Proptest Tests
// ============================================================================

proptest! {
    #[test]
    fn prop_acyclic_cfgs_order_every_block_once(cfg in cfg(false)) {
        let function = cfg.build();
        let order = TopologicalSorter::new().doit(&function);
        prop_assert!(order.is_some());
        check_order(&cfg, &order.unwrap_or_default())?;
    }

    #[test]
    fn prop_back_edge_orders_only_without_a_cycle(cfg in cfg(true)) {
        let function = cfg.build();
        match TopologicalSorter::new().doit(&function) {
            Some(order) => {
                prop_assert!(!cfg.has_cycle());
                check_order(&cfg, &order)?;
            }
            None => prop_assert!(cfg.has_cycle()),
        }
    }
}

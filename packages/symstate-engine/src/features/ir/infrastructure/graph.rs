//! Control-flow graph utilities
//!
//! A petgraph view of a `Function`'s blocks with one extra virtual exit node
//! that every returning block flows into. Forward dominators are rooted at the
//! entry block; post-dominators are the dominators of the reversed graph
//! rooted at the virtual exit.

use crate::features::ir::domain::Function;
use crate::shared::models::BlockId;
use petgraph::algo::dominators::simple_fast;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{DfsPostOrder, Reversed};

/// CFG of one function
#[derive(Debug, Clone)]
pub struct CfgGraph {
    /// `None` weight marks the virtual exit
    graph: DiGraph<Option<BlockId>, ()>,
    nodes: Vec<NodeIndex>,
    exit: NodeIndex,
    entry: BlockId,
}

impl CfgGraph {
    pub fn new(function: &Function) -> Self {
        let mut graph = DiGraph::with_capacity(function.block_count() + 1, function.block_count());
        let nodes: Vec<NodeIndex> = function
            .blocks()
            .iter()
            .map(|b| graph.add_node(Some(b.id)))
            .collect();
        let exit = graph.add_node(None);

        for block in function.blocks() {
            let from = nodes[block.id.index()];
            let succs = function.successors(block.id);
            if succs.is_empty() {
                graph.add_edge(from, exit, ());
            }
            for succ in succs {
                graph.add_edge(from, nodes[succ.index()], ());
            }
        }

        Self {
            graph,
            nodes,
            exit,
            entry: function.entry(),
        }
    }

    fn block_of(&self, node: NodeIndex) -> Option<BlockId> {
        self.graph.node_weight(node).copied().flatten()
    }

    pub fn block_count(&self) -> usize {
        self.nodes.len()
    }

    /// Dominator tree rooted at the entry block
    pub fn dominators(&self) -> DominatorTree {
        let doms = simple_fast(&self.graph, self.nodes[self.entry.index()]);
        let idom = self
            .nodes
            .iter()
            .map(|n| doms.immediate_dominator(*n).and_then(|d| self.block_of(d)))
            .collect();
        DominatorTree { idom }
    }

    /// Post-dominator tree; blocks whose only post-dominator is the virtual
    /// exit have no immediate post-dominator
    pub fn post_dominators(&self) -> DominatorTree {
        let reversed = Reversed(&self.graph);
        let doms = simple_fast(reversed, self.exit);
        let idom = self
            .nodes
            .iter()
            .map(|n| doms.immediate_dominator(*n).and_then(|d| self.block_of(d)))
            .collect();
        DominatorTree { idom }
    }

    /// Blocks reachable from the entry, in reverse post-order
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut dfs = DfsPostOrder::new(&self.graph, self.nodes[self.entry.index()]);
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = dfs.next(&self.graph) {
            if let Some(block) = self.block_of(node) {
                order.push(block);
            }
        }
        order.reverse();
        order
    }

    /// Every block exactly once, predecessors first; `None` on a cycle
    pub fn topological_order(&self) -> Option<Vec<BlockId>> {
        let sorted = toposort(&self.graph, None).ok()?;
        Some(sorted.into_iter().filter_map(|n| self.block_of(n)).collect())
    }
}

/// Immediate (post-)dominator per block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominatorTree {
    idom: Vec<Option<BlockId>>,
}

impl DominatorTree {
    /// Immediate dominator; `None` for the root and unreachable blocks
    pub fn immediate(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block.index()).copied().flatten()
    }

    /// Whether `a` dominates `b` (reflexive)
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = Some(b);
        while let Some(c) = cur {
            if c == a {
                return true;
            }
            cur = self.immediate(c);
        }
        false
    }
}

/// Topological order of a function's blocks
#[derive(Debug, Default)]
pub struct TopologicalSorter;

impl TopologicalSorter {
    pub fn new() -> Self {
        Self
    }

    /// All blocks, each exactly once, or `None` when the CFG has a cycle
    pub fn doit(&self, function: &Function) -> Option<Vec<BlockId>> {
        CfgGraph::new(function).topological_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::FunctionBuilder;
    use crate::shared::models::Locus;

    /// entry -> (left | right) -> exit
    fn diamond() -> Function {
        let mut fb = FunctionBuilder::new("diamond");
        let entry = fb.block("entry");
        let left = fb.block("left");
        let right = fb.block("right");
        let exit = fb.block("exit");
        fb.branch(entry, vec![left, right], Locus::unknown());
        fb.branch(left, vec![exit], Locus::unknown());
        fb.branch(right, vec![exit], Locus::unknown());
        fb.ret(exit, Locus::unknown());
        fb.build().unwrap()
    }

    #[test]
    fn test_dominators_of_diamond() {
        let f = diamond();
        let cfg = CfgGraph::new(&f);
        let dt = cfg.dominators();
        assert_eq!(dt.immediate(BlockId(0)), None);
        assert_eq!(dt.immediate(BlockId(1)), Some(BlockId(0)));
        assert_eq!(dt.immediate(BlockId(2)), Some(BlockId(0)));
        assert_eq!(dt.immediate(BlockId(3)), Some(BlockId(0)));
        assert!(dt.dominates(BlockId(0), BlockId(3)));
        assert!(!dt.dominates(BlockId(1), BlockId(3)));
    }

    #[test]
    fn test_post_dominators_of_diamond() {
        let f = diamond();
        let pdt = CfgGraph::new(&f).post_dominators();
        assert_eq!(pdt.immediate(BlockId(0)), Some(BlockId(3)));
        assert_eq!(pdt.immediate(BlockId(1)), Some(BlockId(3)));
        assert_eq!(pdt.immediate(BlockId(2)), Some(BlockId(3)));
        assert_eq!(pdt.immediate(BlockId(3)), None);
    }

    #[test]
    fn test_topological_order_covers_every_block() {
        let f = diamond();
        let order = TopologicalSorter::new().doit(&f).unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], BlockId(0));
        assert_eq!(order[3], BlockId(3));

        let rpo = CfgGraph::new(&f).reverse_post_order();
        assert_eq!(rpo.first(), Some(&BlockId(0)));
        assert_eq!(rpo.last(), Some(&BlockId(3)));
    }

    #[test]
    fn test_cycle_has_no_topological_order() {
        let mut fb = FunctionBuilder::new("loop");
        let entry = fb.block("entry");
        let body = fb.block("body");
        let exit = fb.block("exit");
        fb.branch(entry, vec![body], Locus::unknown());
        fb.branch(body, vec![body, exit], Locus::unknown());
        fb.ret(exit, Locus::unknown());
        let f = fb.build().unwrap();
        assert_eq!(TopologicalSorter::new().doit(&f), None);
    }

    #[test]
    fn test_unreachable_block_is_still_ordered() {
        let mut fb = FunctionBuilder::new("dead");
        let entry = fb.block("entry");
        let dead = fb.block("dead");
        fb.ret(entry, Locus::unknown());
        fb.ret(dead, Locus::unknown());
        let f = fb.build().unwrap();
        let order = TopologicalSorter::new().doit(&f).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(CfgGraph::new(&f).dominators().immediate(dead), None);
    }
}

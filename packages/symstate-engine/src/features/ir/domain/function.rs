//! Function / BasicBlock / Instruction
//!
//! Instructions carry only what the state algorithms branch on: PHI
//! incoming blocks, call sites, and terminator successors. Everything else
//! is `Other` and contributes through the predicate maps alone.

use crate::errors::{EngineError, Result};
use crate::features::term_algebra::TermId;
use crate::shared::models::{BlockId, InstId, Locus};
use serde::{Deserialize, Serialize};

/// Instruction kinds the state algorithms distinguish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    /// PHI node; `incoming` lists the predecessor blocks it has values for
    Phi { incoming: Vec<BlockId> },
    Call {
        callee: String,
        args: Vec<TermId>,
        result: Option<TermId>,
    },
    /// One target is an unconditional branch, two a conditional one
    Branch { targets: Vec<BlockId> },
    Switch { cases: Vec<BlockId>, default: BlockId },
    Return,
    Unreachable,
    Other,
}

impl InstKind {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstKind::Branch { .. }
                | InstKind::Switch { .. }
                | InstKind::Return
                | InstKind::Unreachable
        )
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, InstKind::Phi { .. })
    }

    /// Successor blocks in edge order, duplicates kept
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            InstKind::Branch { targets } => targets.clone(),
            InstKind::Switch { cases, default } => {
                let mut res = cases.clone();
                res.push(*default);
                res
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub block: BlockId,
    pub locus: Locus,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub instructions: Vec<InstId>,
}

/// Formal argument as seen by the state algorithms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionArgument {
    pub term: TermId,
    pub locus: Locus,
}

/// A validated function body
///
/// Blocks and instructions are stored densely; `BlockId(0)` is the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub arguments: Vec<FunctionArgument>,
    /// Globals visible to the function, registered in its initial state
    pub globals: Vec<TermId>,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    predecessors: Vec<Vec<BlockId>>,
}

impl Function {
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, id: InstId) -> &Instruction {
        &self.instructions[id.index()]
    }

    /// Instructions of `block` in program order
    pub fn block_instructions(&self, block: BlockId) -> impl Iterator<Item = &Instruction> {
        self.block(block)
            .instructions
            .iter()
            .map(move |i| self.instruction(*i))
    }

    pub fn terminator(&self, block: BlockId) -> &Instruction {
        // validated non-empty with a terminator last
        let last = self.block(block).instructions[self.block(block).instructions.len() - 1];
        self.instruction(last)
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block).kind.successors()
    }

    /// Predecessor blocks, one entry per distinct predecessor
    pub fn predecessors(&self, block: BlockId) -> &[BlockId] {
        &self.predecessors[block.index()]
    }

    /// Leading PHI nodes of `block`
    pub fn phis(&self, block: BlockId) -> impl Iterator<Item = &Instruction> {
        self.block_instructions(block).take_while(|i| i.kind.is_phi())
    }
}

/// Incremental construction of a `Function`
///
/// ```text
/// let mut fb = FunctionBuilder::new("f");
/// let entry = fb.block("entry");
/// let exit = fb.block("exit");
/// fb.instruction(entry, InstKind::Other, Locus::new("f.c", 2, 3));
/// fb.branch(entry, vec![exit], Locus::new("f.c", 3, 3));
/// fb.ret(exit, Locus::new("f.c", 4, 3));
/// let function = fb.build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct FunctionBuilder {
    name: String,
    arguments: Vec<FunctionArgument>,
    globals: Vec<TermId>,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn argument(&mut self, term: TermId, locus: Locus) -> &mut Self {
        self.arguments.push(FunctionArgument { term, locus });
        self
    }

    pub fn global(&mut self, term: TermId) -> &mut Self {
        self.globals.push(term);
        self
    }

    /// New empty block; the first one created is the entry
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock {
            id,
            name: name.into(),
            instructions: Vec::new(),
        });
        id
    }

    pub fn instruction(&mut self, block: BlockId, kind: InstKind, locus: Locus) -> InstId {
        let id = InstId(self.instructions.len() as u32);
        self.instructions.push(Instruction {
            id,
            block,
            locus,
            kind,
        });
        if let Some(b) = self.blocks.get_mut(block.index()) {
            b.instructions.push(id);
        }
        id
    }

    pub fn phi(&mut self, block: BlockId, incoming: Vec<BlockId>, locus: Locus) -> InstId {
        self.instruction(block, InstKind::Phi { incoming }, locus)
    }

    pub fn call(
        &mut self,
        block: BlockId,
        callee: impl Into<String>,
        args: Vec<TermId>,
        result: Option<TermId>,
        locus: Locus,
    ) -> InstId {
        let kind = InstKind::Call {
            callee: callee.into(),
            args,
            result,
        };
        self.instruction(block, kind, locus)
    }

    pub fn branch(&mut self, block: BlockId, targets: Vec<BlockId>, locus: Locus) -> InstId {
        self.instruction(block, InstKind::Branch { targets }, locus)
    }

    pub fn switch(
        &mut self,
        block: BlockId,
        cases: Vec<BlockId>,
        default: BlockId,
        locus: Locus,
    ) -> InstId {
        self.instruction(block, InstKind::Switch { cases, default }, locus)
    }

    pub fn ret(&mut self, block: BlockId, locus: Locus) -> InstId {
        self.instruction(block, InstKind::Return, locus)
    }

    /// Validate and freeze
    ///
    /// Every block must end in exactly one terminator, branch targets must
    /// exist, and PHI nodes must lead their block.
    pub fn build(self) -> Result<Function> {
        if self.blocks.is_empty() {
            return Err(EngineError::invariant(format!(
                "function {} has no blocks",
                self.name
            )));
        }
        let count = self.blocks.len();
        let mut predecessors: Vec<Vec<BlockId>> = vec![Vec::new(); count];

        for block in &self.blocks {
            let insts: Vec<&Instruction> = block
                .instructions
                .iter()
                .map(|i| &self.instructions[i.index()])
                .collect();
            let Some(last) = insts.last() else {
                return Err(EngineError::invariant(format!(
                    "{}: block {} is empty",
                    self.name, block.name
                )));
            };
            if !last.kind.is_terminator() {
                return Err(EngineError::invariant(format!(
                    "{}: block {} does not end in a terminator",
                    self.name, block.name
                )));
            }
            if insts[..insts.len() - 1].iter().any(|i| i.kind.is_terminator()) {
                return Err(EngineError::invariant(format!(
                    "{}: block {} has a terminator before its end",
                    self.name, block.name
                )));
            }
            let leading_phis = insts.iter().take_while(|i| i.kind.is_phi()).count();
            if insts.iter().filter(|i| i.kind.is_phi()).count() != leading_phis {
                return Err(EngineError::invariant(format!(
                    "{}: PHI nodes of block {} are not grouped at its start",
                    self.name, block.name
                )));
            }
            if let InstKind::Branch { targets } = &last.kind {
                if targets.is_empty() || targets.len() > 2 {
                    return Err(EngineError::invariant(format!(
                        "{}: branch in {} has {} targets",
                        self.name,
                        block.name,
                        targets.len()
                    )));
                }
            }
            for succ in last.kind.successors() {
                if succ.index() >= count {
                    return Err(EngineError::invariant(format!(
                        "{}: block {} jumps to missing {}",
                        self.name, block.name, succ
                    )));
                }
                let preds = &mut predecessors[succ.index()];
                if !preds.contains(&block.id) {
                    preds.push(block.id);
                }
            }
        }

        Ok(Function {
            name: self.name,
            arguments: self.arguments,
            globals: self.globals,
            blocks: self.blocks,
            instructions: self.instructions,
            predecessors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> Function {
        let mut fb = FunctionBuilder::new("diamond");
        let entry = fb.block("entry");
        let left = fb.block("left");
        let right = fb.block("right");
        let exit = fb.block("exit");
        fb.branch(entry, vec![left, right], Locus::new("d.c", 1, 1));
        fb.branch(left, vec![exit], Locus::new("d.c", 2, 1));
        fb.branch(right, vec![exit], Locus::new("d.c", 3, 1));
        fb.phi(exit, vec![left, right], Locus::new("d.c", 4, 1));
        fb.ret(exit, Locus::new("d.c", 5, 1));
        fb.build().unwrap()
    }

    #[test]
    fn test_edges_are_derived_from_terminators() {
        let f = diamond();
        assert_eq!(f.successors(BlockId(0)), vec![BlockId(1), BlockId(2)]);
        assert_eq!(f.predecessors(BlockId(3)), &[BlockId(1), BlockId(2)]);
        assert!(f.predecessors(f.entry()).is_empty());
        assert_eq!(f.phis(BlockId(3)).count(), 1);
        assert_eq!(f.terminator(BlockId(3)).kind, InstKind::Return);
    }

    #[test]
    fn test_build_rejects_malformed_blocks() {
        let mut fb = FunctionBuilder::new("bad");
        let entry = fb.block("entry");
        fb.instruction(entry, InstKind::Other, Locus::unknown());
        assert!(fb.build().unwrap_err().is_invariant());

        let mut fb = FunctionBuilder::new("dangling");
        let entry = fb.block("entry");
        fb.branch(entry, vec![BlockId(7)], Locus::unknown());
        assert!(fb.build().is_err());

        let mut fb = FunctionBuilder::new("late_phi");
        let entry = fb.block("entry");
        fb.instruction(entry, InstKind::Other, Locus::unknown());
        fb.phi(entry, vec![], Locus::unknown());
        fb.ret(entry, Locus::unknown());
        assert!(fb.build().is_err());
    }

    #[test]
    fn test_switch_successors_end_with_default() {
        let kind = InstKind::Switch {
            cases: vec![BlockId(1), BlockId(2)],
            default: BlockId(3),
        };
        assert_eq!(kind.successors(), vec![BlockId(1), BlockId(2), BlockId(3)]);
        assert!(kind.is_terminator());
    }
}

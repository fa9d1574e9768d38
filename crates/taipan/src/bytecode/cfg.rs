//! Control-flow graph produced by the compiler and consumed by the
//! linearizer.

use crate::bytecode::op::Instr;

/// Index of a basic block within its [`Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// The condition attached to a block's out-jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Always,
    /// Pops the condition, jumps when truthy.
    PopIfTrue,
    /// Pops the condition, jumps when falsy.
    PopIfFalse,
    /// Jumps keeping TOS when truthy; pops on fallthrough.
    OrPopIfTrue,
    /// Jumps keeping TOS when falsy; pops on fallthrough.
    OrPopIfFalse,
    /// Pops the handler class; jumps when the exception doesn't match it.
    IfNotExcMatch,
}

/// A maximal straight-line instruction sequence with one entry and one exit.
///
/// A block exits through at most one conditional `jump` plus an optional
/// fall-through `next`. `ForIter`/`SetupFinally`/`SetupWith` instructions
/// inside `instrs` carry [`BlockId`] arguments until linearization patches
/// them to offsets.
#[derive(Debug, Default)]
pub struct Block {
    pub instrs: Vec<Instr>,
    pub next: Option<BlockId>,
    pub jump: Option<(BlockId, JumpKind)>,
    /// Set by the linearizer's traversal; unreachable blocks are not placed.
    pub reachable: bool,
}

/// A function body as basic blocks. Block 0 is the entry.
#[derive(Debug, Default)]
pub struct Cfg {
    pub blocks: Vec<Block>,
}

impl Cfg {
    #[must_use]
    pub fn new() -> Self {
        let mut cfg = Self { blocks: Vec::new() };
        cfg.new_block();
        cfg
    }

    /// Allocates an empty block and returns its id.
    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        BlockId(self.blocks.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }
}

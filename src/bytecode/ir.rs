use crate::bytecode::Op;
use crate::lang::VariableId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a block in [`ProgramBc::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Function,
    If,
    While,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Function => write!(f, "function"),
            BlockKind::If => write!(f, "if"),
            BlockKind::While => write!(f, "while"),
        }
    }
}

/// A single instruction stream. Immutable once generation finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub ops: Vec<Op>,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            ops: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub entry_block: BlockId,
    /// Every local of the function, parameters included. Pre-populated with
    /// `Undefined` in each new call frame.
    pub locals: Vec<VariableId>,
}

/// A compiled bytecode program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramBc {
    pub top_level_variables: Vec<VariableId>,

    /// Compiled functions: name -> entry
    pub functions: BTreeMap<String, FunctionEntry>,

    /// Block arena. Convention: `blocks[i].id == BlockId(i)`.
    pub blocks: Vec<Block>,
}

impl ProgramBc {
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }
}

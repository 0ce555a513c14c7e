use serde::{Deserialize, Serialize};

use crate::bytecode::ir::BlockId;
use crate::lang::{BinaryOp, SystemCallKind, VariableId};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Op {
    // ───────────────────────────── Literals ─────────────────────────────
    /// Stack effect: `( -- s )`
    PushString { value: String },

    /// Stack effect: `( -- n )`
    PushInteger { value: i64 },

    /// Stack effect: `( -- b )`
    PushBoolean { value: bool },

    /// Stack effect: `( -- undefined )`
    PushUndefined,

    /// Push a deferred read of a variable, not its value.
    ///
    /// Stack effect: `( -- &x )`
    PushVariable { variable: VariableId },

    // ─────────────────────────── Stack operations ───────────────────────
    /// Discard the top operand.
    ///
    /// Stack effect: `( x -- )`
    Pop,

    // ─────────────────────────────── Variables ──────────────────────────
    /// Write `value` through the reference on top and re-push the value.
    ///
    /// Stack effect: `( value &x -- value )`
    AssignVariable,

    /// Bind a parameter: write the resolved operand straight to `target`.
    ///
    /// Stack effect: `( value -- )`
    AssignVariableDirect { target: VariableId },

    // ───────────────────────────── Expressions ──────────────────────────
    /// Stack effect: `( lhs rhs -- result )`
    BinaryExpression { op: BinaryOp },

    /// Stack effect: `( &arr index -- element )`
    ArrayGet,

    /// Stack effect: `( &arr index value -- undefined )`
    ArraySet,

    // ───────────────────────────── Calls ────────────────────────────────
    /// Enter the entry block of a named function.
    ///
    /// Stack effect: `( args... -- args... )`, bound by the callee.
    Call { target: String },

    /// Invoke a VM primitive with `length` arguments.
    ///
    /// Stack effect: `( a1 .. an -- result )`
    SystemCall { call: SystemCallKind, length: usize },

    // ───────────────────────────── Control flow ─────────────────────────
    /// Unconditionally enter a block.
    EnterBlock { block: BlockId },

    /// Leave the current block normally.
    ExitBlock,

    /// Enter a block only if the popped condition is true.
    ///
    /// Stack effect: `( cond -- )`
    BranchEnter { block: BlockId },

    /// Leave the current block if the popped condition is false.
    ///
    /// Stack effect: `( cond -- )`
    BranchReturn,

    /// Unwind to and out of the enclosing function frame.
    ///
    /// Stack effect: `( value -- resolved )`
    Return,

    /// Restart the nearest enclosing while block.
    Continue,

    /// Leave the while block on top of the block stack.
    Break,
}

impl Op {
    /// True for instructions after which control never reaches the next
    /// instruction of the same block.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Return | Op::ExitBlock | Op::Continue | Op::Break)
    }

    /// Block referenced by this instruction, if any.
    pub fn block_target(&self) -> Option<BlockId> {
        match self {
            Op::EnterBlock { block } | Op::BranchEnter { block } => Some(*block),
            _ => None,
        }
    }
}

use crate::bytecode::{BlockId, BlockKind};
use crate::lang::{TypeMismatch, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlFlowError {
    #[error("continue outside a loop")]
    ContinueOutsideLoop,
    #[error("break outside a loop")]
    BreakOutsideLoop,
    #[error("return outside a function")]
    ReturnOutsideFunction,
    #[error("ran past the end of the block")]
    EndOfBlock,
}

/// Everything that can stop a run.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("stack underflow: needed {needed} operand(s), found {found}")]
    StackUnderflow { needed: usize, found: usize },

    #[error("block {0} not found")]
    BlockNotFound(BlockId),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    #[error("undefined variable {0}")]
    UndefinedVariable(VariableId),

    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    #[error("invalid assignment target: expected a variable reference, got {0}")]
    InvalidAssignmentTarget(&'static str),

    #[error("control flow error: {0}")]
    ControlFlow(#[from] ControlFlowError),

    #[error("cyclic reference through variable {0}")]
    CyclicReference(VariableId),

    #[error("{what} limit exceeded ({limit})")]
    LimitExceeded { what: &'static str, limit: usize },

    #[error("interrupted while waiting for input")]
    Interrupted,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Position of an instruction inside the block stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub block: BlockId,
    pub kind: BlockKind,
    pub ip: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {} ({}) ip={}", self.block, self.kind, self.ip)
    }
}

#[derive(Debug)]
pub struct RuntimeError {
    pub fault: Fault,
    /// The failing instruction. `None` when the fault happened before any
    /// block was entered.
    pub location: Option<Location>,
    /// Active blocks at the time of the fault, innermost first.
    pub trace: Vec<Location>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.fault)?;

        if let Some(location) = &self.location {
            write!(f, "\n  at {}", location)?;
        }

        if !self.trace.is_empty() {
            write!(f, "\n  block stack:")?;

            for (i, frame) in self.trace.iter().enumerate() {
                write!(f, "\n    {}: {}", i, frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.fault)
    }
}

impl RuntimeError {
    pub fn new(fault: Fault) -> Self {
        RuntimeError {
            fault,
            location: None,
            trace: Vec::new(),
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_trace(mut self, trace: Vec<Location>) -> Self {
        self.trace = trace;
        self
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.fault {
            Fault::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<Fault> for RuntimeError {
    fn from(fault: Fault) -> Self {
        RuntimeError::new(fault)
    }
}

pub fn stack_underflow(needed: usize, found: usize) -> Fault {
    Fault::StackUnderflow { needed, found }
}

pub mod artifact;
pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod validate;

pub use compile::{Generator, generate};
pub use compile_error::CompileError;
pub use ir::{Block, BlockId, BlockKind, FunctionEntry, ProgramBc};
pub use op::Op;
pub use validate::{ValidationError, validate};

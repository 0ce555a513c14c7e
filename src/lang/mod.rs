//! # Typed program representation
//!
//! This module defines the input of the code generator: a fully resolved
//! program tree produced by the semantic builder, plus the runtime [`Value`]
//! shared by the virtual machine.
//!
//! ## Documentation conventions
//!
//! - Stack effects are written as `( before -- after )`.
//! - `&x` denotes a [`Value::VariableRef`] naming variable `x`.

pub mod builder;
pub mod program;
pub mod value;

pub use builder::ProgramBuilder;
pub use program::{
    BinaryOp, Expression, FunctionDecl, Program, Statement, SystemCallKind, Type, Variable,
    VariableId,
};
pub use value::{TypeMismatch, Value};

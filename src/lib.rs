//! Code generator and block-structured stack machine for a small
//! imperative language.
//!
//! A resolved [`lang::Program`] is lowered by [`bytecode::generate`] into a
//! [`bytecode::ProgramBc`], a set of instruction blocks, which
//! [`runtime::VmBc`] executes.

pub mod bytecode;
pub mod demos;
pub mod lang;
pub mod runtime;

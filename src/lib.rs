//! k0 virtual machine library.
//!
//! A minimal register-based bytecode virtual machine: a fetch-execute loop
//! over a small instruction set operating on per-call register files, with
//! function-call semantics and heap memory access.
//!
//! # Architecture
//!
//! - **Registers**: per-activation 64-bit integer slots, dynamically bound on
//!   first write
//! - **Control flow**: functions are graphs of basic blocks addressed by
//!   integer id; every block ends by an explicit BR, CALL-then-fallthrough,
//!   or RET
//! - **Call stack**: one execution context per in-progress call; program
//!   termination is the stack emptying
//! - **Memory**: ALLOCA'd regions are owned by the allocating context and
//!   released on its RET; loads and stores are bounds-checked by default,
//!   with an opt-in unchecked raw-memory model
//!
//! # Program model
//!
//! Programs are built by direct data construction: [`isa::Instruction`]s are
//! grouped into blocks, blocks into a [`program::Function`], and functions
//! are registered in a [`program::FunctionRegistry`] which validates them and
//! hands back the ids CALL operands use.
//!
//! # Modules
//!
//! - [`engine`]: Core execution engine, contexts, registers, memory
//! - [`errors`]: Execution and validation error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`program`]: Function/basic-block construction and the function registry
//! - [`utils`]: Logging

pub mod engine;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod program;
pub mod utils;

//! Bytecode compilation and execution.
//!
//! This module holds the compiled representation and both halves of the
//! back end: the CFG-building compiler with its linearizer, and the stack
//! virtual machine.
//!
//! # Module structure
//!
//! - `op` - opcode and instruction definitions
//! - `code` - code objects and stored comprehension constants
//! - `cfg` - basic blocks and control-flow edges
//! - `compiler` - AST to CFG
//! - `linear` - CFG to flat instructions with resolved offsets
//! - `vm` - frame evaluation

pub mod cfg;
pub mod code;
pub mod compiler;
pub mod linear;
pub mod op;
pub mod vm;

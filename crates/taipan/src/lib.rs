//! A bytecode compiler and stack virtual machine for a Python subset.
//!
//! The pipeline has four phases glued by three data contracts: an
//! indentation-aware lexer produces a token stream, a recursive-descent
//! parser produces an AST, a CFG-building compiler lowers each code object to
//! linear bytecode, and a stack VM executes frames with Python-faithful
//! semantics (arbitrary-precision integers, closures, generators,
//! exceptions, context managers, pattern matching).
//!
//! The entry points are [`run`], [`run_file`] and the reusable
//! [`Interpreter`], which owns all mutable interpreter state.

#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked at the boundaries")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts follow checked index math")]
#![expect(clippy::cast_possible_wrap, reason = "wrap behavior mirrors the reference interpreter")]
#![allow(clippy::missing_panics_doc, reason = "panics are internal invariant violations")]

pub mod args;
pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod exception;
pub mod fstring;
pub mod io;
pub mod lexer;
mod modules;
pub mod parser;
mod py_hash;
pub mod run;
pub mod scope;
pub mod tracer;
pub mod types;
pub mod value;

pub use crate::{
    exception::{ExcType, Exception},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    run::{InterpOptions, Interpreter, run, run_capture, run_file},
    tracer::{CountingTracer, NoopTracer, StderrTracer, VmTracer},
    value::Value,
};

//! VM execution tracing.
//!
//! The tracer is the interpreter's observability seam: the VM reports opcode
//! dispatch and frame push/pop events to whichever implementation the
//! embedder selects. The default `NoopTracer` compiles down to nothing;
//! `StderrTracer` prints a line per event for debugging interpreter issues.

use crate::bytecode::op::Opcode;

/// Receives VM execution events.
pub trait VmTracer {
    fn on_instruction(&mut self, code_name: &str, pc: usize, op: Opcode) {
        let _ = (code_name, pc, op);
    }

    fn on_frame_push(&mut self, code_name: &str) {
        let _ = code_name;
    }

    fn on_frame_pop(&mut self, code_name: &str) {
        let _ = code_name;
    }
}

/// Tracer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Tracer that logs every event to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer {
    depth: usize,
}

impl VmTracer for StderrTracer {
    fn on_instruction(&mut self, code_name: &str, pc: usize, op: Opcode) {
        eprintln!("{:indent$}{code_name}:{pc} {op:?}", "", indent = self.depth * 2);
    }

    fn on_frame_push(&mut self, code_name: &str) {
        eprintln!("{:indent$}-> {code_name}", "", indent = self.depth * 2);
        self.depth += 1;
    }

    fn on_frame_pop(&mut self, code_name: &str) {
        self.depth = self.depth.saturating_sub(1);
        eprintln!("{:indent$}<- {code_name}", "", indent = self.depth * 2);
    }
}

/// Tracer that counts events; used by tests.
#[derive(Debug, Default)]
pub struct CountingTracer {
    pub instructions: usize,
    pub frames: usize,
}

impl VmTracer for CountingTracer {
    fn on_instruction(&mut self, _code_name: &str, _pc: usize, _op: Opcode) {
        self.instructions += 1;
    }

    fn on_frame_push(&mut self, _code_name: &str) {
        self.frames += 1;
    }
}

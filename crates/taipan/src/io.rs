//! Output abstraction for the `print()` builtin.
//!
//! All interpreter stdout goes through a `PrintWriter`, so embedders and the
//! test suite can capture output byte-for-byte instead of scraping the
//! process's stdout.

use std::{
    cell::RefCell,
    io::{self, Write as _},
    rc::Rc,
};

/// Sink for `print()` output.
pub trait PrintWriter {
    /// Writes one already-formatted chunk (separators and terminator
    /// included).
    fn write(&mut self, text: &str);

    /// Flushes any buffered output; called when a program finishes.
    fn flush(&mut self) {}
}

/// Default writer: buffered process stdout.
#[derive(Debug, Default)]
pub struct StdPrint {
    buffer: String,
}

impl PrintWriter for StdPrint {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
        // Keep interactive output timely without a syscall per print.
        if self.buffer.len() >= 8192 || text.contains('\n') {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let _ = io::stdout().write_all(self.buffer.as_bytes());
            let _ = io::stdout().flush();
            self.buffer.clear();
        }
    }
}

/// Writer that collects output into a string, for tests and embedding.
///
/// Clones share the same buffer, so a caller can keep a handle while the
/// interpreter owns the writer.
#[derive(Debug, Default, Clone)]
pub struct CollectStringPrint {
    output: Rc<RefCell<String>>,
}

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The output collected so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Takes the collected output, leaving the buffer empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut self.output.borrow_mut())
    }
}

impl PrintWriter for CollectStringPrint {
    fn write(&mut self, text: &str) {
        self.output.borrow_mut().push_str(text);
    }
}

/// Writer that discards everything.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_string_print() {
        let mut w = CollectStringPrint::new();
        let handle = w.clone();
        w.write("a");
        w.write("b\n");
        assert_eq!(handle.output(), "ab\n");
        assert_eq!(handle.take(), "ab\n");
        assert_eq!(handle.output(), "");
    }
}

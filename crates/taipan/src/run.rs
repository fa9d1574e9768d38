//! Public interface for running Python source.
//!
//! An [`Interpreter`] owns every piece of mutable global state: the module
//! cache, the module search paths, the output writer and the tracer. There
//! are no process-wide singletons; two interpreters never share state.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use ahash::AHashMap;

use crate::{
    builtins::Builtin,
    bytecode::{
        compiler,
        vm::{Frame, FrameExit, Vm},
    },
    exception::{ExcType, Exception, RunError},
    io::{PrintWriter, StdPrint},
    parser,
    scope::Scope,
    tracer::{NoopTracer, VmTracer},
    value::Value,
};

/// Construction options for an [`Interpreter`].
pub struct InterpOptions {
    /// Module search paths, highest priority first.
    pub search_paths: Vec<PathBuf>,
    /// Maximum Python call depth before `RecursionError`.
    pub recursion_limit: usize,
    pub printer: Box<dyn PrintWriter>,
    pub tracer: Box<dyn VmTracer>,
}

impl Default for InterpOptions {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
            recursion_limit: 1000,
            printer: Box::new(StdPrint::default()),
            tracer: Box::new(NoopTracer),
        }
    }
}

/// One interpreter instance: compiles and executes programs.
///
/// # Example
/// ```
/// use taipan::Interpreter;
///
/// let mut interp = Interpreter::new();
/// let result = interp.run("1 + 1").unwrap();
/// assert_eq!(result.py_repr(), "2");
/// ```
pub struct Interpreter {
    pub(crate) modules: AHashMap<String, Value>,
    pub(crate) search_paths: Vec<PathBuf>,
    pub(crate) printer: Box<dyn PrintWriter>,
    pub(crate) tracer: Box<dyn VmTracer>,
    pub(crate) recursion_limit: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(InterpOptions::default())
    }

    #[must_use]
    pub fn with_options(options: InterpOptions) -> Self {
        Self {
            modules: AHashMap::new(),
            search_paths: options.search_paths,
            printer: options.printer,
            tracer: options.tracer,
            recursion_limit: options.recursion_limit,
        }
    }

    /// Looks up a built-in function or exception class by name.
    #[must_use]
    pub(crate) fn builtin(&self, name: &str) -> Option<Value> {
        if let Ok(builtin) = Builtin::from_str(name) {
            return Some(Value::Builtin(builtin));
        }
        if let Ok(exc_type) = ExcType::from_str(name) {
            return Some(Value::ExcClass(exc_type));
        }
        None
    }

    /// Executes `source` as a module and returns the value of its last
    /// expression statement (`None` when there is none).
    pub fn run(&mut self, source: &str) -> Result<Value, Exception> {
        let result = self.run_inner(source);
        self.printer.flush();
        result.map_err(public_exception)
    }

    /// Reads and executes a `.py` file.
    ///
    /// The file's directory becomes the highest-priority module search path,
    /// ahead of the working directory.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> Result<Value, Exception> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| Exception::new("FileNotFoundError", format!("{}: {e}", path.display())))?;
        if let Some(dir) = path.parent() {
            let dir = if dir.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                dir.to_path_buf()
            };
            if !self.search_paths.contains(&dir) {
                self.search_paths.insert(0, dir);
            }
        }
        self.run(&source)
    }

    fn run_inner(&mut self, source: &str) -> Result<Value, RunError> {
        let program = parser::parse(source)?;
        let code = compiler::compile_module(&program)?;
        let scope = Scope::new_module();
        let mut frame = Frame::new(code, scope);
        let mut vm = Vm::new(self);
        match vm.run_frame(&mut frame)? {
            FrameExit::Return(value) => Ok(value),
            FrameExit::Yield(_) => Err(RunError::internal("module frame yielded")),
        }
    }
}

/// Executes `source` with a fresh default interpreter.
pub fn run(source: &str) -> Result<Value, Exception> {
    Interpreter::new().run(source)
}

/// Executes the file at `path` with a fresh default interpreter.
pub fn run_file(path: impl AsRef<Path>) -> Result<Value, Exception> {
    Interpreter::new().run_file(path)
}

/// Converts an internal error into the public exception shape.
fn public_exception(err: RunError) -> Exception {
    match err {
        RunError::Simple(simple) => Exception::new(simple.exc_type.to_string(), simple.message.unwrap_or_default()),
        RunError::Raised(value) => match &value {
            Value::Exc(exc) => Exception::new(exc.exc_type.to_string(), exc.message_text()),
            Value::Instance(instance) => {
                let message = instance
                    .attrs
                    .borrow()
                    .get("message")
                    .map(Value::py_str)
                    .unwrap_or_default();
                Exception::new(instance.class.name.to_string(), message)
            }
            other => Exception::new("Exception", other.py_str()),
        },
        RunError::Internal(context) => Exception::new("InternalError", context),
    }
}

/// Convenience for tests and embedders: runs `source` and returns captured
/// stdout instead of writing to the process's.
pub fn run_capture(source: &str) -> Result<(Value, String), Exception> {
    let collector = crate::io::CollectStringPrint::new();
    let mut interp = Interpreter::with_options(InterpOptions {
        printer: Box::new(collector.clone()),
        ..InterpOptions::default()
    });
    let value = interp.run(source)?;
    Ok((value, collector.take()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_returns_last_expression() {
        assert_eq!(run("1 + 1").unwrap().py_repr(), "2");
        assert_eq!(run("x = 5").unwrap().py_repr(), "None");
        assert_eq!(run("x = 5\nx * 2").unwrap().py_repr(), "10");
    }

    #[test]
    fn test_uncaught_exception_is_public() {
        let err = run("raise ValueError('boom')").unwrap_err();
        assert_eq!(err.to_string(), "ValueError: boom");
    }

    #[test]
    fn test_syntax_error_reported_before_execution() {
        let err = run("print('side effect')\ndef :\n").unwrap_err();
        assert_eq!(err.type_name, "SyntaxError");
    }

    #[test]
    fn test_run_capture() {
        let (value, output) = run_capture("print('hi')\n42").unwrap();
        assert_eq!(output, "hi\n");
        assert_eq!(value.py_repr(), "42");
    }
}

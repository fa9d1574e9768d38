//! Exception types and the error discriminant threaded through every opcode.
//!
//! Errors come in three tiers: compile-time syntax errors (fatal before any
//! execution), runtime exceptions rooted at `Exception` (catchable, flowing
//! through the block stack), and internal invariant violations (uncatchable,
//! reported with the offending code object and program counter).

use std::fmt::{self, Display, Write};

use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Exception types built into the interpreter.
///
/// Uses strum derives so type names round-trip between raised errors and the
/// exception classes visible in user scopes (e.g. `ValueError` -> "ValueError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    /// Primary exception class; matches any catchable exception.
    Exception,

    /// Raised by `generator.close()`; deliberately not caught by `except Exception`.
    GeneratorExit,

    // --- LookupError hierarchy ---
    LookupError,
    IndexError,
    KeyError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    NotImplementedError,
    RecursionError,

    // --- NameError hierarchy ---
    NameError,
    UnboundLocalError,

    // --- OSError hierarchy ---
    OSError,
    FileNotFoundError,

    // --- SyntaxError hierarchy (compile-time tier) ---
    SyntaxError,
    IndentationError,

    // --- Standalone exception types ---
    ArithmeticError,
    OverflowError,
    ZeroDivisionError,
    AssertionError,
    AttributeError,
    ImportError,
    StopIteration,
    TypeError,
    ValueError,
}

impl ExcType {
    /// Checks whether `except handler:` with class `handler` catches `self`.
    ///
    /// Implements the subset of Python's exception hierarchy this interpreter
    /// carries: `Exception` is the root of everything catchable except
    /// `GeneratorExit`, with `LookupError`, `RuntimeError`, `NameError`,
    /// `OSError`, `SyntaxError` and `ArithmeticError` as intermediate classes.
    #[must_use]
    pub fn is_subclass_of(self, handler: Self) -> bool {
        if self == handler {
            return true;
        }
        match handler {
            Self::Exception => self != Self::GeneratorExit,
            Self::LookupError => matches!(self, Self::IndexError | Self::KeyError),
            Self::RuntimeError => matches!(self, Self::NotImplementedError | Self::RecursionError),
            Self::NameError => self == Self::UnboundLocalError,
            Self::OSError => self == Self::FileNotFoundError,
            Self::SyntaxError => self == Self::IndentationError,
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            _ => false,
        }
    }

    /// Shorthand for a `TypeError` with the given message.
    pub fn type_error(message: impl Into<String>) -> RunError {
        RunError::new(Self::TypeError, message)
    }

    /// Shorthand for a `ValueError` with the given message.
    pub fn value_error(message: impl Into<String>) -> RunError {
        RunError::new(Self::ValueError, message)
    }

    /// `NameError` for an undefined name.
    pub fn name_error(name: &str) -> RunError {
        RunError::new(Self::NameError, format!("name '{name}' is not defined"))
    }

    /// `UnboundLocalError` for a local read before assignment.
    pub fn unbound_local_error(name: &str) -> RunError {
        RunError::new(
            Self::UnboundLocalError,
            format!("cannot access local variable '{name}' where it is not associated with a value"),
        )
    }

    /// `AttributeError` for a missing attribute.
    pub fn attribute_error(type_name: &str, attr: &str) -> RunError {
        RunError::new(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    /// `TypeError` for a binary operator applied to unsupported operand types.
    pub fn binary_type_error(op: &str, lhs: &str, rhs: &str) -> RunError {
        RunError::new(
            Self::TypeError,
            format!("unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'"),
        )
    }
}

/// A raised exception carried as `(type, message)` before normalization.
#[derive(Debug, Clone)]
pub struct SimpleException {
    pub exc_type: ExcType,
    pub message: Option<String>,
}

impl SimpleException {
    pub fn new(exc_type: ExcType) -> Self {
        Self { exc_type, message: None }
    }

    pub fn new_msg(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: Some(message.into()),
        }
    }
}

impl Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) if !m.is_empty() => write!(f, "{}: {m}", self.exc_type),
            _ => write!(f, "{}", self.exc_type),
        }
    }
}

/// Error discriminant returned by every fallible VM operation.
///
/// `Simple` and `Raised` are catchable and flow through the block stack;
/// `Internal` indicates a compiler or VM bug and terminates execution with a
/// diagnostic naming the code object and program counter.
#[derive(Debug, Clone)]
pub enum RunError {
    /// A VM-raised exception that has not been normalized to an object yet.
    Simple(SimpleException),
    /// A user-raised (or already normalized) exception object.
    Raised(Value),
    /// An internal invariant violation; never catchable.
    Internal(String),
}

impl RunError {
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self::Simple(SimpleException::new_msg(exc_type, message))
    }

    pub fn plain(exc_type: ExcType) -> Self {
        Self::Simple(SimpleException::new(exc_type))
    }

    /// Compile-time syntax error; surfaces before any execution.
    pub fn syntax(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self::Simple(SimpleException::new_msg(exc_type, message))
    }

    /// Internal invariant violation pinpointing a code object and pc.
    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal(context.into())
    }

    /// True if the error can be caught by an `except` handler.
    #[must_use]
    pub fn is_catchable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Simple(exc)
    }
}

/// Public exception surfaced by [`crate::Interpreter`] entry points.
///
/// Formats as `<TypeName>: <message>` to match what the reference interpreter
/// prints for an uncaught exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub type_name: String,
    pub message: String,
}

impl Exception {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)?;
        if !self.message.is_empty() {
            f.write_char(':')?;
            f.write_char(' ')?;
            f.write_str(&self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Exception {}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_subclass_relations() {
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::Exception));
        assert!(ExcType::ZeroDivisionError.is_subclass_of(ExcType::ArithmeticError));
        assert!(ExcType::UnboundLocalError.is_subclass_of(ExcType::NameError));
        assert!(ExcType::IndexError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::FileNotFoundError.is_subclass_of(ExcType::OSError));
        assert!(!ExcType::ValueError.is_subclass_of(ExcType::TypeError));
        assert!(!ExcType::GeneratorExit.is_subclass_of(ExcType::Exception));
    }

    #[test]
    fn test_name_round_trip() {
        assert_eq!(ExcType::ValueError.to_string(), "ValueError");
        assert_eq!(ExcType::from_str("ValueError").unwrap(), ExcType::ValueError);
        assert!(ExcType::from_str("NoSuchError").is_err());
    }

    #[test]
    fn test_exception_display() {
        assert_eq!(Exception::new("ValueError", "boom").to_string(), "ValueError: boom");
        assert_eq!(Exception::new("StopIteration", "").to_string(), "StopIteration");
    }
}

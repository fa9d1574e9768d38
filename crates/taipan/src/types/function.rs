//! Function, bound-method and builtin-method objects.

use std::rc::Rc;

use crate::{bytecode::code::Code, scope::ScopeRef, value::Value};

/// A user-defined function (or lambda).
///
/// The closure scope is shared with the defining frame; it lives as long as
/// any holder, which is how captured variables outlive their frame.
#[derive(Debug)]
pub struct Function {
    pub name: Rc<str>,
    pub code: Rc<Code>,
    /// Default values for the trailing defaulted parameters, evaluated at
    /// `def` time in the enclosing scope, in parameter order.
    pub defaults: Vec<Value>,
    pub closure: ScopeRef,
}

impl Function {
    #[must_use]
    pub fn is_generator(&self) -> bool {
        self.code.is_generator
    }
}

/// A user function bound to an instance; calling it prepends the receiver.
#[derive(Debug)]
pub struct BoundMethod {
    pub func: Value,
    pub receiver: Value,
}

impl BoundMethod {
    #[must_use]
    pub fn py_repr(&self) -> String {
        let name = match &self.func {
            Value::Function(f) => f.name.to_string(),
            other => other.py_repr(),
        };
        format!("<bound method {} of {}>", name, self.receiver.py_repr())
    }
}

/// A method of a built-in type bound to its receiver; dispatched by name.
#[derive(Debug)]
pub struct BuiltinMethod {
    pub receiver: Value,
    pub name: Rc<str>,
}

impl BuiltinMethod {
    #[must_use]
    pub fn py_repr(&self) -> String {
        format!(
            "<built-in method {} of {} object>",
            self.name,
            self.receiver.type_name()
        )
    }
}

//! User classes, instances and built-in exception instances.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{exception::ExcType, value::Value};

/// A user-defined class: a name, base list and attribute map.
#[derive(Debug)]
pub struct ClassObject {
    pub name: Rc<str>,
    /// Base classes: `Value::Class` or `Value::ExcClass` entries.
    pub bases: Vec<Value>,
    pub attrs: RefCell<IndexMap<Rc<str>, Value>>,
}

impl ClassObject {
    /// Looks `name` up on this class, then its bases left-to-right DFS.
    #[must_use]
    pub fn mro_lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.attrs.borrow().get(name) {
            return Some(v.clone());
        }
        for base in &self.bases {
            if let Value::Class(base) = base
                && let Some(v) = base.mro_lookup(name)
            {
                return Some(v);
            }
        }
        None
    }

    /// True if `other` appears in this class's MRO.
    #[must_use]
    pub fn derives_from(&self, other: &Rc<Self>) -> bool {
        if std::ptr::eq(self, Rc::as_ptr(other)) {
            return true;
        }
        self.bases.iter().any(|base| match base {
            Value::Class(base) => base.derives_from(other),
            _ => false,
        })
    }

    /// The built-in exception type this class descends from, if any.
    #[must_use]
    pub fn exception_root(&self) -> Option<ExcType> {
        for base in &self.bases {
            match base {
                Value::ExcClass(t) => return Some(*t),
                Value::Class(base) => {
                    if let Some(t) = base.exception_root() {
                        return Some(t);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// An instance of a user-defined class.
#[derive(Debug)]
pub struct InstanceObject {
    pub class: Rc<ClassObject>,
    pub attrs: RefCell<IndexMap<Rc<str>, Value>>,
}

impl InstanceObject {
    #[must_use]
    pub fn new(class: Rc<ClassObject>) -> Self {
        Self {
            class,
            attrs: RefCell::new(IndexMap::new()),
        }
    }
}

/// An instance of a built-in exception class.
///
/// Carries both the `args` tuple and the `message` attribute users read in
/// `except E as e: print(e.message)`.
#[derive(Debug)]
pub struct ExcObject {
    pub exc_type: ExcType,
    pub args: Vec<Value>,
}

impl ExcObject {
    #[must_use]
    pub fn new(exc_type: ExcType, args: Vec<Value>) -> Self {
        Self { exc_type, args }
    }

    #[must_use]
    pub fn from_message(exc_type: ExcType, message: Option<String>) -> Self {
        let args = match message {
            Some(m) => vec![Value::str(m)],
            None => vec![],
        };
        Self { exc_type, args }
    }

    /// The `message` attribute: the single positional argument as text.
    #[must_use]
    pub fn message_text(&self) -> String {
        match self.args.len() {
            0 => String::new(),
            1 => self.args[0].py_str(),
            _ => {
                let parts: Vec<String> = self.args.iter().map(Value::py_repr).collect();
                format!("({})", parts.join(", "))
            }
        }
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        let parts: Vec<String> = self.args.iter().map(Value::py_repr).collect();
        format!("{}({})", self.exc_type, parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, bases: Vec<Value>) -> Rc<ClassObject> {
        Rc::new(ClassObject {
            name: Rc::from(name),
            bases,
            attrs: RefCell::new(IndexMap::new()),
        })
    }

    #[test]
    fn test_mro_left_to_right_depth_first() {
        let a = class("A", vec![]);
        a.attrs.borrow_mut().insert(Rc::from("x"), Value::Int(1));
        let b = class("B", vec![]);
        b.attrs.borrow_mut().insert(Rc::from("x"), Value::Int(2));
        let c = class("C", vec![Value::Class(a.clone()), Value::Class(b)]);
        assert!(matches!(c.mro_lookup("x"), Some(Value::Int(1))));
        assert!(c.mro_lookup("y").is_none());
        assert!(c.derives_from(&a));
        assert!(!a.derives_from(&c));
    }

    #[test]
    fn test_exception_root() {
        let base = class("MyError", vec![Value::ExcClass(ExcType::ValueError)]);
        let derived = class("Sub", vec![Value::Class(base)]);
        assert_eq!(derived.exception_root(), Some(ExcType::ValueError));
        let plain = class("Plain", vec![]);
        assert_eq!(plain.exception_root(), None);
    }

    #[test]
    fn test_exc_object_message() {
        let e = ExcObject::from_message(ExcType::ValueError, Some("boom".into()));
        assert_eq!(e.message_text(), "boom");
        assert_eq!(e.py_repr(), "ValueError('boom')");
        let empty = ExcObject::new(ExcType::StopIteration, vec![]);
        assert_eq!(empty.message_text(), "");
    }
}

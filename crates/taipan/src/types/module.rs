//! Module objects: a name bound to an executed module scope.

use std::rc::Rc;

use crate::{scope::ScopeRef, value::Value};

/// An imported module. Attribute access reads the module scope.
#[derive(Debug)]
pub struct ModuleObject {
    pub name: Rc<str>,
    pub scope: ScopeRef,
}

impl ModuleObject {
    #[must_use]
    pub fn new(name: Rc<str>, scope: ScopeRef) -> Self {
        Self { name, scope }
    }

    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.scope.borrow().get_local(name)
    }

    pub fn set_attr(&self, name: Rc<str>, value: Value) {
        self.scope.borrow_mut().set_local(name, value);
    }
}

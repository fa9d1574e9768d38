//! Lexical scope chain with `global`/`nonlocal` binding annotations.
//!
//! A scope is one link of the chain a frame resolves names through. Function
//! scopes back both the name-based opcodes and the fast-local opcodes (fast
//! locals are compile-time classified but share this storage so closures can
//! observe them). Class bodies get a scope flagged `is_class_scope`, which
//! enclosing-scope lookups skip, matching Python's scoping rule.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::value::Value;

/// Shared handle to a scope; closures keep their defining scope alive.
pub type ScopeRef = Rc<RefCell<Scope>>;

/// One name→value mapping in the lexical chain.
#[derive(Debug, Default)]
pub struct Scope {
    pub values: IndexMap<Rc<str>, Value>,
    pub parent: Option<ScopeRef>,
    /// Names declared `global` in this scope.
    pub globals: AHashSet<Rc<str>>,
    /// Names declared `nonlocal` in this scope.
    pub nonlocals: AHashSet<Rc<str>>,
    /// Class bodies are skipped by enclosing-scope name resolution.
    pub is_class_scope: bool,
}

impl Scope {
    /// A fresh module-level (root) scope.
    #[must_use]
    pub fn new_module() -> ScopeRef {
        Rc::new(RefCell::new(Self::default()))
    }

    /// A child scope for a function call or class body.
    #[must_use]
    pub fn new_child(parent: ScopeRef, is_class_scope: bool) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            is_class_scope,
            ..Self::default()
        }))
    }

    /// Looks a name up in this scope only.
    #[must_use]
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    pub fn set_local(&mut self, name: Rc<str>, value: Value) {
        self.values.insert(name, value);
    }

    pub fn delete_local(&mut self, name: &str) -> bool {
        self.values.shift_remove(name).is_some()
    }
}

/// Resolves a name through the chain starting at `scope`.
///
/// The starting scope is always consulted; enclosing class scopes are skipped.
#[must_use]
pub fn lookup(scope: &ScopeRef, name: &str) -> Option<Value> {
    if let Some(v) = scope.borrow().get_local(name) {
        return Some(v);
    }
    let mut current = scope.borrow().parent.clone();
    while let Some(s) = current {
        let borrowed = s.borrow();
        if !borrowed.is_class_scope
            && let Some(v) = borrowed.get_local(name)
        {
            return Some(v);
        }
        current = borrowed.parent.clone();
    }
    None
}

/// Returns the root (module) scope of the chain.
#[must_use]
pub fn root(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let parent = current.borrow().parent.clone();
        match parent {
            Some(p) => current = p,
            None => return current,
        }
    }
}

/// Stores `name`, honoring `global`/`nonlocal` declarations of the scope.
///
/// Returns `false` only for an undeclared `nonlocal` target, which the
/// compiler rejects earlier; the runtime check is a backstop.
pub fn store(scope: &ScopeRef, name: &Rc<str>, value: Value) -> bool {
    let (is_global, is_nonlocal) = {
        let s = scope.borrow();
        (s.globals.contains(name), s.nonlocals.contains(name))
    };
    if is_global {
        root(scope).borrow_mut().set_local(name.clone(), value);
        return true;
    }
    if is_nonlocal {
        if let Some(target) = find_nonlocal_scope(scope, name) {
            target.borrow_mut().set_local(name.clone(), value);
            return true;
        }
        return false;
    }
    scope.borrow_mut().set_local(name.clone(), value);
    true
}

/// Deletes `name` honoring the same binding rules as [`store`].
pub fn delete(scope: &ScopeRef, name: &str) -> bool {
    let (is_global, is_nonlocal) = {
        let s = scope.borrow();
        (s.globals.contains(name), s.nonlocals.contains(name))
    };
    if is_global {
        return root(scope).borrow_mut().delete_local(name);
    }
    if is_nonlocal {
        if let Some(target) = find_nonlocal_scope(scope, name) {
            return target.borrow_mut().delete_local(name);
        }
        return false;
    }
    scope.borrow_mut().delete_local(name)
}

/// Nearest enclosing non-class scope that defines `name`, excluding the root.
fn find_nonlocal_scope(scope: &ScopeRef, name: &str) -> Option<ScopeRef> {
    let mut current = scope.borrow().parent.clone();
    while let Some(s) = current {
        let (is_class, has_name, has_parent) = {
            let borrowed = s.borrow();
            (
                borrowed.is_class_scope,
                borrowed.values.contains_key(name),
                borrowed.parent.is_some(),
            )
        };
        // The chain root is the module scope; nonlocal never binds there.
        if !is_class && has_name && has_parent {
            return Some(s);
        }
        current = s.borrow().parent.clone();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Rc<str> {
        Rc::from(s)
    }

    #[test]
    fn test_lookup_walks_chain() {
        let module = Scope::new_module();
        module.borrow_mut().set_local(name("x"), Value::Int(1));
        let func = Scope::new_child(module, false);
        assert!(matches!(lookup(&func, "x"), Some(Value::Int(1))));
        assert!(lookup(&func, "y").is_none());
    }

    #[test]
    fn test_enclosing_class_scope_skipped() {
        let module = Scope::new_module();
        module.borrow_mut().set_local(name("x"), Value::Int(1));
        let class = Scope::new_child(module, true);
        class.borrow_mut().set_local(name("x"), Value::Int(2));
        let method = Scope::new_child(class.clone(), false);
        // The method sees the module's x, not the class body's.
        assert!(matches!(lookup(&method, "x"), Some(Value::Int(1))));
        // The class body itself sees its own x.
        assert!(matches!(lookup(&class, "x"), Some(Value::Int(2))));
    }

    #[test]
    fn test_global_store_hits_root() {
        let module = Scope::new_module();
        let func = Scope::new_child(module.clone(), false);
        func.borrow_mut().globals.insert(name("g"));
        assert!(store(&func, &name("g"), Value::Int(9)));
        assert!(matches!(module.borrow().get_local("g"), Some(Value::Int(9))));
        assert!(func.borrow().get_local("g").is_none());
    }

    #[test]
    fn test_nonlocal_store_finds_enclosing() {
        let module = Scope::new_module();
        let outer = Scope::new_child(module.clone(), false);
        outer.borrow_mut().set_local(name("n"), Value::Int(1));
        let inner = Scope::new_child(outer.clone(), false);
        inner.borrow_mut().nonlocals.insert(name("n"));
        assert!(store(&inner, &name("n"), Value::Int(2)));
        assert!(matches!(outer.borrow().get_local("n"), Some(Value::Int(2))));
        // nonlocal never binds at module level
        module.borrow_mut().set_local(name("m"), Value::Int(1));
        inner.borrow_mut().nonlocals.insert(name("m"));
        assert!(!store(&inner, &name("m"), Value::Int(3)));
    }
}

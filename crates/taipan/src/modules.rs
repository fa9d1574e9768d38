//! Module import: file resolution, compilation, execution and caching.

use std::{fs, path::PathBuf, rc::Rc};

use crate::{
    bytecode::{
        compiler,
        vm::{Frame, Vm},
    },
    exception::{ExcType, RunError, RunResult},
    parser,
    scope::Scope,
    types::ModuleObject,
    value::Value,
};

/// `IMPORT_NAME`: resolves, executes and caches a module by name.
///
/// Search order is the interpreter's base paths (entry-file directory, then
/// the working directory), trying `name.py` then `name/__init__.py`. The
/// module executes its top-level code in a fresh scope inheriting only
/// built-ins; the cache entry is registered before execution so circular
/// imports observe the partially-initialized module, and removed again if
/// execution fails.
pub fn import_module(vm: &mut Vm, name: &str) -> RunResult<Value> {
    if let Some(cached) = vm.interp.modules.get(name) {
        return Ok(cached.clone());
    }

    let Some(path) = resolve(&vm.interp.search_paths, name) else {
        return Err(RunError::new(
            ExcType::ImportError,
            format!("No module named '{name}'"),
        ));
    };
    let source = fs::read_to_string(&path).map_err(|e| {
        RunError::new(
            ExcType::ImportError,
            format!("cannot read module '{name}' from {}: {e}", path.display()),
        )
    })?;

    let program = parser::parse(&source)?;
    let code = compiler::compile_module(&program)?;

    let scope = Scope::new_module();
    let module = Value::Module(Rc::new(ModuleObject::new(Rc::from(name), scope.clone())));
    vm.interp.modules.insert(name.to_owned(), module.clone());

    let frame = Frame::new(code, scope);
    if let Err(err) = vm.run_call_frame(frame) {
        vm.interp.modules.remove(name);
        return Err(err);
    }
    Ok(module)
}

/// Finds `name.py` or `name/__init__.py` under the base paths.
fn resolve(search_paths: &[PathBuf], name: &str) -> Option<PathBuf> {
    for base in search_paths {
        let file = base.join(format!("{name}.py"));
        if file.is_file() {
            return Some(file);
        }
        let package = base.join(name).join("__init__.py");
        if package.is_file() {
            return Some(package);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_module() {
        let paths = vec![PathBuf::from("/nonexistent-taipan-test-dir")];
        assert!(resolve(&paths, "nope").is_none());
    }
}

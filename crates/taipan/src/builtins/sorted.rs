//! Implementation of the sorted() builtin function.

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunResult},
    types::{PyIter, list::sort_decorated},
    value::Value,
};

/// `sorted(iterable, key=None, reverse=False)`: a new sorted list, stable.
pub fn builtin_sorted(vm: &mut Vm, mut args: CallArgs) -> RunResult<Value> {
    let mut key_func: Option<Value> = None;
    let mut reverse = false;
    for (name, value) in std::mem::take(&mut args.kwargs) {
        match name.as_ref() {
            "key" => {
                if !matches!(value, Value::None) {
                    key_func = Some(value);
                }
            }
            "reverse" => reverse = value.truthy(),
            other => {
                return Err(ExcType::type_error(format!(
                    "'{other}' is an invalid keyword argument for sorted()"
                )));
            }
        }
    }
    let iterable = args.expect_one("sorted")?;
    let items = PyIter::from_value(&iterable)?.collect(vm)?;

    let mut decorated = Vec::with_capacity(items.len());
    for item in items {
        let key = match &key_func {
            Some(f) => vm.call_value(f.clone(), CallArgs::one(item.clone()))?,
            None => item.clone(),
        };
        decorated.push((key, item));
    }
    Ok(Value::list(sort_decorated(decorated, reverse)?))
}

//! Implementation of the min() and max() builtin functions.

use std::cmp::Ordering;

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunResult},
    types::PyIter,
    value::Value,
};

pub fn builtin_min(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    extreme(vm, args, "min", Ordering::Less)
}

pub fn builtin_max(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    extreme(vm, args, "max", Ordering::Greater)
}

/// Shared engine: one iterable argument, or two-plus scalars; `key=`
/// projects before comparison; ties keep the first seen value.
fn extreme(vm: &mut Vm, mut args: CallArgs, name: &str, wanted: Ordering) -> RunResult<Value> {
    let mut key_func: Option<Value> = None;
    for (kw, value) in std::mem::take(&mut args.kwargs) {
        match kw.as_ref() {
            "key" => {
                if !matches!(value, Value::None) {
                    key_func = Some(value);
                }
            }
            other => {
                return Err(ExcType::type_error(format!(
                    "'{other}' is an invalid keyword argument for {name}()"
                )));
            }
        }
    }

    let items: Vec<Value> = match args.positional.len() {
        0 => {
            return Err(ExcType::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            )));
        }
        1 => PyIter::from_value(&args.positional[0])?.collect(vm)?,
        _ => args.positional.into_vec(),
    };
    if items.is_empty() {
        return Err(ExcType::value_error(format!("{name}() arg is an empty sequence")));
    }

    let mut best: Option<(Value, Value)> = None; // (key, value)
    for item in items {
        let key = match &key_func {
            Some(f) => vm.call_value(f.clone(), CallArgs::one(item.clone()))?,
            None => item.clone(),
        };
        best = match best {
            None => Some((key, item)),
            Some((best_key, best_value)) => {
                if key.py_partial_cmp(&best_key)? == Some(wanted) {
                    Some((key, item))
                } else {
                    Some((best_key, best_value))
                }
            }
        };
    }
    Ok(best.expect("non-empty sequence has an extreme").1)
}

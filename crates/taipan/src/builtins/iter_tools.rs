//! Lazy iteration builtins: enumerate, zip, map, filter, reversed, next.

use std::{cell::RefCell, rc::Rc};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunError, RunResult},
    types::PyIter,
    value::Value,
};

pub fn builtin_enumerate(mut args: CallArgs) -> RunResult<Value> {
    let start = take_kwarg(&mut args, "start");
    let (iterable, pos_start) = args.expect_one_or_two("enumerate")?;
    let count = match start.or(pos_start) {
        Some(v) => v.as_index("enumerate")?,
        None => 0,
    };
    let inner = PyIter::from_value(&iterable)?;
    Ok(iterator(PyIter::Enumerate {
        inner: Box::new(inner),
        count,
    }))
}

pub fn builtin_zip(mut args: CallArgs) -> RunResult<Value> {
    args.reject_kwargs("zip")?;
    let mut inners = Vec::with_capacity(args.positional.len());
    for iterable in args.positional.drain(..) {
        inners.push(PyIter::from_value(&iterable)?);
    }
    Ok(iterator(PyIter::Zip { inners }))
}

pub fn builtin_map(mut args: CallArgs) -> RunResult<Value> {
    args.reject_kwargs("map")?;
    if args.positional.len() < 2 {
        return Err(ExcType::type_error("map() must have at least two arguments."));
    }
    let func = args.positional.remove(0);
    let mut inners = Vec::with_capacity(args.positional.len());
    for iterable in args.positional.drain(..) {
        inners.push(PyIter::from_value(&iterable)?);
    }
    Ok(iterator(PyIter::Map { func, inners }))
}

pub fn builtin_filter(args: CallArgs) -> RunResult<Value> {
    let mut parts = args.expect_exact("filter", 2)?;
    let iterable = parts.remove(1);
    let func = parts.remove(0);
    let inner = PyIter::from_value(&iterable)?;
    let func = match func {
        Value::None => None,
        other => Some(other),
    };
    Ok(iterator(PyIter::Filter {
        func,
        inner: Box::new(inner),
    }))
}

pub fn builtin_reversed(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    let value = args.expect_one("reversed")?;
    let mut items = match &value {
        Value::List(_) | Value::Tuple(_) | Value::Str(_) | Value::Range(_) => {
            PyIter::from_value(&value)?.collect(vm)?
        }
        other => {
            return Err(ExcType::type_error(format!(
                "argument to reversed() must be a sequence, not '{}'",
                other.type_name()
            )));
        }
    };
    items.reverse();
    Ok(iterator(PyIter::Seq { items, index: 0 }))
}

/// `next(iterator[, default])`.
pub fn builtin_next(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    let (target, default) = args.expect_one_or_two("next")?;
    let advanced = match &target {
        Value::Iterator(iter) => {
            let mut guard = iter
                .try_borrow_mut()
                .map_err(|_| ExcType::value_error("iterator already in use"))?;
            guard.next(vm)?
        }
        Value::Generator(generator) => vm.generator_next(generator, Value::None)?,
        other => {
            return Err(ExcType::type_error(format!(
                "'{}' object is not an iterator",
                other.type_name()
            )));
        }
    };
    match advanced {
        Some(value) => Ok(value),
        None => default.ok_or_else(|| RunError::plain(ExcType::StopIteration)),
    }
}

fn iterator(iter: PyIter) -> Value {
    Value::Iterator(Rc::new(RefCell::new(iter)))
}

fn take_kwarg(args: &mut CallArgs, name: &str) -> Option<Value> {
    let pos = args.kwargs.iter().position(|(k, _)| k.as_ref() == name)?;
    Some(args.kwargs.remove(pos).1)
}

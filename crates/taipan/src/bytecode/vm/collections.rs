//! Subscription, slicing and sequence unpacking.

use crate::{
    bytecode::vm::{Frame, Vm},
    exception::{ExcType, RunError, RunResult},
    types::{PyIter, str as py_str},
    value::Value,
};

/// `obj[index]`.
pub fn load_subscr(obj: &Value, index: &Value) -> RunResult<Value> {
    if let Value::Slice(slice) = index {
        return load_slice(obj, slice);
    }
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            let idx = normalize_index(index.as_index("list")?, items.len())
                .ok_or_else(|| RunError::new(ExcType::IndexError, "list index out of range"))?;
            Ok(items[idx].clone())
        }
        Value::Tuple(items) => {
            let idx = normalize_index(index.as_index("tuple")?, items.len())
                .ok_or_else(|| RunError::new(ExcType::IndexError, "tuple index out of range"))?;
            Ok(items[idx].clone())
        }
        Value::Str(s) => py_str::index(s, index.as_index("string")?),
        Value::Dict(d) => d
            .borrow()
            .get(index)?
            .ok_or_else(|| RunError::new(ExcType::KeyError, index.py_repr())),
        Value::Range(r) => Ok(Value::Int(r.get(index.as_index("range")?)?)),
        other => Err(ExcType::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[slice]`: strings and lists return their own kind, tuples stay tuples.
fn load_slice(obj: &Value, slice: &crate::types::SliceObject) -> RunResult<Value> {
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            let resolved = slice.resolve(items.len())?;
            let out: Vec<Value> = resolved.indices().map(|i| items[i].clone()).collect();
            Ok(Value::list(out))
        }
        Value::Tuple(items) => {
            let resolved = slice.resolve(items.len())?;
            let out: Vec<Value> = resolved.indices().map(|i| items[i].clone()).collect();
            Ok(Value::tuple(out))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let resolved = slice.resolve(chars.len())?;
            let out: String = resolved.indices().map(|i| chars[i]).collect();
            Ok(Value::str(out))
        }
        other => Err(ExcType::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[index] = value`.
pub fn store_subscr(obj: &Value, index: &Value, value: Value) -> RunResult<()> {
    match obj {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let len = items.len();
            let idx = normalize_index(index.as_index("list")?, len)
                .ok_or_else(|| RunError::new(ExcType::IndexError, "list assignment index out of range"))?;
            items[idx] = value;
            Ok(())
        }
        Value::Dict(d) => d.borrow_mut().insert(index.clone(), value),
        other => Err(ExcType::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `del obj[index]`.
pub fn delete_subscr(obj: &Value, index: &Value) -> RunResult<()> {
    match obj {
        Value::List(items) => {
            if let Value::Slice(slice) = index {
                let mut items = items.borrow_mut();
                let resolved = slice.resolve(items.len())?;
                let mut doomed: Vec<usize> = resolved.indices().collect();
                doomed.sort_unstable();
                for i in doomed.into_iter().rev() {
                    items.remove(i);
                }
                return Ok(());
            }
            let mut items = items.borrow_mut();
            let len = items.len();
            let idx = normalize_index(index.as_index("list")?, len)
                .ok_or_else(|| RunError::new(ExcType::IndexError, "list assignment index out of range"))?;
            items.remove(idx);
            Ok(())
        }
        Value::Dict(d) => {
            if d.borrow_mut().remove(index)?.is_none() {
                return Err(RunError::new(ExcType::KeyError, index.py_repr()));
            }
            Ok(())
        }
        other => Err(ExcType::type_error(format!(
            "'{}' object doesn't support item deletion",
            other.type_name()
        ))),
    }
}

/// Maps a possibly-negative index into `0..len`.
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if index < 0 { index + len } else { index };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}

/// `UNPACK_SEQUENCE n`: exact-arity unpack, first element ending on TOS.
pub fn unpack_sequence(vm: &mut Vm, frame: &mut Frame, value: &Value, n: usize) -> RunResult<()> {
    let items = PyIter::from_value(value)?.collect(vm)?;
    if items.len() < n {
        return Err(ExcType::value_error(format!(
            "not enough values to unpack (expected {n}, got {})",
            items.len()
        )));
    }
    if items.len() > n {
        return Err(ExcType::value_error(format!("too many values to unpack (expected {n})")));
    }
    for item in items.into_iter().rev() {
        frame.stack.push(item);
    }
    Ok(())
}

/// `UNPACK_EX`: prefix targets, one starred list, suffix targets.
pub fn unpack_ex(vm: &mut Vm, frame: &mut Frame, value: &Value, before: usize, after: usize) -> RunResult<()> {
    let mut items = PyIter::from_value(value)?.collect(vm)?;
    if items.len() < before + after {
        return Err(ExcType::value_error(format!(
            "not enough values to unpack (expected at least {}, got {})",
            before + after,
            items.len()
        )));
    }
    let suffix = items.split_off(items.len() - after);
    let star = items.split_off(before);
    let prefix = items;
    // Stores pop in textual order, so push the suffix first and the first
    // prefix target last.
    for item in suffix.into_iter().rev() {
        frame.stack.push(item);
    }
    frame.stack.push(Value::list(star));
    for item in prefix.into_iter().rev() {
        frame.stack.push(item);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn test_load_subscr_list() {
        let l = Value::list(vec![Value::Int(10), Value::Int(20)]);
        assert!(matches!(load_subscr(&l, &Value::Int(-1)).unwrap(), Value::Int(20)));
        assert!(load_subscr(&l, &Value::Int(2)).is_err());
        assert!(load_subscr(&l, &Value::str("x")).is_err());
    }

    #[test]
    fn test_dict_missing_key_is_key_error() {
        let d = Value::Dict(std::rc::Rc::new(std::cell::RefCell::new(crate::types::Dict::new())));
        let err = load_subscr(&d, &Value::str("k")).unwrap_err();
        let crate::exception::RunError::Simple(simple) = err else {
            panic!("expected simple exception");
        };
        assert_eq!(simple.exc_type, ExcType::KeyError);
    }

    #[test]
    fn test_string_slice() {
        let s = Value::str("hello");
        let slice = Value::Slice(std::rc::Rc::new(crate::types::SliceObject {
            start: None,
            stop: None,
            step: Some(Value::Int(-1)),
        }));
        assert_eq!(load_subscr(&s, &slice).unwrap().py_str(), "olleh");
    }
}

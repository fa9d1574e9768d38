//! The `list` method surface.

use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunError, RunResult},
    types::PyIter,
    value::Value,
};

/// Method names `LOAD_ATTR` accepts on lists.
pub const METHODS: &[&str] = &[
    "append", "pop", "extend", "count", "index", "sort", "reverse", "insert", "remove", "clear", "copy",
];

/// Dispatches a bound list method call.
pub fn call_method(vm: &mut Vm, recv: &Rc<RefCell<Vec<Value>>>, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "append" => {
            let item = args.expect_one("append")?;
            recv.borrow_mut().push(item);
            Ok(Value::None)
        }
        "pop" => {
            let index = match args.expect_at_most_one("pop")? {
                Some(v) => Some(v.as_index("pop")?),
                None => None,
            };
            let mut items = recv.borrow_mut();
            if items.is_empty() {
                return Err(RunError::new(ExcType::IndexError, "pop from empty list"));
            }
            let len = items.len() as i64;
            let idx = match index {
                Some(i) => {
                    let i = if i < 0 { i + len } else { i };
                    if i < 0 || i >= len {
                        return Err(RunError::new(ExcType::IndexError, "pop index out of range"));
                    }
                    i as usize
                }
                None => items.len() - 1,
            };
            Ok(items.remove(idx))
        }
        "extend" => {
            let iterable = args.expect_one("extend")?;
            let items = PyIter::from_value(&iterable)?.collect(vm)?;
            recv.borrow_mut().extend(items);
            Ok(Value::None)
        }
        "count" => {
            let needle = args.expect_one("count")?;
            let count = recv.borrow().iter().filter(|v| v.py_eq(&needle)).count();
            Ok(Value::Int(count as i64))
        }
        "index" => {
            let needle = args.expect_one("index")?;
            let pos = recv.borrow().iter().position(|v| v.py_eq(&needle));
            match pos {
                Some(i) => Ok(Value::Int(i as i64)),
                None => Err(ExcType::value_error(format!("{} is not in list", needle.py_repr()))),
            }
        }
        "sort" => sort(vm, recv, args),
        "reverse" => {
            args.expect_exact("reverse", 0)?;
            recv.borrow_mut().reverse();
            Ok(Value::None)
        }
        "insert" => {
            let mut parts = args.expect_exact("insert", 2)?;
            let item = parts.remove(1);
            let index = parts.remove(0).as_index("insert")?;
            let mut items = recv.borrow_mut();
            let len = items.len() as i64;
            let idx = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(idx as usize, item);
            Ok(Value::None)
        }
        "remove" => {
            let needle = args.expect_one("remove")?;
            let pos = recv.borrow().iter().position(|v| v.py_eq(&needle));
            match pos {
                Some(i) => {
                    recv.borrow_mut().remove(i);
                    Ok(Value::None)
                }
                None => Err(ExcType::value_error("list.remove(x): x not in list")),
            }
        }
        "clear" => {
            args.expect_exact("clear", 0)?;
            recv.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.expect_exact("copy", 0)?;
            let items = recv.borrow().clone();
            Ok(Value::list(items))
        }
        _ => Err(ExcType::attribute_error("list", name)),
    }
}

/// `sort(key=None, reverse=False)`: stable, in place, `<`-based.
fn sort(vm: &mut Vm, recv: &Rc<RefCell<Vec<Value>>>, mut args: CallArgs) -> RunResult<Value> {
    if !args.positional.is_empty() {
        return Err(ExcType::type_error("sort() takes no positional arguments"));
    }
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
                    "'{other}' is an invalid keyword argument for sort()"
                )));
            }
        }
    }

    // Decorate outside the borrow: key functions may touch the list.
    let items = recv.borrow().clone();
    let mut decorated = Vec::with_capacity(items.len());
    for item in items {
        let key = match &key_func {
            Some(f) => vm.call_value(f.clone(), CallArgs::one(item.clone()))?,
            None => item.clone(),
        };
        decorated.push((key, item));
    }

    let sorted = sort_decorated(decorated, reverse)?;
    *recv.borrow_mut() = sorted;
    Ok(Value::None)
}

/// Stable sort of `(key, value)` pairs; comparison errors surface afterwards.
pub fn sort_decorated(mut decorated: Vec<(Value, Value)>, reverse: bool) -> RunResult<Vec<Value>> {
    let mut error: Option<RunError> = None;
    decorated.sort_by(|a, b| {
        if error.is_some() {
            return Ordering::Equal;
        }
        let ord = match a.0.py_partial_cmp(&b.0) {
            Ok(Some(o)) => o,
            // Unordered (NaN) keys compare equal, like CPython's timsort.
            Ok(None) => Ordering::Equal,
            Err(e) => {
                error = Some(e);
                Ordering::Equal
            }
        };
        if reverse { ord.reverse() } else { ord }
    });
    if let Some(e) = error {
        return Err(e);
    }
    Ok(decorated.into_iter().map(|(_, v)| v).collect())
}

/// List repetition for `*`; a non-positive count yields the empty list.
pub fn repeat(items: &[Value], count: i64) -> Value {
    if count <= 0 {
        return Value::list(vec![]);
    }
    let mut out = Vec::with_capacity(items.len() * count as usize);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Value::list(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_decorated_stable() {
        let pairs = vec![
            (Value::Int(1), Value::str("b")),
            (Value::Int(0), Value::str("a")),
            (Value::Int(1), Value::str("c")),
        ];
        let sorted = sort_decorated(pairs, false).unwrap();
        let texts: Vec<String> = sorted.iter().map(Value::py_str).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_decorated_reverse() {
        let pairs = vec![
            (Value::Int(1), Value::Int(1)),
            (Value::Int(3), Value::Int(3)),
            (Value::Int(2), Value::Int(2)),
        ];
        let sorted = sort_decorated(pairs, true).unwrap();
        let nums: Vec<String> = sorted.iter().map(Value::py_repr).collect();
        assert_eq!(nums, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_sort_incomparable_errors() {
        let pairs = vec![(Value::Int(1), Value::None), (Value::str("a"), Value::None)];
        assert!(sort_decorated(pairs, false).is_err());
    }

    #[test]
    fn test_repeat() {
        let out = repeat(&[Value::Int(1), Value::Int(2)], 2);
        assert_eq!(out.py_repr(), "[1, 2, 1, 2]");
        assert_eq!(repeat(&[Value::Int(1)], 0).py_repr(), "[]");
    }
}

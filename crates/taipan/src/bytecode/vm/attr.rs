//! Attribute access: instance dictionaries, class MRO lookup with method
//! binding, and the fixed method surfaces of the built-in types.

use std::{cell::RefCell, rc::Rc};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunError, RunResult},
    types::{
        BoundMethod, BuiltinMethod, Dict, FileObject, Generator, PyIter, Set,
        list as py_list, str as py_str,
    },
    value::Value,
};

/// Method names accepted on dicts.
const DICT_METHODS: &[&str] = &[
    "items",
    "keys",
    "values",
    "get",
    "pop",
    "setdefault",
    "update",
    "clear",
    "copy",
    "__contains__",
];

/// Method names accepted on sets.
const SET_METHODS: &[&str] = &[
    "add",
    "update",
    "remove",
    "discard",
    "union",
    "intersection",
    "difference",
    "symmetric_difference",
    "issubset",
    "issuperset",
    "pop",
    "clear",
    "copy",
];

/// Method names accepted on files.
const FILE_METHODS: &[&str] = &["read", "readline", "readlines", "write", "close", "__enter__", "__exit__"];

/// Method names accepted on generators.
const GENERATOR_METHODS: &[&str] = &["send", "throw", "close", "__next__"];

/// `obj.name`.
///
/// Instances check their attribute map first, then the class MRO
/// (left-to-right depth-first over the bases); a function found on the class
/// comes back bound to the instance.
pub fn load_attr(vm: &mut Vm, obj: &Value, name: &str) -> RunResult<Value> {
    let _ = vm;
    match obj {
        Value::Instance(instance) => {
            if let Some(value) = instance.attrs.borrow().get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = instance.class.mro_lookup(name) {
                return Ok(bind_if_function(value, obj));
            }
            Err(ExcType::attribute_error(&instance.class.name, name))
        }
        Value::Class(class) => {
            if name == "__name__" {
                return Ok(Value::str(class.name.as_ref()));
            }
            class
                .mro_lookup(name)
                .ok_or_else(|| ExcType::attribute_error(&class.name, name))
        }
        Value::ExcClass(exc_type) => {
            if name == "__name__" {
                return Ok(Value::str(exc_type.to_string()));
            }
            Err(ExcType::attribute_error("type", name))
        }
        Value::Exc(exc) => match name {
            "message" => Ok(Value::str(exc.message_text())),
            "args" => Ok(Value::tuple(exc.args.clone())),
            _ => Err(ExcType::attribute_error(&exc.exc_type.to_string(), name)),
        },
        Value::Module(module) => module
            .get_attr(name)
            .ok_or_else(|| ExcType::attribute_error("module", name)),
        Value::Range(range) => match name {
            "start" => Ok(Value::Int(range.start)),
            "stop" => Ok(Value::Int(range.stop)),
            "step" => Ok(Value::Int(range.step)),
            _ => Err(ExcType::attribute_error("range", name)),
        },
        Value::Slice(slice) => {
            let part = |v: &Option<Value>| v.clone().unwrap_or(Value::None);
            match name {
                "start" => Ok(part(&slice.start)),
                "stop" => Ok(part(&slice.stop)),
                "step" => Ok(part(&slice.step)),
                _ => Err(ExcType::attribute_error("slice", name)),
            }
        }
        Value::File(file) => {
            if name == "closed" {
                return Ok(Value::Bool(file.borrow().is_closed()));
            }
            builtin_method(obj, name, FILE_METHODS, "file")
        }
        Value::Str(_) => builtin_method(obj, name, py_str::METHODS, "str"),
        Value::List(_) => builtin_method(obj, name, py_list::METHODS, "list"),
        Value::Dict(_) => builtin_method(obj, name, DICT_METHODS, "dict"),
        Value::Set(_) => builtin_method(obj, name, SET_METHODS, "set"),
        Value::Generator(_) => builtin_method(obj, name, GENERATOR_METHODS, "generator"),
        other => Err(ExcType::attribute_error(&other.type_name(), name)),
    }
}

fn bind_if_function(value: Value, receiver: &Value) -> Value {
    match value {
        Value::Function(_) => Value::BoundMethod(Rc::new(BoundMethod {
            func: value,
            receiver: receiver.clone(),
        })),
        other => other,
    }
}

fn builtin_method(obj: &Value, name: &str, methods: &[&str], type_name: &str) -> RunResult<Value> {
    if methods.contains(&name) {
        Ok(Value::BuiltinMethod(Rc::new(BuiltinMethod {
            receiver: obj.clone(),
            name: Rc::from(name),
        })))
    } else {
        Err(ExcType::attribute_error(type_name, name))
    }
}

/// `obj.name = value`.
pub fn store_attr(obj: &Value, name: &str, value: Value) -> RunResult<()> {
    match obj {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(Rc::from(name), value);
            Ok(())
        }
        Value::Class(class) => {
            class.attrs.borrow_mut().insert(Rc::from(name), value);
            Ok(())
        }
        Value::Module(module) => {
            module.set_attr(Rc::from(name), value);
            Ok(())
        }
        other => Err(ExcType::attribute_error(&other.type_name(), name)),
    }
}

/// `del obj.name`.
pub fn delete_attr(obj: &Value, name: &str) -> RunResult<()> {
    match obj {
        Value::Instance(instance) => {
            if instance.attrs.borrow_mut().shift_remove(name).is_none() {
                return Err(ExcType::attribute_error(&instance.class.name, name));
            }
            Ok(())
        }
        Value::Class(class) => {
            if class.attrs.borrow_mut().shift_remove(name).is_none() {
                return Err(ExcType::attribute_error(&class.name, name));
            }
            Ok(())
        }
        other => Err(ExcType::attribute_error(&other.type_name(), name)),
    }
}

/// Dispatches a bound built-in method call by receiver type.
pub fn call_builtin_method(vm: &mut Vm, receiver: &Value, name: &str, args: CallArgs) -> RunResult<Value> {
    match receiver {
        Value::Str(s) => py_str::call_method(vm, s, name, args),
        Value::List(l) => py_list::call_method(vm, l, name, args),
        Value::Dict(d) => dict_method(vm, d, name, args),
        Value::Set(s) => set_method(vm, s, name, args),
        Value::File(f) => file_method(f, name, args),
        Value::Generator(g) => generator_method(vm, g, name, args),
        other => Err(ExcType::attribute_error(&other.type_name(), name)),
    }
}

fn dict_method(vm: &mut Vm, recv: &Rc<RefCell<Dict>>, name: &str, args: CallArgs) -> RunResult<Value> {
    let _ = vm;
    match name {
        "items" => {
            args.expect_exact("items", 0)?;
            let items = recv
                .borrow()
                .items()
                .into_iter()
                .map(|(k, v)| Value::tuple(vec![k, v]))
                .collect();
            Ok(Value::list(items))
        }
        "keys" => {
            args.expect_exact("keys", 0)?;
            Ok(Value::list(recv.borrow().keys()))
        }
        "values" => {
            args.expect_exact("values", 0)?;
            Ok(Value::list(recv.borrow().values()))
        }
        "get" => {
            let (key, default) = args.expect_one_or_two("get")?;
            Ok(recv.borrow().get(&key)?.unwrap_or(default.unwrap_or(Value::None)))
        }
        "pop" => {
            let (key, default) = args.expect_one_or_two("pop")?;
            match recv.borrow_mut().remove(&key)? {
                Some(value) => Ok(value),
                None => default.ok_or_else(|| RunError::new(ExcType::KeyError, key.py_repr())),
            }
        }
        "setdefault" => {
            let (key, default) = args.expect_one_or_two("setdefault")?;
            let mut dict = recv.borrow_mut();
            if let Some(existing) = dict.get(&key)? {
                return Ok(existing);
            }
            let value = default.unwrap_or(Value::None);
            dict.insert(key, value.clone())?;
            Ok(value)
        }
        "update" => {
            let other = args.expect_one("update")?;
            let Value::Dict(other) = other else {
                return Err(ExcType::type_error(format!(
                    "update() argument must be dict, not {}",
                    other.type_name()
                )));
            };
            if Rc::ptr_eq(recv, &other) {
                return Ok(Value::None);
            }
            recv.borrow_mut().update(&other.borrow());
            Ok(Value::None)
        }
        "clear" => {
            args.expect_exact("clear", 0)?;
            recv.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.expect_exact("copy", 0)?;
            let copied = recv.borrow().clone();
            Ok(Value::Dict(Rc::new(RefCell::new(copied))))
        }
        "__contains__" => {
            let key = args.expect_one("__contains__")?;
            Ok(Value::Bool(recv.borrow().contains(&key)?))
        }
        _ => Err(ExcType::attribute_error("dict", name)),
    }
}

fn set_method(vm: &mut Vm, recv: &Rc<RefCell<Set>>, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "add" => {
            let value = args.expect_one("add")?;
            recv.borrow_mut().add(value)?;
            Ok(Value::None)
        }
        "update" => {
            let other = args.expect_one("update")?;
            let other = to_set(vm, other)?;
            recv.borrow_mut().update(&other);
            Ok(Value::None)
        }
        "remove" => {
            let value = args.expect_one("remove")?;
            recv.borrow_mut().remove(&value)?;
            Ok(Value::None)
        }
        "discard" => {
            let value = args.expect_one("discard")?;
            recv.borrow_mut().discard(&value)?;
            Ok(Value::None)
        }
        "union" => {
            let other = to_set(vm, args.expect_one("union")?)?;
            Ok(set_value(recv.borrow().union(&other)))
        }
        "intersection" => {
            let other = to_set(vm, args.expect_one("intersection")?)?;
            Ok(set_value(recv.borrow().intersection(&other)))
        }
        "difference" => {
            let other = to_set(vm, args.expect_one("difference")?)?;
            Ok(set_value(recv.borrow().difference(&other)))
        }
        "symmetric_difference" => {
            let other = to_set(vm, args.expect_one("symmetric_difference")?)?;
            Ok(set_value(recv.borrow().symmetric_difference(&other)))
        }
        "issubset" => {
            let other = to_set(vm, args.expect_one("issubset")?)?;
            Ok(Value::Bool(recv.borrow().is_subset(&other)))
        }
        "issuperset" => {
            let other = to_set(vm, args.expect_one("issuperset")?)?;
            Ok(Value::Bool(recv.borrow().is_superset(&other)))
        }
        "pop" => {
            args.expect_exact("pop", 0)?;
            recv.borrow_mut()
                .pop()
                .ok_or_else(|| RunError::new(ExcType::KeyError, "pop from an empty set"))
        }
        "clear" => {
            args.expect_exact("clear", 0)?;
            recv.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            args.expect_exact("copy", 0)?;
            let copied = recv.borrow().clone();
            Ok(set_value(copied))
        }
        _ => Err(ExcType::attribute_error("set", name)),
    }
}

fn set_value(set: Set) -> Value {
    Value::Set(Rc::new(RefCell::new(set)))
}

/// Builds a set from any iterable argument of the set algebra methods.
fn to_set(vm: &mut Vm, value: Value) -> RunResult<Set> {
    if let Value::Set(s) = &value {
        return Ok(s.borrow().clone());
    }
    let mut out = Set::new();
    for item in PyIter::from_value(&value)?.collect(vm)? {
        out.add(item)?;
    }
    Ok(out)
}

fn file_method(recv: &Rc<RefCell<FileObject>>, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "read" => {
            args.expect_exact("read", 0)?;
            recv.borrow_mut().read().map(Value::str)
        }
        "readline" => {
            args.expect_exact("readline", 0)?;
            recv.borrow_mut().readline().map(Value::str)
        }
        "readlines" => {
            args.expect_exact("readlines", 0)?;
            recv.borrow_mut().readlines().map(Value::list)
        }
        "write" => {
            let text = args.expect_one("write")?;
            let Value::Str(text) = text else {
                return Err(ExcType::type_error(format!(
                    "write() argument must be str, not {}",
                    text.type_name()
                )));
            };
            let written = recv.borrow_mut().write(&text)?;
            Ok(Value::Int(written as i64))
        }
        "close" => {
            args.expect_exact("close", 0)?;
            recv.borrow_mut().close();
            Ok(Value::None)
        }
        "__enter__" => {
            args.expect_exact("__enter__", 0)?;
            Ok(Value::File(recv.clone()))
        }
        // Files release their handle on every exit path and never suppress.
        "__exit__" => {
            recv.borrow_mut().close();
            Ok(Value::None)
        }
        _ => Err(ExcType::attribute_error("file", name)),
    }
}

fn generator_method(vm: &mut Vm, recv: &Rc<RefCell<Generator>>, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "send" => {
            let value = args.expect_one("send")?;
            match vm.generator_next(recv, value)? {
                Some(yielded) => Ok(yielded),
                None => Err(RunError::plain(ExcType::StopIteration)),
            }
        }
        "throw" => {
            let exc = args.expect_one("throw")?;
            let exc = super::exceptions::into_exception(vm, exc)?;
            match vm.generator_throw(recv, exc)? {
                Some(yielded) => Ok(yielded),
                None => Err(RunError::plain(ExcType::StopIteration)),
            }
        }
        "close" => {
            args.expect_exact("close", 0)?;
            vm.generator_close(recv)?;
            Ok(Value::None)
        }
        "__next__" => {
            args.expect_exact("__next__", 0)?;
            match vm.generator_next(recv, Value::None)? {
                Some(yielded) => Ok(yielded),
                None => Err(RunError::plain(ExcType::StopIteration)),
            }
        }
        _ => Err(ExcType::attribute_error("generator", name)),
    }
}

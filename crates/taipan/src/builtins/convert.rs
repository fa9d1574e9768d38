//! Type constructors: list, tuple, set, dict, str, int, float, bool.

use std::{cell::RefCell, rc::Rc};

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Num, ToPrimitive};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunError, RunResult},
    types::{Dict, PyIter, Set},
    value::{Value, bigint_to_value},
};

pub fn builtin_list(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("list")? {
        None => Ok(Value::list(vec![])),
        Some(iterable) => {
            let items = PyIter::from_value(&iterable)?.collect(vm)?;
            Ok(Value::list(items))
        }
    }
}

pub fn builtin_tuple(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("tuple")? {
        None => Ok(Value::tuple(vec![])),
        Some(Value::Tuple(items)) => Ok(Value::Tuple(items)),
        Some(iterable) => {
            let items = PyIter::from_value(&iterable)?.collect(vm)?;
            Ok(Value::tuple(items))
        }
    }
}

pub fn builtin_set(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    let mut set = Set::new();
    if let Some(iterable) = args.expect_at_most_one("set")? {
        for item in PyIter::from_value(&iterable)?.collect(vm)? {
            set.add(item)?;
        }
    }
    Ok(Value::Set(Rc::new(RefCell::new(set))))
}

/// `dict()`, `dict(mapping)`, `dict(iterable_of_pairs)`, plus keywords.
pub fn builtin_dict(vm: &mut Vm, mut args: CallArgs) -> RunResult<Value> {
    let mut dict = Dict::new();
    if args.positional.len() > 1 {
        return Err(ExcType::type_error(format!(
            "dict expected at most 1 argument, got {}",
            args.positional.len()
        )));
    }
    if let Some(source) = args.positional.pop() {
        match &source {
            Value::Dict(other) => dict.update(&other.borrow()),
            other => {
                for pair in PyIter::from_value(other)?.collect(vm)? {
                    let items = match &pair {
                        Value::Tuple(items) => items.as_ref().clone(),
                        Value::List(items) => items.borrow().clone(),
                        _ => {
                            return Err(ExcType::type_error(
                                "cannot convert dictionary update sequence element to a key-value pair",
                            ));
                        }
                    };
                    if items.len() != 2 {
                        return Err(ExcType::value_error(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            items.len()
                        )));
                    }
                    dict.insert(items[0].clone(), items[1].clone())?;
                }
            }
        }
    }
    for (name, value) in std::mem::take(&mut args.kwargs) {
        dict.insert(Value::Str(name), value)?;
    }
    Ok(Value::Dict(Rc::new(RefCell::new(dict))))
}

pub fn builtin_str(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("str")? {
        None => Ok(Value::str("")),
        Some(value) => Ok(Value::str(vm.str_value(&value)?)),
    }
}

pub fn builtin_int(args: CallArgs) -> RunResult<Value> {
    let (value, base) = args.expect_one_or_two("int")?;
    let base = match base {
        None => 10,
        Some(b) => {
            let b = b.as_index("int")?;
            if !(2..=36).contains(&b) {
                return Err(ExcType::value_error("int() base must be >= 2 and <= 36, or 0"));
            }
            b as u32
        }
    };
    match &value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(_) | Value::BigInt(_) => Ok(value),
        // Conversion truncates toward zero.
        Value::Float(f) => {
            if f.is_nan() {
                return Err(ExcType::value_error("cannot convert float NaN to integer"));
            }
            if f.is_infinite() {
                return Err(RunError::new(
                    ExcType::OverflowError,
                    "cannot convert float infinity to integer",
                ));
            }
            let truncated = f.trunc();
            match (truncated.abs() < 9.3e18).then(|| truncated as i64) {
                Some(i) => Ok(Value::Int(i)),
                None => Ok(bigint_to_value(
                    BigInt::from_f64(truncated).unwrap_or_default(),
                )),
            }
        }
        Value::Str(s) => parse_int(s, base),
        other => Err(ExcType::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn parse_int(s: &str, base: u32) -> RunResult<Value> {
    let trimmed = s.trim();
    let cleaned: String = trimmed.chars().filter(|c| *c != '_').collect();
    // Accept a matching radix prefix ("0x" for base 16, etc.).
    let digits = match base {
        16 => cleaned
            .strip_prefix("0x")
            .or_else(|| cleaned.strip_prefix("0X"))
            .unwrap_or(&cleaned),
        8 => cleaned
            .strip_prefix("0o")
            .or_else(|| cleaned.strip_prefix("0O"))
            .unwrap_or(&cleaned),
        2 => cleaned
            .strip_prefix("0b")
            .or_else(|| cleaned.strip_prefix("0B"))
            .unwrap_or(&cleaned),
        _ => cleaned.as_str(),
    };
    if let Ok(i) = i64::from_str_radix(digits, base) {
        return Ok(Value::Int(i));
    }
    match BigInt::from_str_radix(digits, base) {
        Ok(big) => Ok(bigint_to_value(big)),
        Err(_) => Err(ExcType::value_error(format!(
            "invalid literal for int() with base {base}: {}",
            crate::value::string_repr(s)
        ))),
    }
}

pub fn builtin_float(args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("float")? {
        None => Ok(Value::Float(0.0)),
        Some(value) => match &value {
            Value::Float(_) => Ok(value),
            Value::Bool(b) => Ok(Value::Float(f64::from(i8::from(*b)))),
            Value::Int(i) => Ok(Value::Float(*i as f64)),
            Value::BigInt(b) => b
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| ExcType::value_error("int too large to convert to float")),
            Value::Str(s) => {
                let trimmed = s.trim();
                let parsed = match trimmed {
                    "inf" | "Infinity" | "+inf" | "+Infinity" => Some(f64::INFINITY),
                    "-inf" | "-Infinity" => Some(f64::NEG_INFINITY),
                    "nan" | "+nan" | "-nan" => Some(f64::NAN),
                    other => other.parse().ok(),
                };
                parsed.map(Value::Float).ok_or_else(|| {
                    ExcType::value_error(format!(
                        "could not convert string to float: {}",
                        crate::value::string_repr(s)
                    ))
                })
            }
            other => Err(ExcType::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))),
        },
    }
}

pub fn builtin_bool(args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("bool")? {
        None => Ok(Value::Bool(false)),
        Some(value) => Ok(Value::Bool(value.truthy())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(v: Value) -> CallArgs {
        CallArgs::one(v)
    }

    #[test]
    fn test_int_from_str() {
        assert_eq!(builtin_int(one(Value::str("42"))).unwrap().py_repr(), "42");
        assert_eq!(builtin_int(one(Value::str("  -7  "))).unwrap().py_repr(), "-7");
        assert!(builtin_int(one(Value::str("4.5"))).is_err());
        assert!(builtin_int(one(Value::str(""))).is_err());
    }

    #[test]
    fn test_int_with_base() {
        let mut args = CallArgs::positional([Value::str("ff"), Value::Int(16)]);
        assert_eq!(builtin_int(std::mem::take(&mut args)).unwrap().py_repr(), "255");
    }

    #[test]
    fn test_int_truncates_float() {
        assert_eq!(builtin_int(one(Value::Float(3.9))).unwrap().py_repr(), "3");
        assert_eq!(builtin_int(one(Value::Float(-3.9))).unwrap().py_repr(), "-3");
        assert!(builtin_int(one(Value::Float(f64::NAN))).is_err());
    }

    #[test]
    fn test_float_from_str() {
        assert_eq!(builtin_float(one(Value::str("1.5"))).unwrap().py_repr(), "1.5");
        assert!(builtin_float(one(Value::str("abc"))).is_err());
    }

    #[test]
    fn test_bool() {
        assert_eq!(builtin_bool(one(Value::str(""))).unwrap().py_repr(), "False");
        assert_eq!(builtin_bool(one(Value::Int(2))).unwrap().py_repr(), "True");
    }
}

//! Binary, in-place and unary operator semantics.
//!
//! Integer arithmetic stays on i64 until an operation overflows, then
//! promotes to `BigInt` and demotes back when results fit. Division follows
//! Python: `/` always yields a float, `//` and `%` floor with the divisor's
//! sign, `**` stays exact for non-negative integer exponents.

use std::rc::Rc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    ast::BinOp,
    bytecode::op::Opcode,
    exception::{ExcType, RunError, RunResult},
    types::{list as py_list, str as py_str},
    value::{Number, Value, bigint_to_value},
};

/// Applies a binary (or in-place) operator.
///
/// In-place only differs for lists: `+=` extends the target in place so every
/// alias observes the mutation, and `*=` repeats in place. Immutable operands
/// fall back to the plain operation.
pub fn binary_op(lhs: Value, rhs: Value, op: BinOp, inplace: bool) -> RunResult<Value> {
    if inplace
        && let Value::List(target) = &lhs
    {
        match op {
            BinOp::Add => {
                let added: Vec<Value> = match &rhs {
                    Value::List(other) => {
                        if Rc::ptr_eq(target, other) {
                            let snapshot = target.borrow().clone();
                            snapshot
                        } else {
                            other.borrow().clone()
                        }
                    }
                    Value::Tuple(other) => other.as_ref().clone(),
                    other => {
                        return Err(ExcType::type_error(format!(
                            "can only concatenate list (not \"{}\") to list",
                            other.type_name()
                        )));
                    }
                };
                target.borrow_mut().extend(added);
                return Ok(lhs);
            }
            BinOp::Mul => {
                let count = rhs.as_index("list")?;
                let repeated = {
                    let items = target.borrow();
                    match py_list::repeat(&items, count) {
                        Value::List(l) => l.borrow().clone(),
                        _ => unreachable!(),
                    }
                };
                *target.borrow_mut() = repeated;
                return Ok(lhs);
            }
            _ => {}
        }
    }

    // Numeric pairs first.
    if let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) {
        return numeric_op(a, b, op).map_err(|err| match err {
            NumericError::ZeroDivision(message) => RunError::new(ExcType::ZeroDivisionError, message),
            NumericError::Value(message) => ExcType::value_error(message),
            NumericError::Unsupported => binary_type_error(op, &lhs, &rhs),
        });
    }

    match (&lhs, &rhs, op) {
        (Value::Str(a), Value::Str(b), BinOp::Add) => {
            let mut out = String::with_capacity(a.len() + b.len());
            out.push_str(a);
            out.push_str(b);
            Ok(Value::str(out))
        }
        (Value::Str(a), _, BinOp::Mul) => Ok(py_str::repeat(a, rhs.as_index("str")?)),
        (_, Value::Str(b), BinOp::Mul) => Ok(py_str::repeat(b, lhs.as_index("str")?)),
        (Value::Str(a), _, BinOp::Mod) => py_str::percent_format(a, &rhs),
        (Value::List(a), Value::List(b), BinOp::Add) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::list(out))
        }
        (Value::List(a), _, BinOp::Mul) => {
            let items = a.borrow();
            Ok(py_list::repeat(&items, rhs.as_index("list")?))
        }
        (_, Value::List(b), BinOp::Mul) => {
            let items = b.borrow();
            Ok(py_list::repeat(&items, lhs.as_index("list")?))
        }
        // Concatenation preserves the tuple flag only when both sides carry it.
        (Value::Tuple(a), Value::Tuple(b), BinOp::Add) => {
            let mut out = a.as_ref().clone();
            out.extend(b.iter().cloned());
            Ok(Value::tuple(out))
        }
        (Value::Tuple(a), _, BinOp::Mul) => {
            let count = rhs.as_index("tuple")?;
            let mut out = Vec::new();
            for _ in 0..count.max(0) {
                out.extend(a.iter().cloned());
            }
            Ok(Value::tuple(out))
        }
        (Value::Set(a), Value::Set(b), BinOp::BitOr) => Ok(set_value(a.borrow().union(&b.borrow()))),
        (Value::Set(a), Value::Set(b), BinOp::BitAnd) => Ok(set_value(a.borrow().intersection(&b.borrow()))),
        (Value::Set(a), Value::Set(b), BinOp::Sub) => Ok(set_value(a.borrow().difference(&b.borrow()))),
        (Value::Set(a), Value::Set(b), BinOp::BitXor) => Ok(set_value(a.borrow().symmetric_difference(&b.borrow()))),
        _ => Err(binary_type_error(op, &lhs, &rhs)),
    }
}

fn set_value(set: crate::types::Set) -> Value {
    Value::Set(Rc::new(std::cell::RefCell::new(set)))
}

fn binary_type_error(op: BinOp, lhs: &Value, rhs: &Value) -> RunError {
    let symbol = match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "** or pow()",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    };
    ExcType::binary_type_error(symbol, &lhs.type_name(), &rhs.type_name())
}

enum NumericError {
    ZeroDivision(&'static str),
    Value(String),
    Unsupported,
}

type NumericResult = Result<Value, NumericError>;

fn numeric_op(a: Number, b: Number, op: BinOp) -> NumericResult {
    match (a, b) {
        (Number::Float(x), other) => float_op(x, to_f64(&other)?, op),
        (other, Number::Float(y)) => float_op(to_f64(&other)?, y, op),
        (Number::Int(x), Number::Int(y)) => int_op(x, y, op),
        (Number::Big(x), Number::Big(y)) => big_op(&x, &y, op),
        (Number::Big(x), Number::Int(y)) => big_op(&x, &BigInt::from(y), op),
        (Number::Int(x), Number::Big(y)) => big_op(&BigInt::from(x), &y, op),
    }
}

fn to_f64(n: &Number) -> Result<f64, NumericError> {
    match n {
        Number::Int(i) => Ok(*i as f64),
        Number::Float(f) => Ok(*f),
        Number::Big(b) => b
            .to_f64()
            .ok_or_else(|| NumericError::Value("int too large to convert to float".to_owned())),
    }
}

fn float_op(x: f64, y: f64, op: BinOp) -> NumericResult {
    let out = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y == 0.0 {
                return Err(NumericError::ZeroDivision("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(NumericError::ZeroDivision("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(NumericError::ZeroDivision("float modulo"));
            }
            // Python modulo takes the divisor's sign.
            x - (x / y).floor() * y
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(NumericError::ZeroDivision("0.0 cannot be raised to a negative power"));
            }
            x.powf(y)
        }
        _ => return Err(NumericError::Unsupported),
    };
    Ok(Value::Float(out))
}

fn int_op(x: i64, y: i64, op: BinOp) -> NumericResult {
    match op {
        BinOp::Add => match x.checked_add(y) {
            Some(v) => Ok(Value::Int(v)),
            None => big_op(&BigInt::from(x), &BigInt::from(y), op),
        },
        BinOp::Sub => match x.checked_sub(y) {
            Some(v) => Ok(Value::Int(v)),
            None => big_op(&BigInt::from(x), &BigInt::from(y), op),
        },
        BinOp::Mul => match x.checked_mul(y) {
            Some(v) => Ok(Value::Int(v)),
            None => big_op(&BigInt::from(x), &BigInt::from(y), op),
        },
        // True division of integers yields a float.
        BinOp::Div => {
            if y == 0 {
                return Err(NumericError::ZeroDivision("division by zero"));
            }
            Ok(Value::Float(x as f64 / y as f64))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(NumericError::ZeroDivision("integer division or modulo by zero"));
            }
            match x.checked_div_euclid(y) {
                Some(_) => Ok(Value::Int(x.div_floor(&y))),
                None => big_op(&BigInt::from(x), &BigInt::from(y), op),
            }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(NumericError::ZeroDivision("integer division or modulo by zero"));
            }
            Ok(Value::Int(x.mod_floor(&y)))
        }
        BinOp::Pow => int_pow(x, y),
        BinOp::BitAnd => Ok(Value::Int(x & y)),
        BinOp::BitOr => Ok(Value::Int(x | y)),
        BinOp::BitXor => Ok(Value::Int(x ^ y)),
        BinOp::Shl => {
            if y < 0 {
                return Err(NumericError::Value("negative shift count".to_owned()));
            }
            match u32::try_from(y).ok().and_then(|s| x.checked_shl(s).filter(|v| v >> s == x)) {
                Some(v) => Ok(Value::Int(v)),
                None => big_op(&BigInt::from(x), &BigInt::from(y), op),
            }
        }
        BinOp::Shr => {
            if y < 0 {
                return Err(NumericError::Value("negative shift count".to_owned()));
            }
            let shift = u32::try_from(y).unwrap_or(63).min(63);
            Ok(Value::Int(x >> shift))
        }
    }
}

/// `**` on integers: exact for non-negative exponents, float otherwise.
fn int_pow(base: i64, exp: i64) -> NumericResult {
    if exp < 0 {
        if base == 0 {
            return Err(NumericError::ZeroDivision("0.0 cannot be raised to a negative power"));
        }
        return Ok(Value::Float((base as f64).powi(exp.max(-1_000_000) as i32)));
    }
    match u32::try_from(exp) {
        Ok(small_exp) => {
            if let Some(v) = base.checked_pow(small_exp) {
                Ok(Value::Int(v))
            } else {
                Ok(bigint_to_value(BigInt::from(base).pow(small_exp)))
            }
        }
        // An exponent beyond u32 with |base| > 1 cannot be materialized.
        Err(_) => match base {
            0 | 1 => Ok(Value::Int(base)),
            -1 => Ok(Value::Int(if exp % 2 == 0 { 1 } else { -1 })),
            _ => Err(NumericError::Value("exponent too large".to_owned())),
        },
    }
}

fn big_op(x: &BigInt, y: &BigInt, op: BinOp) -> NumericResult {
    let out = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::Div => {
            if y.is_zero() {
                return Err(NumericError::ZeroDivision("division by zero"));
            }
            let (Some(a), Some(b)) = (x.to_f64(), y.to_f64()) else {
                return Err(NumericError::Value("int too large to convert to float".to_owned()));
            };
            return Ok(Value::Float(a / b));
        }
        BinOp::FloorDiv => {
            if y.is_zero() {
                return Err(NumericError::ZeroDivision("integer division or modulo by zero"));
            }
            x.div_floor(y)
        }
        BinOp::Mod => {
            if y.is_zero() {
                return Err(NumericError::ZeroDivision("integer division or modulo by zero"));
            }
            x.mod_floor(y)
        }
        BinOp::Pow => {
            if y.is_negative() {
                let (Some(a), Some(b)) = (x.to_f64(), y.to_f64()) else {
                    return Err(NumericError::Value("int too large to convert to float".to_owned()));
                };
                if a == 0.0 {
                    return Err(NumericError::ZeroDivision("0.0 cannot be raised to a negative power"));
                }
                return Ok(Value::Float(a.powf(b)));
            }
            let Some(exp) = y.to_u32() else {
                return Err(NumericError::Value("exponent too large".to_owned()));
            };
            x.pow(exp)
        }
        BinOp::BitAnd => x & y,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        BinOp::Shl => {
            if y.is_negative() {
                return Err(NumericError::Value("negative shift count".to_owned()));
            }
            let Some(shift) = y.to_u64() else {
                return Err(NumericError::Value("shift count too large".to_owned()));
            };
            x << shift
        }
        BinOp::Shr => {
            if y.is_negative() {
                return Err(NumericError::Value("negative shift count".to_owned()));
            }
            let Some(shift) = y.to_u64() else {
                return Err(NumericError::Value("shift count too large".to_owned()));
            };
            x >> shift
        }
    };
    Ok(bigint_to_value(out))
}

/// Unary `+ - ~ not`.
pub fn unary_op(operand: &Value, op: Opcode) -> RunResult<Value> {
    match op {
        Opcode::UnaryNot => Ok(Value::Bool(!operand.truthy())),
        Opcode::UnaryNegative => match operand {
            Value::Int(i) => match i.checked_neg() {
                Some(v) => Ok(Value::Int(v)),
                None => Ok(bigint_to_value(-BigInt::from(*i))),
            },
            Value::BigInt(b) => Ok(bigint_to_value(-b.as_ref().clone())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
            other => Err(unary_type_error("-", other)),
        },
        Opcode::UnaryPositive => match operand {
            Value::Int(_) | Value::BigInt(_) | Value::Float(_) => Ok(operand.clone()),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            other => Err(unary_type_error("+", other)),
        },
        Opcode::UnaryInvert => match operand {
            Value::Int(i) => Ok(Value::Int(!i)),
            Value::BigInt(b) => Ok(bigint_to_value(!b.as_ref().clone())),
            Value::Bool(b) => Ok(Value::Int(!i64::from(*b))),
            other => Err(unary_type_error("~", other)),
        },
        other => Err(RunError::internal(format!("not a unary opcode: {other:?}"))),
    }
}

fn unary_type_error(symbol: &str, operand: &Value) -> RunError {
    ExcType::type_error(format!(
        "bad operand type for unary {symbol}: '{}'",
        operand.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_add(a: i64, b: i64) -> Value {
        binary_op(Value::Int(a), Value::Int(b), BinOp::Add, false).unwrap()
    }

    #[test]
    fn test_overflow_promotes_to_bigint() {
        let v = int_add(i64::MAX, 1);
        assert!(matches!(v, Value::BigInt(_)));
        assert_eq!(v.py_repr(), "9223372036854775808");
    }

    #[test]
    fn test_true_division_yields_float() {
        let v = binary_op(Value::Int(7), Value::Int(2), BinOp::Div, false).unwrap();
        assert!(matches!(v, Value::Float(_)));
        assert_eq!(v.py_repr(), "3.5");
        let v = binary_op(Value::Int(4), Value::Int(2), BinOp::Div, false).unwrap();
        assert_eq!(v.py_repr(), "2.0");
    }

    #[test]
    fn test_floor_division_mixed_signs() {
        let v = binary_op(Value::Int(-7), Value::Int(2), BinOp::FloorDiv, false).unwrap();
        assert_eq!(v.py_repr(), "-4");
        let v = binary_op(Value::Int(7), Value::Int(-2), BinOp::FloorDiv, false).unwrap();
        assert_eq!(v.py_repr(), "-4");
    }

    #[test]
    fn test_modulo_takes_divisor_sign() {
        assert_eq!(
            binary_op(Value::Int(-7), Value::Int(3), BinOp::Mod, false).unwrap().py_repr(),
            "2"
        );
        assert_eq!(
            binary_op(Value::Int(7), Value::Int(-3), BinOp::Mod, false).unwrap().py_repr(),
            "-2"
        );
        assert_eq!(
            binary_op(Value::Float(-7.0), Value::Float(3.0), BinOp::Mod, false)
                .unwrap()
                .py_repr(),
            "2.0"
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert!(binary_op(Value::Int(1), Value::Int(0), BinOp::Div, false).is_err());
        assert!(binary_op(Value::Int(1), Value::Int(0), BinOp::FloorDiv, false).is_err());
        assert!(binary_op(Value::Float(1.0), Value::Float(0.0), BinOp::Mod, false).is_err());
    }

    #[test]
    fn test_pow_exactness() {
        let v = binary_op(Value::Int(2), Value::Int(100), BinOp::Pow, false).unwrap();
        assert_eq!(v.py_repr(), "1267650600228229401496703205376");
        let v = binary_op(Value::Int(2), Value::Int(-1), BinOp::Pow, false).unwrap();
        assert_eq!(v.py_repr(), "0.5");
        assert!(binary_op(Value::Int(0), Value::Int(-1), BinOp::Pow, false).is_err());
    }

    #[test]
    fn test_bool_arithmetic() {
        let v = binary_op(Value::Bool(true), Value::Bool(true), BinOp::Add, false).unwrap();
        assert_eq!(v.py_repr(), "2");
        let v = binary_op(Value::Bool(true), Value::Float(1.0), BinOp::Mul, false).unwrap();
        assert_eq!(v.py_repr(), "1.0");
    }

    #[test]
    fn test_string_operators() {
        let v = binary_op(Value::str("ab"), Value::str("cd"), BinOp::Add, false).unwrap();
        assert_eq!(v.py_str(), "abcd");
        let v = binary_op(Value::str("ab"), Value::Int(2), BinOp::Mul, false).unwrap();
        assert_eq!(v.py_str(), "abab");
        assert!(binary_op(Value::str("a"), Value::Int(1), BinOp::Add, false).is_err());
    }

    #[test]
    fn test_inplace_add_mutates_list_in_place() {
        let l1 = Value::list(vec![Value::Int(1)]);
        let l2 = l1.clone();
        let result = binary_op(l1.clone(), Value::list(vec![Value::Int(2)]), BinOp::Add, true).unwrap();
        assert!(result.is_identical(&l1));
        assert!(l2.py_eq(&Value::list(vec![Value::Int(1), Value::Int(2)])));
    }

    #[test]
    fn test_plain_add_copies_list() {
        let l1 = Value::list(vec![Value::Int(1)]);
        let result = binary_op(l1.clone(), Value::list(vec![Value::Int(2)]), BinOp::Add, false).unwrap();
        assert!(!result.is_identical(&l1));
        assert!(l1.py_eq(&Value::list(vec![Value::Int(1)])));
    }

    #[test]
    fn test_tuple_concat_preserves_flag() {
        let v = binary_op(
            Value::tuple(vec![Value::Int(1)]),
            Value::tuple(vec![Value::Int(2)]),
            BinOp::Add,
            false,
        )
        .unwrap();
        assert!(matches!(v, Value::Tuple(_)));
    }

    #[test]
    fn test_unary() {
        assert_eq!(unary_op(&Value::Int(3), Opcode::UnaryNegative).unwrap().py_repr(), "-3");
        assert_eq!(unary_op(&Value::Int(3), Opcode::UnaryInvert).unwrap().py_repr(), "-4");
        assert_eq!(
            unary_op(&Value::Int(0), Opcode::UnaryNot).unwrap().py_repr(),
            "True"
        );
        assert!(unary_op(&Value::str("x"), Opcode::UnaryNegative).is_err());
    }

    #[test]
    fn test_set_operators() {
        let mut a = crate::types::Set::new();
        a.add(Value::Int(1)).unwrap();
        a.add(Value::Int(2)).unwrap();
        let mut b = crate::types::Set::new();
        b.add(Value::Int(2)).unwrap();
        let a = Value::Set(Rc::new(std::cell::RefCell::new(a)));
        let b = Value::Set(Rc::new(std::cell::RefCell::new(b)));
        let v = binary_op(a.clone(), b.clone(), BinOp::BitAnd, false).unwrap();
        assert_eq!(v.py_repr(), "{2}");
        let v = binary_op(a, b, BinOp::Sub, false).unwrap();
        assert_eq!(v.py_repr(), "{1}");
    }
}

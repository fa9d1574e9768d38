//! Implementation of the abs() and round() builtins.

use num_bigint::BigInt;
use num_traits::Signed;

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    value::{Value, bigint_to_value},
};

pub fn builtin_abs(args: CallArgs) -> RunResult<Value> {
    let value = args.expect_one("abs")?;
    match &value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => match i.checked_abs() {
            Some(v) => Ok(Value::Int(v)),
            None => Ok(bigint_to_value(BigInt::from(*i).abs())),
        },
        Value::BigInt(b) => Ok(bigint_to_value(b.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(ExcType::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))),
    }
}

/// `round(x[, ndigits])` with banker's rounding (round half to even).
pub fn builtin_round(args: CallArgs) -> RunResult<Value> {
    let (value, ndigits) = args.expect_one_or_two("round")?;
    let ndigits = match ndigits {
        None | Some(Value::None) => None,
        Some(v) => Some(v.as_index("round")?),
    };
    match (&value, ndigits) {
        (Value::Int(_) | Value::BigInt(_) | Value::Bool(_), _) => Ok(value),
        (Value::Float(f), None) => {
            let rounded = f.round_ties_even();
            if rounded.abs() < 9.2e18 {
                Ok(Value::Int(rounded as i64))
            } else {
                use num_traits::FromPrimitive;
                Ok(bigint_to_value(BigInt::from_f64(rounded).unwrap_or_default()))
            }
        }
        (Value::Float(f), Some(digits)) => {
            let factor = 10f64.powi(digits.clamp(-308, 308) as i32);
            Ok(Value::Float((f * factor).round_ties_even() / factor))
        }
        (other, _) => Err(ExcType::type_error(format!(
            "type {} doesn't define __round__ method",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round1(v: Value) -> String {
        builtin_round(CallArgs::one(v)).unwrap().py_repr()
    }

    #[test]
    fn test_bankers_rounding() {
        assert_eq!(round1(Value::Float(0.5)), "0");
        assert_eq!(round1(Value::Float(1.5)), "2");
        assert_eq!(round1(Value::Float(2.5)), "2");
        assert_eq!(round1(Value::Float(-0.5)), "0");
        assert_eq!(round1(Value::Float(-1.5)), "-2");
    }

    #[test]
    fn test_round_returns_int_without_ndigits() {
        assert_eq!(round1(Value::Float(3.2)), "3");
        assert_eq!(round1(Value::Int(7)), "7");
    }

    #[test]
    fn test_round_with_ndigits_returns_float() {
        let args = CallArgs::positional([Value::Float(2.675), Value::Int(2)]);
        let out = builtin_round(args).unwrap();
        assert!(matches!(out, Value::Float(_)));
    }

    #[test]
    fn test_abs() {
        assert_eq!(builtin_abs(CallArgs::one(Value::Int(-3))).unwrap().py_repr(), "3");
        assert_eq!(
            builtin_abs(CallArgs::one(Value::Float(-2.5))).unwrap().py_repr(),
            "2.5"
        );
        assert_eq!(
            builtin_abs(CallArgs::one(Value::Int(i64::MIN))).unwrap().py_repr(),
            "9223372036854775808"
        );
        assert!(builtin_abs(CallArgs::one(Value::str("x"))).is_err());
    }
}

//! Implementation of the type() and isinstance() builtins.

use crate::{
    args::CallArgs,
    builtins::Builtin,
    exception::{ExcType, RunResult},
    value::Value,
};

/// One-argument `type(x)`: the type object of the value.
pub fn builtin_type(args: CallArgs) -> RunResult<Value> {
    let value = args.expect_one("type")?;
    Ok(type_of(&value))
}

#[must_use]
pub fn type_of(value: &Value) -> Value {
    match value {
        Value::Bool(_) => Value::Builtin(Builtin::Bool),
        Value::Int(_) | Value::BigInt(_) => Value::Builtin(Builtin::Int),
        Value::Float(_) => Value::Builtin(Builtin::Float),
        Value::Str(_) => Value::Builtin(Builtin::Str),
        Value::List(_) => Value::Builtin(Builtin::List),
        Value::Tuple(_) => Value::Builtin(Builtin::Tuple),
        Value::Dict(_) => Value::Builtin(Builtin::Dict),
        Value::Set(_) => Value::Builtin(Builtin::Set),
        Value::Range(_) => Value::Builtin(Builtin::Range),
        Value::Class(_) | Value::ExcClass(_) => Value::Builtin(Builtin::Type),
        Value::Instance(instance) => Value::Class(instance.class.clone()),
        Value::Exc(exc) => Value::ExcClass(exc.exc_type),
        // Types without a constructor name still print and compare usefully.
        other => Value::str(format!("<class '{}'>", other.type_name())),
    }
}

/// `isinstance(obj, class_or_tuple)`.
pub fn builtin_isinstance(args: CallArgs) -> RunResult<Value> {
    let mut parts = args.expect_exact("isinstance", 2)?;
    let class = parts.remove(1);
    let value = parts.remove(0);
    Ok(Value::Bool(is_instance(&value, &class)?))
}

fn is_instance(value: &Value, class: &Value) -> RunResult<bool> {
    match class {
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if is_instance(value, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Builtin(builtin) if builtin.is_type() => Ok(match builtin {
            // bool is a subtype of int.
            Builtin::Int => matches!(value, Value::Int(_) | Value::BigInt(_) | Value::Bool(_)),
            Builtin::Bool => matches!(value, Value::Bool(_)),
            Builtin::Float => matches!(value, Value::Float(_)),
            Builtin::Str => matches!(value, Value::Str(_)),
            Builtin::List => matches!(value, Value::List(_)),
            Builtin::Tuple => matches!(value, Value::Tuple(_)),
            Builtin::Dict => matches!(value, Value::Dict(_)),
            Builtin::Set => matches!(value, Value::Set(_)),
            Builtin::Range => matches!(value, Value::Range(_)),
            Builtin::Type => matches!(value, Value::Class(_) | Value::ExcClass(_)),
            _ => false,
        }),
        Value::Class(class) => Ok(match value {
            Value::Instance(instance) => instance.class.derives_from(class),
            _ => false,
        }),
        Value::ExcClass(handler) => Ok(match value {
            Value::Exc(exc) => exc.exc_type.is_subclass_of(*handler),
            Value::Instance(instance) => instance
                .class
                .exception_root()
                .is_some_and(|root| root.is_subclass_of(*handler)),
            _ => false,
        }),
        _ => Err(ExcType::type_error(
            "isinstance() arg 2 must be a type or tuple of types",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isinstance(value: Value, class: Value) -> bool {
        let args = CallArgs::positional([value, class]);
        matches!(builtin_isinstance(args).unwrap(), Value::Bool(true))
    }

    #[test]
    fn test_bool_is_subtype_of_int() {
        assert!(isinstance(Value::Bool(true), Value::Builtin(Builtin::Int)));
        assert!(isinstance(Value::Bool(true), Value::Builtin(Builtin::Bool)));
        assert!(!isinstance(Value::Int(1), Value::Builtin(Builtin::Bool)));
    }

    #[test]
    fn test_tuple_of_classes() {
        let classes = Value::tuple(vec![Value::Builtin(Builtin::Str), Value::Builtin(Builtin::Int)]);
        assert!(isinstance(Value::Int(1), classes));
    }

    #[test]
    fn test_type_identity() {
        let t = builtin_type(CallArgs::one(Value::Int(1))).unwrap();
        assert!(t.py_eq(&Value::Builtin(Builtin::Int)));
        assert_eq!(t.py_repr(), "<class 'int'>");
    }
}

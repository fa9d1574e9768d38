//! Exception raising, normalization and block-stack dispatch.

use std::rc::Rc;

use crate::{
    bytecode::vm::{Frame, Vm},
    exception::{ExcType, RunError, RunResult},
    types::ExcObject,
    value::Value,
};

/// Normalizes a catchable error into a first-class exception value.
///
/// VM-raised `(type, message)` pairs become instances of the named built-in
/// class with the `message` attribute set, so user code sees one shape
/// regardless of who raised.
pub fn normalize(err: RunError) -> Value {
    match err {
        RunError::Raised(value) => value,
        RunError::Simple(simple) => Value::Exc(Rc::new(ExcObject::from_message(simple.exc_type, simple.message))),
        RunError::Internal(context) => {
            // Internal errors never reach handlers; dispatch refuses them.
            Value::str(context)
        }
    }
}

/// Walks the frame's block stack looking for a handler.
///
/// On a match the operand stack is truncated to the entry's recorded height,
/// the normalized exception is pushed, and the pc moves to the handler. With
/// no handler left the error propagates to the caller frame.
pub fn dispatch(frame: &mut Frame, err: RunError) -> RunResult<()> {
    if !err.is_catchable() {
        return Err(err);
    }
    let Some(entry) = frame.block_stack.pop() else {
        return Err(err);
    };
    let exc = normalize(err);
    frame.stack.truncate(entry.stack_height as usize);
    frame.stack.push(exc.clone());
    frame.current_exc = Some(exc);
    frame.pc = entry.handler as usize;
    Ok(())
}

/// `RAISE_VARARGS`: arg 0 re-raises the active exception, arg 1 raises TOS.
pub fn raise_varargs(vm: &mut Vm, frame: &mut Frame, arg: u32) -> RunResult<()> {
    match arg {
        0 => match frame.current_exc.clone() {
            Some(exc) => Err(RunError::Raised(exc)),
            None => Err(RunError::new(ExcType::RuntimeError, "No active exception to re-raise")),
        },
        1 => {
            let value = frame
                .stack
                .pop()
                .ok_or_else(|| RunError::internal("RAISE_VARARGS with empty stack"))?;
            Err(RunError::Raised(into_exception(vm, value)?))
        }
        other => Err(RunError::internal(format!("RAISE_VARARGS with argument {other}"))),
    }
}

/// Converts a raised value into an exception instance.
///
/// Raising a class instantiates it with no arguments first.
pub fn into_exception(vm: &mut Vm, value: Value) -> RunResult<Value> {
    match &value {
        Value::Exc(_) => Ok(value),
        Value::Instance(instance) if instance.class.exception_root().is_some() => Ok(value),
        Value::ExcClass(_) | Value::Class(_) => {
            let instantiated = vm.call_value(value, crate::args::CallArgs::new())?;
            match &instantiated {
                Value::Exc(_) => Ok(instantiated),
                Value::Instance(instance) if instance.class.exception_root().is_some() => Ok(instantiated),
                _ => Err(ExcType::type_error("exceptions must derive from Exception")),
            }
        }
        _ => Err(ExcType::type_error("exceptions must derive from Exception")),
    }
}

/// The class of an exception value, as passed to `__exit__`.
#[must_use]
pub fn class_of(exc: &Value) -> Value {
    match exc {
        Value::Exc(e) => Value::ExcClass(e.exc_type),
        Value::Instance(i) => Value::Class(i.class.clone()),
        _ => Value::None,
    }
}

/// `except E:` matching: is `exc` an instance of `class` (or of a tuple
/// member)?
pub fn exception_matches(exc: &Value, class: &Value) -> RunResult<bool> {
    match class {
        Value::Tuple(classes) => {
            for c in classes.iter() {
                if exception_matches(exc, c)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::ExcClass(handler) => Ok(match exc {
            Value::Exc(e) => e.exc_type.is_subclass_of(*handler),
            Value::Instance(i) => i
                .class
                .exception_root()
                .is_some_and(|root| root.is_subclass_of(*handler)),
            _ => false,
        }),
        Value::Class(handler) => Ok(match exc {
            Value::Instance(i) => i.class.derives_from(handler),
            _ => false,
        }),
        _ => Err(ExcType::type_error(
            "catching classes that do not inherit from BaseException is not allowed",
        )),
    }
}

/// True for the exception kinds that terminate a generator cleanly.
#[must_use]
pub fn is_exit_exception(err: &RunError) -> bool {
    let exc_type = match err {
        RunError::Simple(simple) => Some(simple.exc_type),
        RunError::Raised(Value::Exc(e)) => Some(e.exc_type),
        _ => None,
    };
    matches!(exc_type, Some(ExcType::GeneratorExit | ExcType::StopIteration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_matches_builtin_hierarchy() {
        let exc = Value::Exc(Rc::new(ExcObject::new(ExcType::ZeroDivisionError, vec![])));
        assert!(exception_matches(&exc, &Value::ExcClass(ExcType::ZeroDivisionError)).unwrap());
        assert!(exception_matches(&exc, &Value::ExcClass(ExcType::ArithmeticError)).unwrap());
        assert!(exception_matches(&exc, &Value::ExcClass(ExcType::Exception)).unwrap());
        assert!(!exception_matches(&exc, &Value::ExcClass(ExcType::ValueError)).unwrap());
    }

    #[test]
    fn test_exception_matches_tuple() {
        let exc = Value::Exc(Rc::new(ExcObject::new(ExcType::KeyError, vec![])));
        let classes = Value::tuple(vec![
            Value::ExcClass(ExcType::ValueError),
            Value::ExcClass(ExcType::KeyError),
        ]);
        assert!(exception_matches(&exc, &classes).unwrap());
    }

    #[test]
    fn test_matching_non_class_is_type_error() {
        let exc = Value::Exc(Rc::new(ExcObject::new(ExcType::ValueError, vec![])));
        assert!(exception_matches(&exc, &Value::Int(3)).is_err());
    }

    #[test]
    fn test_normalize_simple() {
        let err = RunError::new(ExcType::ValueError, "boom");
        let Value::Exc(e) = normalize(err) else { panic!() };
        assert_eq!(e.exc_type, ExcType::ValueError);
        assert_eq!(e.message_text(), "boom");
    }
}

//! `COMPARE_OP` semantics: equality, ordering, identity and membership.

use std::cmp::Ordering;

use crate::{
    ast::CmpOp,
    bytecode::vm::Vm,
    exception::{ExcType, RunResult},
    types::PyIter,
    value::Value,
};

/// Evaluates one comparison sub-operation.
pub fn compare(vm: &mut Vm, op: CmpOp, lhs: &Value, rhs: &Value) -> RunResult<bool> {
    match op {
        CmpOp::Eq => Ok(lhs.py_eq(rhs)),
        CmpOp::Ne => Ok(!lhs.py_eq(rhs)),
        CmpOp::Is => Ok(lhs.is_identical(rhs)),
        CmpOp::IsNot => Ok(!lhs.is_identical(rhs)),
        CmpOp::In => contains(vm, rhs, lhs),
        CmpOp::NotIn => contains(vm, rhs, lhs).map(|b| !b),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ordering = lhs.py_partial_cmp(rhs).map_err(|_| {
                ExcType::type_error(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    symbol(op),
                    lhs.type_name(),
                    rhs.type_name()
                ))
            })?;
            // Unordered operands (NaN) compare false under every ordering op.
            Ok(match ordering {
                None => false,
                Some(ordering) => match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                    _ => unreachable!(),
                },
            })
        }
    }
}

fn symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        _ => "==",
    }
}

/// `item in container`, with the identity-or-equality membership rule.
pub fn contains(vm: &mut Vm, container: &Value, item: &Value) -> RunResult<bool> {
    match container {
        Value::List(items) => {
            let items = items.borrow().clone();
            Ok(items.iter().any(|v| v.is_identical(item) || v.py_eq(item)))
        }
        Value::Tuple(items) => Ok(items.iter().any(|v| v.is_identical(item) || v.py_eq(item))),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_ref())),
            other => Err(ExcType::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Dict(d) => d.borrow().contains(item),
        Value::Set(s) => s.borrow().contains(item),
        Value::Range(r) => match item.as_index("range") {
            Ok(i) => Ok(r.contains(i)),
            Err(_) => Ok(false),
        },
        Value::Generator(_) | Value::Iterator(_) => {
            let mut iter = PyIter::from_value(container)?;
            while let Some(v) = iter.next(vm)? {
                if v.is_identical(item) || v.py_eq(item) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(ExcType::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

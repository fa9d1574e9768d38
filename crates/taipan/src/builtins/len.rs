//! Implementation of the len() builtin function.

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    value::Value,
};

pub fn builtin_len(args: &CallArgs) -> RunResult<Value> {
    let value = args.clone().expect_one("len")?;
    let len = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(l) => l.borrow().len(),
        Value::Tuple(t) => t.len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Set(s) => s.borrow().len(),
        Value::Range(r) => r.len() as usize,
        other => {
            return Err(ExcType::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    Ok(Value::Int(len as i64))
}

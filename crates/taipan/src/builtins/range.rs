//! Implementation of the range() builtin.

use std::rc::Rc;

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    types::RangeObject,
    value::Value,
};

pub fn builtin_range(mut args: CallArgs) -> RunResult<Value> {
    args.reject_kwargs("range")?;
    let (start, stop, step) = match args.positional.len() {
        1 => (0, args.positional.remove(0).as_index("range")?, 1),
        2 => (
            args.positional.remove(0).as_index("range")?,
            args.positional.remove(0).as_index("range")?,
            1,
        ),
        3 => (
            args.positional.remove(0).as_index("range")?,
            args.positional.remove(0).as_index("range")?,
            args.positional.remove(0).as_index("range")?,
        ),
        n => {
            return Err(ExcType::type_error(format!(
                "range expected 1 to 3 arguments, got {n}"
            )));
        }
    };
    Ok(Value::Range(Rc::new(RangeObject::new(start, stop, step)?)))
}

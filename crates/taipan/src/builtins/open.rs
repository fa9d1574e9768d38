//! Implementation of the open() builtin function.

use std::{cell::RefCell, rc::Rc};

use crate::{
    args::CallArgs,
    exception::{ExcType, RunResult},
    types::{FileObject, file::FileMode},
    value::Value,
};

/// `open(path, mode='r')`: returns a file usable as a context manager.
pub fn builtin_open(args: CallArgs) -> RunResult<Value> {
    let (path, mode) = args.expect_one_or_two("open")?;
    let Value::Str(path) = path else {
        return Err(ExcType::type_error(format!(
            "open() argument 'file' must be str, not {}",
            path.type_name()
        )));
    };
    let mode = match mode {
        None => FileMode::Read,
        Some(Value::Str(m)) => FileMode::parse(&m)?,
        Some(other) => {
            return Err(ExcType::type_error(format!(
                "open() argument 'mode' must be str, not {}",
                other.type_name()
            )));
        }
    };
    let file = FileObject::open(&path, mode)?;
    Ok(Value::File(Rc::new(RefCell::new(file))))
}

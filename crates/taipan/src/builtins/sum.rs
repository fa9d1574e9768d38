//! Implementation of the sum() builtin function.

use crate::{
    args::CallArgs,
    ast::BinOp,
    bytecode::vm::{Vm, binary_op},
    exception::{ExcType, RunResult},
    types::PyIter,
    value::Value,
};

/// Sums the items of an iterable left to right with an optional start value.
///
/// String start values are rejected; `''.join(seq)` is the supported path for
/// string concatenation.
pub fn builtin_sum(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    let (iterable, start) = args.expect_one_or_two("sum")?;
    let mut accumulator = match start {
        Some(Value::Str(_)) => {
            return Err(ExcType::type_error(
                "sum() can't sum strings [use ''.join(seq) instead]",
            ));
        }
        Some(v) => v,
        None => Value::Int(0),
    };
    let mut iter = PyIter::from_value(&iterable)?;
    while let Some(item) = iter.next(vm)? {
        accumulator = binary_op(accumulator, item, BinOp::Add, false)?;
    }
    Ok(accumulator)
}

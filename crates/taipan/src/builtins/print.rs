//! Implementation of the print() builtin function.

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunResult},
    value::Value,
};

/// Implementation of the print() builtin function.
///
/// Defaults match the reference interpreter: `sep=' '`, `end='\n'`. Both
/// keyword arguments must be strings (or `None` for the defaults). Output
/// goes through the interpreter's `PrintWriter` only.
pub fn builtin_print(vm: &mut Vm, args: CallArgs) -> RunResult<Value> {
    let mut sep: Option<String> = None;
    let mut end: Option<String> = None;
    for (name, value) in &args.kwargs {
        match name.as_ref() {
            "sep" => sep = extract_str_kwarg("sep", value)?,
            "end" => end = extract_str_kwarg("end", value)?,
            other => {
                return Err(ExcType::type_error(format!(
                    "'{other}' is an invalid keyword argument for print()"
                )));
            }
        }
    }

    // Format everything first; print output is atomic per call.
    let mut output = String::new();
    for (i, value) in args.positional.iter().enumerate() {
        if i > 0 {
            output.push_str(sep.as_deref().unwrap_or(" "));
        }
        output.push_str(&vm.str_value(value)?);
    }
    output.push_str(end.as_deref().unwrap_or("\n"));

    vm.interp.printer.write(&output);
    Ok(Value::None)
}

fn extract_str_kwarg(name: &str, value: &Value) -> RunResult<Option<String>> {
    match value {
        Value::None => Ok(None),
        Value::Str(s) => Ok(Some(s.to_string())),
        other => Err(ExcType::type_error(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

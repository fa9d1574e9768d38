//! The `str` method surface and printf-style formatting.

use std::rc::Rc;

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunError, RunResult},
    fstring,
    types::PyIter,
    value::Value,
};

/// Method names `LOAD_ATTR` accepts on strings.
pub const METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "lstrip",
    "rstrip",
    "startswith",
    "endswith",
    "split",
    "splitlines",
    "count",
    "join",
    "replace",
    "format",
    "find",
    "isdigit",
    "isalpha",
    "title",
    "capitalize",
    "zfill",
];

/// Dispatches a bound string method call.
pub fn call_method(vm: &mut Vm, recv: &Rc<str>, name: &str, args: CallArgs) -> RunResult<Value> {
    match name {
        "upper" => {
            args.expect_exact("upper", 0)?;
            Ok(Value::str(recv.to_uppercase()))
        }
        "lower" => {
            args.expect_exact("lower", 0)?;
            Ok(Value::str(recv.to_lowercase()))
        }
        "strip" => strip(recv, args, "strip", true, true),
        "lstrip" => strip(recv, args, "lstrip", true, false),
        "rstrip" => strip(recv, args, "rstrip", false, true),
        "startswith" => {
            let prefix = expect_str(args.expect_one("startswith")?, "startswith")?;
            Ok(Value::Bool(recv.starts_with(prefix.as_ref())))
        }
        "endswith" => {
            let suffix = expect_str(args.expect_one("endswith")?, "endswith")?;
            Ok(Value::Bool(recv.ends_with(suffix.as_ref())))
        }
        "split" => split(recv, args),
        "splitlines" => {
            args.expect_exact("splitlines", 0)?;
            Ok(Value::list(recv.lines().map(Value::str).collect()))
        }
        "count" => {
            let needle = expect_str(args.expect_one("count")?, "count")?;
            if needle.is_empty() {
                return Ok(Value::Int(recv.chars().count() as i64 + 1));
            }
            Ok(Value::Int(recv.matches(needle.as_ref()).count() as i64))
        }
        "join" => join(vm, recv, args),
        "replace" => {
            let mut parts = args.expect_exact("replace", 2)?;
            let new = expect_str(parts.remove(1), "replace")?;
            let old = expect_str(parts.remove(0), "replace")?;
            Ok(Value::str(recv.replace(old.as_ref(), &new)))
        }
        "format" => fstring::str_format(recv, &args),
        "find" => {
            let needle = expect_str(args.expect_one("find")?, "find")?;
            match recv.find(needle.as_ref()) {
                // Convert the byte offset to a character offset.
                Some(byte_pos) => Ok(Value::Int(recv[..byte_pos].chars().count() as i64)),
                None => Ok(Value::Int(-1)),
            }
        }
        "isdigit" => {
            args.expect_exact("isdigit", 0)?;
            Ok(Value::Bool(!recv.is_empty() && recv.chars().all(|c| c.is_ascii_digit())))
        }
        "isalpha" => {
            args.expect_exact("isalpha", 0)?;
            Ok(Value::Bool(!recv.is_empty() && recv.chars().all(char::is_alphabetic)))
        }
        "title" => {
            args.expect_exact("title", 0)?;
            Ok(Value::str(title_case(recv)))
        }
        "capitalize" => {
            args.expect_exact("capitalize", 0)?;
            let mut chars = recv.chars();
            let out = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            };
            Ok(Value::str(out))
        }
        "zfill" => {
            let width = args.expect_one("zfill")?.as_index("zfill")?.max(0) as usize;
            Ok(Value::str(zfill(recv, width)))
        }
        _ => Err(ExcType::attribute_error("str", name)),
    }
}

fn expect_str(v: Value, method: &str) -> RunResult<Rc<str>> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(ExcType::type_error(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn strip(recv: &str, args: CallArgs, method: &str, left: bool, right: bool) -> RunResult<Value> {
    let chars = match args.expect_at_most_one(method)? {
        Some(v) => Some(expect_str(v, method)?),
        None => None,
    };
    let pred = |c: char| match &chars {
        Some(set) => set.contains(c),
        None => c.is_whitespace(),
    };
    let mut out = recv;
    if left {
        out = out.trim_start_matches(pred);
    }
    if right {
        out = out.trim_end_matches(pred);
    }
    Ok(Value::str(out))
}

fn split(recv: &str, args: CallArgs) -> RunResult<Value> {
    match args.expect_at_most_one("split")? {
        None => {
            // Whitespace split: runs collapse, no empty parts.
            Ok(Value::list(recv.split_whitespace().map(Value::str).collect()))
        }
        Some(sep) => {
            let sep = expect_str(sep, "split")?;
            if sep.is_empty() {
                return Err(ExcType::value_error("empty separator"));
            }
            Ok(Value::list(recv.split(sep.as_ref()).map(Value::str).collect()))
        }
    }
}

fn join(vm: &mut Vm, sep: &str, args: CallArgs) -> RunResult<Value> {
    let iterable = args.expect_one("join")?;
    let items = PyIter::from_value(&iterable)?.collect(vm)?;
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let Value::Str(s) = item else {
            return Err(ExcType::type_error(format!(
                "sequence item {i}: expected str instance, {} found",
                item.type_name()
            )));
        };
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(s);
    }
    Ok(Value::str(out))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn zfill(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_owned();
    }
    let fill = "0".repeat(width - len);
    if let Some(rest) = s.strip_prefix('-') {
        format!("-{fill}{rest}")
    } else if let Some(rest) = s.strip_prefix('+') {
        format!("+{fill}{rest}")
    } else {
        format!("{fill}{s}")
    }
}

/// `%`-formatting: `%d`, `%f`, `%s`, `%o` plus `%%`.
pub fn percent_format(template: &str, rhs: &Value) -> RunResult<Value> {
    let values: Vec<Value> = match rhs {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut out = String::new();
    let mut next = 0usize;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(kind) = chars.next() else {
            return Err(ExcType::value_error("incomplete format"));
        };
        if kind == '%' {
            out.push('%');
            continue;
        }
        let Some(value) = values.get(next) else {
            return Err(ExcType::type_error("not enough arguments for format string"));
        };
        next += 1;
        match kind {
            'd' => match value.as_number() {
                Some(crate::value::Number::Int(i)) => out.push_str(&i.to_string()),
                Some(crate::value::Number::Big(b)) => out.push_str(&b.to_string()),
                Some(crate::value::Number::Float(f)) => out.push_str(&(f.trunc() as i64).to_string()),
                None => {
                    return Err(ExcType::type_error(format!(
                        "%d format: a real number is required, not {}",
                        value.type_name()
                    )));
                }
            },
            'f' => match value.as_number() {
                Some(crate::value::Number::Int(i)) => out.push_str(&format!("{:.6}", i as f64)),
                Some(crate::value::Number::Float(f)) => out.push_str(&format!("{f:.6}")),
                Some(crate::value::Number::Big(b)) => {
                    use num_traits::ToPrimitive;
                    out.push_str(&format!("{:.6}", b.to_f64().unwrap_or(f64::INFINITY)));
                }
                None => {
                    return Err(ExcType::type_error(format!(
                        "%f format: a real number is required, not {}",
                        value.type_name()
                    )));
                }
            },
            's' => out.push_str(&value.py_str()),
            'o' => match value.as_index("%o") {
                Ok(i) => {
                    if i < 0 {
                        out.push('-');
                        out.push_str(&format!("{:o}", i.unsigned_abs()));
                    } else {
                        out.push_str(&format!("{i:o}"));
                    }
                }
                Err(_) => {
                    return Err(ExcType::type_error(format!(
                        "%o format: an integer is required, not {}",
                        value.type_name()
                    )));
                }
            },
            other => {
                return Err(ExcType::value_error(format!(
                    "unsupported format character '{other}'"
                )));
            }
        }
    }
    if next < values.len() && matches!(rhs, Value::Tuple(_)) {
        return Err(ExcType::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(Value::str(out))
}

/// String repetition for `*`; a non-positive count yields the empty string.
pub fn repeat(s: &str, count: i64) -> Value {
    if count <= 0 {
        return Value::str("");
    }
    Value::str(s.repeat(count as usize))
}

/// Character (or slice-free) indexing with negative wrap.
pub fn index(s: &str, idx: i64) -> RunResult<Value> {
    let len = s.chars().count() as i64;
    let i = if idx < 0 { idx + len } else { idx };
    if i < 0 || i >= len {
        return Err(RunError::new(ExcType::IndexError, "string index out of range"));
    }
    let c = s.chars().nth(i as usize).unwrap_or_default();
    Ok(Value::str(c.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_format() {
        let out = percent_format(
            "%s is %d and %f and %o",
            &Value::tuple(vec![Value::str("x"), Value::Int(3), Value::Float(1.5), Value::Int(8)]),
        )
        .unwrap();
        assert_eq!(out.py_str(), "x is 3 and 1.500000 and 10");
        assert_eq!(percent_format("100%%", &Value::tuple(vec![])).unwrap().py_str(), "100%");
        assert!(percent_format("%d %d", &Value::Int(1)).is_err());
    }

    #[test]
    fn test_repeat_and_index() {
        assert_eq!(repeat("ab", 3).py_str(), "ababab");
        assert_eq!(repeat("ab", -1).py_str(), "");
        assert_eq!(index("abc", -1).unwrap().py_str(), "c");
        assert!(index("abc", 3).is_err());
    }

    #[test]
    fn test_title_and_zfill() {
        assert_eq!(title_case("hello world"), "Hello World");
        assert_eq!(title_case("it's a test"), "It'S A Test");
        assert_eq!(zfill("42", 5), "00042");
        assert_eq!(zfill("-42", 5), "-0042");
        assert_eq!(zfill("42", 1), "42");
    }
}

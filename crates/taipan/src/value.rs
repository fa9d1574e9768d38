//! Tagged runtime values and their Python-observable semantics.
//!
//! Small values (ints, floats, bools, `None`) are stored inline; containers
//! and objects are reference-counted handles, so cloning a `Value` is cheap
//! and aliasing matches Python's object identity. Integers promote from i64
//! to `BigInt` on overflow and demote back when they fit.

use std::{cell::RefCell, cmp::Ordering, rc::Rc};

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::{
    builtins::Builtin,
    bytecode::code::{AstConst, Code},
    exception::{ExcType, RunError, RunResult},
    py_hash,
    types::{
        BoundMethod, BuiltinMethod, ClassObject, Dict, ExcObject, FileObject, Function, Generator, InstanceObject,
        ModuleObject, PyIter, RangeObject, Set, SliceObject,
    },
};

/// Primary value type representing Python objects at runtime.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integer outside i64 range. Never holds a value that fits in i64;
    /// arithmetic demotes eagerly via [`bigint_to_value`].
    BigInt(Rc<BigInt>),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    /// A sequence with the immutable flag: only ever produced by tuple
    /// displays, `BUILD_TUPLE`, starred-argument packing, and `tuple()`.
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    Range(Rc<RangeObject>),
    Slice(Rc<SliceObject>),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    /// A method of a built-in type, bound to its receiver.
    BuiltinMethod(Rc<BuiltinMethod>),
    /// A built-in function or type constructor.
    Builtin(Builtin),
    Class(Rc<ClassObject>),
    Instance(Rc<InstanceObject>),
    /// A built-in exception class.
    ExcClass(ExcType),
    /// An instance of a built-in exception class.
    Exc(Rc<ExcObject>),
    Generator(Rc<RefCell<Generator>>),
    Iterator(Rc<RefCell<PyIter>>),
    File(Rc<RefCell<FileObject>>),
    Module(Rc<ModuleObject>),
    /// Compiled code object; appears only in constant pools.
    Code(Rc<Code>),
    /// Stored comprehension AST; appears only in constant pools.
    Ast(Rc<AstConst>),
}

impl Value {
    /// Wraps string content in a value.
    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    /// The Python type name used in error messages and `type()` output.
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_owned(),
            Self::Bool(_) => "bool".to_owned(),
            Self::Int(_) | Self::BigInt(_) => "int".to_owned(),
            Self::Float(_) => "float".to_owned(),
            Self::Str(_) => "str".to_owned(),
            Self::List(_) => "list".to_owned(),
            Self::Tuple(_) => "tuple".to_owned(),
            Self::Dict(_) => "dict".to_owned(),
            Self::Set(_) => "set".to_owned(),
            Self::Range(_) => "range".to_owned(),
            Self::Slice(_) => "slice".to_owned(),
            Self::Function(_) | Self::BoundMethod(_) => "function".to_owned(),
            Self::BuiltinMethod(_) | Self::Builtin(_) => "builtin_function_or_method".to_owned(),
            Self::Class(_) | Self::ExcClass(_) => "type".to_owned(),
            Self::Instance(instance) => instance.class.name.to_string(),
            Self::Exc(exc) => exc.exc_type.to_string(),
            Self::Generator(_) => "generator".to_owned(),
            Self::Iterator(_) => "iterator".to_owned(),
            Self::File(_) => "file".to_owned(),
            Self::Module(_) => "module".to_owned(),
            Self::Code(_) | Self::Ast(_) => "code".to_owned(),
        }
    }

    /// Python truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::BigInt(b) => !b.is_zero(),
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::Dict(d) => !d.borrow().is_empty(),
            Self::Set(s) => !s.borrow().is_empty(),
            Self::Range(r) => r.len() > 0,
            _ => true,
        }
    }

    /// `is` / `is not` identity.
    ///
    /// Immediate values compare by content (mirroring CPython's small-value
    /// interning); heap values compare by handle. Float identity is bitwise,
    /// which gives `nan in [nan]` its identity fallback.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Range(a), Self::Range(b)) => Rc::ptr_eq(a, b),
            (Self::Slice(a), Self::Slice(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::BoundMethod(a), Self::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Self::BuiltinMethod(a), Self::BuiltinMethod(b)) => Rc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Class(a), Self::Class(b)) => Rc::ptr_eq(a, b),
            (Self::Instance(a), Self::Instance(b)) => Rc::ptr_eq(a, b),
            (Self::ExcClass(a), Self::ExcClass(b)) => a == b,
            (Self::Exc(a), Self::Exc(b)) => Rc::ptr_eq(a, b),
            (Self::Generator(a), Self::Generator(b)) => Rc::ptr_eq(a, b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python `==`.
    ///
    /// Numeric values compare across int/float/bool; `NaN != NaN`; containers
    /// compare structurally. Everything else falls back to identity.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a == b,
            _ => {
                if self.is_identical(other) {
                    return true;
                }
                self.py_eq_slow(other)
            }
        }
    }

    fn py_eq_slow(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Int(b)) => i64::from(*a) == *b,
            (Self::Int(a), Self::Bool(b)) => *a == i64::from(*b),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Bool(a), Self::Float(b)) | (Self::Float(b), Self::Bool(a)) => f64::from(i8::from(*a)) == *b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::BigInt(a), Self::Int(b)) | (Self::Int(b), Self::BigInt(a)) => **a == BigInt::from(*b),
            (Self::BigInt(a), Self::Float(b)) | (Self::Float(b), Self::BigInt(a)) => {
                a.to_f64().is_some_and(|f| f == *b)
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Self::Tuple(a), Self::Tuple(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y)),
            (Self::Dict(a), Self::Dict(b)) => a.borrow().py_eq(&b.borrow()),
            (Self::Set(a), Self::Set(b)) => a.borrow().py_eq(&b.borrow()),
            (Self::Range(a), Self::Range(b)) => {
                // Ranges compare as the sequences they denote.
                a.len() == b.len()
                    && (a.len() == 0 || (a.start == b.start && (a.len() == 1 || a.step == b.step)))
            }
            _ => false,
        }
    }

    /// Partial ordering for `<`, `<=`, `>`, `>=`.
    ///
    /// `Ok(None)` means "unordered without error" (NaN involved); an actual
    /// type mismatch is a `TypeError`.
    pub fn py_partial_cmp(&self, other: &Self) -> RunResult<Option<Ordering>> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return Ok(Number::partial_cmp(&a, &b));
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Ok(Some(a.cmp(b))),
            (Self::List(a), Self::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                seq_partial_cmp(&a, &b)
            }
            (Self::Tuple(a), Self::Tuple(b)) => seq_partial_cmp(a, b),
            _ => Err(ExcType::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Projects a numeric value (bool, int, bigint, float) for arithmetic.
    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::BigInt(b) => Some(Number::Big(b.clone())),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Extracts an index-sized integer, for subscripts and repetition counts.
    pub fn as_index(&self, context: &str) -> RunResult<i64> {
        match self {
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Int(i) => Ok(*i),
            Self::BigInt(b) => b
                .to_i64()
                .ok_or_else(|| ExcType::value_error(format!("{context} index out of range"))),
            _ => Err(ExcType::type_error(format!(
                "{context} indices must be integers, not {}",
                self.type_name()
            ))),
        }
    }

    /// Hashes the value for dict/set keying; containers are unhashable.
    pub fn py_hash(&self) -> RunResult<u64> {
        match self {
            Self::None => Ok(0x6eb5_2b3c),
            Self::Bool(b) => Ok(py_hash::hash_int(i64::from(*b))),
            Self::Int(i) => Ok(py_hash::hash_int(*i)),
            Self::BigInt(b) => Ok(py_hash::hash_bigint(b)),
            Self::Float(f) => Ok(py_hash::hash_float(*f)),
            Self::Str(s) => Ok(py_hash::hash_str(s)),
            Self::Tuple(items) => {
                let mut acc: u64 = 0x345678;
                for item in items.iter() {
                    acc = acc.wrapping_mul(1_000_003) ^ item.py_hash()?;
                }
                Ok(acc)
            }
            Self::List(_) | Self::Dict(_) | Self::Set(_) => Err(ExcType::type_error(format!(
                "unhashable type: '{}'",
                self.type_name()
            ))),
            // Objects hash by identity.
            other => Ok(identity_hash(other)),
        }
    }

    /// `repr()` text.
    #[must_use]
    pub fn py_repr(&self) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Bool(true) => "True".to_owned(),
            Self::Bool(false) => "False".to_owned(),
            Self::Int(i) => i.to_string(),
            Self::BigInt(b) => b.to_string(),
            Self::Float(f) => float_repr(*f),
            Self::Str(s) => string_repr(s),
            Self::List(items) => {
                let items = items.borrow();
                let parts: Vec<String> = items.iter().map(Self::py_repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Self::Tuple(items) => match items.len() {
                0 => "()".to_owned(),
                1 => format!("({},)", items[0].py_repr()),
                _ => {
                    let parts: Vec<String> = items.iter().map(Self::py_repr).collect();
                    format!("({})", parts.join(", "))
                }
            },
            Self::Dict(d) => d.borrow().py_repr(),
            Self::Set(s) => s.borrow().py_repr(),
            Self::Range(r) => r.py_repr(),
            Self::Slice(s) => s.py_repr(),
            Self::Function(f) => format!("<function {} at 0x{:012x}>", f.name, Rc::as_ptr(f) as usize),
            Self::BoundMethod(m) => m.py_repr(),
            Self::BuiltinMethod(m) => m.py_repr(),
            Self::Builtin(b) => b.py_repr(),
            Self::Class(c) => format!("<class '{}'>", c.name),
            Self::Instance(i) => format!("<{} object at 0x{:012x}>", i.class.name, Rc::as_ptr(i) as usize),
            Self::ExcClass(t) => format!("<class '{t}'>"),
            Self::Exc(e) => e.py_repr(),
            Self::Generator(g) => {
                format!("<generator object {} at 0x{:012x}>", g.borrow().name, Rc::as_ptr(g) as usize)
            }
            Self::Iterator(i) => format!("<iterator object at 0x{:012x}>", Rc::as_ptr(i) as usize),
            Self::File(f) => f.borrow().py_repr(),
            Self::Module(m) => format!("<module '{}'>", m.name),
            Self::Code(c) => format!("<code object {}>", c.name),
            Self::Ast(_) => "<code object <comprehension>>".to_owned(),
        }
    }

    /// `str()` text: like `repr()` except strings print raw and exception
    /// instances print their message.
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exc(e) => e.message_text(),
            other => other.py_repr(),
        }
    }
}

/// Numeric projection used by arithmetic and comparisons.
pub enum Number {
    Int(i64),
    Big(Rc<BigInt>),
    Float(f64),
}

impl Number {
    fn partial_cmp(a: &Self, b: &Self) -> Option<Ordering> {
        match (a, b) {
            (Self::Int(x), Self::Int(y)) => Some(x.cmp(y)),
            (Self::Float(x), Self::Float(y)) => x.partial_cmp(y),
            (Self::Int(x), Self::Float(y)) => (*x as f64).partial_cmp(y),
            (Self::Float(x), Self::Int(y)) => x.partial_cmp(&(*y as f64)),
            (Self::Big(x), Self::Big(y)) => Some(x.cmp(y)),
            (Self::Big(x), Self::Int(y)) => Some((**x).cmp(&BigInt::from(*y))),
            (Self::Int(x), Self::Big(y)) => Some(BigInt::from(*x).cmp(y)),
            (Self::Big(x), Self::Float(y)) => x.to_f64().and_then(|f| f.partial_cmp(y)),
            (Self::Float(x), Self::Big(y)) => y.to_f64().and_then(|f| x.partial_cmp(&f)),
        }
    }
}

/// Lexicographic sequence comparison; errors propagate from element compares.
fn seq_partial_cmp(a: &[Value], b: &[Value]) -> RunResult<Option<Ordering>> {
    for (x, y) in a.iter().zip(b.iter()) {
        if x.py_eq(y) {
            continue;
        }
        return x.py_partial_cmp(y);
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Hash for values that key by identity (functions, instances, ...).
fn identity_hash(v: &Value) -> u64 {
    let addr = match v {
        Value::Function(f) => Rc::as_ptr(f) as usize,
        Value::BoundMethod(m) => Rc::as_ptr(m) as usize,
        Value::BuiltinMethod(m) => Rc::as_ptr(m) as usize,
        Value::Class(c) => Rc::as_ptr(c) as usize,
        Value::Instance(i) => Rc::as_ptr(i) as usize,
        Value::Exc(e) => Rc::as_ptr(e) as usize,
        Value::Generator(g) => Rc::as_ptr(g) as usize,
        Value::Iterator(i) => Rc::as_ptr(i) as usize,
        Value::File(f) => Rc::as_ptr(f) as usize,
        Value::Module(m) => Rc::as_ptr(m) as usize,
        Value::Range(r) => Rc::as_ptr(r) as usize,
        Value::Slice(s) => Rc::as_ptr(s) as usize,
        Value::Builtin(b) => *b as usize,
        Value::ExcClass(t) => py_hash::hash_str(<&'static str>::from(*t)) as usize,
        _ => 0,
    };
    py_hash::hash_int(addr as i64)
}

/// Demotes a `BigInt` to `Value::Int` when it fits.
#[must_use]
pub fn bigint_to_value(b: BigInt) -> Value {
    match b.to_i64() {
        Some(i) => Value::Int(i),
        None => Value::BigInt(Rc::new(b)),
    }
}

/// Formats a float the way Python's `repr` does.
///
/// Shortest round-trip digits, a mandatory `.0` for integral values, and
/// scientific notation outside `1e-4 ..= ~1e16` with a signed, two-digit
/// minimum exponent.
#[must_use]
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let mut buffer = ryu::Buffer::new();
    let shortest = buffer.format_finite(f);
    let (digits, exp) = split_shortest(shortest);
    // Python switches to scientific when the decimal exponent is < -4 or the
    // value needs 17+ digits before the point.
    let sign = if digits.starts_with('-') { "-" } else { "" };
    let bare: &str = digits.trim_start_matches('-');
    let point = exp + 1; // digits before the decimal point
    if (-3..17).contains(&point) {
        positional(sign, bare, point)
    } else {
        scientific(sign, bare, exp)
    }
}

/// Splits a ryu-formatted float into bare significant digits and the decimal
/// exponent of the leading digit.
fn split_shortest(s: &str) -> (String, i32) {
    let (mantissa, exp) = match s.find(['e', 'E']) {
        Some(pos) => {
            let e: i32 = s[pos + 1..].parse().unwrap_or(0);
            (&s[..pos], e)
        }
        None => (s, 0),
    };
    let negative = mantissa.starts_with('-');
    let mantissa = mantissa.trim_start_matches('-');
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(pos) => (&mantissa[..pos], &mantissa[pos + 1..]),
        None => (mantissa, ""),
    };
    let mut digits: String = format!("{int_part}{frac_part}");
    // Exponent of the first digit: int_part length - 1, adjusted by e.
    let mut lead_exp = i32::try_from(int_part.len()).unwrap_or(0) - 1 + exp;
    // Strip leading zeros ("0.5" -> digits "05").
    while digits.len() > 1 && digits.starts_with('0') {
        digits.remove(0);
        lead_exp -= 1;
    }
    // Strip trailing zeros; they are not significant.
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    if digits == "0" {
        lead_exp = 0;
    }
    let digits = if negative { format!("-{digits}") } else { digits };
    (digits, lead_exp)
}

fn positional(sign: &str, digits: &str, point: i32) -> String {
    if point <= 0 {
        let zeros = "0".repeat(point.unsigned_abs() as usize);
        format!("{sign}0.{zeros}{digits}")
    } else if (point as usize) >= digits.len() {
        let zeros = "0".repeat(point as usize - digits.len());
        format!("{sign}{digits}{zeros}.0")
    } else {
        let (a, b) = digits.split_at(point as usize);
        format!("{sign}{a}.{b}")
    }
}

fn scientific(sign: &str, digits: &str, exp: i32) -> String {
    let mantissa = if digits.len() == 1 {
        digits.to_owned()
    } else {
        let (a, b) = digits.split_at(1);
        format!("{a}.{b}")
    };
    let exp_sign = if exp < 0 { '-' } else { '+' };
    format!("{sign}{mantissa}e{exp_sign}{:02}", exp.unsigned_abs())
}

/// Formats string content the way Python's `repr` does.
#[must_use]
pub fn string_repr(s: &str) -> String {
    // Prefer single quotes; switch to double quotes when the content contains
    // a single quote but no double quote.
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Raises the uncatchable diagnostic for a missing value on the operand stack.
pub fn stack_underflow(code_name: &str, pc: usize) -> RunError {
    RunError::internal(format!("operand stack underflow in {code_name} at pc {pc}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_float_bool_equality() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).py_eq(&Value::Int(1)));
        assert!(Value::Bool(true).py_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).py_eq(&Value::Int(2)));
        assert!(!Value::Str(Rc::from("1")).py_eq(&Value::Int(1)));
    }

    #[test]
    fn test_nan_not_equal_to_itself() {
        let nan = Value::Float(f64::NAN);
        assert!(!nan.py_eq(&nan.clone()));
        // Identity fallback still holds for membership tests.
        assert!(nan.is_identical(&nan.clone()));
    }

    #[test]
    fn test_list_identity_vs_equality() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        let c = Value::list(vec![Value::Int(1)]);
        assert!(a.is_identical(&b));
        assert!(!a.is_identical(&c));
        assert!(a.py_eq(&c));
    }

    #[test]
    fn test_list_tuple_not_equal() {
        let l = Value::list(vec![Value::Int(1)]);
        let t = Value::tuple(vec![Value::Int(1)]);
        assert!(!l.py_eq(&t));
    }

    #[test]
    fn test_float_repr_basic() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(-2.5), "-2.5");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(0.0), "0.0");
        assert_eq!(float_repr(f64::NAN), "nan");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn test_float_repr_scientific() {
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1e-5), "1e-05");
        assert_eq!(float_repr(1.5e20), "1.5e+20");
        assert_eq!(float_repr(1e15), "1000000000000000.0");
        assert_eq!(float_repr(0.0001), "0.0001");
    }

    #[test]
    fn test_int_repr_vs_float_repr() {
        assert_eq!(Value::Int(1).py_repr(), "1");
        assert_eq!(Value::Float(1.0).py_repr(), "1.0");
    }

    #[test]
    fn test_string_repr_quoting() {
        assert_eq!(string_repr("hi"), "'hi'");
        assert_eq!(string_repr("it's"), "\"it's\"");
        assert_eq!(string_repr("a\nb"), "'a\\nb'");
        assert_eq!(string_repr("both'\""), "'both\\'\"'");
    }

    #[test]
    fn test_container_repr() {
        let l = Value::list(vec![Value::Int(1), Value::str("a")]);
        assert_eq!(l.py_repr(), "[1, 'a']");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).py_repr(), "(1,)");
        assert_eq!(Value::tuple(vec![]).py_repr(), "()");
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            Value::Int(1).py_partial_cmp(&Value::Float(1.5)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(f64::NAN).py_partial_cmp(&Value::Float(1.0)).unwrap(),
            None
        );
        assert!(Value::Int(1).py_partial_cmp(&Value::str("a")).is_err());
    }

    #[test]
    fn test_bigint_demotion() {
        assert!(matches!(bigint_to_value(BigInt::from(7)), Value::Int(7)));
        let big = BigInt::from(i64::MAX) * 2;
        assert!(matches!(bigint_to_value(big), Value::BigInt(_)));
    }
}

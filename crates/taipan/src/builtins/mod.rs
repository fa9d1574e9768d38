//! Built-in functions, type constructors and their dispatch.

mod abs_round;
mod convert;
mod iter_tools;
mod len;
mod min_max;
mod open;
mod print;
mod range;
mod sorted;
mod sum;
mod type_;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::RunResult,
    value::Value,
};

/// Every built-in callable, looked up by its Python name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum Builtin {
    #[strum(serialize = "print")]
    Print,
    #[strum(serialize = "len")]
    Len,
    #[strum(serialize = "range")]
    Range,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "tuple")]
    Tuple,
    #[strum(serialize = "set")]
    Set,
    #[strum(serialize = "dict")]
    Dict,
    #[strum(serialize = "str")]
    Str,
    #[strum(serialize = "int")]
    Int,
    #[strum(serialize = "float")]
    Float,
    #[strum(serialize = "bool")]
    Bool,
    #[strum(serialize = "type")]
    Type,
    #[strum(serialize = "isinstance")]
    Isinstance,
    #[strum(serialize = "enumerate")]
    Enumerate,
    #[strum(serialize = "zip")]
    Zip,
    #[strum(serialize = "sorted")]
    Sorted,
    #[strum(serialize = "reversed")]
    Reversed,
    #[strum(serialize = "map")]
    Map,
    #[strum(serialize = "filter")]
    Filter,
    #[strum(serialize = "next")]
    Next,
    #[strum(serialize = "abs")]
    Abs,
    #[strum(serialize = "round")]
    Round,
    #[strum(serialize = "sum")]
    Sum,
    #[strum(serialize = "min")]
    Min,
    #[strum(serialize = "max")]
    Max,
    #[strum(serialize = "open")]
    Open,
    /// The hidden callable pushed by `LOAD_BUILD_CLASS`.
    #[strum(serialize = "__build_class__")]
    BuildClass,
}

impl Builtin {
    /// True for the builtins that are type objects rather than functions.
    #[must_use]
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::List
                | Self::Tuple
                | Self::Set
                | Self::Dict
                | Self::Str
                | Self::Int
                | Self::Float
                | Self::Bool
                | Self::Range
                | Self::Type
                | Self::Enumerate
                | Self::Zip
                | Self::Map
                | Self::Filter
                | Self::Reversed
        )
    }

    #[must_use]
    pub fn py_repr(self) -> String {
        if self.is_type() {
            format!("<class '{self}'>")
        } else {
            format!("<built-in function {self}>")
        }
    }
}

/// Invokes a built-in.
pub fn call(vm: &mut Vm, builtin: Builtin, args: CallArgs) -> RunResult<Value> {
    match builtin {
        Builtin::Print => print::builtin_print(vm, args),
        Builtin::Len => len::builtin_len(&args),
        Builtin::Range => range::builtin_range(args),
        Builtin::List => convert::builtin_list(vm, args),
        Builtin::Tuple => convert::builtin_tuple(vm, args),
        Builtin::Set => convert::builtin_set(vm, args),
        Builtin::Dict => convert::builtin_dict(vm, args),
        Builtin::Str => convert::builtin_str(vm, args),
        Builtin::Int => convert::builtin_int(args),
        Builtin::Float => convert::builtin_float(args),
        Builtin::Bool => convert::builtin_bool(args),
        Builtin::Type => type_::builtin_type(args),
        Builtin::Isinstance => type_::builtin_isinstance(args),
        Builtin::Enumerate => iter_tools::builtin_enumerate(args),
        Builtin::Zip => iter_tools::builtin_zip(args),
        Builtin::Sorted => sorted::builtin_sorted(vm, args),
        Builtin::Reversed => iter_tools::builtin_reversed(vm, args),
        Builtin::Map => iter_tools::builtin_map(args),
        Builtin::Filter => iter_tools::builtin_filter(args),
        Builtin::Next => iter_tools::builtin_next(vm, args),
        Builtin::Abs => abs_round::builtin_abs(args),
        Builtin::Round => abs_round::builtin_round(args),
        Builtin::Sum => sum::builtin_sum(vm, args),
        Builtin::Min => min_max::builtin_min(vm, args),
        Builtin::Max => min_max::builtin_max(vm, args),
        Builtin::Open => open::builtin_open(args),
        Builtin::BuildClass => unreachable!("BuildClass dispatches in the VM"),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_names_round_trip() {
        assert_eq!(Builtin::from_str("print").unwrap(), Builtin::Print);
        assert_eq!(Builtin::Sorted.to_string(), "sorted");
        assert!(Builtin::from_str("no_such_builtin").is_err());
    }

    #[test]
    fn test_repr_shapes() {
        assert_eq!(Builtin::Int.py_repr(), "<class 'int'>");
        assert_eq!(Builtin::Print.py_repr(), "<built-in function print>");
    }
}

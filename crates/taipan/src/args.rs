//! Call-site argument packaging shared by the VM and builtin functions.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    exception::{ExcType, RunResult},
    value::Value,
};

/// Arguments for one call: positionals in order plus keyword pairs.
///
/// Keyword order is preserved so `**kwargs` dicts keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: SmallVec<[Value; 4]>,
    pub kwargs: SmallVec<[(Rc<str>, Value); 2]>,
}

impl CallArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            kwargs: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn one(value: Value) -> Self {
        Self::positional([value])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.kwargs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects any keyword arguments, naming the callable in the error.
    pub fn reject_kwargs(&self, callable: &str) -> RunResult<()> {
        if let Some((name, _)) = self.kwargs.first() {
            return Err(ExcType::type_error(format!(
                "{callable}() got an unexpected keyword argument '{name}'"
            )));
        }
        Ok(())
    }

    /// Exactly `n` positional arguments and no keywords.
    pub fn expect_exact(mut self, callable: &str, n: usize) -> RunResult<SmallVec<[Value; 4]>> {
        self.reject_kwargs(callable)?;
        if self.positional.len() != n {
            return Err(ExcType::type_error(format!(
                "{callable}() takes exactly {n} argument{} ({} given)",
                if n == 1 { "" } else { "s" },
                self.positional.len()
            )));
        }
        Ok(std::mem::take(&mut self.positional))
    }

    /// Exactly one positional argument and no keywords.
    pub fn expect_one(self, callable: &str) -> RunResult<Value> {
        let mut args = self.expect_exact(callable, 1)?;
        Ok(args.remove(0))
    }

    /// One required and one optional positional argument, no keywords.
    pub fn expect_one_or_two(mut self, callable: &str) -> RunResult<(Value, Option<Value>)> {
        self.reject_kwargs(callable)?;
        match self.positional.len() {
            1 => Ok((self.positional.remove(0), None)),
            2 => {
                let second = self.positional.remove(1);
                Ok((self.positional.remove(0), Some(second)))
            }
            n => Err(ExcType::type_error(format!(
                "{callable}() takes 1 or 2 arguments ({n} given)"
            ))),
        }
    }

    /// Zero or one positional argument, no keywords.
    pub fn expect_at_most_one(mut self, callable: &str) -> RunResult<Option<Value>> {
        self.reject_kwargs(callable)?;
        match self.positional.len() {
            0 => Ok(None),
            1 => Ok(Some(self.positional.remove(0))),
            n => Err(ExcType::type_error(format!(
                "{callable}() takes at most 1 argument ({n} given)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_one() {
        let args = CallArgs::one(Value::Int(1));
        assert!(matches!(args.expect_one("len"), Ok(Value::Int(1))));
        let args = CallArgs::positional([Value::Int(1), Value::Int(2)]);
        assert!(args.expect_one("len").is_err());
    }

    #[test]
    fn test_reject_kwargs() {
        let mut args = CallArgs::new();
        args.kwargs.push(("x".into(), Value::None));
        assert!(args.reject_kwargs("abs").is_err());
    }
}

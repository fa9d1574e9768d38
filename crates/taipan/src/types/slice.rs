//! Slice objects and Python slice-index resolution.

use crate::{
    exception::{ExcType, RunResult},
    value::Value,
};

/// A `start:stop:step` slice with unresolved (possibly absent) parts.
#[derive(Debug, Clone)]
pub struct SliceObject {
    pub start: Option<Value>,
    pub stop: Option<Value>,
    pub step: Option<Value>,
}

impl SliceObject {
    #[must_use]
    pub fn py_repr(&self) -> String {
        let part = |v: &Option<Value>| v.as_ref().map_or_else(|| "None".to_owned(), Value::py_repr);
        format!("slice({}, {}, {})", part(&self.start), part(&self.stop), part(&self.step))
    }

    /// Resolves against a sequence length, yielding the index walk
    /// `(start, step, count)` with Python clamping rules applied.
    pub fn resolve(&self, len: usize) -> RunResult<ResolvedSlice> {
        let len = len as i64;
        let step = match &self.step {
            None | Some(Value::None) => 1,
            Some(v) => v.as_index("slice")?,
        };
        if step == 0 {
            return Err(ExcType::value_error("slice step cannot be zero"));
        }
        let (default_start, default_stop) = if step > 0 { (0, len) } else { (len - 1, -1) };
        let clamp = |v: i64| -> i64 {
            let v = if v < 0 { v + len } else { v };
            if step > 0 {
                v.clamp(0, len)
            } else {
                v.clamp(-1, len - 1)
            }
        };
        let start = match &self.start {
            None | Some(Value::None) => default_start,
            Some(v) => clamp(v.as_index("slice")?),
        };
        let stop = match &self.stop {
            None | Some(Value::None) => default_stop,
            Some(v) => clamp(v.as_index("slice")?),
        };
        let count = if step > 0 {
            if stop > start { (stop - start + step - 1) / step } else { 0 }
        } else if start > stop {
            (start - stop + (-step) - 1) / (-step)
        } else {
            0
        };
        Ok(ResolvedSlice { start, step, count })
    }
}

/// A slice resolved against a concrete sequence length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSlice {
    pub start: i64,
    pub step: i64,
    pub count: i64,
}

impl ResolvedSlice {
    /// Iterates the selected indices in slice order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        let (start, step) = (self.start, self.step);
        (0..self.count).map(move |i| (start + i * step) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> SliceObject {
        SliceObject {
            start: start.map(Value::Int),
            stop: stop.map(Value::Int),
            step: step.map(Value::Int),
        }
    }

    #[test]
    fn test_full_slice() {
        let r = slice(None, None, None).resolve(5).unwrap();
        assert_eq!((r.start, r.step, r.count), (0, 1, 5));
    }

    #[test]
    fn test_negative_indices() {
        let r = slice(Some(-3), None, None).resolve(5).unwrap();
        assert_eq!((r.start, r.count), (2, 3));
        let r = slice(None, Some(-1), None).resolve(5).unwrap();
        assert_eq!(r.count, 4);
    }

    #[test]
    fn test_negative_step() {
        let r = slice(None, None, Some(-1)).resolve(4).unwrap();
        let idx: Vec<usize> = r.indices().collect();
        assert_eq!(idx, vec![3, 2, 1, 0]);
        let r = slice(Some(3), Some(0), Some(-2)).resolve(5).unwrap();
        let idx: Vec<usize> = r.indices().collect();
        assert_eq!(idx, vec![3, 1]);
    }

    #[test]
    fn test_empty_for_invalid_ranges() {
        assert_eq!(slice(Some(4), Some(2), None).resolve(5).unwrap().count, 0);
        assert_eq!(slice(Some(10), Some(20), None).resolve(5).unwrap().count, 0);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(slice(None, None, Some(0)).resolve(5).is_err());
    }
}

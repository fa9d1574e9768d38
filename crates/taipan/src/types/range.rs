//! The `range` object: a lazily-evaluated arithmetic sequence.

use crate::{
    exception::{ExcType, RunError, RunResult},
    value::Value,
};

/// `range(start, stop, step)` with a non-zero step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeObject {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeObject {
    pub fn new(start: i64, stop: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(ExcType::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    /// Number of elements the range denotes.
    #[must_use]
    pub fn len(&self) -> i64 {
        if self.step > 0 {
            if self.stop > self.start {
                (self.stop - self.start + self.step - 1) / self.step
            } else {
                0
            }
        } else if self.start > self.stop {
            (self.start - self.stop + (-self.step) - 1) / (-self.step)
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, supporting negative indices.
    pub fn get(&self, index: i64) -> RunResult<i64> {
        let len = self.len();
        let idx = if index < 0 { index + len } else { index };
        if idx < 0 || idx >= len {
            return Err(RunError::new(ExcType::IndexError, "range object index out of range"));
        }
        Ok(self.start + idx * self.step)
    }

    /// Membership test by arithmetic, not iteration.
    #[must_use]
    pub fn contains(&self, v: i64) -> bool {
        if self.step > 0 {
            v >= self.start && v < self.stop && (v - self.start) % self.step == 0
        } else {
            v <= self.start && v > self.stop && (self.start - v) % (-self.step) == 0
        }
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        if self.step == 1 {
            format!("range({}, {})", self.start, self.stop)
        } else {
            format!("range({}, {}, {})", self.start, self.stop, self.step)
        }
    }

    /// Materializes the elements; used by `list(range(...))` and friends.
    #[must_use]
    pub fn to_values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        let mut v = self.start;
        while (self.step > 0 && v < self.stop) || (self.step < 0 && v > self.stop) {
            out.push(Value::Int(v));
            v += self.step;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_len() {
        assert_eq!(RangeObject::new(0, 10, 1).unwrap().len(), 10);
        assert_eq!(RangeObject::new(0, 10, 3).unwrap().len(), 4);
        assert_eq!(RangeObject::new(10, 0, -1).unwrap().len(), 10);
        assert_eq!(RangeObject::new(0, 10, -1).unwrap().len(), 0);
        assert_eq!(RangeObject::new(5, 5, 1).unwrap().len(), 0);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(RangeObject::new(0, 1, 0).is_err());
    }

    #[test]
    fn test_get_and_contains() {
        let r = RangeObject::new(1, 11, 2).unwrap();
        assert_eq!(r.get(0).unwrap(), 1);
        assert_eq!(r.get(-1).unwrap(), 9);
        assert!(r.get(5).is_err());
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert!(!r.contains(11));
    }
}

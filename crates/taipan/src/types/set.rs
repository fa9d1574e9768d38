//! Insertion-ordered set sharing the dict key semantics.

use indexmap::IndexSet;

use crate::{
    exception::{ExcType, RunError, RunResult},
    types::dict::DictKey,
    value::Value,
};

/// Insertion-ordered set with Python-keyed membership.
#[derive(Debug, Clone, Default)]
pub struct Set {
    entries: IndexSet<DictKey>,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(&mut self, value: Value) -> RunResult<()> {
        self.entries.insert(DictKey::new(value)?);
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> RunResult<bool> {
        Ok(self.entries.contains(&DictKey::new(value.clone())?))
    }

    /// `remove`: errors with `KeyError` when the element is absent.
    pub fn remove(&mut self, value: &Value) -> RunResult<()> {
        if self.entries.shift_remove(&DictKey::new(value.clone())?) {
            Ok(())
        } else {
            Err(RunError::new(ExcType::KeyError, value.py_repr()))
        }
    }

    /// `discard`: silently ignores absent elements.
    pub fn discard(&mut self, value: &Value) -> RunResult<()> {
        self.entries.shift_remove(&DictKey::new(value.clone())?);
        Ok(())
    }

    /// Removes and returns the first element in insertion order.
    pub fn pop(&mut self) -> Option<Value> {
        let key = self.entries.first()?.clone();
        self.entries.shift_remove(&key);
        Some(key.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|k| k.value.clone()).collect()
    }

    pub fn update(&mut self, other: &Self) {
        for k in &other.entries {
            self.entries.insert(k.clone());
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.update(other);
        out
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let entries = self.entries.iter().filter(|k| other.entries.contains(*k)).cloned().collect();
        Self { entries }
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|k| !other.entries.contains(*k))
            .cloned()
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let mut out = self.difference(other);
        for k in other.entries.iter().filter(|k| !self.entries.contains(*k)) {
            out.entries.insert(k.clone());
        }
        out
    }

    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.entries.iter().all(|k| other.entries.contains(k))
    }

    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.is_subset(other)
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        if self.entries.is_empty() {
            return "set()".to_owned();
        }
        let parts: Vec<String> = self.entries.iter().map(|k| k.value.py_repr()).collect();
        format!("{{{}}}", parts.join(", "))
    }
}

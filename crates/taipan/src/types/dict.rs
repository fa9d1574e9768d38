//! Insertion-ordered dict with Python key semantics.
//!
//! Keys hash via [`crate::py_hash`], so `True`, `1` and `1.0` collapse to one
//! entry. Key equality is identity-or-equality, which gives NaN keys identity
//! semantics: a NaN key only matches the same NaN bit pattern.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::{exception::RunResult, value::Value};

/// A dict key with its precomputed hash.
#[derive(Debug, Clone)]
pub struct DictKey {
    pub value: Value,
    hash: u64,
}

impl DictKey {
    /// Wraps a value as a key; errors for unhashable types.
    pub fn new(value: Value) -> RunResult<Self> {
        let hash = value.py_hash()?;
        Ok(Self { value, hash })
    }
}

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        self.value.is_identical(&other.value) || self.value.py_eq(&other.value)
    }
}

impl Eq for DictKey {}

/// Insertion-ordered mapping with Python-keyed lookup.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: IndexMap<DictKey, Value>,
}

impl Dict {
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

    /// Inserts, preserving the original key object and position on overwrite.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<()> {
        let key = DictKey::new(key)?;
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let probe = DictKey::new(key.clone())?;
        Ok(self.entries.get(&probe).cloned())
    }

    pub fn contains(&self, key: &Value) -> RunResult<bool> {
        let probe = DictKey::new(key.clone())?;
        Ok(self.entries.contains_key(&probe))
    }

    /// Removes a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let probe = DictKey::new(key.clone())?;
        Ok(self.entries.shift_remove(&probe))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn keys(&self) -> Vec<Value> {
        self.entries.keys().map(|k| k.value.clone()).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.entries.values().cloned().collect()
    }

    #[must_use]
    pub fn items(&self) -> Vec<(Value, Value)> {
        self.entries.iter().map(|(k, v)| (k.value.clone(), v.clone())).collect()
    }

    /// Copies every entry of `other` into `self`, overwriting duplicates.
    pub fn update(&mut self, other: &Self) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| other.entries.get(k).is_some_and(|ov| v.py_eq(ov)))
    }

    #[must_use]
    pub fn py_repr(&self) -> String {
        if self.entries.is_empty() {
            return "{}".to_owned();
        }
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}: {}", k.value.py_repr(), v.py_repr()))
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}

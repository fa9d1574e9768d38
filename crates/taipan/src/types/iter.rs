//! The iteration protocol: one iterator type wrapping every iterable.
//!
//! `GET_ITER` builds a `PyIter` from lists, tuples, strings, sets, dicts
//! (keys), ranges, files and generators. The lazy builtins (`map`, `filter`,
//! `enumerate`, `zip`, `reversed`) are iterators too, so advancing may call
//! back into the VM.

use std::{cell::RefCell, rc::Rc};

use crate::{
    args::CallArgs,
    bytecode::vm::Vm,
    exception::{ExcType, RunResult},
    types::{FileObject, Generator},
    value::Value,
};

/// A live iterator over some iterable.
#[derive(Debug)]
pub enum PyIter {
    /// Snapshot sequence: strings, tuples, dict keys, sets.
    Seq { items: Vec<Value>, index: usize },
    /// Live list iterator: elements appended during iteration are visited.
    List {
        list: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    Range { current: i64, stop: i64, step: i64 },
    Generator(Rc<RefCell<Generator>>),
    Map { func: Value, inners: Vec<PyIter> },
    Filter {
        func: Option<Value>,
        inner: Box<PyIter>,
    },
    Enumerate { inner: Box<PyIter>, count: i64 },
    Zip { inners: Vec<PyIter> },
    File { file: Rc<RefCell<FileObject>> },
}

impl PyIter {
    /// Wraps an iterable value; `TypeError` for non-iterables.
    pub fn from_value(value: &Value) -> RunResult<Self> {
        match value {
            Value::List(list) => Ok(Self::List {
                list: list.clone(),
                index: 0,
            }),
            Value::Tuple(items) => Ok(Self::Seq {
                items: items.as_ref().clone(),
                index: 0,
            }),
            Value::Str(s) => Ok(Self::Seq {
                items: s.chars().map(|c| Value::str(c.to_string())).collect(),
                index: 0,
            }),
            Value::Set(s) => Ok(Self::Seq {
                items: s.borrow().values(),
                index: 0,
            }),
            Value::Dict(d) => Ok(Self::Seq {
                items: d.borrow().keys(),
                index: 0,
            }),
            Value::Range(r) => Ok(Self::Range {
                current: r.start,
                stop: r.stop,
                step: r.step,
            }),
            Value::Generator(g) => Ok(Self::Generator(g.clone())),
            Value::File(f) => Ok(Self::File { file: f.clone() }),
            other => Err(ExcType::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Advances the iterator; `Ok(None)` signals exhaustion.
    pub fn next(&mut self, vm: &mut Vm) -> RunResult<Option<Value>> {
        match self {
            Self::Seq { items, index } => {
                if *index < items.len() {
                    let v = items[*index].clone();
                    *index += 1;
                    Ok(Some(v))
                } else {
                    Ok(None)
                }
            }
            Self::List { list, index } => {
                let item = list.borrow().get(*index).cloned();
                match item {
                    Some(v) => {
                        *index += 1;
                        Ok(Some(v))
                    }
                    None => Ok(None),
                }
            }
            Self::Range { current, stop, step } => {
                let more = if *step > 0 { *current < *stop } else { *current > *stop };
                if more {
                    let v = *current;
                    *current += *step;
                    Ok(Some(Value::Int(v)))
                } else {
                    Ok(None)
                }
            }
            Self::Generator(g) => vm.generator_next(g, Value::None),
            Self::Map { func, inners } => {
                let mut args = Vec::with_capacity(inners.len());
                for inner in inners.iter_mut() {
                    match inner.next(vm)? {
                        Some(v) => args.push(v),
                        None => return Ok(None),
                    }
                }
                vm.call_value(func.clone(), CallArgs::positional(args)).map(Some)
            }
            Self::Filter { func, inner } => loop {
                let Some(item) = inner.next(vm)? else {
                    return Ok(None);
                };
                let keep = match func {
                    Some(f) => vm.call_value(f.clone(), CallArgs::one(item.clone()))?.truthy(),
                    None => item.truthy(),
                };
                if keep {
                    return Ok(Some(item));
                }
            },
            Self::Enumerate { inner, count } => match inner.next(vm)? {
                Some(item) => {
                    let pair = Value::tuple(vec![Value::Int(*count), item]);
                    *count += 1;
                    Ok(Some(pair))
                }
                None => Ok(None),
            },
            Self::Zip { inners } => {
                if inners.is_empty() {
                    return Ok(None);
                }
                let mut items = Vec::with_capacity(inners.len());
                for inner in inners.iter_mut() {
                    match inner.next(vm)? {
                        Some(v) => items.push(v),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::tuple(items)))
            }
            Self::File { file } => {
                let line = file.borrow_mut().readline()?;
                if line.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Value::str(line)))
                }
            }
        }
    }

    /// Drains the iterator into a vector.
    pub fn collect(&mut self, vm: &mut Vm) -> RunResult<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(v) = self.next(vm)? {
            out.push(v);
        }
        Ok(out)
    }
}

/// Builds the iterator for `GET_ITER`, passing pre-built iterators through.
pub fn get_iter(value: &Value) -> RunResult<Value> {
    match value {
        Value::Iterator(_) => Ok(value.clone()),
        other => Ok(Value::Iterator(Rc::new(RefCell::new(PyIter::from_value(other)?)))),
    }
}

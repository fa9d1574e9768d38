//! Stack-based bytecode virtual machine.
//!
//! One [`Frame`] exists per active call; [`Vm::run_frame`] dispatches opcodes
//! until the frame returns, yields, or an exception escapes it. All
//! Python-observable state in a frame is the operand stack, the scope, the
//! block stack and the program counter. Calls recurse through the host stack
//! (bounded by the interpreter's recursion limit); generator frames persist
//! across yields inside their generator object.

mod attr;
mod binary;
mod call;
mod collections;
mod compare;
mod exceptions;

pub(crate) use binary::binary_op;

use std::{cell::RefCell, rc::Rc};

use smallvec::SmallVec;

use crate::{
    args::CallArgs,
    builtins::Builtin,
    bytecode::{
        code::{AstConst, Code, CompKind},
        compiler,
        op::{Instr, Opcode, compare_from_arg},
    },
    exception::{ExcType, RunError, RunResult},
    fstring,
    run::Interpreter,
    scope::{self, Scope, ScopeRef},
    types::{Generator, GeneratorState, PyIter, SliceObject, iter::get_iter},
    value::Value,
};

/// One entry of a frame's block stack: an active `try`/`with` region.
#[derive(Debug, Clone, Copy)]
pub struct BlockEntry {
    /// Instruction offset of the handler.
    pub handler: u32,
    /// Operand-stack height to restore before entering the handler.
    pub stack_height: u32,
}

/// An execution record of one in-progress call to one code object.
#[derive(Debug)]
pub struct Frame {
    pub code: Rc<Code>,
    pub pc: usize,
    pub stack: Vec<Value>,
    pub scope: ScopeRef,
    pub block_stack: SmallVec<[BlockEntry; 4]>,
    /// The most recently caught exception, for bare `raise`.
    pub current_exc: Option<Value>,
}

impl Frame {
    #[must_use]
    pub fn new(code: Rc<Code>, scope: ScopeRef) -> Self {
        Self {
            code,
            pc: 0,
            stack: Vec::with_capacity(8),
            scope,
            block_stack: SmallVec::new(),
            current_exc: None,
        }
    }
}

/// How a frame left [`Vm::run_frame`].
#[derive(Debug)]
pub enum FrameExit {
    Return(Value),
    /// Only generator frames yield; the frame is resumable at `pc`.
    Yield(Value),
}

/// The virtual machine: dispatch state borrowed over one interpreter.
pub struct Vm<'a> {
    pub interp: &'a mut Interpreter,
    /// Python call depth, bounded by the interpreter's recursion limit.
    pub depth: usize,
}

impl<'a> Vm<'a> {
    pub fn new(interp: &'a mut Interpreter) -> Self {
        Self { interp, depth: 0 }
    }

    /// Executes `frame` until it returns, yields, or raises out.
    pub fn run_frame(&mut self, frame: &mut Frame) -> RunResult<FrameExit> {
        loop {
            let Some(instr) = frame.code.instructions.get(frame.pc).copied() else {
                return Err(RunError::internal(format!(
                    "pc {} out of range in {}",
                    frame.pc, frame.code.name
                )));
            };
            self.interp.tracer.on_instruction(&frame.code.name, frame.pc, instr.op);
            frame.pc += 1;

            match self.step(frame, instr) {
                Ok(Step::Continue) => {}
                Ok(Step::Exit(exit)) => return Ok(exit),
                Err(err) => {
                    if !err.is_catchable() {
                        return Err(err);
                    }
                    exceptions::dispatch(frame, err)?;
                }
            }
        }
    }

    /// Executes one instruction.
    fn step(&mut self, frame: &mut Frame, instr: Instr) -> RunResult<Step> {
        let arg = instr.arg;
        match instr.op {
            // ---- load/store ------------------------------------------------
            Opcode::LoadConst => {
                let value = frame.code.const_at(arg).clone();
                frame.stack.push(value);
            }
            Opcode::LoadName => {
                let name = frame.code.name_at(arg).clone();
                let value = scope::lookup(&frame.scope, &name)
                    .or_else(|| self.interp.builtin(&name))
                    .ok_or_else(|| ExcType::name_error(&name))?;
                frame.stack.push(value);
            }
            Opcode::StoreName => {
                let name = frame.code.name_at(arg).clone();
                let value = self.pop(frame)?;
                if !scope::store(&frame.scope, &name, value) {
                    return Err(ExcType::name_error(&name));
                }
            }
            Opcode::DeleteName => {
                let name = frame.code.name_at(arg).clone();
                if !scope::delete(&frame.scope, &name) {
                    return Err(ExcType::name_error(&name));
                }
            }
            Opcode::LoadFast => {
                let name = frame.code.varname_at(arg);
                let value = frame
                    .scope
                    .borrow()
                    .get_local(name)
                    .ok_or_else(|| ExcType::unbound_local_error(name))?;
                frame.stack.push(value);
            }
            Opcode::StoreFast => {
                let name = frame.code.varname_at(arg).clone();
                let value = self.pop(frame)?;
                frame.scope.borrow_mut().set_local(name, value);
            }
            Opcode::DeleteFast => {
                let name = frame.code.varname_at(arg);
                if !frame.scope.borrow_mut().delete_local(name) {
                    return Err(ExcType::unbound_local_error(name));
                }
            }
            Opcode::LoadGlobal => {
                let name = frame.code.name_at(arg).clone();
                let value = scope::root(&frame.scope)
                    .borrow()
                    .get_local(&name)
                    .or_else(|| self.interp.builtin(&name))
                    .ok_or_else(|| ExcType::name_error(&name))?;
                frame.stack.push(value);
            }
            Opcode::StoreGlobal => {
                let name = frame.code.name_at(arg).clone();
                let value = self.pop(frame)?;
                scope::root(&frame.scope).borrow_mut().set_local(name, value);
            }
            Opcode::DeleteGlobal => {
                let name = frame.code.name_at(arg);
                if !scope::root(&frame.scope).borrow_mut().delete_local(name) {
                    return Err(ExcType::name_error(name));
                }
            }
            Opcode::LoadAttr => {
                let name = frame.code.name_at(arg).clone();
                let obj = self.pop(frame)?;
                let value = attr::load_attr(self, &obj, &name)?;
                frame.stack.push(value);
            }
            Opcode::StoreAttr => {
                let name = frame.code.name_at(arg).clone();
                let obj = self.pop(frame)?;
                let value = self.pop(frame)?;
                attr::store_attr(&obj, &name, value)?;
            }
            Opcode::DeleteAttr => {
                let name = frame.code.name_at(arg).clone();
                let obj = self.pop(frame)?;
                attr::delete_attr(&obj, &name)?;
            }
            Opcode::LoadSubscr => {
                let index = self.pop(frame)?;
                let obj = self.pop(frame)?;
                let value = collections::load_subscr(&obj, &index)?;
                frame.stack.push(value);
            }
            Opcode::StoreSubscr => {
                let index = self.pop(frame)?;
                let obj = self.pop(frame)?;
                let value = self.pop(frame)?;
                collections::store_subscr(&obj, &index, value)?;
            }
            Opcode::DeleteSubscr => {
                let index = self.pop(frame)?;
                let obj = self.pop(frame)?;
                collections::delete_subscr(&obj, &index)?;
            }

            // ---- stack -----------------------------------------------------
            Opcode::PopTop => {
                self.pop(frame)?;
            }
            Opcode::DupTop => {
                let top = self.peek(frame)?.clone();
                frame.stack.push(top);
            }
            Opcode::DupTopTwo => {
                let len = frame.stack.len();
                if len < 2 {
                    return Err(self.underflow(frame));
                }
                let a = frame.stack[len - 2].clone();
                let b = frame.stack[len - 1].clone();
                frame.stack.push(a);
                frame.stack.push(b);
            }
            Opcode::RotTwo => {
                let len = frame.stack.len();
                if len < 2 {
                    return Err(self.underflow(frame));
                }
                frame.stack.swap(len - 1, len - 2);
            }
            Opcode::RotThree => {
                // TOS moves below the next two.
                let top = self.pop(frame)?;
                let len = frame.stack.len();
                if len < 2 {
                    return Err(self.underflow(frame));
                }
                frame.stack.insert(len - 2, top);
            }

            // ---- operators -------------------------------------------------
            op if op.binary_op().is_some() => {
                let (bin_op, inplace) = op.binary_op().expect("checked");
                let rhs = self.pop(frame)?;
                let lhs = self.pop(frame)?;
                let result = binary::binary_op(lhs, rhs, bin_op, inplace)?;
                frame.stack.push(result);
            }
            Opcode::UnaryPositive | Opcode::UnaryNegative | Opcode::UnaryNot | Opcode::UnaryInvert => {
                let operand = self.pop(frame)?;
                let result = binary::unary_op(&operand, instr.op)?;
                frame.stack.push(result);
            }
            Opcode::CompareOp => {
                let op = compare_from_arg(arg)
                    .ok_or_else(|| RunError::internal(format!("bad COMPARE_OP argument {arg}")))?;
                let rhs = self.pop(frame)?;
                let lhs = self.pop(frame)?;
                let result = compare::compare(self, op, &lhs, &rhs)?;
                frame.stack.push(Value::Bool(result));
            }

            // ---- control ---------------------------------------------------
            Opcode::JumpAbsolute | Opcode::JumpForward => {
                frame.pc = arg as usize;
            }
            Opcode::PopJumpIfTrue => {
                if self.pop(frame)?.truthy() {
                    frame.pc = arg as usize;
                }
            }
            Opcode::PopJumpIfFalse => {
                if !self.pop(frame)?.truthy() {
                    frame.pc = arg as usize;
                }
            }
            Opcode::JumpIfTrueOrPop => {
                if self.peek(frame)?.truthy() {
                    frame.pc = arg as usize;
                } else {
                    self.pop(frame)?;
                }
            }
            Opcode::JumpIfFalseOrPop => {
                if self.peek(frame)?.truthy() {
                    self.pop(frame)?;
                } else {
                    frame.pc = arg as usize;
                }
            }
            Opcode::GetIter => {
                let value = self.pop(frame)?;
                frame.stack.push(get_iter(&value)?);
            }
            Opcode::ForIter => {
                let Value::Iterator(iter) = self.peek(frame)?.clone() else {
                    return Err(RunError::internal(format!(
                        "FOR_ITER without iterator in {} at pc {}",
                        frame.code.name,
                        frame.pc - 1
                    )));
                };
                let mut guard = iter
                    .try_borrow_mut()
                    .map_err(|_| ExcType::value_error("iterator already in use"))?;
                match guard.next(self)? {
                    Some(value) => {
                        drop(guard);
                        frame.stack.push(value);
                    }
                    None => {
                        drop(guard);
                        self.pop(frame)?; // the exhausted iterator
                        frame.pc = arg as usize;
                    }
                }
            }

            // ---- collections -----------------------------------------------
            Opcode::BuildList => {
                let items = self.pop_n(frame, arg as usize)?;
                frame.stack.push(Value::list(items));
            }
            Opcode::BuildTuple => {
                let items = self.pop_n(frame, arg as usize)?;
                frame.stack.push(Value::tuple(items));
            }
            Opcode::BuildMap => {
                let flat = self.pop_n(frame, 2 * arg as usize)?;
                let mut dict = crate::types::Dict::new();
                let mut it = flat.into_iter();
                while let (Some(k), Some(v)) = (it.next(), it.next()) {
                    dict.insert(k, v)?;
                }
                frame.stack.push(Value::Dict(Rc::new(RefCell::new(dict))));
            }
            Opcode::BuildSet => {
                let items = self.pop_n(frame, arg as usize)?;
                let mut set = crate::types::Set::new();
                for item in items {
                    set.add(item)?;
                }
                frame.stack.push(Value::Set(Rc::new(RefCell::new(set))));
            }
            Opcode::BuildSlice => {
                let step = self.pop(frame)?;
                let stop = self.pop(frame)?;
                let start = self.pop(frame)?;
                let part = |v: Value| match v {
                    Value::None => None,
                    other => Some(other),
                };
                frame.stack.push(Value::Slice(Rc::new(SliceObject {
                    start: part(start),
                    stop: part(stop),
                    step: part(step),
                })));
            }
            Opcode::UnpackSequence => {
                let value = self.pop(frame)?;
                collections::unpack_sequence(self, frame, &value, arg as usize)?;
            }
            Opcode::UnpackEx => {
                let value = self.pop(frame)?;
                let before = (arg >> 8) as usize;
                let after = (arg & 0xff) as usize;
                collections::unpack_ex(self, frame, &value, before, after)?;
            }

            // ---- functions and classes -------------------------------------
            Opcode::MakeFunction => {
                let Value::Code(code) = self.pop(frame)? else {
                    return Err(RunError::internal("MAKE_FUNCTION without code object"));
                };
                let defaults = self.pop_n(frame, arg as usize)?;
                let function = crate::types::Function {
                    name: code.name.clone(),
                    code,
                    defaults,
                    closure: frame.scope.clone(),
                };
                frame.stack.push(Value::Function(Rc::new(function)));
            }
            Opcode::CallFunction => {
                let args = self.pop_n(frame, arg as usize)?;
                let callee = self.pop(frame)?;
                let result = self.call_value(callee, CallArgs::positional(args))?;
                frame.stack.push(result);
            }
            Opcode::CallFunctionKw => {
                let Value::Tuple(names) = self.pop(frame)? else {
                    return Err(RunError::internal("CALL_FUNCTION_KW without name tuple"));
                };
                let total = arg as usize;
                let mut values = self.pop_n(frame, total)?;
                let callee = self.pop(frame)?;
                let kw_values = values.split_off(total - names.len());
                let mut call_args = CallArgs::positional(values);
                for (name, value) in names.iter().zip(kw_values) {
                    let Value::Str(name) = name else {
                        return Err(RunError::internal("keyword name is not a string"));
                    };
                    call_args.kwargs.push((name.clone(), value));
                }
                let result = self.call_value(callee, call_args)?;
                frame.stack.push(result);
            }
            Opcode::CallFunctionEx => {
                let kwargs = if arg & 1 == 1 { Some(self.pop(frame)?) } else { None };
                let positional = self.pop(frame)?;
                let callee = self.pop(frame)?;
                let mut call_args = CallArgs::new();
                for item in PyIter::from_value(&positional)?.collect(self)? {
                    call_args.positional.push(item);
                }
                if let Some(kwargs) = kwargs {
                    let Value::Dict(dict) = kwargs else {
                        return Err(ExcType::type_error("argument after ** must be a mapping"));
                    };
                    for (key, value) in dict.borrow().items() {
                        let Value::Str(key) = key else {
                            return Err(ExcType::type_error("keywords must be strings"));
                        };
                        call_args.kwargs.push((key, value));
                    }
                }
                let result = self.call_value(callee, call_args)?;
                frame.stack.push(result);
            }
            Opcode::ReturnValue => {
                let value = self.pop(frame)?;
                return Ok(Step::Exit(FrameExit::Return(value)));
            }
            Opcode::YieldValue => {
                let value = self.pop(frame)?;
                return Ok(Step::Exit(FrameExit::Yield(value)));
            }
            Opcode::LoadBuildClass => {
                frame.stack.push(Value::Builtin(Builtin::BuildClass));
            }

            // ---- exceptions and context managers ---------------------------
            Opcode::SetupFinally => {
                frame.block_stack.push(BlockEntry {
                    handler: arg,
                    stack_height: frame.stack.len() as u32,
                });
            }
            Opcode::SetupWith => {
                let ctx = self.pop(frame)?;
                let exit = attr::load_attr(self, &ctx, "__exit__")?;
                let enter = attr::load_attr(self, &ctx, "__enter__")?;
                let entered = self.call_value(enter, CallArgs::new())?;
                frame.stack.push(exit);
                // The recorded height keeps __exit__ below the handler's
                // pushed exception.
                frame.block_stack.push(BlockEntry {
                    handler: arg,
                    stack_height: frame.stack.len() as u32,
                });
                frame.stack.push(entered);
            }
            Opcode::WithExceptStart => {
                // Stack: [.., __exit__, exc]; calls __exit__(type, exc, None).
                let len = frame.stack.len();
                if len < 2 {
                    return Err(self.underflow(frame));
                }
                let exc = frame.stack[len - 1].clone();
                let exit = frame.stack[len - 2].clone();
                let exc_class = exceptions::class_of(&exc);
                let result = self.call_value(
                    exit,
                    CallArgs::positional([exc_class, exc, Value::None]),
                )?;
                frame.stack.push(result);
            }
            Opcode::PopBlock => {
                if frame.block_stack.pop().is_none() {
                    return Err(RunError::internal(format!(
                        "POP_BLOCK on empty block stack in {} at pc {}",
                        frame.code.name,
                        frame.pc - 1
                    )));
                }
            }
            Opcode::RaiseVarargs => return exceptions::raise_varargs(self, frame, arg).map(|()| Step::Continue),
            Opcode::JumpIfNotExcMatch => {
                let class = self.pop(frame)?;
                let exc = self.pop(frame)?;
                if !exceptions::exception_matches(&exc, &class)? {
                    frame.pc = arg as usize;
                }
            }
            Opcode::EndFinally => {
                let marker = self.pop(frame)?;
                if !matches!(marker, Value::None) {
                    return Err(RunError::Raised(marker));
                }
            }

            // ---- import ----------------------------------------------------
            Opcode::ImportName => {
                let name = frame.code.name_at(arg).clone();
                let module = crate::modules::import_module(self, &name)?;
                frame.stack.push(module);
            }
            Opcode::ImportFrom => {
                let name = frame.code.name_at(arg).clone();
                let module = self.peek(frame)?.clone();
                let Value::Module(module) = module else {
                    return Err(RunError::internal("IMPORT_FROM without module"));
                };
                let value = module.get_attr(&name).ok_or_else(|| {
                    RunError::new(
                        ExcType::ImportError,
                        format!("cannot import name '{name}' from '{}'", module.name),
                    )
                })?;
                frame.stack.push(value);
            }
            Opcode::ImportStar => {
                let Value::Module(module) = self.pop(frame)? else {
                    return Err(RunError::internal("IMPORT_STAR without module"));
                };
                let exported: Vec<(Rc<str>, Value)> = module
                    .scope
                    .borrow()
                    .values
                    .iter()
                    .filter(|(name, _)| !name.starts_with('_') && !name.starts_with('.'))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                for (name, value) in exported {
                    frame.scope.borrow_mut().set_local(name, value);
                }
            }

            // ---- auxiliary -------------------------------------------------
            Opcode::EvalAst => {
                let Value::Ast(ast) = frame.code.const_at(arg).clone() else {
                    return Err(RunError::internal("EVAL_AST without stored AST"));
                };
                let iterator = self.pop(frame)?;
                let result = self.eval_comprehension(&ast, iterator, &frame.scope)?;
                frame.stack.push(result);
            }
            Opcode::FormatValue => {
                let spec = if arg & 4 == 4 {
                    let Value::Str(spec) = self.pop(frame)? else {
                        return Err(RunError::internal("FORMAT_VALUE without spec string"));
                    };
                    spec
                } else {
                    Rc::from("")
                };
                let value = self.pop(frame)?;
                let conversion = match arg & 3 {
                    1 => Some('r'),
                    2 => Some('s'),
                    _ => None,
                };
                // Instances format through their __str__ when no conversion
                // or spec asks otherwise.
                let text = if conversion.is_none() && spec.is_empty() {
                    self.str_value(&value)?
                } else {
                    fstring::convert_and_format(&value, conversion, &spec)?
                };
                frame.stack.push(Value::str(text));
            }
            Opcode::BuildFString => {
                let parts = self.pop_n(frame, arg as usize)?;
                let mut out = String::new();
                for part in parts {
                    out.push_str(&part.py_str());
                }
                frame.stack.push(Value::str(out));
            }
            Opcode::MatchSequence => {
                let value = self.pop(frame)?;
                let matched = match &value {
                    Value::List(items) => items.borrow().len() == arg as usize,
                    Value::Tuple(items) => items.len() == arg as usize,
                    _ => false,
                };
                frame.stack.push(Value::Bool(matched));
            }

            other => {
                return Err(RunError::internal(format!(
                    "unknown opcode {other:?} in {} at pc {}",
                    frame.code.name,
                    frame.pc - 1
                )));
            }
        }
        Ok(Step::Continue)
    }

    // ------------------------------------------------------------------
    // stack helpers
    // ------------------------------------------------------------------

    fn pop(&self, frame: &mut Frame) -> RunResult<Value> {
        frame.stack.pop().ok_or_else(|| self.underflow(frame))
    }

    fn peek<'f>(&self, frame: &'f Frame) -> RunResult<&'f Value> {
        frame.stack.last().ok_or_else(|| self.underflow(frame))
    }

    /// Pops `n` values, restoring their push order.
    fn pop_n(&self, frame: &mut Frame, n: usize) -> RunResult<Vec<Value>> {
        if frame.stack.len() < n {
            return Err(self.underflow(frame));
        }
        Ok(frame.stack.split_off(frame.stack.len() - n))
    }

    fn underflow(&self, frame: &Frame) -> RunError {
        crate::value::stack_underflow(&frame.code.name, frame.pc.saturating_sub(1))
    }

    // ------------------------------------------------------------------
    // strings with dunder support
    // ------------------------------------------------------------------

    /// `str(value)` honoring user `__str__`/`__repr__` methods.
    pub fn str_value(&mut self, value: &Value) -> RunResult<String> {
        if let Value::Instance(instance) = value {
            for dunder in ["__str__", "__repr__"] {
                if let Some(method) = instance.class.mro_lookup(dunder) {
                    let result = self.call_value(
                        method,
                        CallArgs::one(value.clone()),
                    )?;
                    return Ok(result.py_str());
                }
            }
        }
        Ok(value.py_str())
    }

    // ------------------------------------------------------------------
    // generators
    // ------------------------------------------------------------------

    /// Advances a generator, sending `sent`; `Ok(None)` signals exhaustion.
    pub fn generator_next(&mut self, gen_: &Rc<RefCell<Generator>>, sent: Value) -> RunResult<Option<Value>> {
        let (mut frame, was_initial) = {
            let mut g = gen_.borrow_mut();
            match g.state {
                GeneratorState::Closed => return Ok(None),
                GeneratorState::Running => {
                    return Err(ExcType::value_error("generator already executing"));
                }
                GeneratorState::SuspendedInitial => {
                    if !matches!(sent, Value::None) {
                        return Err(ExcType::type_error(
                            "can't send non-None value to a just-started generator",
                        ));
                    }
                    let frame = g.frame.take().expect("suspended generator has a frame");
                    g.state = GeneratorState::Running;
                    (frame, true)
                }
                GeneratorState::SuspendedYielded => {
                    let frame = g.frame.take().expect("suspended generator has a frame");
                    g.state = GeneratorState::Running;
                    (frame, false)
                }
            }
        };
        if !was_initial {
            // The sent value becomes the result of the suspended yield.
            frame.stack.push(sent);
        }
        self.resume_generator_frame(gen_, *frame)
    }

    /// Injects an exception at the suspension point and resumes.
    pub fn generator_throw(&mut self, gen_: &Rc<RefCell<Generator>>, exc: Value) -> RunResult<Option<Value>> {
        let mut frame = {
            let mut g = gen_.borrow_mut();
            match g.state {
                GeneratorState::Closed => return Err(RunError::Raised(exc)),
                GeneratorState::Running => {
                    return Err(ExcType::value_error("generator already executing"));
                }
                _ => {
                    let frame = g.frame.take().expect("suspended generator has a frame");
                    g.state = GeneratorState::Running;
                    frame
                }
            }
        };
        // Dispatch inside the paused frame; unhandled errors close it.
        if let Err(err) = exceptions::dispatch(&mut frame, RunError::Raised(exc)) {
            gen_.borrow_mut().close();
            return Err(err);
        }
        self.resume_generator_frame(gen_, *frame)
    }

    /// Raises `GeneratorExit` inside the generator and discards the frame.
    pub fn generator_close(&mut self, gen_: &Rc<RefCell<Generator>>) -> RunResult<()> {
        let state = gen_.borrow().state;
        match state {
            GeneratorState::Closed | GeneratorState::SuspendedInitial => {
                gen_.borrow_mut().close();
                Ok(())
            }
            GeneratorState::Running => Err(ExcType::value_error("generator already executing")),
            GeneratorState::SuspendedYielded => {
                let exit = Value::Exc(Rc::new(crate::types::ExcObject::new(ExcType::GeneratorExit, vec![])));
                match self.generator_throw(gen_, exit) {
                    Ok(Some(_)) => {
                        gen_.borrow_mut().close();
                        Err(RunError::new(ExcType::RuntimeError, "generator ignored GeneratorExit"))
                    }
                    Ok(None) => Ok(()),
                    Err(err) => {
                        // GeneratorExit (or StopIteration) escaping is the
                        // normal close path.
                        if exceptions::is_exit_exception(&err) {
                            Ok(())
                        } else {
                            Err(err)
                        }
                    }
                }
            }
        }
    }

    fn resume_generator_frame(
        &mut self,
        gen_: &Rc<RefCell<Generator>>,
        mut frame: Frame,
    ) -> RunResult<Option<Value>> {
        self.depth += 1;
        if self.depth > self.interp.recursion_limit {
            self.depth -= 1;
            gen_.borrow_mut().close();
            return Err(RunError::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        let result = self.run_frame(&mut frame);
        self.depth -= 1;
        match result {
            Ok(FrameExit::Yield(value)) => {
                let mut g = gen_.borrow_mut();
                g.frame = Some(Box::new(frame));
                g.state = GeneratorState::SuspendedYielded;
                Ok(Some(value))
            }
            Ok(FrameExit::Return(_)) => {
                gen_.borrow_mut().close();
                Ok(None)
            }
            Err(err) => {
                gen_.borrow_mut().close();
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // comprehensions
    // ------------------------------------------------------------------

    /// `EVAL_AST`: evaluates a stored comprehension against a fresh scope.
    ///
    /// The outermost iterator was already built in the defining scope; it
    /// binds to the comprehension's `.0` parameter.
    fn eval_comprehension(&mut self, ast: &Rc<AstConst>, iterator: Value, defining: &ScopeRef) -> RunResult<Value> {
        let code = {
            let cached = ast.compiled.borrow().clone();
            match cached {
                Some(code) => code,
                None => {
                    let code = compiler::compile_comprehension(ast)?;
                    *ast.compiled.borrow_mut() = Some(code.clone());
                    code
                }
            }
        };

        let comp_scope = Scope::new_child(defining.clone(), false);
        comp_scope.borrow_mut().set_local(code.varname_at(0).clone(), iterator);

        let mut frame = Frame::new(code.clone(), comp_scope);
        if ast.kind == CompKind::Generator {
            let generator = Generator::new(code.name.clone(), frame);
            return Ok(Value::Generator(Rc::new(RefCell::new(generator))));
        }
        self.depth += 1;
        let result = self.run_frame(&mut frame);
        self.depth -= 1;
        match result? {
            FrameExit::Return(value) => Ok(value),
            FrameExit::Yield(_) => Err(RunError::internal("comprehension yielded")),
        }
    }
}

/// Outcome of one dispatched instruction.
enum Step {
    Continue,
    Exit(FrameExit),
}

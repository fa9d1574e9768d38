//! Call dispatch: user functions, bound methods, builtins, class
//! instantiation and argument binding.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::{
    args::CallArgs,
    builtins::{self, Builtin},
    bytecode::vm::{Frame, FrameExit, Vm, attr},
    exception::{ExcType, RunError, RunResult},
    scope::{Scope, ScopeRef},
    types::{ClassObject, Dict, ExcObject, Function, Generator, InstanceObject},
    value::Value,
};

use crate::ast::ParamKind;

impl Vm<'_> {
    /// Calls any callable value with the given arguments.
    pub fn call_value(&mut self, callee: Value, args: CallArgs) -> RunResult<Value> {
        match callee {
            Value::Function(func) => self.call_function(&func, args),
            Value::BoundMethod(method) => {
                let mut full = CallArgs::new();
                full.positional.push(method.receiver.clone());
                full.positional.extend(args.positional);
                full.kwargs = args.kwargs;
                self.call_value(method.func.clone(), full)
            }
            Value::BuiltinMethod(method) => attr::call_builtin_method(self, &method.receiver, &method.name, args),
            Value::Builtin(Builtin::BuildClass) => self.build_class(args),
            Value::Builtin(builtin) => builtins::call(self, builtin, args),
            Value::Class(class) => self.instantiate(&class, args),
            Value::ExcClass(exc_type) => {
                args.reject_kwargs(&exc_type.to_string())?;
                Ok(Value::Exc(Rc::new(ExcObject::new(
                    exc_type,
                    args.positional.into_vec(),
                ))))
            }
            other => Err(ExcType::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Calls a user-defined function or lambda.
    ///
    /// Calling a generator function does not execute the body; it returns a
    /// generator holding the ready-to-run frame.
    fn call_function(&mut self, func: &Rc<Function>, args: CallArgs) -> RunResult<Value> {
        let scope = bind_args(func, args)?;
        let frame = Frame::new(func.code.clone(), scope);
        if func.code.is_generator {
            let generator = Generator::new(func.name.clone(), frame);
            return Ok(Value::Generator(Rc::new(RefCell::new(generator))));
        }
        self.run_call_frame(frame)
    }

    /// Runs a frame as a call, enforcing the recursion limit.
    pub(crate) fn run_call_frame(&mut self, mut frame: Frame) -> RunResult<Value> {
        self.depth += 1;
        if self.depth > self.interp.recursion_limit {
            self.depth -= 1;
            return Err(RunError::new(
                ExcType::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        self.interp.tracer.on_frame_push(&frame.code.name);
        let result = self.run_frame(&mut frame);
        self.interp.tracer.on_frame_pop(&frame.code.name);
        self.depth -= 1;
        match result? {
            FrameExit::Return(value) => Ok(value),
            FrameExit::Yield(_) => Err(RunError::internal(format!(
                "non-generator frame {} yielded",
                frame.code.name
            ))),
        }
    }

    /// `LOAD_BUILD_CLASS` callable: `(body_function, name, *bases)`.
    fn build_class(&mut self, mut args: CallArgs) -> RunResult<Value> {
        args.reject_kwargs("__build_class__")?;
        if args.positional.len() < 2 {
            return Err(ExcType::type_error("__build_class__: not enough arguments"));
        }
        let bases: Vec<Value> = args.positional.drain(2..).collect();
        let name = args.positional.remove(1);
        let body = args.positional.remove(0);

        let Value::Str(name) = name else {
            return Err(ExcType::type_error("__build_class__: name is not a string"));
        };
        let Value::Function(body) = body else {
            return Err(ExcType::type_error("__build_class__: func must be a function"));
        };
        for base in &bases {
            if !matches!(base, Value::Class(_) | Value::ExcClass(_)) {
                return Err(ExcType::type_error(format!(
                    "class base must be a class, not '{}'",
                    base.type_name()
                )));
            }
        }

        // The class body executes in a fresh class scope; its bindings become
        // the class attribute map.
        let class_scope = Scope::new_child(body.closure.clone(), true);
        let frame = Frame::new(body.code.clone(), class_scope.clone());
        self.run_call_frame(frame)?;

        let attrs = class_scope.borrow().values.clone();
        Ok(Value::Class(Rc::new(ClassObject {
            name,
            bases,
            attrs: RefCell::new(attrs),
        })))
    }

    /// Class call: construct an instance and run `__init__` if defined.
    fn instantiate(&mut self, class: &Rc<ClassObject>, args: CallArgs) -> RunResult<Value> {
        let instance = Rc::new(InstanceObject::new(class.clone()));
        let value = Value::Instance(instance.clone());

        // Exception classes mirror their construction arguments into
        // `message`/`args` so handlers can read them uniformly.
        if class.exception_root().is_some() {
            let message = match args.positional.len() {
                0 => Value::str(""),
                1 => Value::str(args.positional[0].py_str()),
                _ => Value::str(Value::tuple(args.positional.to_vec()).py_repr()),
            };
            instance.attrs.borrow_mut().insert(Rc::from("message"), message);
            instance
                .attrs
                .borrow_mut()
                .insert(Rc::from("args"), Value::tuple(args.positional.to_vec()));
        }

        if let Some(init) = class.mro_lookup("__init__") {
            let mut init_args = CallArgs::new();
            init_args.positional.push(value.clone());
            init_args.positional.extend(args.positional);
            init_args.kwargs = args.kwargs;
            self.call_value(init, init_args)?;
        } else if !args.is_empty() && class.exception_root().is_none() {
            return Err(ExcType::type_error(format!("{}() takes no arguments", class.name)));
        }
        Ok(value)
    }
}

/// Binds call arguments to parameters in a fresh scope chained to the
/// function's closure.
///
/// Positional arguments bind first, then keywords; unmatched positionals
/// flow into `*args` (a tuple), unmatched keywords into `**kwargs` (a dict);
/// defaults fill the rest; anything still missing is a `TypeError`.
pub fn bind_args(func: &Rc<Function>, args: CallArgs) -> RunResult<ScopeRef> {
    let code = &func.code;
    let scope = Scope::new_child(func.closure.clone(), false);
    {
        let mut s = scope.borrow_mut();
        s.globals = code.globals.clone();
        s.nonlocals = code.nonlocals.clone();
    }

    let mut positional: VecDeque<Value> = args.positional.into_iter().collect();
    let mut kwargs: Vec<(Rc<str>, Value)> = args.kwargs.into_iter().collect();
    let mut default_index = 0usize;
    let mut past_star = false;

    for param in &code.params {
        match param.kind {
            ParamKind::Star => {
                let rest: Vec<Value> = positional.drain(..).collect();
                scope.borrow_mut().set_local(param.name.clone(), Value::tuple(rest));
                past_star = true;
            }
            ParamKind::DoubleStar => {
                let mut dict = Dict::new();
                for (key, value) in kwargs.drain(..) {
                    dict.insert(Value::Str(key), value)?;
                }
                scope
                    .borrow_mut()
                    .set_local(param.name.clone(), Value::Dict(Rc::new(RefCell::new(dict))));
            }
            ParamKind::Normal => {
                let default = if param.has_default {
                    let d = func.defaults.get(default_index).cloned();
                    default_index += 1;
                    d
                } else {
                    None
                };
                let keyword_pos = kwargs.iter().position(|(k, _)| *k == param.name);
                let value = if !past_star && !positional.is_empty() {
                    if keyword_pos.is_some() {
                        return Err(ExcType::type_error(format!(
                            "{}() got multiple values for argument '{}'",
                            func.name, param.name
                        )));
                    }
                    positional.pop_front().expect("checked non-empty")
                } else if let Some(pos) = keyword_pos {
                    kwargs.remove(pos).1
                } else if let Some(default) = default {
                    default
                } else {
                    return Err(ExcType::type_error(format!(
                        "{}() missing 1 required positional argument: '{}'",
                        func.name, param.name
                    )));
                };
                scope.borrow_mut().set_local(param.name.clone(), value);
            }
        }
    }

    if !positional.is_empty() {
        let expected = code
            .params
            .iter()
            .filter(|p| p.kind == ParamKind::Normal)
            .count();
        return Err(ExcType::type_error(format!(
            "{}() takes {} positional argument{} but {} were given",
            func.name,
            expected,
            if expected == 1 { "" } else { "s" },
            expected + positional.len()
        )));
    }
    if let Some((name, _)) = kwargs.first() {
        return Err(ExcType::type_error(format!(
            "{}() got an unexpected keyword argument '{}'",
            func.name, name
        )));
    }

    Ok(scope)
}

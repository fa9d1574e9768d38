//! AST to CFG compilation.
//!
//! One `Compiler` instance builds the CFG for one code object (module,
//! function body, class body, lambda, or comprehension shell). Nested
//! function bodies compile to their own code objects referenced from the
//! parent's constant pool.
//!
//! Early exits (`return`, `break`, `continue`) through protected regions are
//! compiled as explicit unwind sequences: block-stack pops, inline finally
//! bodies, and `__exit__(None, None, None)` calls, so every finalizer runs
//! exactly once per exit path without VM-side bookkeeping.

use std::rc::Rc;

use ahash::AHashSet;

use crate::{
    ast::{
        BinOp, BoolOp, CallArg, CmpOp, CompClause, ExceptHandler, Expr, ExprKind, FStringPart, MatchCase, ParamKind,
        ParamSpec, Pattern, Program, Stmt, StmtKind, UnaryOp,
    },
    bytecode::{
        cfg::{BlockId, Cfg, JumpKind},
        code::{AstConst, Code, CompKind, Param},
        linear,
        op::{Instr, Opcode, compare_arg},
    },
    exception::{ExcType, RunError, RunResult},
    value::Value,
};

/// What kind of code object is being compiled; drives name classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeKind {
    Module,
    Function,
    ClassBody,
}

/// Compile-time model of the runtime block stack plus loop targets.
#[derive(Debug, Clone)]
enum Context {
    Loop {
        break_target: BlockId,
        continue_target: BlockId,
        /// For-loops keep their iterator on the operand stack; `break` pops it.
        pops_iter: bool,
    },
    /// An active `SETUP_FINALLY` whose handler is an except dispatcher.
    TryExcept,
    /// An active `SETUP_FINALLY` whose handler is a finally block; early
    /// exits inline the body.
    TryFinally { body: Rc<Vec<Stmt>> },
    /// An active `SETUP_WITH`; early exits call `__exit__(None, None, None)`.
    With,
    /// Inside the shared finally handler: the marker value sits on the stack.
    FinallyMarker,
}

/// Compiles a parsed module into a code object.
pub fn compile_module(program: &Program) -> RunResult<Rc<Code>> {
    let mut compiler = Compiler::new(CodeKind::Module, "<module>", &[], Vec::new());
    compiler.scan_assignments(&program.body)?;

    // The module result is the value of the last expression statement run.
    let none = compiler.add_const(Value::None);
    compiler.emit_arg(Opcode::LoadConst, none);
    let result_name = compiler.add_name(MODULE_RESULT);
    compiler.emit_arg(Opcode::StoreName, result_name);

    compiler.compile_stmts(&program.body)?;

    compiler.emit_arg(Opcode::LoadName, result_name);
    compiler.emit(Opcode::ReturnValue);
    compiler.finish()
}

/// Hidden module-scope name holding the last expression-statement value.
pub const MODULE_RESULT: &str = ".result";

/// Compiles a stored comprehension into its nested code object.
///
/// The produced code takes one parameter, `.0`, bound to the already-built
/// iterator of the outermost iterable (which the parent evaluated in the
/// defining scope).
pub fn compile_comprehension(ast: &AstConst) -> RunResult<Rc<Code>> {
    let params = [ParamSpec {
        name: COMP_ARG.to_owned(),
        default: None,
        kind: ParamKind::Normal,
    }];
    let name = match ast.kind {
        CompKind::List => "<listcomp>",
        CompKind::Set => "<setcomp>",
        CompKind::Dict => "<dictcomp>",
        CompKind::Generator => "<genexpr>",
    };
    let mut compiler = Compiler::new(CodeKind::Function, name, &params, Vec::new());
    for clause in &ast.clauses {
        compiler.collect_target_names(&clause.target);
    }
    compiler.is_generator = ast.kind == CompKind::Generator;

    if ast.kind != CompKind::Generator {
        // .acc = [] / set() / {}
        match ast.kind {
            CompKind::List => compiler.emit_arg(Opcode::BuildList, 0),
            CompKind::Set => compiler.emit_arg(Opcode::BuildSet, 0),
            CompKind::Dict => compiler.emit_arg(Opcode::BuildMap, 0),
            CompKind::Generator => unreachable!(),
        }
        let acc = compiler.add_varname(COMP_ACC);
        compiler.emit_arg(Opcode::StoreFast, acc);
    }

    compiler.compile_comp_clauses(ast, 0)?;

    if ast.kind == CompKind::Generator {
        let none = compiler.add_const(Value::None);
        compiler.emit_arg(Opcode::LoadConst, none);
    } else {
        let acc = compiler.add_varname(COMP_ACC);
        compiler.emit_arg(Opcode::LoadFast, acc);
    }
    compiler.emit(Opcode::ReturnValue);
    compiler.finish()
}

/// Parameter slot holding the outermost iterator of a comprehension.
const COMP_ARG: &str = ".0";
/// Fast-local slot accumulating a comprehension result.
const COMP_ACC: &str = ".acc";

struct Compiler {
    kind: CodeKind,
    name: Rc<str>,
    cfg: Cfg,
    current: BlockId,
    constants: Vec<Value>,
    names: Vec<Rc<str>>,
    varnames: Vec<Rc<str>>,
    params: Vec<Param>,
    argcount: usize,
    globals: AHashSet<Rc<str>>,
    nonlocals: AHashSet<Rc<str>>,
    /// Names classified as fast locals (assigned in this body).
    locals: AHashSet<Rc<str>>,
    is_generator: bool,
    contexts: Vec<Context>,
    /// Local-name sets of enclosing function bodies, innermost last; used to
    /// validate `nonlocal` declarations at compile time.
    enclosing_locals: Vec<AHashSet<Rc<str>>>,
}

impl Compiler {
    fn new(kind: CodeKind, name: &str, params: &[ParamSpec], enclosing_locals: Vec<AHashSet<Rc<str>>>) -> Self {
        let mut compiler = Self {
            kind,
            name: Rc::from(name),
            cfg: Cfg::new(),
            current: BlockId(0),
            constants: Vec::new(),
            names: Vec::new(),
            varnames: Vec::new(),
            params: Vec::new(),
            argcount: params.len(),
            globals: AHashSet::new(),
            nonlocals: AHashSet::new(),
            locals: AHashSet::new(),
            is_generator: false,
            contexts: Vec::new(),
            enclosing_locals,
        };
        for p in params {
            let name: Rc<str> = Rc::from(p.name.as_str());
            compiler.varnames.push(name.clone());
            compiler.locals.insert(name.clone());
            compiler.params.push(Param {
                name,
                kind: p.kind,
                has_default: p.default.is_some(),
            });
        }
        compiler
    }

    fn finish(self) -> RunResult<Rc<Code>> {
        let code = Code {
            name: self.name,
            instructions: Vec::new(),
            constants: self.constants,
            names: self.names,
            varnames: self.varnames,
            argcount: self.argcount,
            params: self.params,
            globals: self.globals,
            nonlocals: self.nonlocals,
            is_generator: self.is_generator,
        };
        linear::linearize(self.cfg, code).map(Rc::new)
    }

    // ------------------------------------------------------------------
    // emission helpers
    // ------------------------------------------------------------------

    fn emit(&mut self, op: Opcode) {
        self.cfg.block_mut(self.current).instrs.push(Instr::new(op));
    }

    fn emit_arg(&mut self, op: Opcode, arg: u32) {
        self.cfg.block_mut(self.current).instrs.push(Instr::with_arg(op, arg));
    }

    fn new_block(&mut self) -> BlockId {
        self.cfg.new_block()
    }

    /// Ends the current block with an unconditional edge and switches to `to`.
    fn fall_to(&mut self, to: BlockId) {
        self.cfg.block_mut(self.current).next = Some(to);
        self.current = to;
    }

    /// Ends the current block with a conditional jump; fallthrough continues
    /// in a fresh block.
    fn jump_cond(&mut self, kind: JumpKind, target: BlockId) -> BlockId {
        let fall = self.new_block();
        let block = self.cfg.block_mut(self.current);
        block.jump = Some((target, kind));
        block.next = Some(fall);
        self.current = fall;
        fall
    }

    /// Ends the current block with an unconditional jump; emission continues
    /// in a fresh (initially unreachable) block.
    fn jump_always(&mut self, target: BlockId) {
        self.cfg.block_mut(self.current).jump = Some((target, JumpKind::Always));
        let dead = self.new_block();
        self.current = dead;
    }

    /// Switches emission to `block` without linking it.
    fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    fn add_const(&mut self, value: Value) -> u32 {
        // The pool is deduplicated for simple immutable constants.
        for (i, existing) in self.constants.iter().enumerate() {
            let same = match (existing, &value) {
                (Value::None, Value::None) => true,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::BigInt(a), Value::BigInt(b)) => a == b,
                _ => false,
            };
            if same {
                return i as u32;
            }
        }
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    fn add_name(&mut self, name: &str) -> u32 {
        if let Some(i) = self.names.iter().position(|n| n.as_ref() == name) {
            return i as u32;
        }
        self.names.push(Rc::from(name));
        (self.names.len() - 1) as u32
    }

    fn add_varname(&mut self, name: &str) -> u32 {
        if let Some(i) = self.varnames.iter().position(|n| n.as_ref() == name) {
            return i as u32;
        }
        self.varnames.push(Rc::from(name));
        (self.varnames.len() - 1) as u32
    }

    fn syntax_error(&self, message: impl Into<String>) -> RunError {
        RunError::syntax(ExcType::SyntaxError, message)
    }

    // ------------------------------------------------------------------
    // variable classification
    // ------------------------------------------------------------------

    /// Pre-scans a function body: assigned names become fast locals and
    /// `global`/`nonlocal` declarations are recorded (and excluded).
    fn scan_assignments(&mut self, body: &[Stmt]) -> RunResult<()> {
        for stmt in body {
            self.scan_stmt(stmt)?;
        }
        // Declarations win over assignment classification.
        for name in &self.globals {
            self.locals.remove(name);
        }
        for name in &self.nonlocals {
            self.locals.remove(name);
        }
        self.is_generator = self.kind == CodeKind::Function && body_yields(body);
        Ok(())
    }

    fn scan_stmt(&mut self, stmt: &Stmt) -> RunResult<()> {
        match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                for t in targets {
                    self.collect_target_names(t);
                }
            }
            StmtKind::AugAssign { target, .. } => self.collect_target_names(target),
            StmtKind::For { target, body, orelse, .. } => {
                self.collect_target_names(target);
                self.scan_stmts(body)?;
                self.scan_stmts(orelse)?;
            }
            StmtKind::While { body, orelse, .. } | StmtKind::If { body, orelse, .. } => {
                self.scan_stmts(body)?;
                self.scan_stmts(orelse)?;
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finally,
            } => {
                self.scan_stmts(body)?;
                for h in handlers {
                    if let Some(name) = &h.name {
                        self.add_local(name);
                    }
                    self.scan_stmts(&h.body)?;
                }
                self.scan_stmts(orelse)?;
                self.scan_stmts(finally)?;
            }
            StmtKind::With { items, body } => {
                for (_, target) in items {
                    if let Some(t) = target {
                        self.collect_target_names(t);
                    }
                }
                self.scan_stmts(body)?;
            }
            StmtKind::Match { cases, .. } => {
                for case in cases {
                    self.collect_pattern_names(&case.pattern);
                    self.scan_stmts(&case.body)?;
                }
            }
            StmtKind::FunctionDef { name, .. } | StmtKind::ClassDef { name, .. } => {
                // The bound name is assigned here; the nested body is not
                // scanned -- it classifies its own names.
                self.add_local(name);
            }
            StmtKind::Import { names } => {
                for (module, alias) in names {
                    let bound = alias.as_deref().unwrap_or_else(|| module.split('.').next().unwrap_or(module));
                    self.add_local(bound);
                }
            }
            StmtKind::ImportFrom { names, star, .. } => {
                if !*star {
                    for (name, alias) in names {
                        self.add_local(alias.as_deref().unwrap_or(name));
                    }
                }
            }
            StmtKind::Global(names) => {
                for name in names {
                    self.globals.insert(Rc::from(name.as_str()));
                }
            }
            StmtKind::Nonlocal(names) => {
                if self.kind != CodeKind::Function {
                    return Err(self.syntax_error("nonlocal declaration not allowed at module level"));
                }
                for name in names {
                    let found = self
                        .enclosing_locals
                        .iter()
                        .rev()
                        .any(|set| set.contains(name.as_str()));
                    if !found {
                        return Err(self.syntax_error(format!("no binding for nonlocal '{name}' found")));
                    }
                    self.nonlocals.insert(Rc::from(name.as_str()));
                }
            }
            StmtKind::Delete(targets) => {
                for t in targets {
                    self.collect_target_names(t);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn scan_stmts(&mut self, stmts: &[Stmt]) -> RunResult<()> {
        for stmt in stmts {
            self.scan_stmt(stmt)?;
        }
        Ok(())
    }

    fn add_local(&mut self, name: &str) {
        if self.kind == CodeKind::Function {
            let name: Rc<str> = Rc::from(name);
            self.locals.insert(name.clone());
            self.add_varname(&name);
        }
    }

    fn collect_target_names(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(name) => self.add_local(name),
            ExprKind::TupleLit(items) | ExprKind::ListLit(items) => {
                for item in items {
                    self.collect_target_names(item);
                }
            }
            ExprKind::Starred(inner) => self.collect_target_names(inner),
            // Attribute/subscript targets assign into objects, not names.
            _ => {}
        }
    }

    fn collect_pattern_names(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Capture(name) => self.add_local(name),
            Pattern::Sequence(items) | Pattern::Or(items) => {
                for p in items {
                    self.collect_pattern_names(p);
                }
            }
            Pattern::Value(_) | Pattern::Wildcard => {}
        }
    }

    /// True when `name` is a fast local of this code object.
    fn is_local(&self, name: &str) -> bool {
        self.kind == CodeKind::Function && self.locals.contains(name)
    }

    // ------------------------------------------------------------------
    // name access
    // ------------------------------------------------------------------

    fn emit_load_name(&mut self, name: &str) {
        if self.is_local(name) {
            let idx = self.add_varname(name);
            self.emit_arg(Opcode::LoadFast, idx);
        } else if self.globals.contains(name) {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::LoadGlobal, idx);
        } else {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::LoadName, idx);
        }
    }

    fn emit_store_name(&mut self, name: &str) {
        if self.is_local(name) {
            let idx = self.add_varname(name);
            self.emit_arg(Opcode::StoreFast, idx);
        } else if self.globals.contains(name) {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::StoreGlobal, idx);
        } else {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::StoreName, idx);
        }
    }

    fn emit_delete_name(&mut self, name: &str) {
        if self.is_local(name) {
            let idx = self.add_varname(name);
            self.emit_arg(Opcode::DeleteFast, idx);
        } else if self.globals.contains(name) {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::DeleteGlobal, idx);
        } else {
            let idx = self.add_name(name);
            self.emit_arg(Opcode::DeleteName, idx);
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn compile_stmts(&mut self, stmts: &[Stmt]) -> RunResult<()> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> RunResult<()> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                if self.kind == CodeKind::Module {
                    let idx = self.add_name(MODULE_RESULT);
                    self.emit_arg(Opcode::StoreName, idx);
                } else {
                    self.emit(Opcode::PopTop);
                }
            }
            StmtKind::Assign { targets, value } => {
                self.compile_expr(value)?;
                for (i, target) in targets.iter().enumerate() {
                    if i + 1 < targets.len() {
                        self.emit(Opcode::DupTop);
                    }
                    self.compile_store_target(target)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.compile_aug_assign(target, *op, value)?,
            StmtKind::Assert { test, msg } => self.compile_assert(test, msg.as_ref())?,
            StmtKind::Raise { exc } => match exc {
                Some(e) => {
                    self.compile_expr(e)?;
                    self.emit_arg(Opcode::RaiseVarargs, 1);
                    self.start_dead_block();
                }
                None => {
                    self.emit_arg(Opcode::RaiseVarargs, 0);
                    self.start_dead_block();
                }
            },
            StmtKind::Return(value) => self.compile_return(value.as_ref(), stmt.line)?,
            StmtKind::Pass => {}
            StmtKind::Break => self.compile_break(stmt.line)?,
            StmtKind::Continue => self.compile_continue(stmt.line)?,
            StmtKind::Global(_) | StmtKind::Nonlocal(_) => {} // handled by the pre-scan
            StmtKind::Delete(targets) => {
                for target in targets {
                    self.compile_delete_target(target)?;
                }
            }
            StmtKind::Import { names } => {
                for (module, alias) in names {
                    let idx = self.add_name(module);
                    self.emit_arg(Opcode::ImportName, idx);
                    let bound = alias
                        .as_deref()
                        .unwrap_or_else(|| module.split('.').next().unwrap_or(module));
                    self.emit_store_name(bound);
                }
            }
            StmtKind::ImportFrom { module, names, star } => {
                let idx = self.add_name(module);
                self.emit_arg(Opcode::ImportName, idx);
                if *star {
                    self.emit(Opcode::ImportStar);
                } else {
                    for (name, alias) in names {
                        let name_idx = self.add_name(name);
                        self.emit_arg(Opcode::ImportFrom, name_idx);
                        self.emit_store_name(alias.as_deref().unwrap_or(name));
                    }
                    self.emit(Opcode::PopTop);
                }
            }
            StmtKind::If { test, body, orelse } => self.compile_if(test, body, orelse)?,
            StmtKind::While { test, body, orelse } => self.compile_while(test, body, orelse)?,
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => self.compile_for(target, iter, body, orelse)?,
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finally,
            } => self.compile_try(body, handlers, orelse, finally)?,
            StmtKind::With { items, body } => self.compile_with(items, body)?,
            StmtKind::Match { subject, cases } => self.compile_match(subject, cases)?,
            StmtKind::FunctionDef {
                name,
                params,
                body,
                decorators,
                ..
            } => {
                self.compile_decorated_def(name, params, body, decorators)?;
            }
            StmtKind::ClassDef {
                name,
                bases,
                body,
                decorators,
            } => self.compile_class(name, bases, body, decorators)?,
        }
        Ok(())
    }

    /// After a `raise`/`return`/`break`/`continue`, emission continues in a
    /// block nothing links to; the linearizer drops it if it stays empty.
    fn start_dead_block(&mut self) {
        let dead = self.new_block();
        self.current = dead;
    }

    fn compile_assert(&mut self, test: &Expr, msg: Option<&Expr>) -> RunResult<()> {
        let end = self.new_block();
        self.compile_expr(test)?;
        self.jump_cond(JumpKind::PopIfTrue, end);
        self.emit_load_name("AssertionError");
        if let Some(msg) = msg {
            self.compile_expr(msg)?;
            self.emit_arg(Opcode::CallFunction, 1);
        }
        self.emit_arg(Opcode::RaiseVarargs, 1);
        self.fall_to(end);
        Ok(())
    }

    // ------------------------------------------------------------------
    // control flow
    // ------------------------------------------------------------------

    fn compile_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> RunResult<()> {
        let merge = self.new_block();
        if orelse.is_empty() {
            self.compile_expr(test)?;
            self.jump_cond(JumpKind::PopIfFalse, merge);
            self.compile_stmts(body)?;
            self.fall_to(merge);
        } else {
            let else_block = self.new_block();
            self.compile_expr(test)?;
            self.jump_cond(JumpKind::PopIfFalse, else_block);
            self.compile_stmts(body)?;
            self.cfg.block_mut(self.current).jump = Some((merge, JumpKind::Always));
            self.switch_to(else_block);
            self.compile_stmts(orelse)?;
            self.fall_to(merge);
        }
        Ok(())
    }

    fn compile_while(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> RunResult<()> {
        let header = self.new_block();
        let exit = self.new_block();
        let end = self.new_block();

        self.fall_to(header);
        self.compile_expr(test)?;
        self.jump_cond(JumpKind::PopIfFalse, exit);

        self.contexts.push(Context::Loop {
            break_target: end,
            continue_target: header,
            pops_iter: false,
        });
        self.compile_stmts(body)?;
        self.contexts.pop();
        self.cfg.block_mut(self.current).jump = Some((header, JumpKind::Always));

        // The else clause runs only when the condition goes false.
        self.switch_to(exit);
        self.compile_stmts(orelse)?;
        self.fall_to(end);
        Ok(())
    }

    fn compile_for(&mut self, target: &Expr, iter: &Expr, body: &[Stmt], orelse: &[Stmt]) -> RunResult<()> {
        let header = self.new_block();
        let body_block = self.new_block();
        let exhausted = self.new_block();
        let end = self.new_block();

        self.compile_expr(iter)?;
        self.emit(Opcode::GetIter);
        self.fall_to(header);

        // FOR_ITER's argument targets the post-loop block; on exhaustion the
        // VM pops the iterator and jumps there.
        self.emit_arg(Opcode::ForIter, exhausted.0 as u32);
        self.fall_to(body_block);
        self.compile_store_target(target)?;

        self.contexts.push(Context::Loop {
            break_target: end,
            continue_target: header,
            pops_iter: true,
        });
        self.compile_stmts(body)?;
        self.contexts.pop();
        self.cfg.block_mut(self.current).jump = Some((header, JumpKind::Always));

        self.switch_to(exhausted);
        self.compile_stmts(orelse)?;
        self.fall_to(end);
        Ok(())
    }

    fn compile_break(&mut self, line: u32) -> RunResult<()> {
        let Some(loop_index) = self.innermost_loop() else {
            return Err(self.syntax_error(format!("'break' outside loop (line {line})")));
        };
        self.emit_unwinds_above(loop_index, false)?;
        let Context::Loop {
            break_target,
            pops_iter,
            ..
        } = self.contexts[loop_index].clone()
        else {
            unreachable!()
        };
        if pops_iter {
            self.emit(Opcode::PopTop);
        }
        self.jump_always(break_target);
        Ok(())
    }

    fn compile_continue(&mut self, line: u32) -> RunResult<()> {
        let Some(loop_index) = self.innermost_loop() else {
            return Err(self.syntax_error(format!("'continue' not properly in loop (line {line})")));
        };
        self.emit_unwinds_above(loop_index, false)?;
        let Context::Loop { continue_target, .. } = self.contexts[loop_index].clone() else {
            unreachable!()
        };
        self.jump_always(continue_target);
        Ok(())
    }

    fn compile_return(&mut self, value: Option<&Expr>, line: u32) -> RunResult<()> {
        if self.kind != CodeKind::Function {
            return Err(self.syntax_error(format!("'return' outside function (line {line})")));
        }
        match value {
            Some(v) => self.compile_expr(v)?,
            None => {
                let none = self.add_const(Value::None);
                self.emit_arg(Opcode::LoadConst, none);
            }
        }
        self.emit_unwinds_above(usize::MAX, true)?;
        self.emit(Opcode::ReturnValue);
        self.start_dead_block();
        Ok(())
    }

    fn innermost_loop(&self) -> Option<usize> {
        self.contexts.iter().rposition(|c| matches!(c, Context::Loop { .. }))
    }

    /// Emits unwind actions for every context strictly above `floor`
    /// (`usize::MAX` floor unwinds everything), innermost first.
    ///
    /// `preserve_top` is set when a return value rides on top of the stack.
    fn emit_unwinds_above(&mut self, floor: usize, preserve_top: bool) -> RunResult<()> {
        let actions: Vec<Context> = self
            .contexts
            .iter()
            .enumerate()
            .filter(|(i, _)| floor == usize::MAX || *i > floor)
            .map(|(_, c)| c.clone())
            .rev()
            .collect();
        for (offset, action) in actions.iter().enumerate() {
            match action {
                Context::Loop { .. } => {} // stale iterators die with the frame
                Context::TryExcept => self.emit(Opcode::PopBlock),
                Context::TryFinally { body } => {
                    self.emit(Opcode::PopBlock);
                    // Inline the finally body with only the outer contexts
                    // active, so a nested early exit unwinds correctly.
                    let keep = self.contexts.len() - offset - 1;
                    let saved = self.contexts.split_off(keep);
                    let body = body.clone();
                    self.compile_stmts(&body)?;
                    self.contexts.extend(saved);
                }
                Context::With => {
                    self.emit(Opcode::PopBlock);
                    if preserve_top {
                        self.emit(Opcode::RotTwo);
                    }
                    let none = self.add_const(Value::None);
                    self.emit_arg(Opcode::LoadConst, none);
                    self.emit_arg(Opcode::LoadConst, none);
                    self.emit_arg(Opcode::LoadConst, none);
                    self.emit_arg(Opcode::CallFunction, 3);
                    self.emit(Opcode::PopTop);
                }
                Context::FinallyMarker => {
                    if preserve_top {
                        self.emit(Opcode::RotTwo);
                    }
                    self.emit(Opcode::PopTop);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // try / with
    // ------------------------------------------------------------------

    fn compile_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finally: &[Stmt],
    ) -> RunResult<()> {
        let has_finally = !finally.is_empty();
        let has_except = !handlers.is_empty();
        let finally_rc = Rc::new(finally.to_vec());

        let finally_block = if has_finally { Some(self.new_block()) } else { None };
        let dispatch_block = if has_except { Some(self.new_block()) } else { None };
        let end = self.new_block();

        if let Some(fb) = finally_block {
            self.emit_arg(Opcode::SetupFinally, fb.0 as u32);
            self.contexts.push(Context::TryFinally {
                body: finally_rc.clone(),
            });
        }
        if let Some(db) = dispatch_block {
            self.emit_arg(Opcode::SetupFinally, db.0 as u32);
            self.contexts.push(Context::TryExcept);
        }

        self.compile_stmts(body)?;

        // Normal completion: pop the except entry, run else, then the
        // finally protocol with a None marker.
        if has_except {
            self.emit(Opcode::PopBlock);
            self.contexts.pop();
        }
        self.compile_stmts(orelse)?;
        if let Some(fb) = finally_block {
            self.emit(Opcode::PopBlock);
            self.contexts.pop();
            let none = self.add_const(Value::None);
            self.emit_arg(Opcode::LoadConst, none);
            self.jump_always(fb);
        } else {
            self.jump_always(end);
        }

        // Except dispatcher: entered with the normalized exception on TOS and
        // the stack truncated to the entry's recorded height. While handler
        // bodies run, the outer finally entry (if any) is still active, so it
        // must be back on the compile-time context stack.
        if let Some(db) = dispatch_block {
            self.switch_to(db);
            if has_finally {
                self.contexts.push(Context::TryFinally {
                    body: finally_rc.clone(),
                });
            }
            for handler in handlers {
                let next_case = self.new_block();
                if let Some(class_expr) = &handler.exc_type {
                    self.emit(Opcode::DupTop);
                    self.compile_expr(class_expr)?;
                    self.jump_cond(JumpKind::IfNotExcMatch, next_case);
                }
                match &handler.name {
                    Some(name) => self.emit_store_name(name),
                    None => self.emit(Opcode::PopTop),
                }
                self.compile_stmts(&handler.body)?;
                if let Some(name) = &handler.name {
                    // CPython deletes the binding when the handler completes.
                    self.emit_delete_name(name);
                }
                if let Some(fb) = finally_block {
                    self.emit(Opcode::PopBlock);
                    let none = self.add_const(Value::None);
                    self.emit_arg(Opcode::LoadConst, none);
                    self.jump_always(fb);
                } else {
                    self.jump_always(end);
                }
                self.switch_to(next_case);
            }
            if has_finally {
                self.contexts.pop();
            }
            // No handler matched: re-raise the exception on TOS. The outer
            // finally entry (if any) catches it next.
            self.emit_arg(Opcode::RaiseVarargs, 1);
            self.start_dead_block();
        }

        // Shared finally handler: TOS is the marker (None for normal flow,
        // the exception otherwise); EndFinally re-raises a non-None marker.
        match finally_block {
            Some(fb) => {
                self.switch_to(fb);
                self.contexts.push(Context::FinallyMarker);
                self.compile_stmts(finally)?;
                self.contexts.pop();
                self.emit(Opcode::EndFinally);
                self.fall_to(end);
            }
            None => self.switch_to(end),
        }
        Ok(())
    }

    fn compile_with(&mut self, items: &[(Expr, Option<Expr>)], body: &[Stmt]) -> RunResult<()> {
        let Some(((ctx_expr, target), rest)) = items.split_first() else {
            return self.compile_stmts(body);
        };

        let handler = self.new_block();
        let suppress = self.new_block();
        let end = self.new_block();

        self.compile_expr(ctx_expr)?;
        // SETUP_WITH pushes __exit__ then the __enter__ result; its block
        // entry records the height that keeps __exit__ on the stack.
        self.emit_arg(Opcode::SetupWith, handler.0 as u32);
        match target {
            Some(t) => self.compile_store_target(t)?,
            None => self.emit(Opcode::PopTop),
        }

        self.contexts.push(Context::With);
        if rest.is_empty() {
            self.compile_stmts(body)?;
        } else {
            self.compile_with(rest, body)?;
        }
        self.contexts.pop();

        // Normal exit: __exit__(None, None, None), result discarded.
        self.emit(Opcode::PopBlock);
        let none = self.add_const(Value::None);
        self.emit_arg(Opcode::LoadConst, none);
        self.emit_arg(Opcode::LoadConst, none);
        self.emit_arg(Opcode::LoadConst, none);
        self.emit_arg(Opcode::CallFunction, 3);
        self.emit(Opcode::PopTop);
        self.jump_always(end);

        // Exception exit: stack is [.., __exit__, exc]. WITH_EXCEPT_START
        // calls __exit__(type, value, None) and pushes the result; a truthy
        // result suppresses the exception.
        self.switch_to(handler);
        self.emit(Opcode::WithExceptStart);
        self.jump_cond(JumpKind::PopIfTrue, suppress);
        self.emit_arg(Opcode::RaiseVarargs, 1);
        self.start_dead_block();

        self.switch_to(suppress);
        self.emit(Opcode::PopTop); // the exception
        self.emit(Opcode::PopTop); // __exit__
        self.fall_to(end);
        Ok(())
    }

    // ------------------------------------------------------------------
    // match
    // ------------------------------------------------------------------

    fn compile_match(&mut self, subject: &Expr, cases: &[MatchCase]) -> RunResult<()> {
        let done = self.new_block();
        self.compile_expr(subject)?;
        for case in cases {
            // The subject is duplicated so pattern tests may consume a copy.
            let fail = self.new_block();
            let matched = self.new_block();
            self.emit(Opcode::DupTop);
            self.compile_pattern(&case.pattern, fail)?;
            self.fall_to(matched);
            if let Some(guard) = &case.guard {
                // Guard failure resumes at the next case, after bindings.
                self.compile_expr(guard)?;
                self.jump_cond(JumpKind::PopIfFalse, fail);
            }
            self.emit(Opcode::PopTop); // the retained subject
            self.compile_stmts(&case.body)?;
            self.jump_always(done);
            self.switch_to(fail);
        }
        // No case matched: discard the subject.
        self.emit(Opcode::PopTop);
        self.fall_to(done);
        Ok(())
    }

    /// Compiles a pattern test against the subject copy on TOS.
    ///
    /// Contract: on success, falls through with the copy consumed and all
    /// bindings stored; on failure, jumps to `fail` with the copy consumed.
    fn compile_pattern(&mut self, pattern: &Pattern, fail: BlockId) -> RunResult<()> {
        match pattern {
            Pattern::Wildcard => {
                self.emit(Opcode::PopTop);
            }
            Pattern::Capture(name) => {
                self.emit_store_name(name);
            }
            Pattern::Value(expr) => {
                self.compile_expr(expr)?;
                self.emit_arg(Opcode::CompareOp, compare_arg(CmpOp::Eq));
                self.jump_cond(JumpKind::PopIfFalse, fail);
            }
            Pattern::Sequence(items) => {
                // Helper target that pops the lingering subject before failing.
                let pop_fail = self.new_block();
                self.emit(Opcode::DupTop);
                self.emit_arg(Opcode::MatchSequence, items.len() as u32);
                self.jump_cond(JumpKind::PopIfFalse, pop_fail);
                for (i, item) in items.iter().enumerate() {
                    self.emit(Opcode::DupTop);
                    let idx = self.add_const(Value::Int(i as i64));
                    self.emit_arg(Opcode::LoadConst, idx);
                    self.emit(Opcode::LoadSubscr);
                    self.compile_pattern(item, pop_fail)?;
                }
                self.emit(Opcode::PopTop);
                let after = self.new_block();
                self.cfg.block_mut(self.current).jump = Some((after, JumpKind::Always));
                self.switch_to(pop_fail);
                self.emit(Opcode::PopTop);
                self.jump_always(fail);
                self.switch_to(after);
            }
            Pattern::Or(alternatives) => {
                let success = self.new_block();
                let last_index = alternatives.len() - 1;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i < last_index {
                        let next_alt = self.new_block();
                        self.emit(Opcode::DupTop);
                        self.compile_pattern(alt, next_alt)?;
                        // The duplicated copy was consumed; drop the original.
                        self.emit(Opcode::PopTop);
                        self.jump_always(success);
                        self.switch_to(next_alt);
                    } else {
                        self.compile_pattern(alt, fail)?;
                        self.fall_to(success);
                    }
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // functions and classes
    // ------------------------------------------------------------------

    fn compile_decorated_def(
        &mut self,
        name: &str,
        params: &[ParamSpec],
        body: &[Stmt],
        decorators: &[Expr],
    ) -> RunResult<()> {
        for decorator in decorators {
            self.compile_expr(decorator)?;
        }
        self.compile_make_function(name, params, body)?;
        // Decorators apply innermost-first.
        for _ in decorators {
            self.emit_arg(Opcode::CallFunction, 1);
        }
        self.emit_store_name(name);
        Ok(())
    }

    /// Compiles a nested function body and emits `MAKE_FUNCTION`.
    fn compile_make_function(&mut self, name: &str, params: &[ParamSpec], body: &[Stmt]) -> RunResult<()> {
        // Default expressions evaluate now, in the enclosing scope, in
        // parameter order.
        let mut defaults = 0u32;
        for param in params {
            if let Some(default) = &param.default {
                self.compile_expr(default)?;
                defaults += 1;
            }
        }

        let mut enclosing = self.enclosing_locals.clone();
        if self.kind == CodeKind::Function {
            enclosing.push(self.locals.clone());
        }
        let mut nested = Compiler::new(CodeKind::Function, name, params, enclosing);
        nested.scan_assignments(body)?;
        nested.compile_stmts(body)?;
        let none = nested.add_const(Value::None);
        nested.emit_arg(Opcode::LoadConst, none);
        nested.emit(Opcode::ReturnValue);
        let code = nested.finish()?;

        let code_idx = self.add_const(Value::Code(code));
        self.emit_arg(Opcode::LoadConst, code_idx);
        self.emit_arg(Opcode::MakeFunction, defaults);
        Ok(())
    }

    fn compile_class(&mut self, name: &str, bases: &[Expr], body: &[Stmt], decorators: &[Expr]) -> RunResult<()> {
        for decorator in decorators {
            self.compile_expr(decorator)?;
        }

        self.emit(Opcode::LoadBuildClass);

        let mut nested = Compiler::new(CodeKind::ClassBody, name, &[], self.enclosing_locals.clone());
        nested.scan_assignments(body)?;
        nested.compile_stmts(body)?;
        let none = nested.add_const(Value::None);
        nested.emit_arg(Opcode::LoadConst, none);
        nested.emit(Opcode::ReturnValue);
        let code = nested.finish()?;

        let code_idx = self.add_const(Value::Code(code));
        self.emit_arg(Opcode::LoadConst, code_idx);
        self.emit_arg(Opcode::MakeFunction, 0);
        let name_idx = self.add_const(Value::str(name));
        self.emit_arg(Opcode::LoadConst, name_idx);
        for base in bases {
            self.compile_expr(base)?;
        }
        self.emit_arg(Opcode::CallFunction, 2 + bases.len() as u32);

        for _ in decorators {
            self.emit_arg(Opcode::CallFunction, 1);
        }
        self.emit_store_name(name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // assignment targets
    // ------------------------------------------------------------------

    /// Stores TOS into `target`.
    fn compile_store_target(&mut self, target: &Expr) -> RunResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.emit_store_name(name);
            }
            ExprKind::Attribute { value, attr } => {
                self.compile_expr(value)?;
                let idx = self.add_name(attr);
                self.emit_arg(Opcode::StoreAttr, idx);
            }
            ExprKind::Subscript { value, index } => {
                self.compile_expr(value)?;
                self.compile_subscript_index(index)?;
                self.emit(Opcode::StoreSubscr);
            }
            ExprKind::TupleLit(items) | ExprKind::ListLit(items) => {
                let star_pos = items.iter().position(|i| matches!(i.kind, ExprKind::Starred(_)));
                match star_pos {
                    None => {
                        self.emit_arg(Opcode::UnpackSequence, items.len() as u32);
                        for item in items {
                            self.compile_store_target(item)?;
                        }
                    }
                    Some(pos) => {
                        let before = pos as u32;
                        let after = (items.len() - pos - 1) as u32;
                        self.emit_arg(Opcode::UnpackEx, (before << 8) | after);
                        for (i, item) in items.iter().enumerate() {
                            if i == pos {
                                let ExprKind::Starred(inner) = &item.kind else {
                                    unreachable!()
                                };
                                self.compile_store_target(inner)?;
                            } else {
                                self.compile_store_target(item)?;
                            }
                        }
                    }
                }
            }
            ExprKind::Starred(_) => {
                return Err(self.syntax_error("starred assignment target must be in a list or tuple"));
            }
            _ => return Err(self.syntax_error("cannot assign to this expression")),
        }
        Ok(())
    }

    fn compile_delete_target(&mut self, target: &Expr) -> RunResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.emit_delete_name(name);
            }
            ExprKind::Attribute { value, attr } => {
                self.compile_expr(value)?;
                let idx = self.add_name(attr);
                self.emit_arg(Opcode::DeleteAttr, idx);
            }
            ExprKind::Subscript { value, index } => {
                self.compile_expr(value)?;
                self.compile_subscript_index(index)?;
                self.emit(Opcode::DeleteSubscr);
            }
            ExprKind::TupleLit(items) => {
                for item in items {
                    self.compile_delete_target(item)?;
                }
            }
            _ => return Err(self.syntax_error("cannot delete this expression")),
        }
        Ok(())
    }

    fn compile_aug_assign(&mut self, target: &Expr, op: BinOp, value: &Expr) -> RunResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.emit_load_name(name);
                self.compile_expr(value)?;
                self.emit(Opcode::for_inplace_op(op));
                self.emit_store_name(name);
            }
            ExprKind::Attribute { value: obj, attr } => {
                // Evaluate the object once: dup for the load, keep for store.
                self.compile_expr(obj)?;
                self.emit(Opcode::DupTop);
                let idx = self.add_name(attr);
                self.emit_arg(Opcode::LoadAttr, idx);
                self.compile_expr(value)?;
                self.emit(Opcode::for_inplace_op(op));
                self.emit(Opcode::RotTwo);
                self.emit_arg(Opcode::StoreAttr, idx);
            }
            ExprKind::Subscript { value: obj, index } => {
                // Evaluate object and index once each.
                self.compile_expr(obj)?;
                self.compile_subscript_index(index)?;
                self.emit(Opcode::DupTopTwo);
                self.emit(Opcode::LoadSubscr);
                self.compile_expr(value)?;
                self.emit(Opcode::for_inplace_op(op));
                self.emit(Opcode::RotThree);
                self.emit(Opcode::StoreSubscr);
            }
            _ => return Err(self.syntax_error("illegal target for augmented assignment")),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> RunResult<()> {
        match &expr.kind {
            ExprKind::IntLit(i) => {
                let idx = self.add_const(Value::Int(*i));
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::BigIntLit(b) => {
                let idx = self.add_const(Value::BigInt(Rc::new(b.clone())));
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::FloatLit(f) => {
                let idx = self.add_const(Value::Float(*f));
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::StrLit(s) => {
                let idx = self.add_const(Value::str(s.as_str()));
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::BoolLit(b) => {
                let idx = self.add_const(Value::Bool(*b));
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::NoneLit => {
                let idx = self.add_const(Value::None);
                self.emit_arg(Opcode::LoadConst, idx);
            }
            ExprKind::Name(name) => self.emit_load_name(name),
            ExprKind::FString(parts) => self.compile_fstring(parts)?,
            ExprKind::TupleLit(items) => {
                if items.iter().any(|i| matches!(i.kind, ExprKind::Starred(_))) {
                    self.compile_starred_display(items, Opcode::BuildTuple)?;
                } else {
                    for item in items {
                        self.compile_expr(item)?;
                    }
                    self.emit_arg(Opcode::BuildTuple, items.len() as u32);
                }
            }
            ExprKind::ListLit(items) => {
                if items.iter().any(|i| matches!(i.kind, ExprKind::Starred(_))) {
                    self.compile_starred_display(items, Opcode::BuildList)?;
                } else {
                    for item in items {
                        self.compile_expr(item)?;
                    }
                    self.emit_arg(Opcode::BuildList, items.len() as u32);
                }
            }
            ExprKind::SetLit(items) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit_arg(Opcode::BuildSet, items.len() as u32);
            }
            ExprKind::DictLit(pairs) => {
                for (k, v) in pairs {
                    self.compile_expr(k)?;
                    self.compile_expr(v)?;
                }
                self.emit_arg(Opcode::BuildMap, pairs.len() as u32);
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(Opcode::for_bin_op(*op));
            }
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand)?;
                let opcode = match op {
                    UnaryOp::Pos => Opcode::UnaryPositive,
                    UnaryOp::Neg => Opcode::UnaryNegative,
                    UnaryOp::Not => Opcode::UnaryNot,
                    UnaryOp::Invert => Opcode::UnaryInvert,
                };
                self.emit(opcode);
            }
            ExprKind::Bool { op, values } => self.compile_bool_op(*op, values)?,
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => self.compile_compare(left, ops, comparators)?,
            ExprKind::Call { func, args } => self.compile_call(func, args)?,
            ExprKind::Attribute { value, attr } => {
                self.compile_expr(value)?;
                let idx = self.add_name(attr);
                self.emit_arg(Opcode::LoadAttr, idx);
            }
            ExprKind::Subscript { value, index } => {
                self.compile_expr(value)?;
                self.compile_subscript_index(index)?;
                self.emit(Opcode::LoadSubscr);
            }
            ExprKind::Slice { .. } => {
                // Bare slice expressions only appear as subscript indices.
                self.compile_subscript_index(expr)?;
            }
            ExprKind::Ternary {
                condition,
                then,
                orelse,
            } => {
                let else_block = self.new_block();
                let end = self.new_block();
                self.compile_expr(condition)?;
                self.jump_cond(JumpKind::PopIfFalse, else_block);
                self.compile_expr(then)?;
                self.cfg.block_mut(self.current).jump = Some((end, JumpKind::Always));
                self.switch_to(else_block);
                self.compile_expr(orelse)?;
                self.fall_to(end);
            }
            ExprKind::Lambda { params, body } => {
                let body_stmt = Stmt::new(StmtKind::Return(Some((**body).clone())), body.line);
                self.compile_make_function("<lambda>", params, &[body_stmt])?;
            }
            ExprKind::ListComp { element, clauses } => {
                self.compile_comprehension_const(CompKind::List, None, element, clauses)?;
            }
            ExprKind::SetComp { element, clauses } => {
                self.compile_comprehension_const(CompKind::Set, None, element, clauses)?;
            }
            ExprKind::DictComp { key, value, clauses } => {
                self.compile_comprehension_const(CompKind::Dict, Some(key), value, clauses)?;
            }
            ExprKind::GenExp { element, clauses } => {
                self.compile_comprehension_const(CompKind::Generator, None, element, clauses)?;
            }
            ExprKind::Yield(value) => {
                if self.kind != CodeKind::Function {
                    return Err(self.syntax_error("'yield' outside function"));
                }
                match value {
                    Some(v) => self.compile_expr(v)?,
                    None => {
                        let none = self.add_const(Value::None);
                        self.emit_arg(Opcode::LoadConst, none);
                    }
                }
                self.emit(Opcode::YieldValue);
            }
            ExprKind::Await(inner) => {
                // Surface syntax only: awaiting evaluates the operand.
                self.compile_expr(inner)?;
            }
            ExprKind::Starred(_) => {
                return Err(self.syntax_error("starred expression is only valid in assignment or call"));
            }
        }
        Ok(())
    }

    /// Builds a display containing `*expr` splices.
    ///
    /// Elements append and splices extend an accumulator list; a tuple
    /// display converts the result through `tuple(...)`, which also sets the
    /// immutable flag.
    fn compile_starred_display(&mut self, items: &[Expr], build: Opcode) -> RunResult<()> {
        self.emit_arg(Opcode::BuildList, 0);
        for item in items {
            let (method, argument) = match &item.kind {
                ExprKind::Starred(inner) => ("extend", inner.as_ref()),
                _ => ("append", item),
            };
            let idx = self.add_name(method);
            self.emit(Opcode::DupTop);
            self.emit_arg(Opcode::LoadAttr, idx);
            self.compile_expr(argument)?;
            self.emit_arg(Opcode::CallFunction, 1);
            self.emit(Opcode::PopTop);
        }
        if build == Opcode::BuildTuple {
            self.emit_load_name("tuple");
            self.emit(Opcode::RotTwo);
            self.emit_arg(Opcode::CallFunction, 1);
        }
        Ok(())
    }

    fn compile_bool_op(&mut self, op: BoolOp, values: &[Expr]) -> RunResult<()> {
        let end = self.new_block();
        let kind = match op {
            BoolOp::And => JumpKind::OrPopIfFalse,
            BoolOp::Or => JumpKind::OrPopIfTrue,
        };
        for (i, value) in values.iter().enumerate() {
            self.compile_expr(value)?;
            if i + 1 < values.len() {
                // The jump inspects TOS and pops only on fallthrough.
                self.jump_cond(kind, end);
            }
        }
        self.fall_to(end);
        Ok(())
    }

    fn compile_compare(&mut self, left: &Expr, ops: &[CmpOp], comparators: &[Expr]) -> RunResult<()> {
        self.compile_expr(left)?;
        if ops.len() == 1 {
            self.compile_expr(&comparators[0])?;
            self.emit_arg(Opcode::CompareOp, compare_arg(ops[0]));
            return Ok(());
        }

        // Chained form: duplicate each middle comparator, rotate it below the
        // pending result, and bail to a cleanup block on the first failure.
        let cleanup = self.new_block();
        let end = self.new_block();
        for (i, (op, comparator)) in ops.iter().zip(comparators).enumerate() {
            let is_last = i + 1 == ops.len();
            self.compile_expr(comparator)?;
            if !is_last {
                self.emit(Opcode::DupTop);
                self.emit(Opcode::RotThree);
            }
            self.emit_arg(Opcode::CompareOp, compare_arg(*op));
            if !is_last {
                self.jump_cond(JumpKind::OrPopIfFalse, cleanup);
            }
        }
        self.cfg.block_mut(self.current).jump = Some((end, JumpKind::Always));

        // Failure path: the duplicated comparator is still below the result.
        self.switch_to(cleanup);
        self.emit(Opcode::RotTwo);
        self.emit(Opcode::PopTop);
        self.fall_to(end);
        Ok(())
    }

    fn compile_call(&mut self, func: &Expr, args: &[CallArg]) -> RunResult<()> {
        let has_star = args
            .iter()
            .any(|a| matches!(a, CallArg::Star(_) | CallArg::DoubleStar(_)));
        let has_keyword = args.iter().any(|a| matches!(a, CallArg::Keyword(_, _)));

        self.compile_expr(func)?;

        if has_star {
            return self.compile_call_ex(args);
        }
        if has_keyword {
            // CALL_FUNCTION_KW: positionals, then keyword values, then the
            // tuple of keyword names on top; arg is the total count.
            let mut kw_names = Vec::new();
            for arg in args {
                if let CallArg::Positional(e) = arg {
                    self.compile_expr(e)?;
                }
            }
            for arg in args {
                if let CallArg::Keyword(name, e) = arg {
                    self.compile_expr(e)?;
                    kw_names.push(name.clone());
                }
            }
            let names_tuple = Value::tuple(kw_names.iter().map(|n| Value::str(n.as_str())).collect());
            let idx = self.add_const_raw(names_tuple);
            self.emit_arg(Opcode::LoadConst, idx);
            self.emit_arg(Opcode::CallFunctionKw, args.len() as u32);
            return Ok(());
        }
        for arg in args {
            if let CallArg::Positional(e) = arg {
                self.compile_expr(e)?;
            }
        }
        self.emit_arg(Opcode::CallFunction, args.len() as u32);
        Ok(())
    }

    /// `CALL_FUNCTION_EX`: one iterable of positional args, plus an optional
    /// kwargs dict when `arg` is 1.
    fn compile_call_ex(&mut self, args: &[CallArg]) -> RunResult<()> {
        // Build the positional tuple by list concatenation.
        self.emit_arg(Opcode::BuildList, 0);
        for arg in args {
            match arg {
                CallArg::Positional(e) => {
                    let append = self.add_name("append");
                    self.emit(Opcode::DupTop);
                    self.emit_arg(Opcode::LoadAttr, append);
                    self.compile_expr(e)?;
                    self.emit_arg(Opcode::CallFunction, 1);
                    self.emit(Opcode::PopTop);
                }
                CallArg::Star(e) => {
                    let extend = self.add_name("extend");
                    self.emit(Opcode::DupTop);
                    self.emit_arg(Opcode::LoadAttr, extend);
                    self.compile_expr(e)?;
                    self.emit_arg(Opcode::CallFunction, 1);
                    self.emit(Opcode::PopTop);
                }
                CallArg::Keyword(_, _) | CallArg::DoubleStar(_) => {}
            }
        }

        let has_kwargs = args
            .iter()
            .any(|a| matches!(a, CallArg::Keyword(_, _) | CallArg::DoubleStar(_)));
        if has_kwargs {
            self.emit_arg(Opcode::BuildMap, 0);
            for arg in args {
                match arg {
                    CallArg::Keyword(name, e) => {
                        self.emit(Opcode::DupTop);
                        let idx = self.add_const(Value::str(name.as_str()));
                        // dict[name] = value via STORE_SUBSCR: [dict, dict] ->
                        // push value, dict copy already there; order below.
                        self.compile_expr(e)?;
                        self.emit(Opcode::RotTwo);
                        self.emit_arg(Opcode::LoadConst, idx);
                        self.emit(Opcode::StoreSubscr);
                    }
                    CallArg::DoubleStar(e) => {
                        let update = self.add_name("update");
                        self.emit(Opcode::DupTop);
                        self.emit_arg(Opcode::LoadAttr, update);
                        self.compile_expr(e)?;
                        self.emit_arg(Opcode::CallFunction, 1);
                        self.emit(Opcode::PopTop);
                    }
                    CallArg::Positional(_) | CallArg::Star(_) => {}
                }
            }
            self.emit_arg(Opcode::CallFunctionEx, 1);
        } else {
            self.emit_arg(Opcode::CallFunctionEx, 0);
        }
        Ok(())
    }

    /// Adds a constant without deduplication (tuples of keyword names).
    fn add_const_raw(&mut self, value: Value) -> u32 {
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    fn compile_subscript_index(&mut self, index: &Expr) -> RunResult<()> {
        if let ExprKind::Slice { start, stop, step } = &index.kind {
            let none = self.add_const(Value::None);
            match start {
                Some(e) => self.compile_expr(e)?,
                None => self.emit_arg(Opcode::LoadConst, none),
            }
            match stop {
                Some(e) => self.compile_expr(e)?,
                None => self.emit_arg(Opcode::LoadConst, none),
            }
            match step {
                Some(e) => self.compile_expr(e)?,
                None => self.emit_arg(Opcode::LoadConst, none),
            }
            self.emit_arg(Opcode::BuildSlice, 3);
            return Ok(());
        }
        self.compile_expr(index)
    }

    fn compile_fstring(&mut self, parts: &[FStringPart]) -> RunResult<()> {
        for part in parts {
            match part {
                FStringPart::Literal(s) => {
                    let idx = self.add_const(Value::str(s.as_str()));
                    self.emit_arg(Opcode::LoadConst, idx);
                }
                FStringPart::Expr { expr, conversion, spec } => {
                    self.compile_expr(expr)?;
                    // FormatValue arg: low bits encode the conversion, and a
                    // spec constant index is pushed first when present.
                    let conv_bits = match conversion {
                        Some('r') => 1u32,
                        Some('s') => 2u32,
                        _ => 0u32,
                    };
                    match spec {
                        Some(s) => {
                            let idx = self.add_const(Value::str(s.as_str()));
                            self.emit_arg(Opcode::LoadConst, idx);
                            self.emit_arg(Opcode::FormatValue, conv_bits | 4);
                        }
                        None => self.emit_arg(Opcode::FormatValue, conv_bits),
                    }
                }
            }
        }
        self.emit_arg(Opcode::BuildFString, parts.len() as u32);
        Ok(())
    }

    // ------------------------------------------------------------------
    // comprehensions
    // ------------------------------------------------------------------

    /// Stores the comprehension AST in the constant pool and emits the
    /// `GET_ITER; EVAL_AST` sequence. The outermost iterable is evaluated
    /// here, in the defining scope.
    fn compile_comprehension_const(
        &mut self,
        kind: CompKind,
        key: Option<&Expr>,
        element: &Expr,
        clauses: &[CompClause],
    ) -> RunResult<()> {
        let Some(first) = clauses.first() else {
            return Err(self.syntax_error("comprehension requires at least one for clause"));
        };
        self.compile_expr(&first.iter)?;
        self.emit(Opcode::GetIter);

        let ast = AstConst {
            kind,
            element: element.clone(),
            key: key.cloned(),
            clauses: clauses.to_vec(),
            compiled: std::cell::RefCell::new(None),
        };
        let idx = self.add_const_raw(Value::Ast(Rc::new(ast)));
        self.emit_arg(Opcode::EvalAst, idx);
        Ok(())
    }

    /// Emits the loop nest inside a comprehension code object.
    ///
    /// Clause 0 iterates the prebound `.0` iterator; later clauses evaluate
    /// their iterables in the comprehension scope.
    fn compile_comp_clauses(&mut self, ast: &AstConst, depth: usize) -> RunResult<()> {
        if depth == ast.clauses.len() {
            return self.compile_comp_element(ast);
        }
        let clause = ast.clauses[depth].clone();

        if depth == 0 {
            let arg = self.add_varname(COMP_ARG);
            self.emit_arg(Opcode::LoadFast, arg);
            self.emit(Opcode::GetIter);
        } else {
            self.compile_expr(&clause.iter)?;
            self.emit(Opcode::GetIter);
        }

        let header = self.new_block();
        let body_block = self.new_block();
        let exhausted = self.new_block();
        let end = self.new_block();

        self.fall_to(header);
        self.emit_arg(Opcode::ForIter, exhausted.0 as u32);
        self.fall_to(body_block);
        self.compile_store_target(&clause.target)?;

        for condition in &clause.conditions {
            self.compile_expr(condition)?;
            self.jump_cond(JumpKind::PopIfFalse, header);
        }

        self.compile_comp_clauses(ast, depth + 1)?;
        self.cfg.block_mut(self.current).jump = Some((header, JumpKind::Always));

        self.switch_to(exhausted);
        self.fall_to(end);
        Ok(())
    }

    fn compile_comp_element(&mut self, ast: &AstConst) -> RunResult<()> {
        match ast.kind {
            CompKind::Generator => {
                self.compile_expr(&ast.element)?;
                self.emit(Opcode::YieldValue);
                self.emit(Opcode::PopTop);
            }
            CompKind::List => {
                let acc = self.add_varname(COMP_ACC);
                self.emit_arg(Opcode::LoadFast, acc);
                let append = self.add_name("append");
                self.emit_arg(Opcode::LoadAttr, append);
                self.compile_expr(&ast.element)?;
                self.emit_arg(Opcode::CallFunction, 1);
                self.emit(Opcode::PopTop);
            }
            CompKind::Set => {
                let acc = self.add_varname(COMP_ACC);
                self.emit_arg(Opcode::LoadFast, acc);
                let add = self.add_name("add");
                self.emit_arg(Opcode::LoadAttr, add);
                self.compile_expr(&ast.element)?;
                self.emit_arg(Opcode::CallFunction, 1);
                self.emit(Opcode::PopTop);
            }
            CompKind::Dict => {
                // .acc[key] = value
                self.compile_expr(&ast.element)?;
                let acc = self.add_varname(COMP_ACC);
                self.emit_arg(Opcode::LoadFast, acc);
                let key = ast.key.as_ref().expect("dict comprehension has a key");
                self.compile_expr(key)?;
                self.emit(Opcode::StoreSubscr);
            }
        }
        Ok(())
    }
}

/// Recursive yield-scan marking generator code objects; nested functions and
/// lambdas are not entered.
fn body_yields(body: &[Stmt]) -> bool {
    body.iter().any(stmt_yields)
}

fn stmt_yields(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Expr(e) => expr_yields(e),
        StmtKind::Assign { targets, value } => targets.iter().any(expr_yields) || expr_yields(value),
        StmtKind::AugAssign { target, value, .. } => expr_yields(target) || expr_yields(value),
        StmtKind::Assert { test, msg } => expr_yields(test) || msg.as_ref().is_some_and(expr_yields),
        StmtKind::Raise { exc } => exc.as_ref().is_some_and(expr_yields),
        StmtKind::Return(v) => v.as_ref().is_some_and(expr_yields),
        StmtKind::Delete(targets) => targets.iter().any(expr_yields),
        StmtKind::If { test, body, orelse } => expr_yields(test) || body_yields(body) || body_yields(orelse),
        StmtKind::While { test, body, orelse } => expr_yields(test) || body_yields(body) || body_yields(orelse),
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => expr_yields(target) || expr_yields(iter) || body_yields(body) || body_yields(orelse),
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finally,
        } => {
            body_yields(body)
                || handlers.iter().any(|h| body_yields(&h.body))
                || body_yields(orelse)
                || body_yields(finally)
        }
        StmtKind::With { items, body } => items.iter().any(|(e, _)| expr_yields(e)) || body_yields(body),
        StmtKind::Match { subject, cases } => {
            expr_yields(subject) || cases.iter().any(|c| body_yields(&c.body) || c.guard.as_ref().is_some_and(expr_yields))
        }
        _ => false,
    }
}

fn expr_yields(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield(_) => true,
        ExprKind::Binary { left, right, .. } => expr_yields(left) || expr_yields(right),
        ExprKind::Unary { operand, .. } => expr_yields(operand),
        ExprKind::Bool { values, .. } => values.iter().any(expr_yields),
        ExprKind::Compare {
            left, comparators, ..
        } => expr_yields(left) || comparators.iter().any(expr_yields),
        ExprKind::Call { func, args } => {
            expr_yields(func)
                || args.iter().any(|a| match a {
                    CallArg::Positional(e) | CallArg::Star(e) | CallArg::DoubleStar(e) | CallArg::Keyword(_, e) => {
                        expr_yields(e)
                    }
                })
        }
        ExprKind::Attribute { value, .. } => expr_yields(value),
        ExprKind::Subscript { value, index } => expr_yields(value) || expr_yields(index),
        ExprKind::Slice { start, stop, step } => [start, stop, step]
            .iter()
            .any(|part| part.as_deref().is_some_and(expr_yields)),
        ExprKind::Ternary {
            condition,
            then,
            orelse,
        } => expr_yields(condition) || expr_yields(then) || expr_yields(orelse),
        ExprKind::TupleLit(items) | ExprKind::ListLit(items) | ExprKind::SetLit(items) => {
            items.iter().any(expr_yields)
        }
        ExprKind::DictLit(pairs) => pairs.iter().any(|(k, v)| expr_yields(k) || expr_yields(v)),
        ExprKind::FString(parts) => parts.iter().any(|p| match p {
            FStringPart::Expr { expr, .. } => expr_yields(expr),
            FStringPart::Literal(_) => false,
        }),
        ExprKind::Starred(inner) | ExprKind::Await(inner) => expr_yields(inner),
        // Nested functions, lambdas and comprehensions own their yields.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(source: &str) -> Rc<Code> {
        compile_module(&parse(source).unwrap()).unwrap()
    }

    fn ops(code: &Code) -> Vec<Opcode> {
        code.instructions.iter().map(|i| i.op).collect()
    }

    #[test]
    fn test_module_compiles() {
        let code = compile("x = 1\nprint(x)\n");
        assert!(ops(&code).contains(&Opcode::StoreName));
        assert!(ops(&code).contains(&Opcode::CallFunction));
        assert_eq!(*ops(&code).last().unwrap(), Opcode::ReturnValue);
    }

    #[test]
    fn test_function_uses_fast_locals() {
        let code = compile("def f(a):\n    b = a + 1\n    return b\n");
        let func_code = code
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Code(c) => Some(c.clone()),
                _ => None,
            })
            .expect("nested code object");
        let func_ops = ops(&func_code);
        assert!(func_ops.contains(&Opcode::LoadFast));
        assert!(func_ops.contains(&Opcode::StoreFast));
        assert!(!func_ops.contains(&Opcode::StoreName));
        assert_eq!(func_code.argcount, 1);
    }

    #[test]
    fn test_global_declaration_uses_global_opcodes() {
        let code = compile("def f():\n    global g\n    g = 1\n");
        let func_code = code
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Code(c) => Some(c.clone()),
                _ => None,
            })
            .unwrap();
        assert!(ops(&func_code).contains(&Opcode::StoreGlobal));
    }

    #[test]
    fn test_generator_flag() {
        let code = compile("def g():\n    yield 1\ndef f():\n    return 1\n");
        let flags: Vec<bool> = code
            .constants
            .iter()
            .filter_map(|c| match c {
                Value::Code(c) => Some(c.is_generator),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_nested_function_not_marked_generator() {
        let code = compile("def outer():\n    def inner():\n        yield 1\n    return inner\n");
        let outer = code
            .constants
            .iter()
            .find_map(|c| match c {
                Value::Code(c) => Some(c.clone()),
                _ => None,
            })
            .unwrap();
        assert!(!outer.is_generator);
    }

    #[test]
    fn test_break_outside_loop_rejected() {
        assert!(compile_module(&parse("break\n").unwrap()).is_err());
        assert!(compile_module(&parse("continue\n").unwrap()).is_err());
    }

    #[test]
    fn test_return_outside_function_rejected() {
        assert!(compile_module(&parse("return 1\n").unwrap()).is_err());
    }

    #[test]
    fn test_undeclared_nonlocal_rejected() {
        let src = "def f():\n    nonlocal x\n    x = 1\n";
        assert!(compile_module(&parse(src).unwrap()).is_err());
    }

    #[test]
    fn test_declared_nonlocal_accepted() {
        let src = "def f():\n    x = 1\n    def g():\n        nonlocal x\n        x = 2\n    return g\n";
        assert!(compile_module(&parse(src).unwrap()).is_ok());
    }

    #[test]
    fn test_for_iter_targets_valid_offset() {
        let code = compile("for i in range(3):\n    print(i)\n");
        for instr in &code.instructions {
            if instr.op == Opcode::ForIter {
                assert!((instr.arg as usize) < code.instructions.len());
            }
        }
    }

    #[test]
    fn test_setup_finally_targets_valid_offset() {
        let code = compile("try:\n    x = 1\nexcept ValueError:\n    pass\nfinally:\n    x = 2\n");
        let setup_count = code
            .instructions
            .iter()
            .filter(|i| i.op == Opcode::SetupFinally)
            .count();
        assert_eq!(setup_count, 2);
        for instr in &code.instructions {
            if instr.op == Opcode::SetupFinally {
                assert!((instr.arg as usize) < code.instructions.len());
            }
        }
    }

    #[test]
    fn test_comprehension_stored_as_ast_const() {
        let code = compile("xs = [i * i for i in range(3)]\n");
        assert!(ops(&code).contains(&Opcode::EvalAst));
        assert!(code.constants.iter().any(|c| matches!(c, Value::Ast(_))));
        // The outermost iterable is evaluated in the defining scope.
        assert!(ops(&code).contains(&Opcode::GetIter));
    }

    #[test]
    fn test_constant_pool_deduplicated() {
        let code = compile("a = 7\nb = 7\nc = 'x'\nd = 'x'\n");
        let sevens = code
            .constants
            .iter()
            .filter(|c| matches!(c, Value::Int(7)))
            .count();
        assert_eq!(sevens, 1);
        let xs = code
            .constants
            .iter()
            .filter(|c| matches!(c, Value::Str(s) if s.as_ref() == "x"))
            .count();
        assert_eq!(xs, 1);
    }

    #[test]
    fn test_unpack_ex_packs_counts() {
        let code = compile("a, *b, c = [1, 2, 3, 4]\n");
        let instr = code
            .instructions
            .iter()
            .find(|i| i.op == Opcode::UnpackEx)
            .expect("UnpackEx emitted");
        assert_eq!(instr.arg, (1 << 8) | 1);
    }

    #[test]
    fn test_compare_chain_emits_dup_and_rot() {
        let code = compile("r = a < b < c\n");
        let o = ops(&code);
        assert!(o.contains(&Opcode::DupTop));
        assert!(o.contains(&Opcode::RotThree));
        assert!(o.contains(&Opcode::JumpIfFalseOrPop));
    }

    #[test]
    fn test_and_or_short_circuit_opcodes() {
        let code = compile("r = a and b\ns = a or b\n");
        let o = ops(&code);
        assert!(o.contains(&Opcode::JumpIfFalseOrPop));
        assert!(o.contains(&Opcode::JumpIfTrueOrPop));
    }

    #[test]
    fn test_aug_assign_subscript_single_evaluation() {
        let code = compile("d[k] += 1\n");
        let o = ops(&code);
        assert!(o.contains(&Opcode::DupTopTwo));
        assert!(o.contains(&Opcode::InplaceAdd));
        assert!(o.contains(&Opcode::RotThree));
        assert!(o.contains(&Opcode::StoreSubscr));
    }

    #[test]
    fn test_default_count_in_make_function() {
        let code = compile("def f(a, b=1, c=2):\n    pass\n");
        let instr = code
            .instructions
            .iter()
            .find(|i| i.op == Opcode::MakeFunction)
            .unwrap();
        assert_eq!(instr.arg, 2);
    }
}

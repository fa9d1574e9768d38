//! Recursive-descent parser: token stream to AST.
//!
//! Expressions use Pratt-style precedence climbing; statements are plain
//! recursive descent over the indentation structure the lexer synthesized.
//! On an unexpected token the parser reports the expected kind and the
//! offending token's position and halts; there is no error recovery.

use num_bigint::BigInt;
use num_traits::Num;

use crate::{
    ast::{
        BinOp, BoolOp, CallArg, CmpOp, CompClause, ExceptHandler, Expr, ExprKind, FStringPart, MatchCase, ParamKind,
        ParamSpec, Pattern, Program, Stmt, StmtKind, UnaryOp,
    },
    exception::{ExcType, RunError, RunResult},
    fstring::{self, CookedLiteral, TemplateCache, TemplatePart},
    lexer::{Token, TokenKind, tokenize},
};

/// Parses a complete module.
pub fn parse(source: &str) -> RunResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    templates: TemplateCache,
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            templates: TemplateCache::new(),
        }
    }

    fn parse_program(&mut self) -> RunResult<Program> {
        let mut body = Vec::new();
        while !self.check(TokenKind::Eof) {
            body.extend(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    // ------------------------------------------------------------------
    // token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn line(&self) -> u32 {
        self.peek().line
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_op(&self, op: &str) -> bool {
        self.peek().kind == TokenKind::Op && self.peek().text == op
    }

    fn check_keyword(&self, kw: &str) -> bool {
        self.peek().kind == TokenKind::Keyword && self.peek().text == kw
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> RunResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> RunResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{kw}'")))
        }
    }

    fn expect_ident(&mut self) -> RunResult<String> {
        if self.check(TokenKind::Ident) {
            Ok(self.advance().text)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn unexpected(&self, expected: &str) -> RunError {
        let tok = self.peek();
        let found = if tok.kind == TokenKind::Eof {
            "end of file".to_owned()
        } else if tok.text.is_empty() {
            tok.kind.to_string()
        } else {
            format!("'{}'", tok.text)
        };
        RunError::syntax(
            ExcType::SyntaxError,
            format!(
                "expected {expected}, found {found} (line {}, column {})",
                tok.line, tok.column
            ),
        )
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    /// One logical statement; simple-statement lines may carry several.
    fn parse_statement(&mut self) -> RunResult<Vec<Stmt>> {
        if self.check(TokenKind::At) {
            return Ok(vec![self.parse_decorated()?]);
        }
        if self.check(TokenKind::Keyword) {
            let kw = self.peek().text.clone();
            match kw.as_str() {
                "if" => return Ok(vec![self.parse_if()?]),
                "while" => return Ok(vec![self.parse_while()?]),
                "for" => return Ok(vec![self.parse_for()?]),
                "try" => return Ok(vec![self.parse_try()?]),
                "with" => return Ok(vec![self.parse_with()?]),
                "match" => return Ok(vec![self.parse_match()?]),
                "def" => return Ok(vec![self.parse_def(Vec::new(), false)?]),
                "class" => return Ok(vec![self.parse_class(Vec::new())?]),
                "async" => {
                    let line = self.line();
                    self.advance();
                    if self.check_keyword("def") {
                        return Ok(vec![self.parse_def(Vec::new(), true)?]);
                    }
                    let _ = line;
                    return Err(self.unexpected("'def'"));
                }
                _ => {}
            }
        }
        self.parse_simple_statement_line()
    }

    /// `stmt (';' stmt)* [';'] NEWLINE`
    fn parse_simple_statement_line(&mut self) -> RunResult<Vec<Stmt>> {
        let mut out = vec![self.parse_simple_statement()?];
        while self.eat(TokenKind::Semicolon) {
            if self.check(TokenKind::Newline) || self.check(TokenKind::Eof) {
                break;
            }
            out.push(self.parse_simple_statement()?);
        }
        if !self.eat(TokenKind::Newline) && !self.check(TokenKind::Eof) {
            return Err(self.unexpected("newline"));
        }
        Ok(out)
    }

    fn parse_simple_statement(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        if self.check(TokenKind::Keyword) {
            let kw = self.peek().text.clone();
            match kw.as_str() {
                "pass" => {
                    self.advance();
                    return Ok(Stmt::new(StmtKind::Pass, line));
                }
                "break" => {
                    self.advance();
                    return Ok(Stmt::new(StmtKind::Break, line));
                }
                "continue" => {
                    self.advance();
                    return Ok(Stmt::new(StmtKind::Continue, line));
                }
                "return" => {
                    self.advance();
                    let value = if self.at_expression_start() {
                        Some(self.parse_testlist()?)
                    } else {
                        None
                    };
                    return Ok(Stmt::new(StmtKind::Return(value), line));
                }
                "raise" => {
                    self.advance();
                    let exc = if self.at_expression_start() {
                        let e = self.parse_expression()?;
                        // `raise X from Y` is accepted; the cause is discarded.
                        if self.eat_keyword("from") {
                            self.parse_expression()?;
                        }
                        Some(e)
                    } else {
                        None
                    };
                    return Ok(Stmt::new(StmtKind::Raise { exc }, line));
                }
                "assert" => {
                    self.advance();
                    let test = self.parse_expression()?;
                    let msg = if self.eat(TokenKind::Comma) {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    return Ok(Stmt::new(StmtKind::Assert { test, msg }, line));
                }
                "global" => {
                    self.advance();
                    let names = self.parse_name_list()?;
                    return Ok(Stmt::new(StmtKind::Global(names), line));
                }
                "nonlocal" => {
                    self.advance();
                    let names = self.parse_name_list()?;
                    return Ok(Stmt::new(StmtKind::Nonlocal(names), line));
                }
                "del" => {
                    self.advance();
                    let mut targets = vec![self.parse_expression()?];
                    while self.eat(TokenKind::Comma) {
                        targets.push(self.parse_expression()?);
                    }
                    return Ok(Stmt::new(StmtKind::Delete(targets), line));
                }
                "import" => {
                    self.advance();
                    let mut names = Vec::new();
                    loop {
                        let module = self.parse_dotted_name()?;
                        let alias = if self.eat_keyword("as") {
                            Some(self.expect_ident()?)
                        } else {
                            None
                        };
                        names.push((module, alias));
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    return Ok(Stmt::new(StmtKind::Import { names }, line));
                }
                "from" => {
                    self.advance();
                    let module = self.parse_dotted_name()?;
                    self.expect_keyword("import")?;
                    if self.eat_op("*") {
                        return Ok(Stmt::new(
                            StmtKind::ImportFrom {
                                module,
                                names: Vec::new(),
                                star: true,
                            },
                            line,
                        ));
                    }
                    let parenthesized = self.eat(TokenKind::LParen);
                    let mut names = Vec::new();
                    loop {
                        let name = self.expect_ident()?;
                        let alias = if self.eat_keyword("as") {
                            Some(self.expect_ident()?)
                        } else {
                            None
                        };
                        names.push((name, alias));
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        if parenthesized && self.check(TokenKind::RParen) {
                            break;
                        }
                    }
                    if parenthesized {
                        self.expect(TokenKind::RParen)?;
                    }
                    return Ok(Stmt::new(
                        StmtKind::ImportFrom {
                            module,
                            names,
                            star: false,
                        },
                        line,
                    ));
                }
                "yield" => {
                    let value = self.parse_yield_expr()?;
                    return Ok(Stmt::new(StmtKind::Expr(value), line));
                }
                _ => {}
            }
        }
        self.parse_expr_statement()
    }

    /// Expression statement, assignment chain, or augmented assignment.
    fn parse_expr_statement(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        let first = self.parse_target_or_expr()?;

        if self.check(TokenKind::Assign) {
            // `a = b = value`: everything before the last `=` is a target.
            let mut exprs = vec![first];
            while self.eat(TokenKind::Assign) {
                let next = if self.check_keyword("yield") {
                    self.parse_yield_expr()?
                } else {
                    self.parse_target_or_expr()?
                };
                exprs.push(next);
            }
            let value = exprs.pop().expect("assignment chain has a value");
            return Ok(Stmt::new(StmtKind::Assign { targets: exprs, value }, line));
        }

        if self.check(TokenKind::Op) {
            let op_text = self.peek().text.clone();
            if let Some(op) = aug_op(&op_text) {
                self.advance();
                let value = self.parse_testlist()?;
                return Ok(Stmt::new(
                    StmtKind::AugAssign {
                        target: first,
                        op,
                        value,
                    },
                    line,
                ));
            }
        }

        Ok(Stmt::new(StmtKind::Expr(first), line))
    }

    /// A testlist that may contain starred targets (`a, *b = ...`).
    fn parse_target_or_expr(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let first = self.parse_star_or_expr()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if !self.at_expression_start() && !self.check_op("*") {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        Ok(Expr::new(ExprKind::TupleLit(items), line))
    }

    fn parse_star_or_expr(&mut self) -> RunResult<Expr> {
        let line = self.line();
        if self.eat_op("*") {
            let inner = self.parse_expression()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), line));
        }
        self.parse_expression()
    }

    fn parse_name_list(&mut self) -> RunResult<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(TokenKind::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> RunResult<String> {
        let mut name = self.expect_ident()?;
        while self.eat(TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_yield_expr(&mut self) -> RunResult<Expr> {
        let line = self.line();
        self.expect_keyword("yield")?;
        let value = if self.at_expression_start() {
            Some(Box::new(self.parse_testlist()?))
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Yield(value), line))
    }

    /// True when the current token can begin an expression.
    fn at_expression_start(&self) -> bool {
        match self.peek().kind {
            TokenKind::Number
            | TokenKind::Str
            | TokenKind::Ident
            | TokenKind::Bool
            | TokenKind::NoneLit
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace => true,
            TokenKind::Op => matches!(self.peek().text.as_str(), "+" | "-" | "~" | "*" | "**"),
            TokenKind::Keyword => matches!(self.peek().text.as_str(), "not" | "lambda" | "await" | "yield"),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // compound statements
    // ------------------------------------------------------------------

    /// `':' NEWLINE INDENT stmt+ DEDENT`, or an inline simple-statement line.
    fn parse_block(&mut self) -> RunResult<Vec<Stmt>> {
        self.expect(TokenKind::Colon)?;
        if self.eat(TokenKind::Newline) {
            self.expect(TokenKind::Indent)?;
            let mut body = Vec::new();
            while !self.eat(TokenKind::Dedent) {
                if self.check(TokenKind::Eof) {
                    return Err(self.unexpected("dedent"));
                }
                body.extend(self.parse_statement()?);
            }
            Ok(body)
        } else {
            self.parse_simple_statement_line()
        }
    }

    fn parse_if(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("if")?;
        let test = self.parse_expression()?;
        let body = self.parse_block()?;
        let orelse = self.parse_else_of_if()?;
        Ok(Stmt::new(StmtKind::If { test, body, orelse }, line))
    }

    /// `elif` chains lower to nested `if` statements in the else branch.
    fn parse_else_of_if(&mut self) -> RunResult<Vec<Stmt>> {
        if self.check_keyword("elif") {
            let line = self.line();
            self.advance();
            let test = self.parse_expression()?;
            let body = self.parse_block()?;
            let orelse = self.parse_else_of_if()?;
            return Ok(vec![Stmt::new(StmtKind::If { test, body, orelse }, line)]);
        }
        if self.eat_keyword("else") {
            return self.parse_block();
        }
        Ok(Vec::new())
    }

    fn parse_while(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("while")?;
        let test = self.parse_expression()?;
        let body = self.parse_block()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::While { test, body, orelse }, line))
    }

    fn parse_for(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("for")?;
        let target = self.parse_for_target()?;
        self.expect_keyword("in")?;
        let iter = self.parse_testlist()?;
        let body = self.parse_block()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            line,
        ))
    }

    /// A for-loop (or comprehension) target: name, tuple, starred, etc.
    fn parse_for_target(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let first = self.parse_star_or_postfix()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.check_keyword("in") {
                break;
            }
            items.push(self.parse_star_or_postfix()?);
        }
        Ok(Expr::new(ExprKind::TupleLit(items), line))
    }

    fn parse_star_or_postfix(&mut self) -> RunResult<Expr> {
        let line = self.line();
        if self.eat_op("*") {
            let inner = self.parse_postfix()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), line));
        }
        self.parse_postfix()
    }

    fn parse_try(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("try")?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.check_keyword("except") {
            self.advance();
            let (exc_type, name) = if self.check(TokenKind::Colon) {
                (None, None)
            } else {
                let e = self.parse_expression()?;
                let name = if self.eat_keyword("as") {
                    Some(self.expect_ident()?)
                } else {
                    None
                };
                (Some(e), name)
            };
            let handler_body = self.parse_block()?;
            handlers.push(ExceptHandler {
                exc_type,
                name,
                body: handler_body,
            });
        }
        let orelse = if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        let finally = if self.eat_keyword("finally") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finally.is_empty() {
            return Err(RunError::syntax(
                ExcType::SyntaxError,
                format!("expected 'except' or 'finally' block (line {line})"),
            ));
        }
        Ok(Stmt::new(
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finally,
            },
            line,
        ))
    }

    fn parse_with(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("with")?;
        let mut items = Vec::new();
        loop {
            let ctx = self.parse_expression()?;
            let target = if self.eat_keyword("as") {
                Some(self.parse_postfix()?)
            } else {
                None
            };
            items.push((ctx, target));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::With { items, body }, line))
    }

    fn parse_match(&mut self) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("match")?;
        let subject = self.parse_testlist()?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut cases = Vec::new();
        while !self.eat(TokenKind::Dedent) {
            self.expect_keyword("case")?;
            let pattern = self.parse_pattern()?;
            let guard = if self.eat_keyword("if") {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            cases.push(MatchCase { pattern, guard, body });
        }
        if cases.is_empty() {
            return Err(RunError::syntax(
                ExcType::SyntaxError,
                format!("match statement must have at least one case (line {line})"),
            ));
        }
        Ok(Stmt::new(StmtKind::Match { subject, cases }, line))
    }

    fn parse_pattern(&mut self) -> RunResult<Pattern> {
        let first = self.parse_closed_pattern()?;
        if !self.check_op("|") {
            return Ok(first);
        }
        let mut alternatives = vec![first];
        while self.eat_op("|") {
            alternatives.push(self.parse_closed_pattern()?);
        }
        Ok(Pattern::Or(alternatives))
    }

    fn parse_closed_pattern(&mut self) -> RunResult<Pattern> {
        let line = self.line();
        match self.peek().kind {
            TokenKind::Ident => {
                if self.peek().text == "_" {
                    self.advance();
                    return Ok(Pattern::Wildcard);
                }
                // A dotted name is a value pattern; a bare name captures.
                if self.peek_ahead(1).kind == TokenKind::Dot {
                    let mut expr = Expr::new(ExprKind::Name(self.advance().text), line);
                    while self.eat(TokenKind::Dot) {
                        let attr = self.expect_ident()?;
                        expr = Expr::new(
                            ExprKind::Attribute {
                                value: Box::new(expr),
                                attr,
                            },
                            line,
                        );
                    }
                    return Ok(Pattern::Value(expr));
                }
                Ok(Pattern::Capture(self.advance().text))
            }
            TokenKind::LBracket | TokenKind::LParen => {
                let close = if self.peek().kind == TokenKind::LBracket {
                    TokenKind::RBracket
                } else {
                    TokenKind::RParen
                };
                self.advance();
                let mut items = Vec::new();
                while !self.check(close) {
                    items.push(self.parse_pattern()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(close)?;
                Ok(Pattern::Sequence(items))
            }
            TokenKind::Number | TokenKind::Str | TokenKind::Bool | TokenKind::NoneLit => {
                let expr = self.parse_atom()?;
                Ok(Pattern::Value(expr))
            }
            TokenKind::Op if self.peek().text == "-" => {
                self.advance();
                let operand = self.parse_atom()?;
                Ok(Pattern::Value(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    line,
                )))
            }
            _ => Err(self.unexpected("pattern")),
        }
    }

    fn parse_decorated(&mut self) -> RunResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat(TokenKind::At) {
            decorators.push(self.parse_expression()?);
            self.expect(TokenKind::Newline)?;
        }
        if self.check_keyword("def") {
            self.parse_def(decorators, false)
        } else if self.check_keyword("class") {
            self.parse_class(decorators)
        } else if self.check_keyword("async") {
            self.advance();
            self.parse_def(decorators, true)
        } else {
            Err(self.unexpected("'def' or 'class'"))
        }
    }

    fn parse_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("def")?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params(TokenKind::RParen)?;
        self.expect(TokenKind::RParen)?;
        // Return annotations are accepted and discarded.
        if self.eat_op("->") {
            self.parse_expression()?;
        }
        let body = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::FunctionDef {
                name,
                params,
                body,
                decorators,
                is_async,
            },
            line,
        ))
    }

    fn parse_params(&mut self, close: TokenKind) -> RunResult<Vec<ParamSpec>> {
        // Annotations only exist in parenthesized lists; a colon after a
        // lambda parameter is the lambda's body separator.
        let allow_annotations = close == TokenKind::RParen;
        let mut params = Vec::new();
        while !self.check(close) {
            let kind = if self.eat_op("**") {
                ParamKind::DoubleStar
            } else if self.eat_op("*") {
                ParamKind::Star
            } else {
                ParamKind::Normal
            };
            let name = self.expect_ident()?;
            // Annotations are accepted and discarded.
            if allow_annotations && self.eat(TokenKind::Colon) {
                self.parse_expression()?;
            }
            let default = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(ParamSpec { name, default, kind });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_class(&mut self, decorators: Vec<Expr>) -> RunResult<Stmt> {
        let line = self.line();
        self.expect_keyword("class")?;
        let name = self.expect_ident()?;
        let mut bases = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.check(TokenKind::RParen) {
                bases.push(self.parse_expression()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        let body = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::ClassDef {
                name,
                bases,
                body,
                decorators,
            },
            line,
        ))
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    /// A comma-separated expression list; two or more items form a tuple.
    fn parse_testlist(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let first = self.parse_star_or_expr()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if !self.at_expression_start() && !self.check_op("*") {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        Ok(Expr::new(ExprKind::TupleLit(items), line))
    }

    /// Conditional expression (lowest precedence) and lambda.
    pub fn parse_expression(&mut self) -> RunResult<Expr> {
        if self.check_keyword("lambda") {
            return self.parse_lambda();
        }
        if self.check_keyword("yield") {
            return self.parse_yield_expr();
        }
        let line = self.line();
        let value = self.parse_or()?;
        if self.eat_keyword("if") {
            let condition = self.parse_or()?;
            self.expect_keyword("else")?;
            let orelse = self.parse_expression()?;
            return Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(condition),
                    then: Box::new(value),
                    orelse: Box::new(orelse),
                },
                line,
            ));
        }
        Ok(value)
    }

    fn parse_lambda(&mut self) -> RunResult<Expr> {
        let line = self.line();
        self.expect_keyword("lambda")?;
        let params = self.parse_params(TokenKind::Colon)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_expression()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            line,
        ))
    }

    fn parse_or(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let first = self.parse_and()?;
        if !self.check_keyword("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.parse_and()?);
        }
        Ok(Expr::new(ExprKind::Bool { op: BoolOp::Or, values }, line))
    }

    fn parse_and(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let first = self.parse_not()?;
        if !self.check_keyword("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.parse_not()?);
        }
        Ok(Expr::new(ExprKind::Bool { op: BoolOp::And, values }, line))
    }

    fn parse_not(&mut self) -> RunResult<Expr> {
        let line = self.line();
        if self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let left = self.parse_bit_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = if self.check(TokenKind::Op) {
                match self.peek().text.as_str() {
                    "<" => Some(CmpOp::Lt),
                    "<=" => Some(CmpOp::Le),
                    "==" => Some(CmpOp::Eq),
                    "!=" => Some(CmpOp::Ne),
                    ">" => Some(CmpOp::Gt),
                    ">=" => Some(CmpOp::Ge),
                    _ => None,
                }
            } else if self.check_keyword("in") {
                Some(CmpOp::In)
            } else if self.check_keyword("not") && self.peek_ahead(1).kind == TokenKind::Keyword
                && self.peek_ahead(1).text == "in"
            {
                self.advance();
                Some(CmpOp::NotIn)
            } else if self.check_keyword("is") {
                if self.peek_ahead(1).kind == TokenKind::Keyword && self.peek_ahead(1).text == "not" {
                    self.advance();
                    Some(CmpOp::IsNot)
                } else {
                    Some(CmpOp::Is)
                }
            } else {
                None
            };
            let Some(op) = op else { break };
            self.advance();
            ops.push(op);
            comparators.push(self.parse_bit_or()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops,
                comparators,
            },
            line,
        ))
    }

    fn parse_bit_or(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_bit_xor()?;
        while self.check_op("|") {
            let line = self.line();
            self.advance();
            let right = self.parse_bit_xor()?;
            left = binary(BinOp::BitOr, left, right, line);
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_bit_and()?;
        while self.check_op("^") {
            let line = self.line();
            self.advance();
            let right = self.parse_bit_and()?;
            left = binary(BinOp::BitXor, left, right, line);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_shift()?;
        while self.check_op("&") {
            let line = self.line();
            self.advance();
            let right = self.parse_shift()?;
            left = binary(BinOp::BitAnd, left, right, line);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check_op("<<") {
                BinOp::Shl
            } else if self.check_op(">>") {
                BinOp::Shr
            } else {
                break;
            };
            let line = self.line();
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check_op("+") {
                BinOp::Add
            } else if self.check_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            let line = self.line();
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> RunResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check_op("*") {
                BinOp::Mul
            } else if self.check_op("//") {
                BinOp::FloorDiv
            } else if self.check_op("/") {
                BinOp::Div
            } else if self.check_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            let line = self.line();
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right, line);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let op = if self.check_op("+") {
            Some(UnaryOp::Pos)
        } else if self.check_op("-") {
            Some(UnaryOp::Neg)
        } else if self.check_op("~") {
            Some(UnaryOp::Invert)
        } else {
            None
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                line,
            ));
        }
        if self.eat_keyword("await") {
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Await(Box::new(operand)), line));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> RunResult<Expr> {
        let base = self.parse_postfix()?;
        if self.check_op("**") {
            let line = self.line();
            self.advance();
            // Right-associative: the exponent binds unary operators too.
            let exponent = self.parse_unary()?;
            return Ok(binary(BinOp::Pow, base, exponent, line));
        }
        Ok(base)
    }

    /// Postfix chains: calls, subscripts, attribute access, left to right.
    fn parse_postfix(&mut self) -> RunResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.check(TokenKind::LParen) {
                let line = self.line();
                self.advance();
                let args = self.parse_call_args()?;
                self.expect(TokenKind::RParen)?;
                expr = Expr::new(
                    ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    line,
                );
            } else if self.check(TokenKind::LBracket) {
                let line = self.line();
                self.advance();
                let index = self.parse_subscript()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                );
            } else if self.check(TokenKind::Dot) {
                let line = self.line();
                self.advance();
                let attr = self.expect_ident()?;
                expr = Expr::new(
                    ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                    line,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_call_args(&mut self) -> RunResult<Vec<CallArg>> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            if self.eat_op("**") {
                args.push(CallArg::DoubleStar(self.parse_expression()?));
            } else if self.eat_op("*") {
                args.push(CallArg::Star(self.parse_expression()?));
            } else if self.check(TokenKind::Ident) && self.peek_ahead(1).kind == TokenKind::Assign {
                let name = self.advance().text;
                self.advance(); // '='
                args.push(CallArg::Keyword(name, self.parse_expression()?));
            } else {
                let expr = self.parse_expression()?;
                // A bare generator expression as the sole argument.
                if self.check_keyword("for") && args.is_empty() {
                    let clauses = self.parse_comp_clauses()?;
                    let line = expr.line;
                    args.push(CallArg::Positional(Expr::new(
                        ExprKind::GenExp {
                            element: Box::new(expr),
                            clauses,
                        },
                        line,
                    )));
                    break;
                }
                args.push(CallArg::Positional(expr));
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_subscript(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let start = if self.check(TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        if !self.check(TokenKind::Colon) {
            // Plain index; tuple indices like d[1, 2] form a tuple key.
            let first = *start.expect("non-slice subscript has an index");
            if self.check(TokenKind::Comma) {
                let mut items = vec![first];
                while self.eat(TokenKind::Comma) {
                    if self.check(TokenKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_expression()?);
                }
                return Ok(Expr::new(ExprKind::TupleLit(items), line));
            }
            return Ok(first);
        }
        self.advance(); // ':'
        let stop = if self.check(TokenKind::Colon) || self.check(TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let step = if self.eat(TokenKind::Colon) {
            if self.check(TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression()?))
            }
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Slice { start, stop, step }, line))
    }

    fn parse_comp_clauses(&mut self) -> RunResult<Vec<CompClause>> {
        let mut clauses = Vec::new();
        while self.eat_keyword("for") {
            let target = self.parse_for_target()?;
            self.expect_keyword("in")?;
            let iter = self.parse_or()?;
            let mut conditions = Vec::new();
            while self.eat_keyword("if") {
                conditions.push(self.parse_or()?);
            }
            clauses.push(CompClause {
                target,
                iter,
                conditions,
            });
        }
        Ok(clauses)
    }

    fn parse_atom(&mut self) -> RunResult<Expr> {
        let line = self.line();
        match self.peek().kind {
            TokenKind::Number => {
                let text = self.advance().text;
                Ok(Expr::new(parse_number(&text)?, line))
            }
            TokenKind::Str => self.parse_string_atom(),
            TokenKind::Bool => {
                let text = self.advance().text;
                Ok(Expr::new(ExprKind::BoolLit(text == "True"), line))
            }
            TokenKind::NoneLit => {
                self.advance();
                Ok(Expr::new(ExprKind::NoneLit, line))
            }
            TokenKind::Ident => {
                let name = self.advance().text;
                Ok(Expr::new(ExprKind::Name(name), line))
            }
            TokenKind::Keyword if self.peek().text == "lambda" => self.parse_lambda(),
            TokenKind::Keyword if self.peek().text == "not" => self.parse_not(),
            TokenKind::LParen => self.parse_paren_atom(),
            TokenKind::LBracket => self.parse_list_atom(),
            TokenKind::LBrace => self.parse_brace_atom(),
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Adjacent string literals concatenate; f-strings join the template.
    fn parse_string_atom(&mut self) -> RunResult<Expr> {
        let line = self.line();
        let mut literal = String::new();
        let mut fparts: Vec<FStringPart> = Vec::new();
        let mut is_fstring = false;
        while self.check(TokenKind::Str) {
            let lexeme = self.advance().text;
            match fstring::cook_literal(&lexeme, &mut self.templates)? {
                CookedLiteral::Str(s) => {
                    if is_fstring {
                        fparts.push(FStringPart::Literal(s));
                    } else {
                        literal.push_str(&s);
                    }
                }
                CookedLiteral::FString(template) => {
                    if !is_fstring {
                        is_fstring = true;
                        if !literal.is_empty() {
                            fparts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                        }
                    }
                    for part in template.iter() {
                        match part {
                            TemplatePart::Literal(s) => fparts.push(FStringPart::Literal(s.clone())),
                            TemplatePart::Field { expr, conversion, spec } => {
                                let parsed = self.parse_embedded_expression(expr, line)?;
                                fparts.push(FStringPart::Expr {
                                    expr: Box::new(parsed),
                                    conversion: *conversion,
                                    spec: spec.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
        if is_fstring {
            Ok(Expr::new(ExprKind::FString(fparts), line))
        } else {
            Ok(Expr::new(ExprKind::StrLit(literal), line))
        }
    }

    /// Parses one f-string field's expression source.
    fn parse_embedded_expression(&mut self, source: &str, line: u32) -> RunResult<Expr> {
        let tokens = tokenize(source).map_err(|_| {
            RunError::syntax(
                ExcType::SyntaxError,
                format!("f-string: invalid expression (line {line})"),
            )
        })?;
        let mut sub = Parser::new(tokens);
        let expr = sub.parse_testlist()?;
        if !sub.eat(TokenKind::Newline) && !sub.check(TokenKind::Eof) {
            return Err(RunError::syntax(
                ExcType::SyntaxError,
                format!("f-string: invalid expression (line {line})"),
            ));
        }
        Ok(expr)
    }

    fn parse_paren_atom(&mut self) -> RunResult<Expr> {
        let line = self.line();
        self.expect(TokenKind::LParen)?;
        if self.eat(TokenKind::RParen) {
            return Ok(Expr::new(ExprKind::TupleLit(Vec::new()), line));
        }
        if self.check_keyword("yield") {
            let inner = self.parse_yield_expr()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        let first = self.parse_star_or_expr()?;
        if self.check_keyword("for") {
            let clauses = self.parse_comp_clauses()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::new(
                ExprKind::GenExp {
                    element: Box::new(first),
                    clauses,
                },
                line,
            ));
        }
        if self.check(TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat(TokenKind::Comma) {
                if self.check(TokenKind::RParen) {
                    break;
                }
                items.push(self.parse_star_or_expr()?);
            }
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::new(ExprKind::TupleLit(items), line));
        }
        self.expect(TokenKind::RParen)?;
        Ok(first)
    }

    fn parse_list_atom(&mut self) -> RunResult<Expr> {
        let line = self.line();
        self.expect(TokenKind::LBracket)?;
        if self.eat(TokenKind::RBracket) {
            return Ok(Expr::new(ExprKind::ListLit(Vec::new()), line));
        }
        let first = self.parse_star_or_expr()?;
        if self.check_keyword("for") {
            let clauses = self.parse_comp_clauses()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::new(
                ExprKind::ListComp {
                    element: Box::new(first),
                    clauses,
                },
                line,
            ));
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.check(TokenKind::RBracket) {
                break;
            }
            items.push(self.parse_star_or_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::ListLit(items), line))
    }

    fn parse_brace_atom(&mut self) -> RunResult<Expr> {
        let line = self.line();
        self.expect(TokenKind::LBrace)?;
        if self.eat(TokenKind::RBrace) {
            return Ok(Expr::new(ExprKind::DictLit(Vec::new()), line));
        }
        let first = self.parse_expression()?;
        if self.eat(TokenKind::Colon) {
            // Dict literal or dict comprehension.
            let value = self.parse_expression()?;
            if self.check_keyword("for") {
                let clauses = self.parse_comp_clauses()?;
                self.expect(TokenKind::RBrace)?;
                return Ok(Expr::new(
                    ExprKind::DictComp {
                        key: Box::new(first),
                        value: Box::new(value),
                        clauses,
                    },
                    line,
                ));
            }
            let mut pairs = vec![(first, value)];
            while self.eat(TokenKind::Comma) {
                if self.check(TokenKind::RBrace) {
                    break;
                }
                let k = self.parse_expression()?;
                self.expect(TokenKind::Colon)?;
                let v = self.parse_expression()?;
                pairs.push((k, v));
            }
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::new(ExprKind::DictLit(pairs), line));
        }
        // Set literal or set comprehension.
        if self.check_keyword("for") {
            let clauses = self.parse_comp_clauses()?;
            self.expect(TokenKind::RBrace)?;
            return Ok(Expr::new(
                ExprKind::SetComp {
                    element: Box::new(first),
                    clauses,
                },
                line,
            ));
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.check(TokenKind::RBrace) {
                break;
            }
            items.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::SetLit(items), line))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr, line: u32) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        line,
    )
}

fn aug_op(text: &str) -> Option<BinOp> {
    match text {
        "+=" => Some(BinOp::Add),
        "-=" => Some(BinOp::Sub),
        "*=" => Some(BinOp::Mul),
        "/=" => Some(BinOp::Div),
        "//=" => Some(BinOp::FloorDiv),
        "%=" => Some(BinOp::Mod),
        "**=" => Some(BinOp::Pow),
        "&=" => Some(BinOp::BitAnd),
        "|=" => Some(BinOp::BitOr),
        "^=" => Some(BinOp::BitXor),
        "<<=" => Some(BinOp::Shl),
        ">>=" => Some(BinOp::Shr),
        _ => None,
    }
}

/// Converts a numeric lexeme into a literal node.
fn parse_number(text: &str) -> RunResult<ExprKind> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if cleaned.ends_with('j') || cleaned.ends_with('J') {
        return Err(RunError::syntax(
            ExcType::SyntaxError,
            "complex literals are not supported",
        ));
    }
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return int_literal(hex, 16);
    }
    if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        return int_literal(oct, 8);
    }
    if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        return int_literal(bin, 2);
    }
    if cleaned.contains('.') || cleaned.contains('e') || cleaned.contains('E') {
        let f: f64 = cleaned
            .parse()
            .map_err(|_| RunError::syntax(ExcType::SyntaxError, format!("invalid numeric literal '{text}'")))?;
        return Ok(ExprKind::FloatLit(f));
    }
    int_literal(&cleaned, 10)
}

fn int_literal(digits: &str, radix: u32) -> RunResult<ExprKind> {
    if let Ok(i) = i64::from_str_radix(digits, radix) {
        return Ok(ExprKind::IntLit(i));
    }
    let big = BigInt::from_str_radix(digits, radix)
        .map_err(|_| RunError::syntax(ExcType::SyntaxError, format!("invalid numeric literal '{digits}'")))?;
    Ok(ExprKind::BigIntLit(big))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        parse(source).unwrap()
    }

    fn first_expr(source: &str) -> Expr {
        let program = parse_ok(source);
        match program.body.into_iter().next().unwrap().kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let e = first_expr("1 + 2 * 3\n");
        let ExprKind::Binary { op: BinOp::Add, right, .. } = e.kind else {
            panic!("expected Add at the top");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_power_right_associative() {
        let e = first_expr("2 ** 3 ** 2\n");
        let ExprKind::Binary { op: BinOp::Pow, right, .. } = e.kind else {
            panic!("expected Pow at the top");
        };
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn test_chained_comparison_lowering() {
        let e = first_expr("a < b < c\n");
        let ExprKind::Compare { ops, comparators, .. } = e.kind else {
            panic!("expected Compare");
        };
        assert_eq!(ops, vec![CmpOp::Lt, CmpOp::Lt]);
        assert_eq!(comparators.len(), 2);
    }

    #[test]
    fn test_not_in_and_is_not() {
        let e = first_expr("a not in b\n");
        let ExprKind::Compare { ops, .. } = e.kind else { panic!() };
        assert_eq!(ops, vec![CmpOp::NotIn]);
        let e = first_expr("a is not b\n");
        let ExprKind::Compare { ops, .. } = e.kind else { panic!() };
        assert_eq!(ops, vec![CmpOp::IsNot]);
    }

    #[test]
    fn test_slice_with_omitted_parts() {
        let e = first_expr("x[::2]\n");
        let ExprKind::Subscript { index, .. } = e.kind else { panic!() };
        let ExprKind::Slice { start, stop, step } = index.kind else {
            panic!("expected Slice");
        };
        assert!(start.is_none());
        assert!(stop.is_none());
        assert!(step.is_some());
    }

    #[test]
    fn test_call_arg_forms() {
        let e = first_expr("f(1, *a, k=2, **b)\n");
        let ExprKind::Call { args, .. } = e.kind else { panic!() };
        assert!(matches!(args[0], CallArg::Positional(_)));
        assert!(matches!(args[1], CallArg::Star(_)));
        assert!(matches!(args[2], CallArg::Keyword(_, _)));
        assert!(matches!(args[3], CallArg::DoubleStar(_)));
    }

    #[test]
    fn test_assignment_chain() {
        let program = parse_ok("a = b = 1\n");
        let StmtKind::Assign { targets, .. } = &program.body[0].kind else {
            panic!("expected Assign");
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_augmented_assignment() {
        let program = parse_ok("x += 1\n");
        assert!(matches!(
            program.body[0].kind,
            StmtKind::AugAssign { op: BinOp::Add, .. }
        ));
    }

    #[test]
    fn test_semicolon_statements() {
        let program = parse_ok("a = 1; b = 2; print(a)\n");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_inline_block() {
        let program = parse_ok("if x: y = 1\n");
        let StmtKind::If { body, .. } = &program.body[0].kind else { panic!() };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_elif_lowering() {
        let program = parse_ok("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        let StmtKind::If { orelse, .. } = &program.body[0].kind else { panic!() };
        assert_eq!(orelse.len(), 1);
        assert!(matches!(orelse[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_def_with_defaults_and_stars() {
        let program = parse_ok("def f(a, b=1, *args, **kwargs):\n    pass\n");
        let StmtKind::FunctionDef { params, .. } = &program.body[0].kind else {
            panic!()
        };
        assert_eq!(params.len(), 4);
        assert!(params[1].default.is_some());
        assert_eq!(params[2].kind, ParamKind::Star);
        assert_eq!(params[3].kind, ParamKind::DoubleStar);
    }

    #[test]
    fn test_decorators_stack() {
        let program = parse_ok("@dec1\n@dec2\ndef f():\n    pass\n");
        let StmtKind::FunctionDef { decorators, .. } = &program.body[0].kind else {
            panic!()
        };
        assert_eq!(decorators.len(), 2);
    }

    #[test]
    fn test_try_except_finally() {
        let program = parse_ok("try:\n    pass\nexcept ValueError as e:\n    pass\nelse:\n    pass\nfinally:\n    pass\n");
        let StmtKind::Try {
            handlers,
            orelse,
            finally,
            ..
        } = &program.body[0].kind
        else {
            panic!()
        };
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name.as_deref(), Some("e"));
        assert_eq!(orelse.len(), 1);
        assert_eq!(finally.len(), 1);
    }

    #[test]
    fn test_try_without_handlers_rejected() {
        assert!(parse("try:\n    pass\n").is_err());
    }

    #[test]
    fn test_match_patterns() {
        let program = parse_ok("match x:\n    case [a, b]:\n        pass\n    case 1 | 2:\n        pass\n    case _:\n        pass\n");
        let StmtKind::Match { cases, .. } = &program.body[0].kind else { panic!() };
        assert_eq!(cases.len(), 3);
        assert!(matches!(cases[0].pattern, Pattern::Sequence(_)));
        assert!(matches!(cases[1].pattern, Pattern::Or(_)));
        assert!(matches!(cases[2].pattern, Pattern::Wildcard));
    }

    #[test]
    fn test_comprehensions() {
        assert!(matches!(first_expr("[x for x in y if x]\n").kind, ExprKind::ListComp { .. }));
        assert!(matches!(first_expr("{x for x in y}\n").kind, ExprKind::SetComp { .. }));
        assert!(matches!(
            first_expr("{k: v for k, v in y}\n").kind,
            ExprKind::DictComp { .. }
        ));
        assert!(matches!(first_expr("(x for x in y)\n").kind, ExprKind::GenExp { .. }));
    }

    #[test]
    fn test_genexp_as_sole_call_arg() {
        let e = first_expr("sum(x * x for x in y)\n");
        let ExprKind::Call { args, .. } = e.kind else { panic!() };
        assert_eq!(args.len(), 1);
        let CallArg::Positional(arg) = &args[0] else { panic!() };
        assert!(matches!(arg.kind, ExprKind::GenExp { .. }));
    }

    #[test]
    fn test_fstring_parts() {
        let e = first_expr("f'a{x}b{y!r:>3}'\n");
        let ExprKind::FString(parts) = e.kind else { panic!() };
        assert_eq!(parts.len(), 4);
        assert!(matches!(&parts[0], FStringPart::Literal(s) if s == "a"));
        assert!(matches!(&parts[1], FStringPart::Expr { conversion: None, .. }));
        assert!(
            matches!(&parts[3], FStringPart::Expr { conversion: Some('r'), spec: Some(s), .. } if s == ">3")
        );
    }

    #[test]
    fn test_adjacent_string_concatenation() {
        let e = first_expr("'a' 'b' 'c'\n");
        let ExprKind::StrLit(s) = e.kind else { panic!() };
        assert_eq!(s, "abc");
    }

    #[test]
    fn test_big_int_literal() {
        let e = first_expr("123456789012345678901234567890\n");
        assert!(matches!(e.kind, ExprKind::BigIntLit(_)));
    }

    #[test]
    fn test_unexpected_token_reports_position() {
        let err = parse("x = )\n").unwrap_err();
        let text = format!("{err:?}");
        assert!(text.contains("line 1"), "error should name the line: {text}");
    }

    #[test]
    fn test_starred_assignment_target() {
        let program = parse_ok("a, *b, c = xs\n");
        let StmtKind::Assign { targets, .. } = &program.body[0].kind else { panic!() };
        let ExprKind::TupleLit(items) = &targets[0].kind else { panic!() };
        assert!(matches!(items[1].kind, ExprKind::Starred(_)));
    }

    #[test]
    fn test_lambda() {
        let e = first_expr("lambda a, b=2: a + b\n");
        let ExprKind::Lambda { params, .. } = e.kind else { panic!() };
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_ternary() {
        let e = first_expr("a if c else b\n");
        assert!(matches!(e.kind, ExprKind::Ternary { .. }));
    }

    #[test]
    fn test_async_def_and_await() {
        let program = parse_ok("async def f():\n    await g()\n");
        let StmtKind::FunctionDef { is_async, body, .. } = &program.body[0].kind else {
            panic!()
        };
        assert!(is_async);
        let StmtKind::Expr(e) = &body[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::Await(_)));
    }
}

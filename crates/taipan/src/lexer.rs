//! Indentation-aware lexer producing the token stream consumed by the parser.
//!
//! The lexer works line-by-line: physical newlines inside open brackets do not
//! terminate a logical line, and the leading whitespace of each logical line is
//! compared against a stack of indent widths to synthesize `Indent`/`Dedent`
//! tokens. String literals keep their raw lexeme (prefix and quotes included)
//! so the parser can handle f-strings and raw strings itself.

use std::fmt;

use crate::exception::{ExcType, RunError};

/// Kinds of tokens produced by [`Lexer::tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Str,
    Ident,
    Keyword,
    Op,
    Newline,
    Indent,
    Dedent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    At,
    Assign,
    Bool,
    NoneLit,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Number => "number",
            Self::Str => "string",
            Self::Ident => "identifier",
            Self::Keyword => "keyword",
            Self::Op => "operator",
            Self::Newline => "newline",
            Self::Indent => "indent",
            Self::Dedent => "dedent",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Comma => "','",
            Self::Colon => "':'",
            Self::Semicolon => "';'",
            Self::Dot => "'.'",
            Self::At => "'@'",
            Self::Assign => "'='",
            Self::Bool => "bool literal",
            Self::NoneLit => "None",
            Self::Eof => "end of file",
        };
        f.write_str(s)
    }
}

/// A single token with its raw text and 1-based source position.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

/// The fixed Python keyword set recognized by the lexer.
///
/// `True`/`False`/`None` are excluded here; they lex to their own token kinds.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "while", "for", "def", "class", "return", "yield", "break",
    "continue", "pass", "import", "from", "as", "with", "try", "except", "finally", "raise", "assert", "global",
    "nonlocal", "lambda", "match", "case", "async", "await", "del",
];

/// Multi-character operators, longest first so greedy matching is correct.
const OPERATORS: &[&str] = &[
    "**=", "//=", "<<=", ">>=", "->", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "~", "!",
];

/// Tab stop used when measuring leading whitespace.
const TAB_WIDTH: u32 = 8;

/// Indentation-aware tokenizer for Python source.
pub struct Lexer<'a> {
    chars: Vec<char>,
    source: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    /// Stack of indent widths, always starting with `[0]`.
    indents: Vec<u32>,
    /// Open bracket depth; newlines are soft while non-zero.
    bracket_depth: u32,
    tokens: Vec<Token>,
    /// Set once the first non-blank token of a logical line has been handled.
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 1,
            column: 1,
            indents: vec![0],
            bracket_depth: 0,
            tokens: Vec::new(),
            at_line_start: true,
        }
    }

    /// Tokenizes the whole source, ending the stream with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, RunError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.bracket_depth == 0 {
                self.handle_line_start()?;
                if self.pos >= self.chars.len() {
                    break;
                }
                if self.at_line_start {
                    // Line was blank or comment-only; loop to the next one.
                    continue;
                }
            }
            self.lex_one()?;
        }

        // Close the final logical line and drain the indent stack.
        if !matches!(self.tokens.last().map(|t| t.kind), Some(TokenKind::Newline) | None) {
            self.push(TokenKind::Newline, "\n");
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "");
        }
        self.push(TokenKind::Eof, "");
        Ok(self.tokens)
    }

    /// Measures leading whitespace and emits indent/dedent tokens.
    ///
    /// Blank and comment-only lines are skipped without affecting the stack.
    fn handle_line_start(&mut self) -> Result<(), RunError> {
        let mut width = 0u32;
        loop {
            match self.peek() {
                Some(' ') => {
                    width += 1;
                    self.advance();
                }
                Some('\t') => {
                    width = (width / TAB_WIDTH + 1) * TAB_WIDTH;
                    self.advance();
                }
                _ => break,
            }
        }
        match self.peek() {
            // Blank line: consume the newline, stay at line start.
            Some('\n') => {
                self.advance();
                return Ok(());
            }
            Some('\r') => {
                self.advance();
                if self.peek() == Some('\n') {
                    self.advance();
                }
                return Ok(());
            }
            // Comment-only line: skip to end of line.
            Some('#') => {
                while let Some(c) = self.peek() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                }
                return Ok(());
            }
            None => return Ok(()),
            _ => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, "");
        } else if width < current {
            while *self.indents.last().unwrap_or(&0) > width {
                self.indents.pop();
                self.push(TokenKind::Dedent, "");
            }
            if *self.indents.last().unwrap_or(&0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        self.at_line_start = false;
        Ok(())
    }

    /// Lexes one token (or consumes insignificant input) at the current position.
    fn lex_one(&mut self) -> Result<(), RunError> {
        let Some(c) = self.peek() else { return Ok(()) };
        match c {
            ' ' | '\t' => {
                self.advance();
                Ok(())
            }
            '\r' => {
                self.advance();
                Ok(())
            }
            '\n' => {
                self.advance();
                if self.bracket_depth == 0 {
                    self.push_at(TokenKind::Newline, "\n", self.line - 1, self.column);
                    self.at_line_start = true;
                }
                Ok(())
            }
            '#' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                Ok(())
            }
            '\\' => {
                // Explicit line continuation: backslash immediately before a newline.
                self.advance();
                if self.peek() == Some('\r') {
                    self.advance();
                }
                if self.peek() == Some('\n') {
                    self.advance();
                    Ok(())
                } else {
                    Err(self.error("unexpected character after line continuation character"))
                }
            }
            '0'..='9' => self.lex_number(),
            '.' => {
                if matches!(self.peek_ahead(1), Some('0'..='9')) {
                    self.lex_number()
                } else {
                    self.advance();
                    self.push_at(TokenKind::Dot, ".", self.line, self.column - 1);
                    Ok(())
                }
            }
            '"' | '\'' => self.lex_string(self.pos),
            c if c == '_' || c.is_alphabetic() => self.lex_word(),
            _ => self.lex_punct(),
        }
    }

    fn lex_word(&mut self) -> Result<(), RunError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        // A string prefix directly followed by a quote starts a string literal.
        if matches!(word.as_str(), "f" | "F" | "r" | "R" | "fr" | "rf" | "Rf" | "rF" | "fR" | "FR" | "Fr" | "RF")
            && matches!(self.peek(), Some('"' | '\''))
        {
            return self.lex_string(start);
        }

        let kind = match word.as_str() {
            "True" | "False" => TokenKind::Bool,
            "None" => TokenKind::NoneLit,
            w if KEYWORDS.contains(&w) => TokenKind::Keyword,
            _ => TokenKind::Ident,
        };
        self.push_at(kind, word, line, column);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), RunError> {
        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let mut is_float = false;

        if self.peek() == Some('0') && matches!(self.peek_ahead(1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')) {
            self.advance();
            let radix_char = self.peek().unwrap_or('x');
            self.advance();
            let mut digits = 0;
            while let Some(c) = self.peek() {
                let ok = match radix_char {
                    'x' | 'X' => c.is_ascii_hexdigit(),
                    'o' | 'O' => ('0'..='7').contains(&c),
                    _ => c == '0' || c == '1',
                };
                if ok || c == '_' {
                    if ok {
                        digits += 1;
                    }
                    self.advance();
                } else {
                    break;
                }
            }
            if digits == 0 {
                return Err(self.error("invalid numeric literal"));
            }
        } else {
            while matches!(self.peek(), Some('0'..='9' | '_')) {
                self.advance();
            }
            // A dot belongs to the number unless it starts an attribute access.
            if self.peek() == Some('.')
                && !matches!(self.peek_ahead(1), Some(c) if c == '_' || c.is_alphabetic())
            {
                is_float = true;
                self.advance();
                while matches!(self.peek(), Some('0'..='9' | '_')) {
                    self.advance();
                }
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let mut look = 1;
                if matches!(self.peek_ahead(1), Some('+' | '-')) {
                    look = 2;
                }
                if matches!(self.peek_ahead(look), Some('0'..='9')) {
                    is_float = true;
                    for _ in 0..=look {
                        self.advance();
                    }
                    while matches!(self.peek(), Some('0'..='9' | '_')) {
                        self.advance();
                    }
                }
            }
        }
        // Imaginary suffix is accepted lexically.
        if matches!(self.peek(), Some('j' | 'J')) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.ends_with('_') || text.contains("__") {
            return Err(self.error("invalid numeric literal"));
        }
        let _ = is_float;
        self.push_at(TokenKind::Number, text, line, column);
        Ok(())
    }

    /// Lexes a string literal starting at `start` (which may point at a prefix).
    ///
    /// The emitted token text is the raw lexeme, prefix and quotes included.
    fn lex_string(&mut self, start: usize) -> Result<(), RunError> {
        let line = self.line;
        let column = self.column - u32::try_from(self.pos - start).unwrap_or(0);
        let raw = {
            let prefix: String = self.chars[start..self.pos].iter().collect();
            prefix.contains('r') || prefix.contains('R')
        };

        let quote = self.peek().ok_or_else(|| self.error("unterminated string literal"))?;
        self.advance();
        let triple = self.peek() == Some(quote) && self.peek_ahead(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        loop {
            let Some(c) = self.peek() else {
                return Err(self.error_at("unterminated string literal", line, column));
            };
            if c == '\\' && !raw {
                self.advance();
                if self.peek().is_none() {
                    return Err(self.error_at("unterminated string literal", line, column));
                }
                self.advance();
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error_at("unterminated string literal", line, column));
            }
            if c == quote {
                if triple {
                    if self.peek_ahead(1) == Some(quote) && self.peek_ahead(2) == Some(quote) {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                } else {
                    self.advance();
                    break;
                }
            } else {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push_at(TokenKind::Str, text, line, column);
        Ok(())
    }

    fn lex_punct(&mut self) -> Result<(), RunError> {
        let line = self.line;
        let column = self.column;
        let c = self.peek().unwrap_or('\0');
        let simple = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semicolon),
            '@' => Some(TokenKind::At),
            _ => None,
        };
        if let Some(kind) = simple {
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.bracket_depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    self.bracket_depth = self.bracket_depth.saturating_sub(1);
                }
                _ => {}
            }
            self.advance();
            self.push_at(kind, c.to_string(), line, column);
            return Ok(());
        }

        // Multi-character operators, longest match first.
        for op in OPERATORS {
            if self.matches_str(op) {
                for _ in 0..op.chars().count() {
                    self.advance();
                }
                self.push_at(TokenKind::Op, *op, line, column);
                return Ok(());
            }
        }
        if c == '=' {
            if self.peek_ahead(1) == Some('=') {
                self.advance();
                self.advance();
                self.push_at(TokenKind::Op, "==", line, column);
            } else {
                self.advance();
                self.push_at(TokenKind::Assign, "=", line, column);
            }
            return Ok(());
        }
        Err(self.error(&format!("unexpected character {c:?}")))
    }

    fn matches_str(&self, s: &str) -> bool {
        // `==` is handled separately so `=` can lex as Assign.
        if s.starts_with('=') {
            return false;
        }
        let mut i = self.pos;
        for ch in s.chars() {
            if self.chars.get(i) != Some(&ch) {
                return false;
            }
            i += 1;
        }
        // `!` alone is not an operator; only `!=` is.
        if s == "!" {
            return self.chars.get(self.pos + 1) == Some(&'=');
        }
        true
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn advance(&mut self) {
        if let Some(&c) = self.chars.get(self.pos) {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn push(&mut self, kind: TokenKind, text: &str) {
        self.push_at(kind, text, self.line, self.column);
    }

    fn push_at(&mut self, kind: TokenKind, text: impl Into<String>, line: u32, column: u32) {
        self.tokens.push(Token::new(kind, text, line, column));
    }

    fn error(&self, message: &str) -> RunError {
        self.error_at(message, self.line, self.column)
    }

    fn error_at(&self, message: &str, line: u32, column: u32) -> RunError {
        let _ = self.source;
        RunError::syntax(ExcType::SyntaxError, format!("{message} (line {line}, column {column})"))
    }
}

/// Tokenizes `source`, returning the full token stream ending in `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, RunError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_assignment() {
        let toks = tokenize("x = 1\n").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "x");
        assert_eq!(toks[1].kind, TokenKind::Assign);
        assert_eq!(toks[2].kind, TokenKind::Number);
        assert_eq!(toks[3].kind, TokenKind::Newline);
        assert_eq!(toks[4].kind, TokenKind::Eof);
    }

    #[test]
    fn test_indent_dedent() {
        let toks = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
        // Dedent appears before z's Ident token
        let dedent_pos = toks.iter().position(|k| *k == TokenKind::Dedent).unwrap();
        let indent_pos = toks.iter().position(|k| *k == TokenKind::Indent).unwrap();
        assert!(indent_pos < dedent_pos);
    }

    #[test]
    fn test_eof_closes_open_indents() {
        let toks = kinds("if x:\n    if y:\n        z");
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(toks.last(), Some(&TokenKind::Eof));
        // Synthetic newline precedes the dedents.
        let newline_pos = toks.iter().rposition(|k| *k == TokenKind::Newline).unwrap();
        let first_dedent = toks.iter().position(|k| *k == TokenKind::Dedent).unwrap();
        assert!(newline_pos < first_dedent);
    }

    #[test]
    fn test_newline_suppressed_in_brackets() {
        let toks = kinds("x = [1,\n2]\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_mismatched_dedent_is_error() {
        assert!(tokenize("if x:\n    y = 1\n  z = 2\n").is_err());
    }

    #[test]
    fn test_string_keeps_raw_lexeme() {
        let toks = tokenize("s = f'hi {x}'\n").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert_eq!(toks[2].text, "f'hi {x}'");
    }

    #[test]
    fn test_triple_quoted_string() {
        let toks = tokenize("s = \"\"\"line1\nline2\"\"\"\n").unwrap();
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert!(toks[2].text.contains("line1\nline2"));
        // The embedded newline must not terminate the logical line.
        let newlines = toks.iter().filter(|t| t.kind == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        assert!(tokenize("s = 'abc\n").is_err());
        assert!(tokenize("s = \"\"\"abc\n").is_err());
    }

    #[test]
    fn test_numeric_literals() {
        let toks = tokenize("a = 1_000 0x1F 0o17 0b101 1.5e-3 2j\n").unwrap();
        let numbers: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Number)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(numbers, vec!["1_000", "0x1F", "0o17", "0b101", "1.5e-3", "2j"]);
    }

    #[test]
    fn test_invalid_numeric_literal() {
        assert!(tokenize("x = 0x\n").is_err());
        assert!(tokenize("x = 1__0\n").is_err());
    }

    #[test]
    fn test_keywords_and_literals() {
        let toks = tokenize("if True and None or x\n").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[1].kind, TokenKind::Bool);
        assert_eq!(toks[2].kind, TokenKind::Keyword);
        assert_eq!(toks[3].kind, TokenKind::NoneLit);
        assert_eq!(toks[4].kind, TokenKind::Keyword);
        assert_eq!(toks[5].kind, TokenKind::Ident);
    }

    #[test]
    fn test_operators() {
        let toks = tokenize("a **= b // c != d\n").unwrap();
        let ops: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Op)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec!["**=", "//", "!="]);
    }

    #[test]
    fn test_semicolons_split_statements() {
        let toks = kinds("a = 1; b = 2\n");
        assert!(toks.contains(&TokenKind::Semicolon));
    }

    #[test]
    fn test_comment_only_lines_ignored() {
        let toks = kinds("x = 1\n# comment\n\ny = 2\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 2);
        assert!(!toks.contains(&TokenKind::Indent));
    }

    #[test]
    fn test_line_and_column_are_one_based() {
        let toks = tokenize("x = 1\ny = 2\n").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        let y = toks.iter().find(|t| t.text == "y").unwrap();
        assert_eq!((y.line, y.column), (2, 1));
    }
}

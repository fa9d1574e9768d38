//! String-literal cooking, f-string templates, and `format` semantics.
//!
//! F-string lexemes are split into a template: literal runs plus
//! `(expression source, conversion, format spec)` fields. The split is cached
//! in a bounded LRU keyed by the raw lexeme, so repeated literals (common in
//! generated or long-running programs) parse once. The parser turns each
//! field's source into an expression AST; the runtime half of this module
//! implements `format(value, spec)` for f-strings and `str.format`.

use indexmap::IndexMap;
use std::rc::Rc;

use crate::{
    args::CallArgs,
    exception::{ExcType, RunError, RunResult},
    value::{Value, float_repr},
};

/// One piece of a split f-string template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Field {
        /// Raw expression source between the braces.
        expr: String,
        /// `!r` / `!s` conversion.
        conversion: Option<char>,
        /// Format spec after `:`.
        spec: Option<String>,
    },
}

/// Bounded LRU cache of template splits, keyed by raw lexeme.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: IndexMap<String, Rc<Vec<TemplatePart>>>,
}

/// Cache capacity; evicting beyond this bounds memory for long inputs.
const TEMPLATE_CACHE_CAP: usize = 64;

impl TemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached split for `lexeme`, parsing `content` on a miss.
    pub fn get_or_parse(&mut self, lexeme: &str, content: &str) -> RunResult<Rc<Vec<TemplatePart>>> {
        if let Some(parts) = self.entries.shift_remove(lexeme) {
            // Re-insert at the back: most recently used.
            self.entries.insert(lexeme.to_owned(), parts.clone());
            return Ok(parts);
        }
        let parts = Rc::new(split_template(content)?);
        if self.entries.len() >= TEMPLATE_CACHE_CAP {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(lexeme.to_owned(), parts.clone());
        Ok(parts)
    }
}

/// A cooked string literal: either plain text or an f-string template.
#[derive(Debug)]
pub enum CookedLiteral {
    Str(String),
    FString(Rc<Vec<TemplatePart>>),
}

/// Cooks a raw string lexeme (prefix and quotes included) from the lexer.
pub fn cook_literal(lexeme: &str, cache: &mut TemplateCache) -> RunResult<CookedLiteral> {
    let (body, is_f, is_raw) = strip_prefix_and_quotes(lexeme)?;
    let content = if is_raw { body.to_owned() } else { cook_escapes(body) };
    if is_f {
        Ok(CookedLiteral::FString(cache.get_or_parse(lexeme, &content)?))
    } else {
        Ok(CookedLiteral::Str(content))
    }
}

/// Splits off `f`/`r` prefixes and the surrounding quotes.
fn strip_prefix_and_quotes(lexeme: &str) -> RunResult<(&str, bool, bool)> {
    let mut is_f = false;
    let mut is_raw = false;
    let mut rest = lexeme;
    while let Some(c) = rest.chars().next() {
        match c {
            'f' | 'F' => {
                is_f = true;
                rest = &rest[1..];
            }
            'r' | 'R' => {
                is_raw = true;
                rest = &rest[1..];
            }
            _ => break,
        }
    }
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if rest.starts_with(quote) && rest.ends_with(quote) && rest.len() >= 2 * quote.len() {
            return Ok((&rest[quote.len()..rest.len() - quote.len()], is_f, is_raw));
        }
    }
    Err(RunError::syntax(ExcType::SyntaxError, "malformed string literal"))
}

/// Processes the escape sequences `\n \t \r \" \' \\ \0`.
fn cook_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {} // escaped newline disappears
            Some(other) => {
                // Unknown escapes pass through verbatim, like CPython.
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Splits f-string content into literal and `{...}` field parts.
pub fn split_template(content: &str) -> RunResult<Vec<TemplatePart>> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(RunError::syntax(
                    ExcType::SyntaxError,
                    "f-string: single '}' is not allowed",
                ));
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(parse_field(&mut chars)?);
            }
            other => literal.push(other),
        }
    }
    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
}

/// Parses one `{expr[!conv][:spec]}` field after the opening brace.
fn parse_field(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> RunResult<TemplatePart> {
    let mut expr = String::new();
    let mut conversion = None;
    let mut spec = None;
    let mut depth = 0u32;
    loop {
        let Some(c) = chars.next() else {
            return Err(RunError::syntax(ExcType::SyntaxError, "f-string: expecting '}'"));
        };
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                expr.push(c);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                expr.push(c);
            }
            '}' if depth == 0 => break,
            '}' => {
                depth -= 1;
                expr.push(c);
            }
            '!' if depth == 0 && matches!(chars.peek(), Some('r' | 's')) => {
                let conv = chars.next().unwrap_or('s');
                match chars.peek() {
                    Some('}' | ':') => conversion = Some(conv),
                    _ => {
                        // Not a conversion after all (e.g. `!=` comparison).
                        expr.push('!');
                        expr.push(conv);
                    }
                }
            }
            ':' if depth == 0 => {
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => s.push(c),
                        None => {
                            return Err(RunError::syntax(ExcType::SyntaxError, "f-string: expecting '}'"));
                        }
                    }
                }
                spec = Some(s);
                break;
            }
            other => expr.push(other),
        }
    }
    if expr.trim().is_empty() {
        return Err(RunError::syntax(
            ExcType::SyntaxError,
            "f-string: empty expression not allowed",
        ));
    }
    Ok(TemplatePart::Field { expr, conversion, spec })
}

/// Applies a `!r`/`!s` conversion, then the format spec.
pub fn convert_and_format(value: &Value, conversion: Option<char>, spec: &str) -> RunResult<String> {
    let converted;
    let value = match conversion {
        Some('r') => {
            converted = Value::str(value.py_repr());
            &converted
        }
        Some('s') => {
            converted = Value::str(value.py_str());
            &converted
        }
        _ => value,
    };
    format_value(value, spec)
}

/// `format(value, spec)` for the subset `[[fill]align][width][.prec][type]`.
pub fn format_value(value: &Value, spec: &str) -> RunResult<String> {
    if spec.is_empty() {
        return Ok(value.py_str());
    }
    let parsed = FormatSpec::parse(spec)?;
    let text = parsed.render(value)?;
    Ok(parsed.pad(&text, value))
}

#[derive(Debug, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    width: Option<usize>,
    precision: Option<usize>,
    kind: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> RunResult<Self> {
        let mut out = Self::default();
        let chars: Vec<char> = spec.chars().collect();
        let mut i = 0;
        // fill+align: a two-char prefix whose second char is an align mark.
        if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
            out.fill = Some(chars[0]);
            out.align = Some(chars[1]);
            i = 2;
        } else if chars.first().is_some_and(|c| matches!(c, '<' | '>' | '^')) {
            out.align = Some(chars[0]);
            i = 1;
        }
        let mut width = String::new();
        while i < chars.len() && chars[i].is_ascii_digit() {
            width.push(chars[i]);
            i += 1;
        }
        if !width.is_empty() {
            // A leading zero means zero-padding for numbers.
            if width.starts_with('0') && out.fill.is_none() {
                out.fill = Some('0');
                out.align.get_or_insert('>');
            }
            out.width = width.parse().ok();
        }
        if i < chars.len() && chars[i] == '.' {
            i += 1;
            let mut precision = String::new();
            while i < chars.len() && chars[i].is_ascii_digit() {
                precision.push(chars[i]);
                i += 1;
            }
            out.precision = precision.parse().ok();
            if out.precision.is_none() {
                return Err(ExcType::value_error("Format specifier missing precision"));
            }
        }
        if i < chars.len() {
            let kind = chars[i];
            i += 1;
            if i != chars.len() || !matches!(kind, 'd' | 'f' | 's' | 'e') {
                return Err(ExcType::value_error(format!("Invalid format specifier '{spec}'")));
            }
            out.kind = Some(kind);
        }
        Ok(out)
    }

    fn render(&self, value: &Value) -> RunResult<String> {
        match self.kind {
            Some('d') => match value {
                Value::Bool(b) => Ok(i64::from(*b).to_string()),
                Value::Int(i) => Ok(i.to_string()),
                Value::BigInt(b) => Ok(b.to_string()),
                other => Err(ExcType::value_error(format!(
                    "Unknown format code 'd' for object of type '{}'",
                    other.type_name()
                ))),
            },
            Some('f') => {
                let f = number_as_f64(value, 'f')?;
                Ok(format!("{:.*}", self.precision.unwrap_or(6), f))
            }
            Some('e') => {
                let f = number_as_f64(value, 'e')?;
                Ok(python_scientific(f, self.precision.unwrap_or(6)))
            }
            Some('s') | None => {
                let mut text = value.py_str();
                // Precision truncates strings.
                if let Some(p) = self.precision
                    && !matches!(value, Value::Float(_) | Value::Int(_) | Value::BigInt(_))
                {
                    text = text.chars().take(p).collect();
                } else if let Some(p) = self.precision
                    && matches!(value, Value::Float(_))
                {
                    if let Value::Float(f) = value {
                        text = format!("{:.*}", p, *f);
                    }
                } else if self.kind.is_none()
                    && self.precision.is_some()
                    && matches!(value, Value::Int(_) | Value::BigInt(_))
                {
                    return Err(ExcType::value_error("Precision not allowed in integer format specifier"));
                }
                Ok(text)
            }
            _ => Ok(value.py_str()),
        }
    }

    fn pad(&self, text: &str, value: &Value) -> String {
        let Some(width) = self.width else {
            return text.to_owned();
        };
        let len = text.chars().count();
        if len >= width {
            return text.to_owned();
        }
        let fill = self.fill.unwrap_or(' ');
        let is_numeric = matches!(value, Value::Int(_) | Value::BigInt(_) | Value::Float(_) | Value::Bool(_));
        let align = self.align.unwrap_or(if is_numeric { '>' } else { '<' });
        let pad = width - len;
        match align {
            '>' => {
                // Zero fill goes between the sign and the digits.
                if fill == '0'
                    && is_numeric
                    && let Some(rest) = text.strip_prefix('-')
                {
                    return format!("-{}{rest}", "0".repeat(pad));
                }
                format!("{}{text}", fill.to_string().repeat(pad))
            }
            '^' => {
                let left = pad / 2;
                let right = pad - left;
                format!(
                    "{}{text}{}",
                    fill.to_string().repeat(left),
                    fill.to_string().repeat(right)
                )
            }
            _ => format!("{text}{}", fill.to_string().repeat(pad)),
        }
    }
}

fn number_as_f64(value: &Value, code: char) -> RunResult<f64> {
    use num_traits::ToPrimitive;
    match value {
        Value::Bool(b) => Ok(f64::from(i8::from(*b))),
        Value::Int(i) => Ok(*i as f64),
        Value::BigInt(b) => Ok(b.to_f64().unwrap_or(f64::INFINITY)),
        Value::Float(f) => Ok(*f),
        other => Err(ExcType::value_error(format!(
            "Unknown format code '{code}' for object of type '{}'",
            other.type_name()
        ))),
    }
}

/// Formats in Python's `e` style: signed exponent, at least two digits.
fn python_scientific(f: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, f);
    match raw.find('e') {
        Some(pos) => {
            let (mantissa, exp) = raw.split_at(pos);
            let exp: i32 = exp[1..].parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
        }
        None => raw,
    }
}

/// `str.format` with positional `{}`/`{0}` and keyword `{name}` fields.
pub fn str_format(template: &str, args: &CallArgs) -> RunResult<Value> {
    let parts = split_template(template)?;
    let mut auto_index = 0usize;
    let mut out = String::new();
    for part in parts {
        match part {
            TemplatePart::Literal(text) => out.push_str(&text),
            TemplatePart::Field { expr, conversion, spec } => {
                let name = expr.trim();
                let value = if name.is_empty() {
                    let v = args.positional.get(auto_index).ok_or_else(|| {
                        RunError::new(
                            ExcType::IndexError,
                            "Replacement index out of range for positional args tuple",
                        )
                    })?;
                    auto_index += 1;
                    v
                } else if let Ok(index) = name.parse::<usize>() {
                    args.positional.get(index).ok_or_else(|| {
                        RunError::new(
                            ExcType::IndexError,
                            "Replacement index out of range for positional args tuple",
                        )
                    })?
                } else {
                    args.kwargs
                        .iter()
                        .find(|(k, _)| k.as_ref() == name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| RunError::new(ExcType::KeyError, format!("'{name}'")))?
                };
                out.push_str(&convert_and_format(value, conversion, spec.as_deref().unwrap_or(""))?);
            }
        }
    }
    Ok(Value::str(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cook_plain_string() {
        let mut cache = TemplateCache::new();
        match cook_literal("'a\\nb'", &mut cache).unwrap() {
            CookedLiteral::Str(s) => assert_eq!(s, "a\nb"),
            CookedLiteral::FString(_) => panic!("not an f-string"),
        }
    }

    #[test]
    fn test_raw_string_keeps_backslashes() {
        let mut cache = TemplateCache::new();
        match cook_literal("r'a\\nb'", &mut cache).unwrap() {
            CookedLiteral::Str(s) => assert_eq!(s, "a\\nb"),
            CookedLiteral::FString(_) => panic!("not an f-string"),
        }
    }

    #[test]
    fn test_fstring_split() {
        let parts = split_template("x={x!r:>5} and {{literal}}").unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], TemplatePart::Literal("x=".to_owned()));
        assert_eq!(
            parts[1],
            TemplatePart::Field {
                expr: "x".to_owned(),
                conversion: Some('r'),
                spec: Some(">5".to_owned()),
            }
        );
        assert_eq!(parts[2], TemplatePart::Literal(" and {literal}".to_owned()));
    }

    #[test]
    fn test_fstring_nested_brackets() {
        let parts = split_template("{d['k']}").unwrap();
        assert_eq!(
            parts[0],
            TemplatePart::Field {
                expr: "d['k']".to_owned(),
                conversion: None,
                spec: None,
            }
        );
    }

    #[test]
    fn test_template_cache_bounded() {
        let mut cache = TemplateCache::new();
        for i in 0..(TEMPLATE_CACHE_CAP + 10) {
            let lexeme = format!("f'{{x{i}}}'");
            cache.get_or_parse(&lexeme, &format!("{{x{i}}}")).unwrap();
        }
        assert!(cache.entries.len() <= TEMPLATE_CACHE_CAP);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&Value::Int(42), "5").unwrap(), "   42");
        assert_eq!(format_value(&Value::Int(42), "<5").unwrap(), "42   ");
        assert_eq!(format_value(&Value::Int(42), "05d").unwrap(), "00042");
        assert_eq!(format_value(&Value::Float(1.5), ".2f").unwrap(), "1.50");
        assert_eq!(format_value(&Value::str("ab"), "^6").unwrap(), "  ab  ");
        assert_eq!(format_value(&Value::Float(12345.678), ".2e").unwrap(), "1.23e+04");
        assert_eq!(format_value(&Value::str("hi"), "").unwrap(), "hi");
    }

    #[test]
    fn test_str_format() {
        let args = CallArgs {
            positional: [Value::Int(1), Value::str("b")].into_iter().collect(),
            kwargs: [(Rc::from("name"), Value::str("n"))].into_iter().collect(),
        };
        let out = str_format("{} {1} {0} {name}", &args).unwrap();
        assert_eq!(out.py_str(), "1 b 1 n");
        assert!(str_format("{2}", &args).is_err());
        assert!(str_format("{missing}", &args).is_err());
    }
}

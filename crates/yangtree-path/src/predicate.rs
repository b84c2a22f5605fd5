//! Predicate classification.
//!
//! A predicate is either a plain `name=value` equality (usable for a direct
//! key lookup), a positional selector, or a general expression.

use crate::expr::Expr;
use crate::parser::ParseError;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `name=value` or `.=value`, value unescaped and unquoted.
    KeyValue { name: String, value: String },
    /// `[N]`, 1-based.
    Position(usize),
    /// `[last()]`
    Last,
    Expr(Expr),
}

fn key_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*(\.|[A-Za-z_][A-Za-z0-9_.:-]*)\s*=\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)"|((?:\\.|[^\s'"=<>!()\[\]\\])*))\s*$"#,
        )
        .expect("key-value pattern is valid")
    })
}

/// Classify one raw predicate string (without its outer brackets).
pub fn classify_predicate(raw: &str) -> Result<Predicate, ParseError> {
    let trimmed = raw.trim();

    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return match trimmed.parse::<usize>() {
            Ok(n) if n > 0 => Ok(Predicate::Position(n)),
            _ => Err(ParseError::InvalidPosition(trimmed.to_string())),
        };
    }

    if trimmed == "last()" {
        return Ok(Predicate::Last);
    }

    if let Some(caps) = key_value_regex().captures(trimmed) {
        let name = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| unescape(m.as_str()))
            .unwrap_or_default();
        return Ok(Predicate::KeyValue { name, value });
    }

    Ok(Predicate::Expr(Expr::parse(trimmed)?))
}

/// Remove backslash escapes (`\[`, `\]`, `\'`, ...).
pub fn unescape(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escape brackets so a value can be embedded in a predicate.
pub fn escape(value: &str) -> String {
    if !value.contains(|c: char| matches!(c, '[' | ']' | '\\')) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(name: &str, value: &str) -> Predicate {
        Predicate::KeyValue {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_key_value_forms() {
        assert_eq!(classify_predicate("id=5").unwrap(), kv("id", "5"));
        assert_eq!(classify_predicate(" name = 'a b' ").unwrap(), kv("name", "a b"));
        assert_eq!(classify_predicate(".=\"x\"").unwrap(), kv(".", "x"));
        assert_eq!(classify_predicate("if:name=eth0/1").unwrap(), kv("if:name", "eth0/1"));
        assert_eq!(classify_predicate(r"n=a\]b").unwrap(), kv("n", "a]b"));
        assert_eq!(classify_predicate("id=*").unwrap(), kv("id", "*"));
    }

    #[test]
    fn test_positional() {
        assert_eq!(classify_predicate("3").unwrap(), Predicate::Position(3));
        assert_eq!(classify_predicate("last()").unwrap(), Predicate::Last);
        assert!(classify_predicate("0").is_err());
    }

    #[test]
    fn test_expressions() {
        assert!(matches!(classify_predicate("id>5").unwrap(), Predicate::Expr(_)));
        assert!(matches!(classify_predicate("a=1 and b=2").unwrap(), Predicate::Expr(_)));
        assert!(matches!(classify_predicate("a!=1").unwrap(), Predicate::Expr(_)));
        assert!(matches!(
            classify_predicate("position()=2").unwrap(),
            Predicate::Expr(_)
        ));
    }
}

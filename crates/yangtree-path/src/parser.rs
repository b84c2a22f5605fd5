//! Location-path parser.

use crate::types::{PathStep, StepKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("path must not start with '{0}'")]
    LeadingBracket(char),
    #[error("unbalanced brackets at offset {0}")]
    UnbalancedBracket(usize),
    #[error("predicate without a step name at offset {0}")]
    EmptyStep(usize),
    #[error("invalid position predicate: {0}")]
    InvalidPosition(String),
    #[error("unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("invalid number")]
    InvalidNumber,
    #[error("unclosed string")]
    UnclosedString,
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

/// Location-path parser.
///
/// Grammar: `path = step ("/" step)*`. A leading `/` selects from the tree
/// root, a leading or embedded `//` selects self and all descendants. Step
/// names end at `/`, `[` or `=`; bracketed predicates are kept as raw strings
/// and a trailing `=value` ends parsing.
pub struct PathParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> PathParser<'a> {
    /// Parse a location path into its steps.
    pub fn parse(input: &'a str) -> Result<Vec<PathStep>, ParseError> {
        let mut parser = Self { input, pos: 0 };
        parser.parse_steps()
    }

    fn parse_steps(&mut self) -> Result<Vec<PathStep>, ParseError> {
        let mut steps = Vec::new();

        if let Some(c @ ('[' | ']')) = self.peek() {
            return Err(ParseError::LeadingBracket(c));
        }

        if self.peek_str("//") {
            self.advance_by(2);
            steps.push(PathStep::new("...", StepKind::AllDescendants));
        } else if self.peek() == Some('/') {
            self.advance();
            steps.push(PathStep::new("/", StepKind::FromRoot));
        }

        while !self.is_at_end() {
            let start = self.pos;
            let name = self.parse_name()?;

            let mut predicates = Vec::new();
            while self.peek() == Some('[') {
                predicates.push(self.parse_predicate()?);
            }
            if name.is_empty() && !predicates.is_empty() {
                return Err(ParseError::EmptyStep(start));
            }

            let mut value = None;
            if self.peek() == Some('=') {
                self.advance();
                value = Some(self.input[self.pos..].to_string());
                self.pos = self.input.len();
            }

            if !name.is_empty() || value.is_some() {
                let name = if name.is_empty() { ".".to_string() } else { name };
                let kind = StepKind::from_name(&name);
                steps.push(PathStep {
                    name,
                    kind,
                    predicates,
                    value,
                });
            }

            if self.peek() == Some('/') {
                self.advance();
                if self.peek() == Some('/') {
                    self.advance();
                    steps.push(PathStep::new("...", StepKind::AllDescendants));
                }
            }
            // Anything else after the predicates starts a new step.
        }

        Ok(steps)
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            match c {
                '/' | '[' | '=' => break,
                ']' => return Err(ParseError::UnbalancedBracket(self.pos)),
                _ => self.advance(),
            }
        }
        Ok(self.input[start..self.pos].to_string())
    }

    /// Capture one bracketed predicate. Nested brackets are tracked with a
    /// depth counter; `\[`, `\]` and quoted strings do not count.
    fn parse_predicate(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        self.advance();
        let start = self.pos;
        let mut depth = 0usize;

        loop {
            match self.peek() {
                None => return Err(ParseError::UnbalancedBracket(open)),
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(quote @ ('\'' | '"')) => {
                    self.advance();
                    while let Some(c) = self.peek() {
                        self.advance();
                        if c == quote {
                            break;
                        }
                    }
                }
                Some('[') => {
                    depth += 1;
                    self.advance();
                }
                Some(']') => {
                    if depth == 0 {
                        let content = self.input[start..self.pos].to_string();
                        self.advance();
                        return Ok(content);
                    }
                    depth -= 1;
                    self.advance();
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Parse a location path into its steps.
pub fn parse_path(input: &str) -> Result<Vec<PathStep>, ParseError> {
    PathParser::parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_steps() {
        let steps = parse_path("a/b/c").unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.kind == StepKind::Child));
        assert_eq!(steps[2].name, "c");
    }

    #[test]
    fn test_leading_slashes() {
        let steps = parse_path("/a").unwrap();
        assert_eq!(steps[0].kind, StepKind::FromRoot);
        assert_eq!(steps[1].name, "a");

        let steps = parse_path("//a").unwrap();
        assert_eq!(steps[0].kind, StepKind::AllDescendants);
        assert_eq!(steps[1].name, "a");
    }

    #[test]
    fn test_nested_predicate() {
        let steps = parse_path("a[b[c=1]]/d").unwrap();
        assert_eq!(steps[0].predicates, vec!["b[c=1]".to_string()]);
        assert_eq!(steps[1].name, "d");
    }

    #[test]
    fn test_escaped_bracket_in_predicate() {
        let steps = parse_path(r"a[name=x\]y]").unwrap();
        assert_eq!(steps[0].predicates, vec![r"name=x\]y".to_string()]);
    }

    #[test]
    fn test_unbalanced() {
        assert!(matches!(parse_path("a[b=1"), Err(ParseError::UnbalancedBracket(1))));
        assert!(matches!(parse_path("a]"), Err(ParseError::UnbalancedBracket(1))));
        assert!(matches!(parse_path("[a]"), Err(ParseError::LeadingBracket('['))));
    }
}

//! Predicate expression tokenizer.

use crate::parser::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Literal(String),
    /// Relative location path or bare name: `name`, `../a/b`, `.`
    Path(String),
    /// Function name followed by `(`.
    Function(String),
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Multiply,
    And,
    Or,
    Div,
    Mod,
}

impl Token {
    /// Whether the token ends an operand, so that a following `*` or name is
    /// read as an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::Number(_) | Token::Literal(_) | Token::Path(_) | Token::RParen
        )
    }
}

/// Split a predicate expression into a flat token list.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let operator_position = tokens.last().map(Token::ends_operand).unwrap_or(false);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar('!'));
                }
            }
            '<' | '>' => {
                let eq = chars.get(i + 1) == Some(&'=');
                tokens.push(match (c, eq) {
                    ('<', true) => Token::Le,
                    ('<', false) => Token::Lt,
                    (_, true) => Token::Ge,
                    _ => Token::Gt,
                });
                i += if eq { 2 } else { 1 };
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' if operator_position => {
                tokens.push(Token::Multiply);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(ParseError::UnclosedString);
                }
                tokens.push(Token::Literal(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| ParseError::InvalidNumber)?;
                tokens.push(Token::Number(n));
            }
            c if is_path_start(c) => {
                let (text, next) = read_path(&chars, i)?;
                i = next;
                if operator_position {
                    let op = match text.as_str() {
                        "and" => Token::And,
                        "or" => Token::Or,
                        "div" => Token::Div,
                        "mod" => Token::Mod,
                        _ => return Err(ParseError::UnexpectedToken(text)),
                    };
                    tokens.push(op);
                    continue;
                }
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if chars.get(j) == Some(&'(') && is_function_name(&text) {
                    tokens.push(Token::Function(text));
                    i = j + 1;
                    tokens.push(Token::LParen);
                } else {
                    tokens.push(Token::Path(text));
                }
            }
            other => return Err(ParseError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn is_path_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '.' || c == '/' || c == '*'
}

fn is_function_name(text: &str) -> bool {
    !text.is_empty()
        && !text.contains('/')
        && !text.starts_with('.')
        && text.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

/// Read a location path starting at `start`. Bracketed predicates inside the
/// path are taken verbatim.
fn read_path(chars: &[char], start: usize) -> Result<(String, usize), ParseError> {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        let after_slash = i == start || chars[i - 1] == '/';
        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/') {
            i += 1;
        } else if c == '*' && after_slash {
            i += 1;
        } else if c == '[' {
            let mut depth = 0usize;
            while i < chars.len() {
                match chars[i] {
                    '[' => depth += 1,
                    ']' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            if i >= chars.len() {
                return Err(ParseError::UnbalancedBracket(start));
            }
            i += 1;
        } else {
            break;
        }
    }
    Ok((chars[start..i].iter().collect(), i))
}

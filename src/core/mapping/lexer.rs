// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer for mapping programs.
//!
//! Newlines and `;` separate statements, but only outside brackets, so object
//! and array literals may span several lines.

use crate::core::error::CompileError;

/// Token categories recognized by the mapping lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Identifier,
    String,
    Number,
    Dot,
    Comma,
    Colon,
    Equals,
    Minus,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    /// Statement separator (newline or `;` at nesting depth zero)
    Separator,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Identifier name, decoded string contents or number text
    pub value: String,
    /// Byte offset in the source
    pub position: usize,
}

impl Token {
    fn new(token_type: TokenType, value: impl Into<String>, position: usize) -> Self {
        Self {
            token_type,
            value: value.into(),
            position,
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    let mut depth: usize = 0;

    while let Some(&(position, ch)) = chars.peek() {
        let single = match ch {
            ' ' | '\t' | '\r' => {
                chars.next();
                continue;
            }
            '\n' | ';' => {
                chars.next();
                if depth == 0 {
                    tokens.push(Token::new(TokenType::Separator, ch.to_string(), position));
                }
                continue;
            }
            '#' => {
                while let Some(&(_, c)) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            }
            '.' => Some(TokenType::Dot),
            ',' => Some(TokenType::Comma),
            ':' => Some(TokenType::Colon),
            '=' => Some(TokenType::Equals),
            '-' => Some(TokenType::Minus),
            '(' => Some(TokenType::LeftParen),
            ')' => Some(TokenType::RightParen),
            '{' => Some(TokenType::LeftBrace),
            '}' => Some(TokenType::RightBrace),
            '[' => Some(TokenType::LeftBracket),
            ']' => Some(TokenType::RightBracket),
            _ => None,
        };

        if let Some(token_type) = single {
            match token_type {
                TokenType::LeftParen | TokenType::LeftBrace | TokenType::LeftBracket => depth += 1,
                TokenType::RightParen | TokenType::RightBrace | TokenType::RightBracket => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        CompileError::new(format!("Unbalanced '{}'", ch), position)
                    })?;
                }
                _ => {}
            }
            tokens.push(Token::new(token_type, ch.to_string(), position));
            chars.next();
            continue;
        }

        if ch == '"' {
            chars.next();
            let value = read_string(&mut chars, position)?;
            tokens.push(Token::new(TokenType::String, value, position));
        } else if ch.is_ascii_digit() {
            let mut text = String::new();
            let mut seen_dot = false;
            let mut seen_exp = false;
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                } else if c == '.' && !seen_dot && !seen_exp {
                    // `this.items.0.name` uses dots as separators after an index
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    if !matches!(lookahead.peek(), Some((_, d)) if d.is_ascii_digit()) {
                        break;
                    }
                    seen_dot = true;
                    text.push(c);
                } else if (c == 'e' || c == 'E') && !seen_exp {
                    seen_exp = true;
                    text.push(c);
                    chars.next();
                    if let Some(&(_, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            text.push(sign);
                            chars.next();
                        }
                    }
                    continue;
                } else {
                    break;
                }
                chars.next();
            }
            if text.ends_with(&['e', 'E', '+', '-'][..]) {
                return Err(CompileError::new(
                    format!("Malformed number '{}'", text),
                    position,
                ));
            }
            tokens.push(Token::new(TokenType::Number, text, position));
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let mut ident = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    ident.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::new(TokenType::Identifier, ident, position));
        } else {
            return Err(CompileError::new(
                format!("Unexpected character '{}'", ch),
                position,
            ));
        }
    }

    if depth != 0 {
        return Err(CompileError::new("Unclosed bracket", source.len()));
    }

    tokens.push(Token::new(TokenType::Eof, "", source.len()));
    Ok(tokens)
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> Result<String, CompileError> {
    let mut value = String::new();
    while let Some((position, c)) = chars.next() {
        match c {
            '"' => return Ok(value),
            '\\' => {
                let (_, escaped) = chars
                    .next()
                    .ok_or_else(|| CompileError::new("Unterminated escape sequence", position))?;
                match escaped {
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    '/' => value.push('/'),
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{0008}'),
                    'f' => value.push('\u{000C}'),
                    'u' => {
                        let mut hex = String::with_capacity(4);
                        for _ in 0..4 {
                            let (_, h) = chars.next().ok_or_else(|| {
                                CompileError::new("Truncated unicode escape", position)
                            })?;
                            hex.push(h);
                        }
                        let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                            CompileError::new(format!("Invalid unicode escape '\\u{}'", hex), position)
                        })?;
                        let decoded = char::from_u32(code).ok_or_else(|| {
                            CompileError::new(format!("Invalid unicode escape '\\u{}'", hex), position)
                        })?;
                        value.push(decoded);
                    }
                    other => {
                        return Err(CompileError::new(
                            format!("Unknown escape sequence '\\{}'", other),
                            position,
                        ))
                    }
                }
            }
            other => value.push(other),
        }
    }
    Err(CompileError::new("Unterminated string literal", start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(source: &str) -> Vec<TokenType> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn test_assignment_tokens() {
        assert_eq!(
            types("root.a = this.foo"),
            vec![
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Equals,
                TokenType::Identifier,
                TokenType::Dot,
                TokenType::Identifier,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let tokens = types("root = {\n\"a\": 1,\n\"b\": [1,\n2]\n}\nroot.c = 3");
        let separators = tokens
            .iter()
            .filter(|t| **t == TokenType::Separator)
            .count();
        assert_eq!(separators, 1);
    }

    #[test]
    fn test_string_escapes_and_positions() {
        let tokens = tokenize(r#"root."$inc" = "a\"bA""#).unwrap();
        assert_eq!(tokens[2].token_type, TokenType::String);
        assert_eq!(tokens[2].value, "$inc");
        assert_eq!(tokens[2].position, 5);
        assert_eq!(tokens[4].value, "a\"bA");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("1 2.5 3e2 -4").unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2.5", "3e2", "-", "4", ""]);
    }

    #[test]
    fn test_index_segment_is_not_a_decimal() {
        let tokens = tokenize("this.items.0.name").unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["this", ".", "items", ".", "0", ".", "name", ""]);
    }

    #[test]
    fn test_comments_and_semicolons() {
        let tokens = types("root.a = 1 # trailing\n# full line\nroot.b = 2; root.c = 3");
        let separators = tokens
            .iter()
            .filter(|t| **t == TokenType::Separator)
            .count();
        assert_eq!(separators, 3);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("root = \"open").is_err());
        assert!(tokenize("root = {").is_err());
        assert!(tokenize("root = }").is_err());
        assert!(tokenize("root = 1e").is_err());
        let err = tokenize("root = @").unwrap_err();
        assert_eq!(err.position, 7);
    }
}

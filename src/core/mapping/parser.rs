// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recursive-descent parser producing the mapping AST.
//!
//! ```text
//! program    := statement (SEP statement)*
//! statement  := "root" ("." segment)* "=" expr
//! expr       := "this" ("." segment)* | literal | "-" NUMBER
//!             | IDENT "(" (expr ("," expr)*)? ")"
//!             | "{" (key ":" expr ("," key ":" expr)*)? "}"
//!             | "[" (expr ("," expr)*)? "]"
//! segment    := IDENT | STRING | NUMBER
//! key        := IDENT | STRING
//! ```

use super::lexer::{tokenize, Token, TokenType};
use crate::core::error::CompileError;
use serde_json::Value as JsonValue;

/// Built-in functions callable from expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `json()` or `json("a.b")`: the parsed payload, or a dotted path into it
    Json,
    /// `meta("key")`: a metadata value, `null` when absent
    Meta,
    /// `content()`: the raw payload as a string
    Content,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "json" => Some(Function::Json),
            "meta" => Some(Function::Meta),
            "content" => Some(Function::Content),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Json => "json",
            Function::Meta => "meta",
            Function::Content => "content",
        }
    }

    fn arity(&self) -> std::ops::RangeInclusive<usize> {
        match self {
            Function::Json => 0..=1,
            Function::Meta => 1..=1,
            Function::Content => 0..=0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(JsonValue),
    /// `this` followed by zero or more path segments
    This(Vec<String>),
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Call { function: Function, args: Vec<Expr> },
}

/// `root.<target> = <expr>`; an empty target assigns the whole output
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub target: Vec<String>,
    pub expr: Expr,
}

/// Parse a full mapping program into statements
pub fn parse_program(source: &str) -> Result<Vec<Statement>, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    let statements = parser.program()?;
    if statements.is_empty() {
        return Err(CompileError::new("Mapping contains no statements", 0));
    }
    Ok(statements)
}

/// Parse a single expression, as used inside interpolation segments
pub fn parse_expression(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(&tokens);
    parser.skip_separators();
    let expr = parser.expression()?;
    parser.skip_separators();
    parser.expect(TokenType::Eof)?;
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, current: 0 }
    }

    fn current_token(&self) -> &'a Token {
        // tokenize always terminates the stream with Eof
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.current_token();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current_token().token_type == token_type
    }

    fn expect(&mut self, expected: TokenType) -> Result<&'a Token, CompileError> {
        if self.check(expected) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}", expected)))
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let token = self.current_token();
        let found = match token.token_type {
            TokenType::Eof => "end of input".to_string(),
            TokenType::Separator => "end of statement".to_string(),
            _ => format!("'{}'", token.value),
        };
        CompileError::new(format!("{}, found {}", message.into(), found), token.position)
    }

    fn skip_separators(&mut self) {
        while self.check(TokenType::Separator) {
            self.advance();
        }
    }

    fn program(&mut self) -> Result<Vec<Statement>, CompileError> {
        let mut statements = Vec::new();
        self.skip_separators();
        while !self.check(TokenType::Eof) {
            statements.push(self.statement()?);
            if !self.check(TokenType::Eof) {
                self.expect(TokenType::Separator)?;
            }
            self.skip_separators();
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, CompileError> {
        let root = self.current_token();
        if root.token_type != TokenType::Identifier || root.value != "root" {
            return Err(self.error("Expected assignment target starting with 'root'"));
        }
        self.advance();
        let target = self.path_segments()?;
        self.expect(TokenType::Equals)?;
        let expr = self.expression()?;
        Ok(Statement { target, expr })
    }

    fn path_segments(&mut self) -> Result<Vec<String>, CompileError> {
        let mut segments = Vec::new();
        while self.check(TokenType::Dot) {
            self.advance();
            let token = self.current_token();
            match token.token_type {
                TokenType::Identifier | TokenType::String | TokenType::Number => {
                    segments.push(token.value.clone());
                    self.advance();
                }
                _ => return Err(self.error("Expected path segment after '.'")),
            }
        }
        Ok(segments)
    }

    fn expression(&mut self) -> Result<Expr, CompileError> {
        let token = self.current_token();
        match token.token_type {
            TokenType::String => {
                self.advance();
                Ok(Expr::Literal(JsonValue::String(token.value.clone())))
            }
            TokenType::Number => {
                self.advance();
                self.number(&token.value, token.position)
            }
            TokenType::Minus => {
                self.advance();
                let number = self.expect(TokenType::Number)?;
                self.number(&format!("-{}", number.value), token.position)
            }
            TokenType::LeftBrace => self.object(),
            TokenType::LeftBracket => self.array(),
            TokenType::Identifier => match token.value.as_str() {
                "this" => {
                    self.advance();
                    Ok(Expr::This(self.path_segments()?))
                }
                "true" => {
                    self.advance();
                    Ok(Expr::Literal(JsonValue::Bool(true)))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Literal(JsonValue::Bool(false)))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Literal(JsonValue::Null))
                }
                name => {
                    let function = Function::lookup(name).ok_or_else(|| {
                        CompileError::new(format!("Unknown function '{}'", name), token.position)
                    })?;
                    self.advance();
                    self.call(function, token.position)
                }
            },
            _ => Err(self.error("Expected expression")),
        }
    }

    fn number(&self, text: &str, position: usize) -> Result<Expr, CompileError> {
        serde_json::from_str::<JsonValue>(text)
            .map(Expr::Literal)
            .map_err(|e| CompileError::new(format!("Invalid number '{}': {}", text, e), position))
    }

    fn call(&mut self, function: Function, position: usize) -> Result<Expr, CompileError> {
        self.expect(TokenType::LeftParen)?;
        let args = self.comma_separated(TokenType::RightParen, |p| p.expression())?;
        if !function.arity().contains(&args.len()) {
            return Err(CompileError::new(
                format!(
                    "Function '{}' expects {} argument(s), got {}",
                    function.name(),
                    describe_arity(function.arity()),
                    args.len()
                ),
                position,
            ));
        }
        Ok(Expr::Call { function, args })
    }

    fn object(&mut self) -> Result<Expr, CompileError> {
        self.expect(TokenType::LeftBrace)?;
        let fields = self.comma_separated(TokenType::RightBrace, |p| {
            let key = p.current_token();
            match key.token_type {
                TokenType::String | TokenType::Identifier => {
                    p.advance();
                }
                _ => return Err(p.error("Expected object key")),
            }
            p.expect(TokenType::Colon)?;
            Ok((key.value.clone(), p.expression()?))
        })?;
        Ok(Expr::Object(fields))
    }

    fn array(&mut self) -> Result<Expr, CompileError> {
        self.expect(TokenType::LeftBracket)?;
        let items = self.comma_separated(TokenType::RightBracket, |p| p.expression())?;
        Ok(Expr::Array(items))
    }

    /// Parse `item ("," item)* ","? close`, with the opening token already consumed
    fn comma_separated<T>(
        &mut self,
        close: TokenType,
        mut item: impl FnMut(&mut Self) -> Result<T, CompileError>,
    ) -> Result<Vec<T>, CompileError> {
        let mut items = Vec::new();
        while !self.check(close) {
            items.push(item(self)?);
            if self.check(TokenType::Comma) {
                self.advance();
            } else if !self.check(close) {
                return Err(self.error(format!("Expected ',' or {:?}", close)));
            }
        }
        self.advance();
        Ok(items)
    }
}

fn describe_arity(range: std::ops::RangeInclusive<usize>) -> String {
    if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("{} to {}", range.start(), range.end())
    }
}

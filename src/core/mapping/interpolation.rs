// SPDX-License-Identifier: MIT OR Apache-2.0

//! `${! expr }` string templates.

use super::eval::evaluate_expr;
use super::parser::{parse_expression, Expr};
use super::MessageContext;
use crate::core::error::{CompileError, MappingError};
use serde_json::Value as JsonValue;

const OPEN: &str = "${!";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Expr(Expr),
}

/// A string with embedded expressions, rendered per message.
///
/// String results are inserted verbatim; any other value is inserted as its
/// JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedString {
    source: String,
    segments: Vec<Segment>,
}

impl InterpolatedString {
    pub fn parse(template: &str) -> Result<Self, CompileError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            literal.push_str(&rest[..start]);
            let body_start = start + OPEN.len();
            let body_len = closing_brace(&rest[body_start..]).ok_or_else(|| {
                CompileError::new("Unterminated interpolation '${!'", offset + start)
            })?;
            let body = &rest[body_start..body_start + body_len];
            if body.trim().is_empty() {
                return Err(CompileError::new("Empty interpolation", offset + start));
            }
            let expr = parse_expression(body).map_err(|e| {
                CompileError::new(e.message, offset + body_start + e.position)
            })?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Expr(expr));

            let consumed = body_start + body_len + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// True when the template contains no expressions
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn render(&self, ctx: &MessageContext<'_>) -> Result<String, MappingError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expr(expr) => match evaluate_expr(expr, ctx)? {
                    JsonValue::String(s) => out.push_str(&s),
                    other => out.push_str(&other.to_string()),
                },
            }
        }
        Ok(out)
    }
}

/// Byte length up to the `}` closing an interpolation body, skipping braces
/// nested in object literals and inside string literals.
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

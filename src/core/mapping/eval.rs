// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation of compiled mapping programs against a message.

use super::parser::{parse_program, Expr, Function, Statement};
use super::{Mapping, MessageContext};
use crate::core::error::{CompileError, MappingError};
use serde_json::{Map, Value as JsonValue};

/// A compiled mapping program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    statements: Vec<Statement>,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let statements = parse_program(source)?;
        Ok(Self {
            source: source.to_string(),
            statements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

impl Mapping for Program {
    fn evaluate(&self, ctx: &MessageContext<'_>) -> Result<JsonValue, MappingError> {
        let mut output = JsonValue::Null;
        for statement in &self.statements {
            let value = evaluate_expr(&statement.expr, ctx)?;
            assign(&mut output, &statement.target, value);
        }
        Ok(output)
    }
}

/// Write `value` at `path` inside `target`, creating objects along the way.
///
/// Any non-object met on the path (including the root) is replaced by an
/// empty object first.
fn assign(target: &mut JsonValue, path: &[String], value: JsonValue) {
    if path.is_empty() {
        *target = value;
        return;
    }
    match target {
        JsonValue::Object(map) => assign_into(map, path, value),
        other => {
            let mut map = Map::new();
            assign_into(&mut map, path, value);
            *other = JsonValue::Object(map);
        }
    }
}

fn assign_into(map: &mut Map<String, JsonValue>, path: &[String], value: JsonValue) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = map.entry(head.clone()).or_insert(JsonValue::Null);
            assign(entry, rest, value);
        }
    }
}

pub(crate) fn evaluate_expr(
    expr: &Expr,
    ctx: &MessageContext<'_>,
) -> Result<JsonValue, MappingError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::This(path) => {
            let input = ctx.json()?;
            Ok(lookup(input, path.iter().map(String::as_str)))
        }
        Expr::Object(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (key, value) in fields {
                map.insert(key.clone(), evaluate_expr(value, ctx)?);
            }
            Ok(JsonValue::Object(map))
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate_expr(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate_expr(arg, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, &args, ctx)
        }
    }
}

fn call(
    function: Function,
    args: &[JsonValue],
    ctx: &MessageContext<'_>,
) -> Result<JsonValue, MappingError> {
    match function {
        Function::Json => {
            let input = ctx.json()?;
            match args.first() {
                None => Ok(input.clone()),
                Some(JsonValue::String(path)) if path.is_empty() => Ok(input.clone()),
                Some(JsonValue::String(path)) => Ok(lookup(input, path.split('.'))),
                Some(other) => Err(MappingError::function(
                    function.name(),
                    format!("expected a string path, got {}", other),
                )),
            }
        }
        Function::Meta => match args.first() {
            Some(JsonValue::String(key)) => Ok(ctx
                .meta(key)
                .map(|v| JsonValue::String(v.to_string()))
                .unwrap_or(JsonValue::Null)),
            other => Err(MappingError::function(
                function.name(),
                format!(
                    "expected a string key, got {}",
                    other.cloned().unwrap_or(JsonValue::Null)
                ),
            )),
        },
        Function::Content => Ok(JsonValue::String(ctx.content().into_owned())),
    }
}

/// Follow a path through objects and arrays; anything missing yields `null`
fn lookup<'s>(root: &JsonValue, path: impl IntoIterator<Item = &'s str>) -> JsonValue {
    let mut current = root;
    for segment in path {
        let next = match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return JsonValue::Null,
        }
    }
    current.clone()
}

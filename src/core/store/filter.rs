// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filter document evaluation for the in-memory store.
//!
//! Supported:
//! - implicit equality `{field: value}`; an array field matches when it equals
//!   the value or contains it
//! - dotted paths into embedded documents and array positions
//! - `$eq $ne $gt $gte $lt $lte $in $nin $exists` field operators
//! - top-level `$and $or $nor`
//!
//! Range operators only match values of the same type class, so
//! `{a: {$gt: 1}}` never matches a string. Unknown operators are rejected.

use super::sort::compare_bson;
use crate::core::error::{StoreError, StoreResult};
use bson::{Bson, Document};
use std::cmp::Ordering;

/// Resolve a dotted path through embedded documents and array positions
pub fn get_path<'d>(doc: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Whether `doc` satisfies every clause of `filter`
pub fn matches(doc: &Document, filter: &Document) -> StoreResult<bool> {
    for (key, condition) in filter {
        if !matches_clause(doc, key, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_clause(doc: &Document, key: &str, condition: &Bson) -> StoreResult<bool> {
    match key {
        "$and" => {
            for sub in sub_filters(key, condition)? {
                if !matches(doc, sub)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "$or" => {
            for sub in sub_filters(key, condition)? {
                if matches(doc, sub)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        "$nor" => {
            for sub in sub_filters(key, condition)? {
                if matches(doc, sub)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ if key.starts_with('$') => Err(StoreError::command_rejected(format!(
            "unknown top level operator: {}",
            key
        ))),
        _ => {
            let actual = get_path(doc, key);
            match condition {
                Bson::Document(ops) if is_operator_expression(ops)? => {
                    for (op, operand) in ops {
                        if !matches_operator(actual, op, operand)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                expected => Ok(equality_matches(actual, expected)),
            }
        }
    }
}

fn sub_filters<'f>(op: &str, condition: &'f Bson) -> StoreResult<Vec<&'f Document>> {
    let items = match condition {
        Bson::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(StoreError::command_rejected(format!(
                "{} must be a nonempty array",
                op
            )))
        }
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => Ok(sub),
            other => Err(StoreError::command_rejected(format!(
                "{} entries must be documents, got {}",
                op, other
            ))),
        })
        .collect()
}

/// `{$gt: 1, $lt: 5}` is an operator expression, `{a: 1}` is a literal.
/// Mixing the two is rejected.
fn is_operator_expression(doc: &Document) -> StoreResult<bool> {
    let operators = doc.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return Ok(false);
    }
    if operators != doc.len() {
        return Err(StoreError::command_rejected(
            "cannot mix operators and fields in a filter expression",
        ));
    }
    Ok(true)
}

fn matches_operator(actual: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
    let matched = match op {
        "$eq" => equality_matches(actual, operand),
        "$ne" => !equality_matches(actual, operand),
        "$gt" => range_matches(actual, operand, |o| o == Ordering::Greater),
        "$gte" => range_matches(actual, operand, |o| o != Ordering::Less),
        "$lt" => range_matches(actual, operand, |o| o == Ordering::Less),
        "$lte" => range_matches(actual, operand, |o| o != Ordering::Greater),
        "$in" => in_array(op, operand)?
            .iter()
            .any(|candidate| equality_matches(actual, candidate)),
        "$nin" => !in_array(op, operand)?
            .iter()
            .any(|candidate| equality_matches(actual, candidate)),
        "$exists" => actual.is_some() == truthy(operand),
        other => {
            return Err(StoreError::command_rejected(format!(
                "unknown operator: {}",
                other
            )))
        }
    };
    Ok(matched)
}

fn in_array<'o>(op: &str, operand: &'o Bson) -> StoreResult<&'o [Bson]> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(StoreError::command_rejected(format!("{} needs an array", op))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        _ => true,
    }
}

/// Equality with array-contains semantics; `null` also matches a missing field
pub fn equality_matches(actual: Option<&Bson>, expected: &Bson) -> bool {
    match actual {
        None => matches!(expected, Bson::Null),
        Some(Bson::Array(items)) if !matches!(expected, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(whole @ Bson::Array(items)) => {
            values_equal(whole, expected) || items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

fn range_matches(actual: Option<&Bson>, bound: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |value: &Bson| same_class(value, bound) && accept(compare_bson(value, bound));
    match actual {
        None => false,
        Some(Bson::Array(items)) if !matches!(bound, Bson::Array(_)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn same_class(a: &Bson, b: &Bson) -> bool {
    let numeric = |v: &Bson| matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_));
    (numeric(a) && numeric(b)) || std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Structural equality where numbers compare by value across widths
pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_), Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => {
            compare_bson(a, b) == Ordering::Equal
        }
        (Bson::Document(x), Bson::Document(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y.iter())
                    .all(|((ka, va), (kb, vb))| ka == kb && values_equal(va, vb))
        }
        (Bson::Array(x), Bson::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(va, vb)| values_equal(va, vb))
        }
        _ => a == b,
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Update-operator documents and replacements for the in-memory store.

use crate::core::error::{StoreError, StoreResult};
use bson::{Bson, Document};

const OPERATORS: &[&str] = &["$set", "$unset", "$inc", "$push", "$setOnInsert"];

/// Reject anything that is not a non-empty document of known update operators
pub fn validate_update(update: &Document) -> StoreResult<()> {
    if update.is_empty() {
        return Err(StoreError::command_rejected("update document must not be empty"));
    }
    for (op, fields) in update {
        if !op.starts_with('$') {
            return Err(StoreError::command_rejected(format!(
                "update document requires atomic operators, found field '{}'",
                op
            )));
        }
        if !OPERATORS.contains(&op.as_str()) {
            return Err(StoreError::command_rejected(format!(
                "unknown update operator: {}",
                op
            )));
        }
        if !matches!(fields, Bson::Document(_)) {
            return Err(StoreError::command_rejected(format!(
                "{} requires a document of fields, got {}",
                op, fields
            )));
        }
    }
    Ok(())
}

/// A replacement must be a plain document without operators
pub fn validate_replacement(replacement: &Document) -> StoreResult<()> {
    match replacement.keys().find(|k| k.starts_with('$')) {
        Some(key) => Err(StoreError::command_rejected(format!(
            "replacement document must not contain update operators, found '{}'",
            key
        ))),
        None => Ok(()),
    }
}

/// Apply a validated update to `doc`, returning whether anything changed.
///
/// `inserting` enables `$setOnInsert` and allows writes to `_id`.
pub fn apply_update(doc: &mut Document, update: &Document, inserting: bool) -> StoreResult<bool> {
    validate_update(update)?;
    let before = doc.clone();

    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            continue;
        };
        if op == "$setOnInsert" && !inserting {
            continue;
        }
        for (path, value) in fields {
            if !inserting && (path == "_id" || path.starts_with("_id.")) {
                return Err(StoreError::command_rejected(format!(
                    "performing an update on the path '{}' would modify the immutable field '_id'",
                    path
                )));
            }
            match op.as_str() {
                "$set" | "$setOnInsert" => set_path(doc, path, value.clone())?,
                "$unset" => {
                    remove_path(doc, path);
                }
                "$inc" => increment(doc, path, value)?,
                "$push" => push(doc, path, value)?,
                _ => {}
            }
        }
    }

    Ok(*doc != before)
}

/// Build the document a replacement produces for a stored document, keeping
/// the stored `_id` first
pub fn replace_keeping_id(existing: &Document, replacement: &Document) -> StoreResult<Document> {
    let mut next = Document::new();
    if let Some(id) = existing.get("_id") {
        if let Some(new_id) = replacement.get("_id") {
            if new_id != id {
                return Err(StoreError::command_rejected(
                    "the _id field cannot be changed by a replacement",
                ));
            }
        }
        next.insert("_id", id.clone());
    }
    for (key, value) in replacement {
        if key != "_id" {
            next.insert(key.clone(), value.clone());
        }
    }
    Ok(next)
}

/// Equality fields of a filter, used as the starting point of an upsert
pub fn seed_from_filter(filter: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;
    Ok(seed)
}

fn collect_equalities(filter: &Document, seed: &mut Document) -> StoreResult<()> {
    for (key, condition) in filter {
        if key == "$and" {
            if let Bson::Array(clauses) = condition {
                for clause in clauses {
                    if let Bson::Document(clause) = clause {
                        collect_equalities(clause, seed)?;
                    }
                }
            }
            continue;
        }
        if key.starts_with('$') {
            continue;
        }
        match condition {
            Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => {
                if let Some(value) = ops.get("$eq") {
                    set_path(seed, key, value.clone())?;
                }
            }
            value => set_path(seed, key, value.clone())?,
        }
    }
    Ok(())
}

/// Set a dotted path, creating embedded documents for missing parents
pub fn set_path(doc: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !doc.contains_key(head) {
                doc.insert(head, Document::new());
            }
            match doc.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                Some(other) => Err(StoreError::command_rejected(format!(
                    "cannot create field '{}' in element {{{}: {}}}",
                    rest, head, other
                ))),
                None => Err(StoreError::internal(format!("lost field '{}' while updating", head))),
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(child)) => remove_path(child, rest),
            _ => None,
        },
    }
}

fn get_path_mut<'d>(doc: &'d mut Document, path: &str) -> Option<&'d mut Bson> {
    match path.split_once('.') {
        None => doc.get_mut(path),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Bson::Document(child)) => get_path_mut(child, rest),
            _ => None,
        },
    }
}

fn increment(doc: &mut Document, path: &str, amount: &Bson) -> StoreResult<()> {
    if !matches!(amount, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
        return Err(StoreError::command_rejected(format!(
            "cannot increment with non-numeric argument: {{{}: {}}}",
            path, amount
        )));
    }
    let Some(current) = get_path_mut(doc, path) else {
        return set_path(doc, path, amount.clone());
    };
    let sum = match (&*current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        },
        (Bson::Int32(a), Bson::Int64(b)) => add_i64(i64::from(*a), *b)?,
        (Bson::Int64(a), Bson::Int32(b)) => add_i64(*a, i64::from(*b))?,
        (Bson::Int64(a), Bson::Int64(b)) => add_i64(*a, *b)?,
        (Bson::Double(a), b) => Bson::Double(a + as_f64(b)),
        (a @ (Bson::Int32(_) | Bson::Int64(_)), Bson::Double(b)) => Bson::Double(as_f64(a) + b),
        (other, _) => {
            return Err(StoreError::command_rejected(format!(
                "cannot apply $inc to a value of non-numeric type at '{}': {}",
                path, other
            )))
        }
    };
    *current = sum;
    Ok(())
}

fn add_i64(a: i64, b: i64) -> StoreResult<Bson> {
    a.checked_add(b)
        .map(Bson::Int64)
        .ok_or_else(|| StoreError::command_rejected("integer overflow in $inc"))
}

fn as_f64(value: &Bson) -> f64 {
    super::sort::as_f64(value).unwrap_or(0.0)
}

fn push(doc: &mut Document, path: &str, value: &Bson) -> StoreResult<()> {
    match get_path_mut(doc, path) {
        Some(Bson::Array(items)) => {
            items.push(value.clone());
            Ok(())
        }
        Some(other) => Err(StoreError::command_rejected(format!(
            "the field '{}' must be an array but is {}",
            path, other
        ))),
        None => set_path(doc, path, Bson::Array(vec![value.clone()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_set_and_unset() {
        let mut d = doc! {"_id": 1, "a": "x", "b": 1, "c": true};
        let changed = apply_update(&mut d, &doc! {"$set": {"a": "y", "meta.k": 1}, "$unset": {"c": ""}}, false).unwrap();
        assert!(changed);
        assert_eq!(d, doc! {"_id": 1, "a": "y", "b": 1, "meta": {"k": 1}});
    }

    #[test]
    fn test_unchanged_update_reports_no_modification() {
        let mut d = doc! {"a": 1};
        assert!(!apply_update(&mut d, &doc! {"$set": {"a": 1}}, false).unwrap());
    }

    #[test]
    fn test_inc() {
        let mut d = doc! {"n": 1, "big": i32::MAX, "f": 1.5};
        apply_update(&mut d, &doc! {"$inc": {"n": 2, "big": 1, "f": 1, "new": -1}}, false).unwrap();
        assert_eq!(d.get("n"), Some(&Bson::Int32(3)));
        assert_eq!(d.get("big"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
        assert_eq!(d.get("f"), Some(&Bson::Double(2.5)));
        assert_eq!(d.get("new"), Some(&Bson::Int32(-1)));

        let mut s = doc! {"s": "text"};
        assert!(apply_update(&mut s, &doc! {"$inc": {"s": 1}}, false).is_err());
        assert!(apply_update(&mut s, &doc! {"$inc": {"n": "1"}}, false).is_err());
    }

    #[test]
    fn test_push() {
        let mut d = doc! {"tags": ["a"], "s": 1};
        apply_update(&mut d, &doc! {"$push": {"tags": "b", "fresh": 1}}, false).unwrap();
        assert_eq!(d, doc! {"tags": ["a", "b"], "s": 1, "fresh": [1]});
        assert!(apply_update(&mut d, &doc! {"$push": {"s": 2}}, false).is_err());
    }

    #[test]
    fn test_set_on_insert_only_when_inserting() {
        let mut d = doc! {"a": 1};
        apply_update(&mut d, &doc! {"$setOnInsert": {"created": true}}, false).unwrap();
        assert!(!d.contains_key("created"));
        apply_update(&mut d, &doc! {"$setOnInsert": {"created": true}}, true).unwrap();
        assert_eq!(d.get("created"), Some(&Bson::Boolean(true)));
    }

    #[test]
    fn test_invalid_updates() {
        let mut d = doc! {"_id": 1, "a": 1};
        assert!(apply_update(&mut d, &doc! {}, false).is_err());
        assert!(apply_update(&mut d, &doc! {"a": 2}, false).is_err());
        assert!(apply_update(&mut d, &doc! {"$rename": {"a": "b"}}, false).is_err());
        assert!(apply_update(&mut d, &doc! {"$set": 1}, false).is_err());
        assert!(apply_update(&mut d, &doc! {"$set": {"_id": 2}}, false).is_err());
        assert!(apply_update(&mut d, &doc! {"$set": {"a.b": 2}}, false).is_err());
    }

    #[test]
    fn test_replacement() {
        assert!(validate_replacement(&doc! {"a": 1}).is_ok());
        assert!(validate_replacement(&doc! {"$set": {"a": 1}}).is_err());

        let existing = doc! {"_id": 7, "a": 1, "c": 3};
        let next = replace_keeping_id(&existing, &doc! {"a": 2, "b": 2}).unwrap();
        assert_eq!(next, doc! {"_id": 7, "a": 2, "b": 2});
        assert!(replace_keeping_id(&existing, &doc! {"_id": 8}).is_err());
        assert!(replace_keeping_id(&existing, &doc! {"_id": 7, "a": 0}).is_ok());
    }

    #[test]
    fn test_seed_from_filter() {
        let seed = seed_from_filter(&doc! {
            "a": "foo",
            "meta.k": 1,
            "n": {"$gt": 1},
            "e": {"$eq": 5},
            "$and": [{"x": true}],
            "$or": [{"y": 1}],
        })
        .unwrap();
        assert_eq!(seed, doc! {"a": "foo", "meta": {"k": 1}, "e": 5, "x": true});
    }
}

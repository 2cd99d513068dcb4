// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion from mapping output (JSON values) to BSON documents.
//!
//! Values are read as extended JSON: `{"$oid": "..."}` becomes an
//! `ObjectId`, `{"$numberLong": "7"}` an `Int64`, and so on. Plain integers
//! that fit in 32 bits become `Int32`, other integers `Int64`, and other
//! numbers `Double`. Object key order is preserved.

use bson::{Bson, Document};
use serde_json::Value as JsonValue;

/// Why a mapping result could not become a document
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The value converted fine but is not a document; carries the type name
    NotAnObject(&'static str),
    /// A `$`-tagged value did not follow the extended JSON format
    ExtendedJson(String),
}

/// Convert a JSON value into its BSON counterpart, reading extended JSON
pub fn json_to_bson(value: JsonValue) -> Result<Bson, ConversionError> {
    Bson::try_from(value).map_err(|e| ConversionError::ExtendedJson(e.to_string()))
}

/// Convert a JSON object into a BSON document.
///
/// A top-level extended JSON value such as `{"$oid": "..."}` is not a
/// document.
pub fn json_to_document(value: JsonValue) -> Result<Document, ConversionError> {
    if !value.is_object() {
        return Err(ConversionError::NotAnObject(json_type_name(&value)));
    }
    match json_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(ConversionError::NotAnObject(bson_type_name(&other))),
    }
}

/// Short name of a JSON value's type, for error messages
pub fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::ObjectId(_) => "objectId",
        Bson::DateTime(_) => "date",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => "number",
        Bson::Binary(_) => "binary",
        Bson::RegularExpression(_) => "regex",
        Bson::Timestamp(_) => "timestamp",
        _ => "extended JSON value",
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result documents to payload bytes, as canonical or relaxed extended JSON.

use crate::core::error::{ConfigurationError, ProcessError};
use bson::{Bson, Document};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarshalMode {
    /// Type-preserving: `{"$numberInt": "42"}`
    #[default]
    Canonical,
    /// Plain JSON numbers where they are representable
    Relaxed,
}

impl MarshalMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MarshalMode::Canonical => "canonical",
            MarshalMode::Relaxed => "relaxed",
        }
    }

    pub fn marshal(&self, document: Document) -> Result<Vec<u8>, ProcessError> {
        let value = match self {
            MarshalMode::Canonical => Bson::Document(document).into_canonical_extjson(),
            MarshalMode::Relaxed => Bson::Document(document).into_relaxed_extjson(),
        };
        serde_json::to_vec(&value).map_err(|e| ProcessError::Marshal(e.to_string()))
    }
}

impl fmt::Display for MarshalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarshalMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" => Ok(MarshalMode::Canonical),
            "relaxed" => Ok(MarshalMode::Relaxed),
            _ => Err(ConfigurationError::invalid_value(
                "json_marshal_mode",
                format!("'{}'. Valid values: 'canonical', 'relaxed'", s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;
    use serde_json::{json, Value as JsonValue};

    fn marshal(mode: MarshalMode, document: Document) -> JsonValue {
        serde_json::from_slice(&mode.marshal(document).unwrap()).unwrap()
    }

    #[test]
    fn test_canonical_numbers() {
        let out = marshal(
            MarshalMode::Canonical,
            doc! {"a": "foo", "b": 42, "big": 5_000_000_000i64, "f": 1.5},
        );
        assert_eq!(
            out,
            json!({
                "a": "foo",
                "b": {"$numberInt": "42"},
                "big": {"$numberLong": "5000000000"},
                "f": {"$numberDouble": "1.5"}
            })
        );
    }

    #[test]
    fn test_relaxed_numbers() {
        let out = marshal(
            MarshalMode::Relaxed,
            doc! {"a": "foo", "b": 42, "big": 5_000_000_000i64, "f": 1.5},
        );
        assert_eq!(out, json!({"a": "foo", "b": 42, "big": 5000000000i64, "f": 1.5}));
    }

    #[test]
    fn test_object_id_is_tagged_in_both_modes() {
        let id = ObjectId::new();
        for mode in [MarshalMode::Canonical, MarshalMode::Relaxed] {
            let out = marshal(mode, doc! {"_id": id});
            assert_eq!(out, json!({"_id": {"$oid": id.to_hex()}}));
        }
    }

    #[test]
    fn test_key_order_preserved() {
        let bytes = MarshalMode::Relaxed
            .marshal(doc! {"z": 1, "a": 2, "m": 3})
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"z":1,"a":2,"m":3}"#);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("relaxed".parse::<MarshalMode>().unwrap(), MarshalMode::Relaxed);
        assert_eq!("Canonical".parse::<MarshalMode>().unwrap(), MarshalMode::Canonical);
        assert!("loose".parse::<MarshalMode>().is_err());
        assert_eq!(MarshalMode::default(), MarshalMode::Canonical);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping language: compiles small assignment programs that turn a message
//! into a structured value, plus `${! expr }` interpolation templates.

pub mod eval;
pub mod interpolation;
pub mod lexer;
pub mod parser;

pub use eval::Program;
pub use interpolation::InterpolatedString;

use crate::core::error::MappingError;
use serde_json::Value as JsonValue;
use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;

/// Produces a structured value from one message.
///
/// [`Program`] is the built-in implementation; any other evaluator can be
/// plugged into a processor through this trait.
pub trait Mapping: Send + Sync + fmt::Debug {
    fn evaluate(&self, ctx: &MessageContext<'_>) -> Result<JsonValue, MappingError>;
}

/// Read-only view of one message for mapping evaluation.
///
/// The payload is parsed as JSON on first use and the result shared by every
/// mapping evaluated against the same context.
pub struct MessageContext<'a> {
    payload: &'a [u8],
    metadata: &'a BTreeMap<String, String>,
    parsed: OnceCell<Result<JsonValue, String>>,
}

impl<'a> MessageContext<'a> {
    pub fn new(payload: &'a [u8], metadata: &'a BTreeMap<String, String>) -> Self {
        Self {
            payload,
            metadata,
            parsed: OnceCell::new(),
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn meta(&self, key: &str) -> Option<&'a str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Payload as text, with invalid UTF-8 replaced
    pub fn content(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.payload)
    }

    /// Parsed payload
    pub fn json(&self) -> Result<&JsonValue, MappingError> {
        self.parsed
            .get_or_init(|| serde_json::from_slice(self.payload).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| MappingError::InvalidInput(e.clone()))
    }
}

impl fmt::Debug for MessageContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("payload_len", &self.payload.len())
            .field("metadata", &self.metadata)
            .field("parsed", &self.parsed.get().is_some())
            .finish()
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::error::ProcessError;
use crate::core::mapping::MessageContext;
use std::collections::BTreeMap;

/// One unit of a batch: raw payload bytes, string metadata and, after
/// processing, an optional error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    payload: Vec<u8>,
    metadata: BTreeMap<String, String>,
    error: Option<ProcessError>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as text, lossy for invalid UTF-8
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn error(&self) -> Option<&ProcessError> {
        self.error.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn set_error(&mut self, error: ProcessError) {
        self.error = Some(error);
    }

    pub fn take_error(&mut self) -> Option<ProcessError> {
        self.error.take()
    }

    pub(crate) fn context(&self) -> MessageContext<'_> {
        MessageContext::new(&self.payload, &self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_and_error() {
        let mut message = Message::new(r#"{"a":1}"#).with_metadata("topic", "orders");
        assert_eq!(message.meta("topic"), Some("orders"));
        assert_eq!(message.meta("missing"), None);
        assert!(!message.is_error());

        message.set_error(ProcessError::NoDocuments);
        assert!(message.error().unwrap().is_no_documents());
        assert_eq!(message.take_error(), Some(ProcessError::NoDocuments));
        assert!(!message.is_error());
    }

    #[test]
    fn test_context_sees_payload_and_metadata() {
        let message = Message::new(r#"{"a":1}"#).with_metadata("k", "v");
        let ctx = message.context();
        assert_eq!(ctx.meta("k"), Some("v"));
        assert_eq!(ctx.json().unwrap()["a"], 1);
    }
}

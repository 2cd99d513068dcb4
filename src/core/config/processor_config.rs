// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Processor Configuration
//!
//! [`ProcessorConfig`] is the user-facing description of one document processor.
//! Values stay as written (strings for the operation, modes and mapping programs)
//! until the processor is built; every parse happens once, at construction, and
//! fails with a [`ConfigurationError`].
//!
//! Configuration can come from YAML:
//!
//! ```yaml
//! operation: find-and-update
//! collection: orders
//! filter_map: root.id = this.id
//! document_map: root."$inc".count = 1
//! find_and_update_return_mode: after
//! write_concern:
//!   w: majority
//!   w_timeout: 5s
//! ```
//!
//! or from flat `docstore.*` properties (see [`keys`](super::keys)).

use super::keys;
use super::write_concern::{WriteConcern, WriteConcernConfig};
use crate::core::error::ConfigurationError;
use crate::core::processor::marshal::MarshalMode;
use crate::core::processor::operation::OperationKind;
use crate::core::store::ReturnDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default number of messages of one batch executed concurrently
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Target collection; may contain `${! expr }` interpolations
    pub collection: String,
    /// One of the operation names, e.g. `insert-one`
    pub operation: String,
    pub write_concern: WriteConcernConfig,
    pub filter_map: Option<String>,
    pub document_map: Option<String>,
    pub sort_map: Option<String>,
    pub upsert: bool,
    /// `canonical` (default) or `relaxed`
    pub json_marshal_mode: Option<String>,
    /// `before` (default) or `after`; find-and-update only
    pub find_and_update_return_mode: Option<String>,
    pub comment: Option<String>,
    pub max_in_flight: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            collection: String::new(),
            operation: OperationKind::InsertOne.to_string(),
            write_concern: WriteConcernConfig::default(),
            filter_map: None,
            document_map: None,
            sort_map: None,
            upsert: false,
            json_marshal_mode: None,
            find_and_update_return_mode: None,
            comment: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl ProcessorConfig {
    pub fn new(operation: OperationKind, collection: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            collection: collection.into(),
            ..Self::default()
        }
    }

    pub fn with_filter_map(mut self, mapping: impl Into<String>) -> Self {
        self.filter_map = Some(mapping.into());
        self
    }

    pub fn with_document_map(mut self, mapping: impl Into<String>) -> Self {
        self.document_map = Some(mapping.into());
        self
    }

    pub fn with_sort_map(mut self, mapping: impl Into<String>) -> Self {
        self.sort_map = Some(mapping.into());
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_marshal_mode(mut self, mode: MarshalMode) -> Self {
        self.json_marshal_mode = Some(mode.to_string());
        self
    }

    pub fn with_return_mode(mut self, mode: ReturnDocument) -> Self {
        self.find_and_update_return_mode = Some(mode.to_string());
        self
    }

    pub fn with_write_concern(
        mut self,
        w: impl Into<String>,
        j: bool,
        w_timeout: impl Into<String>,
    ) -> Self {
        self.write_concern = WriteConcernConfig {
            w: w.into(),
            j,
            w_timeout: w_timeout.into(),
        };
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Build a configuration from flat `docstore.*` properties.
    ///
    /// Unknown keys are ignored. Empty values count as absent, so a missing
    /// operation means `insert-one`.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, ConfigurationError> {
        let get = |key: &str| {
            properties
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut config = Self {
            collection: get(keys::COLLECTION)
                .ok_or_else(|| ConfigurationError::missing_parameter(keys::COLLECTION))?,
            filter_map: get(keys::FILTER_MAP),
            document_map: get(keys::DOCUMENT_MAP),
            sort_map: get(keys::SORT_MAP),
            json_marshal_mode: get(keys::JSON_MARSHAL_MODE),
            find_and_update_return_mode: get(keys::RETURN_MODE),
            comment: get(keys::COMMENT),
            ..Self::default()
        };

        if let Some(operation) = get(keys::OPERATION) {
            config.operation = operation;
        }
        if let Some(upsert) = get(keys::UPSERT) {
            config.upsert = parse_bool(keys::UPSERT, &upsert)?;
        }
        if let Some(max) = get(keys::MAX_IN_FLIGHT) {
            config.max_in_flight = max
                .parse::<usize>()
                .map_err(|e| ConfigurationError::invalid_value(keys::MAX_IN_FLIGHT, e.to_string()))?;
        }

        config.write_concern.w = get(keys::WRITE_CONCERN_W).unwrap_or_default();
        if let Some(j) = get(keys::WRITE_CONCERN_J) {
            config.write_concern.j = parse_bool(keys::WRITE_CONCERN_J, &j)?;
        }
        config.write_concern.w_timeout = get(keys::WRITE_CONCERN_W_TIMEOUT).unwrap_or_default();

        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    pub fn operation_kind(&self) -> Result<OperationKind, ConfigurationError> {
        self.operation.trim().parse()
    }

    pub fn marshal_mode(&self) -> Result<MarshalMode, ConfigurationError> {
        match non_empty(&self.json_marshal_mode) {
            Some(mode) => mode.parse(),
            None => Ok(MarshalMode::default()),
        }
    }

    /// The configured return mode, if one was given
    pub fn return_document(&self) -> Result<Option<ReturnDocument>, ConfigurationError> {
        non_empty(&self.find_and_update_return_mode)
            .map(|mode| mode.parse::<ReturnDocument>())
            .transpose()
    }

    pub fn resolved_write_concern(&self) -> Result<WriteConcern, ConfigurationError> {
        self.write_concern.resolve()
    }

    pub fn filter_source(&self) -> Option<&str> {
        non_empty(&self.filter_map)
    }

    pub fn document_source(&self) -> Option<&str> {
        non_empty(&self.document_map)
    }

    pub fn sort_source(&self) -> Option<&str> {
        non_empty(&self.sort_map)
    }

    pub fn comment(&self) -> Option<&str> {
        non_empty(&self.comment)
    }

    /// Checks that do not depend on compiling anything
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.collection.trim().is_empty() {
            return Err(ConfigurationError::missing_parameter("collection"));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_in_flight",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ConfigurationError::invalid_value(
            key,
            format!("expected 'true' or 'false', got '{}'", other),
        )),
    }
}

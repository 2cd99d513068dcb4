// SPDX-License-Identifier: MIT OR Apache-2.0

//! docflux error types
//!
//! Construction-time problems are [`ConfigurationError`]s and abort processor
//! creation. Everything that can go wrong while handling one message is a
//! [`ProcessError`] attached to that message; a batch never fails as a whole.

use crate::core::processor::operation::{MappingSlot, OperationKind};
use crate::core::util::CancelReason;
use thiserror::Error;

/// Result type for store commands
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while building a processor from its configuration
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Unknown operation '{0}'. Valid values: {valid}", valid = OperationKind::valid_values())]
    UnknownOperation(String),

    #[error("Operation '{operation}' requires a {slot} mapping")]
    MissingMapping {
        operation: OperationKind,
        slot: MappingSlot,
    },

    #[error("Operation '{operation}' does not accept a {slot} mapping")]
    UnexpectedMapping {
        operation: OperationKind,
        slot: MappingSlot,
    },

    #[error("Operation '{operation}' does not support the '{option}' option")]
    UnsupportedOption {
        operation: OperationKind,
        option: &'static str,
    },

    #[error("Failed to compile {slot} mapping: {source}")]
    MappingCompile {
        slot: MappingSlot,
        #[source]
        source: CompileError,
    },

    #[error("Invalid collection template: {0}")]
    CollectionTemplate(#[source] CompileError),

    #[error("Invalid write concern: {0}")]
    WriteConcern(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Failed to read configuration: {0}")]
    Load(String),
}

impl ConfigurationError {
    /// Create an invalid value error for a configuration key
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a missing parameter error
    pub fn missing_parameter(parameter: impl Into<String>) -> Self {
        Self::MissingParameter(parameter.into())
    }

    /// Create a write concern error
    pub fn write_concern(message: impl Into<String>) -> Self {
        Self::WriteConcern(message.into())
    }
}

/// Mapping program or interpolation template that failed to compile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at position {position})")]
pub struct CompileError {
    pub message: String,
    pub position: usize,
}

impl CompileError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A mapping failed to produce usable arguments for one message
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Message payload is not valid JSON: {0}")]
    InvalidInput(String),

    #[error("The {slot} mapping must produce an object, got {found}")]
    NotADocument { slot: MappingSlot, found: String },

    #[error("Function '{function}' failed: {message}")]
    Function { function: String, message: String },

    #[error("Collection name resolved to an empty string")]
    EmptyCollection,

    #[error("The {slot} mapping produced invalid extended JSON: {message}")]
    ExtendedJson { slot: MappingSlot, message: String },
}

impl MappingError {
    /// Create a function error
    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by a [`DocumentStore`](crate::core::store::DocumentStore)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Connection unavailable: {0}")]
    Connection(String),

    #[error("Command rejected: {0}")]
    CommandRejected(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Command timed out: {0}")]
    Timeout(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a command rejected error
    pub fn command_rejected(message: impl Into<String>) -> Self {
        Self::CommandRejected(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether an outer retry stage could reasonably try the command again
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout(_))
    }
}

/// Coarse classification of a [`ProcessError`], for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Mapping,
    NoDocuments,
    Database,
    Cancelled,
    Marshal,
}

/// Error attached to a single message
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("no documents in result")]
    NoDocuments,

    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    #[error("Operation cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("Failed to marshal result document: {0}")]
    Marshal(String),
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Mapping(_) => ErrorKind::Mapping,
            ProcessError::NoDocuments => ErrorKind::NoDocuments,
            ProcessError::Database(_) => ErrorKind::Database,
            ProcessError::Cancelled(_) => ErrorKind::Cancelled,
            ProcessError::Marshal(_) => ErrorKind::Marshal,
        }
    }

    pub fn is_no_documents(&self) -> bool {
        self.kind() == ErrorKind::NoDocuments
    }
}

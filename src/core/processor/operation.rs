// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seven operation kinds and what each one accepts.
//!
//! | Operation       | filter   | document | sort     | upsert | return mode |
//! |-----------------|----------|----------|----------|--------|-------------|
//! | insert-one      | -        | required | -        | no     | no          |
//! | delete-one      | required | -        | -        | no     | no          |
//! | delete-many     | required | -        | -        | no     | no          |
//! | replace-one     | required | required | -        | yes    | no          |
//! | update-one      | required | required | -        | no     | no          |
//! | find-one        | required | -        | optional | no     | no          |
//! | find-and-update | required | required | optional | yes    | yes         |

use crate::core::error::ConfigurationError;
use crate::core::mapping::Mapping;
use crate::core::store::ReturnDocument;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    InsertOne,
    DeleteOne,
    DeleteMany,
    ReplaceOne,
    UpdateOne,
    FindOne,
    FindAndUpdate,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::InsertOne,
        OperationKind::DeleteOne,
        OperationKind::DeleteMany,
        OperationKind::ReplaceOne,
        OperationKind::UpdateOne,
        OperationKind::FindOne,
        OperationKind::FindAndUpdate,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            OperationKind::InsertOne => "insert-one",
            OperationKind::DeleteOne => "delete-one",
            OperationKind::DeleteMany => "delete-many",
            OperationKind::ReplaceOne => "replace-one",
            OperationKind::UpdateOne => "update-one",
            OperationKind::FindOne => "find-one",
            OperationKind::FindAndUpdate => "find-and-update",
        }
    }

    /// Comma separated list of accepted names, for error messages
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!("'{}'", kind.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub const fn requirement(&self, slot: MappingSlot) -> Requirement {
        use OperationKind::*;
        use Requirement::*;
        match (self, slot) {
            (InsertOne, MappingSlot::Filter) => Forbidden,
            (_, MappingSlot::Filter) => Required,
            (InsertOne | ReplaceOne | UpdateOne | FindAndUpdate, MappingSlot::Document) => {
                Required
            }
            (_, MappingSlot::Document) => Forbidden,
            (FindOne | FindAndUpdate, MappingSlot::Sort) => Optional,
            (_, MappingSlot::Sort) => Forbidden,
        }
    }

    /// Every kind except `find-one` writes and carries the write concern
    pub const fn is_write(&self) -> bool {
        !matches!(self, OperationKind::FindOne)
    }

    pub const fn supports_upsert(&self) -> bool {
        matches!(self, OperationKind::ReplaceOne | OperationKind::FindAndUpdate)
    }

    pub const fn supports_return_mode(&self) -> bool {
        matches!(self, OperationKind::FindAndUpdate)
    }

    /// Whether a result document replaces the message payload
    pub const fn returns_document(&self) -> bool {
        matches!(self, OperationKind::FindOne | OperationKind::FindAndUpdate)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownOperation(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingSlot {
    Filter,
    Document,
    Sort,
}

impl MappingSlot {
    pub const ALL: [MappingSlot; 3] = [MappingSlot::Filter, MappingSlot::Document, MappingSlot::Sort];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MappingSlot::Filter => "filter",
            MappingSlot::Document => "document",
            MappingSlot::Sort => "sort",
        }
    }
}

impl fmt::Display for MappingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
    Forbidden,
}

pub type SharedMapping = Arc<dyn Mapping>;

/// Compiled mappings, one optional program per slot
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    pub filter: Option<SharedMapping>,
    pub document: Option<SharedMapping>,
    pub sort: Option<SharedMapping>,
}

impl MappingSet {
    pub fn get(&self, slot: MappingSlot) -> Option<&SharedMapping> {
        match slot {
            MappingSlot::Filter => self.filter.as_ref(),
            MappingSlot::Document => self.document.as_ref(),
            MappingSlot::Sort => self.sort.as_ref(),
        }
    }
}

/// Options that only some operation kinds accept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationOptions {
    pub upsert: bool,
    pub return_document: Option<ReturnDocument>,
}

/// A fully validated operation, carrying only what its kind uses
#[derive(Debug, Clone)]
pub enum Operation {
    InsertOne {
        document: SharedMapping,
    },
    DeleteOne {
        filter: SharedMapping,
    },
    DeleteMany {
        filter: SharedMapping,
    },
    ReplaceOne {
        filter: SharedMapping,
        document: SharedMapping,
        upsert: bool,
    },
    UpdateOne {
        filter: SharedMapping,
        document: SharedMapping,
    },
    FindOne {
        filter: SharedMapping,
        sort: Option<SharedMapping>,
    },
    FindAndUpdate {
        filter: SharedMapping,
        document: SharedMapping,
        sort: Option<SharedMapping>,
        return_document: ReturnDocument,
        upsert: bool,
    },
}

impl Operation {
    /// Check `mappings` and `options` against the table for `kind` and build
    /// the matching variant.
    ///
    /// A missing required mapping, a mapping in a forbidden slot, `upsert` on
    /// a kind without upsert and a return mode outside find-and-update are
    /// all rejected.
    pub fn build(
        kind: OperationKind,
        mappings: MappingSet,
        options: OperationOptions,
    ) -> Result<Self, ConfigurationError> {
        for slot in MappingSlot::ALL {
            let present = mappings.get(slot).is_some();
            match kind.requirement(slot) {
                Requirement::Required if !present => {
                    return Err(ConfigurationError::MissingMapping {
                        operation: kind,
                        slot,
                    })
                }
                Requirement::Forbidden if present => {
                    return Err(ConfigurationError::UnexpectedMapping {
                        operation: kind,
                        slot,
                    })
                }
                _ => {}
            }
        }
        if options.upsert && !kind.supports_upsert() {
            return Err(ConfigurationError::UnsupportedOption {
                operation: kind,
                option: "upsert",
            });
        }
        if options.return_document.is_some() && !kind.supports_return_mode() {
            return Err(ConfigurationError::UnsupportedOption {
                operation: kind,
                option: "find_and_update_return_mode",
            });
        }

        let MappingSet {
            filter,
            document,
            sort,
        } = mappings;
        let required = |mapping: Option<SharedMapping>, slot| {
            mapping.ok_or(ConfigurationError::MissingMapping {
                operation: kind,
                slot,
            })
        };

        let operation = match kind {
            OperationKind::InsertOne => Operation::InsertOne {
                document: required(document, MappingSlot::Document)?,
            },
            OperationKind::DeleteOne => Operation::DeleteOne {
                filter: required(filter, MappingSlot::Filter)?,
            },
            OperationKind::DeleteMany => Operation::DeleteMany {
                filter: required(filter, MappingSlot::Filter)?,
            },
            OperationKind::ReplaceOne => Operation::ReplaceOne {
                filter: required(filter, MappingSlot::Filter)?,
                document: required(document, MappingSlot::Document)?,
                upsert: options.upsert,
            },
            OperationKind::UpdateOne => Operation::UpdateOne {
                filter: required(filter, MappingSlot::Filter)?,
                document: required(document, MappingSlot::Document)?,
            },
            OperationKind::FindOne => Operation::FindOne {
                filter: required(filter, MappingSlot::Filter)?,
                sort,
            },
            OperationKind::FindAndUpdate => Operation::FindAndUpdate {
                filter: required(filter, MappingSlot::Filter)?,
                document: required(document, MappingSlot::Document)?,
                sort,
                return_document: options.return_document.unwrap_or_default(),
                upsert: options.upsert,
            },
        };
        Ok(operation)
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::InsertOne { .. } => OperationKind::InsertOne,
            Operation::DeleteOne { .. } => OperationKind::DeleteOne,
            Operation::DeleteMany { .. } => OperationKind::DeleteMany,
            Operation::ReplaceOne { .. } => OperationKind::ReplaceOne,
            Operation::UpdateOne { .. } => OperationKind::UpdateOne,
            Operation::FindOne { .. } => OperationKind::FindOne,
            Operation::FindAndUpdate { .. } => OperationKind::FindAndUpdate,
        }
    }
}

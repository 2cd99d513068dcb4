// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message argument building: evaluates the operation's mappings against
//! one message and produces typed [`RequestArgs`].

use super::operation::{MappingSlot, Operation, SharedMapping};
use crate::core::document::{json_to_document, ConversionError};
use crate::core::error::{CompileError, MappingError};
use crate::core::mapping::{InterpolatedString, MessageContext};
use crate::core::store::ReturnDocument;
use bson::Document;

/// How the target collection is chosen for each message
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionResolver {
    Static(String),
    Template(InterpolatedString),
}

impl CollectionResolver {
    /// A template without interpolations becomes a static name
    pub fn parse(collection: &str) -> Result<Self, CompileError> {
        let template = InterpolatedString::parse(collection)?;
        if template.is_static() {
            Ok(CollectionResolver::Static(collection.to_string()))
        } else {
            Ok(CollectionResolver::Template(template))
        }
    }

    pub fn resolve(&self, ctx: &MessageContext<'_>) -> Result<String, MappingError> {
        let name = match self {
            CollectionResolver::Static(name) => name.clone(),
            CollectionResolver::Template(template) => template.render(ctx)?,
        };
        if name.is_empty() {
            return Err(MappingError::EmptyCollection);
        }
        Ok(name)
    }
}

/// Store command for one message, with mapping results as BSON documents
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    InsertOne {
        document: Document,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    UpdateOne {
        filter: Document,
        update: Document,
    },
    FindOne {
        filter: Document,
        sort: Option<Document>,
    },
    FindAndUpdate {
        filter: Document,
        update: Document,
        sort: Option<Document>,
        return_document: ReturnDocument,
        upsert: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestArgs {
    pub collection: String,
    pub request: Request,
}

/// Evaluate every mapping the operation carries and resolve the collection.
///
/// Stops at the first failure.
pub fn build_args(
    operation: &Operation,
    collection: &CollectionResolver,
    ctx: &MessageContext<'_>,
) -> Result<RequestArgs, MappingError> {
    let request = match operation {
        Operation::InsertOne { document } => Request::InsertOne {
            document: evaluate(document, MappingSlot::Document, ctx)?,
        },
        Operation::DeleteOne { filter } => Request::DeleteOne {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
        },
        Operation::DeleteMany { filter } => Request::DeleteMany {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
        },
        Operation::ReplaceOne {
            filter,
            document,
            upsert,
        } => Request::ReplaceOne {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
            replacement: evaluate(document, MappingSlot::Document, ctx)?,
            upsert: *upsert,
        },
        Operation::UpdateOne { filter, document } => Request::UpdateOne {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
            update: evaluate(document, MappingSlot::Document, ctx)?,
        },
        Operation::FindOne { filter, sort } => Request::FindOne {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
            sort: evaluate_optional(sort.as_ref(), MappingSlot::Sort, ctx)?,
        },
        Operation::FindAndUpdate {
            filter,
            document,
            sort,
            return_document,
            upsert,
        } => Request::FindAndUpdate {
            filter: evaluate(filter, MappingSlot::Filter, ctx)?,
            update: evaluate(document, MappingSlot::Document, ctx)?,
            sort: evaluate_optional(sort.as_ref(), MappingSlot::Sort, ctx)?,
            return_document: *return_document,
            upsert: *upsert,
        },
    };

    Ok(RequestArgs {
        collection: collection.resolve(ctx)?,
        request,
    })
}

fn evaluate(
    mapping: &SharedMapping,
    slot: MappingSlot,
    ctx: &MessageContext<'_>,
) -> Result<Document, MappingError> {
    let value = mapping.evaluate(ctx)?;
    json_to_document(value).map_err(|e| match e {
        ConversionError::NotAnObject(found) => MappingError::NotADocument {
            slot,
            found: found.to_string(),
        },
        ConversionError::ExtendedJson(message) => MappingError::ExtendedJson { slot, message },
    })
}

fn evaluate_optional(
    mapping: Option<&SharedMapping>,
    slot: MappingSlot,
    ctx: &MessageContext<'_>,
) -> Result<Option<Document>, MappingError> {
    mapping.map(|m| evaluate(m, slot, ctx)).transpose()
}

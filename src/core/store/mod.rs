// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Document Stores
//!
//! [`DocumentStore`] is the boundary between the processor and a database. It
//! exposes exactly the commands the seven operation kinds need. A store is
//! long-lived and shared across batches through `Arc<dyn DocumentStore>`;
//! connection pooling, if any, is the implementation's business.
//!
//! - [`MemoryStore`]: in-process store with filter, update-operator and sort
//!   support, used for tests and embedding.
//! - `MongoStore` (feature `mongodb`): adapter over the official driver.

pub mod filter;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod sort;
pub mod update;

pub use memory::{CommandRecord, MemoryStore};
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;

use crate::core::config::WriteConcern;
use crate::core::error::{ConfigurationError, StoreResult};
use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt;
use std::str::FromStr;

/// Which image of the document find-and-update returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    /// The document as it was before the update
    #[default]
    Before,
    /// The document after the update was applied
    After,
}

impl ReturnDocument {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnDocument::Before => "before",
            ReturnDocument::After => "after",
        }
    }
}

impl fmt::Display for ReturnDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnDocument {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "before" => Ok(ReturnDocument::Before),
            "after" => Ok(ReturnDocument::After),
            _ => Err(ConfigurationError::invalid_value(
                "find_and_update_return_mode",
                format!("'{}'. Valid values: 'before', 'after'", s),
            )),
        }
    }
}

/// Options shared by write-class commands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    pub write_concern: WriteConcern,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub sort: Option<Document>,
    pub return_document: ReturnDocument,
    pub upsert: bool,
    pub write: WriteOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// `_id` of the document inserted by an upsert
    pub upserted_id: Option<Bson>,
}

/// Commands a document database must support for the processor.
///
/// Zero matches is never an error at this level: deletes and updates report
/// counts of zero and finds return `None`.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: &WriteOptions,
    ) -> StoreResult<InsertOneResult>;

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult>;

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult>;

    /// Replace the first match entirely, keeping its `_id`
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult>;

    /// Apply an update-operator document to the first match
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: &FindOneOptions,
    ) -> StoreResult<Option<Document>>;

    /// Atomically update the first match and return its before or after image
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>>;

    /// Check that the store is reachable
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_document_parse() {
        assert_eq!("before".parse::<ReturnDocument>().unwrap(), ReturnDocument::Before);
        assert_eq!("AFTER".parse::<ReturnDocument>().unwrap(), ReturnDocument::After);
        assert_eq!(ReturnDocument::default(), ReturnDocument::Before);
        assert_eq!(ReturnDocument::After.to_string(), "after");

        let err = "later".parse::<ReturnDocument>().unwrap_err();
        assert!(err.to_string().contains("Valid values"));
    }
}

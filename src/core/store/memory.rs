// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process [`DocumentStore`].
//!
//! Collections are vectors of documents in insertion order behind one
//! `tokio::sync::RwLock`, so every command is atomic with respect to the
//! others. Each command is also appended to a command log that tests use to
//! inspect write concerns and comments.

use super::filter::{matches, values_equal};
use super::sort::{compare_documents, parse_sort};
use super::update::{
    apply_update, replace_keeping_id, seed_from_filter, validate_replacement, validate_update,
};
use super::{
    DeleteResult, DocumentStore, FindOneAndUpdateOptions, FindOneOptions, InsertOneResult,
    ReturnDocument, UpdateResult, WriteOptions,
};
use crate::core::config::WriteConcern;
use crate::core::error::{StoreError, StoreResult};
use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use log::debug;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One command as received by the store
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub name: &'static str,
    pub collection: String,
    /// `None` for read commands
    pub write_concern: Option<WriteConcern>,
    pub comment: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    commands: RwLock<Vec<CommandRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents directly, bypassing the command log
    pub async fn seed(&self, collection: &str, documents: impl IntoIterator<Item = Document>) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        for document in documents {
            insert_into(docs, document)?;
        }
        Ok(())
    }

    /// Snapshot of a collection in insertion order
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn command_log(&self) -> Vec<CommandRecord> {
        self.commands.read().await.clone()
    }

    async fn record(
        &self,
        name: &'static str,
        collection: &str,
        write_concern: Option<&WriteConcern>,
        comment: Option<&String>,
    ) {
        self.commands.write().await.push(CommandRecord {
            name,
            collection: collection.to_string(),
            write_concern: write_concern.cloned(),
            comment: comment.cloned(),
        });
    }

    async fn record_write(&self, name: &'static str, collection: &str, options: &WriteOptions) {
        self.record(
            name,
            collection,
            Some(&options.write_concern),
            options.comment.as_ref(),
        )
        .await;
    }
}

/// Insert a document, giving it an `ObjectId` `_id` first when it has none
fn insert_into(docs: &mut Vec<Document>, document: Document) -> StoreResult<Bson> {
    let document = with_id(document);
    let id = document.get("_id").cloned().unwrap_or(Bson::Null);
    if docs
        .iter()
        .any(|existing| existing.get("_id").is_some_and(|other| values_equal(other, &id)))
    {
        return Err(StoreError::DuplicateKey(format!("_id: {}", id)));
    }
    docs.push(document);
    Ok(id)
}

fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }
    let mut with_id = Document::new();
    with_id.insert("_id", ObjectId::new());
    with_id.extend(document);
    with_id
}

/// Positions of matching documents, in natural order or by `sort`
fn matching_positions(
    docs: &[Document],
    filter: &Document,
    sort: Option<&Document>,
) -> StoreResult<Vec<usize>> {
    let mut positions = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if matches(doc, filter)? {
            positions.push(i);
        }
    }
    if let Some(sort) = sort {
        let keys = parse_sort(sort)?;
        // stable, so ties keep insertion order
        positions.sort_by(|&a, &b| compare_documents(&docs[a], &docs[b], &keys));
    }
    Ok(positions)
}

fn first_match(docs: &[Document], filter: &Document, sort: Option<&Document>) -> StoreResult<Option<usize>> {
    Ok(matching_positions(docs, filter, sort)?.into_iter().next())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: &WriteOptions,
    ) -> StoreResult<InsertOneResult> {
        self.record_write("insert", collection, options).await;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let inserted_id = insert_into(docs, document)?;
        debug!("[MemoryStore] Inserted {} into '{}'", inserted_id, collection);
        Ok(InsertOneResult { inserted_id })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        self.record_write("delete", collection, options).await;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };
        match first_match(docs, &filter, None)? {
            Some(position) => {
                docs.remove(position);
                Ok(DeleteResult { deleted_count: 1 })
            }
            None => Ok(DeleteResult::default()),
        }
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        self.record_write("delete", collection, options).await;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(DeleteResult::default());
        };
        let doomed = matching_positions(docs, &filter, None)?;
        for position in doomed.iter().rev() {
            docs.remove(*position);
        }
        debug!(
            "[MemoryStore] Deleted {} document(s) from '{}'",
            doomed.len(),
            collection
        );
        Ok(DeleteResult {
            deleted_count: doomed.len() as u64,
        })
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult> {
        self.record_write("update", collection, options).await;
        validate_replacement(&replacement)?;
        let mut collections = self.collections.write().await;

        if let Some(docs) = collections.get_mut(collection) {
            if let Some(position) = first_match(docs, &filter, None)? {
                let next = replace_keeping_id(&docs[position], &replacement)?;
                let modified = next != docs[position];
                docs[position] = next;
                return Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                });
            }
        }

        if !upsert {
            return Ok(UpdateResult::default());
        }

        let mut document = Document::new();
        if let Some(id) = seed_from_filter(&filter)?.remove("_id") {
            document.insert("_id", id);
        }
        document.extend(replacement);
        let docs = collections.entry(collection.to_string()).or_default();
        let upserted_id = insert_into(docs, document)?;
        Ok(UpdateResult {
            matched_count: 0,
            modified_count: 0,
            upserted_id: Some(upserted_id),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult> {
        self.record_write("update", collection, options).await;
        validate_update(&update)?;
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(UpdateResult::default());
        };
        let Some(position) = first_match(docs, &filter, None)? else {
            return Ok(UpdateResult::default());
        };

        // Work on a copy so a failing operator leaves the stored document intact
        let mut next = docs[position].clone();
        let modified = apply_update(&mut next, &update, false)?;
        docs[position] = next;
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_id: None,
        })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: &FindOneOptions,
    ) -> StoreResult<Option<Document>> {
        self.record("find", collection, None, options.comment.as_ref())
            .await;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(None);
        };
        let position = first_match(docs, &filter, options.sort.as_ref())?;
        Ok(position.map(|p| docs[p].clone()))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>> {
        self.record_write("findAndModify", collection, &options.write)
            .await;
        validate_update(&update)?;
        let mut collections = self.collections.write().await;

        if let Some(docs) = collections.get_mut(collection) {
            if let Some(position) = first_match(docs, &filter, options.sort.as_ref())? {
                let before = docs[position].clone();
                let mut after = before.clone();
                apply_update(&mut after, &update, false)?;
                docs[position] = after.clone();
                return Ok(Some(match options.return_document {
                    ReturnDocument::Before => before,
                    ReturnDocument::After => after,
                }));
            }
        }

        if !options.upsert {
            return Ok(None);
        }

        let mut document = seed_from_filter(&filter)?;
        apply_update(&mut document, &update, true)?;
        let document = with_id(document);
        let docs = collections.entry(collection.to_string()).or_default();
        insert_into(docs, document.clone())?;
        debug!("[MemoryStore] Upserted into '{}' by find-and-update", collection);
        Ok(match options.return_document {
            ReturnDocument::Before => None,
            ReturnDocument::After => Some(document),
        })
    }
}

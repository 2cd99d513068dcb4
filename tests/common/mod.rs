// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Bson, Document};
use docflux::core::config::ProcessorConfig;
use docflux::core::error::{StoreError, StoreResult};
use docflux::core::processor::{DocumentProcessor, Message};
use docflux::core::store::{
    DeleteResult, DocumentStore, FindOneAndUpdateOptions, FindOneOptions, InsertOneResult,
    MemoryStore, UpdateResult, WriteOptions,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn processor(config: ProcessorConfig, store: Arc<dyn DocumentStore>) -> DocumentProcessor {
    init_logging();
    DocumentProcessor::new(config, store).expect("processor should build")
}

pub fn messages(payloads: &[&str]) -> Vec<Message> {
    payloads.iter().map(|p| Message::new(*p)).collect()
}

pub fn payloads(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.payload_str().into_owned()).collect()
}

/// Parse a result payload and drop the generated `_id`
pub fn result_json(message: &Message) -> JsonValue {
    let mut value: JsonValue =
        serde_json::from_slice(message.payload()).expect("payload should be JSON");
    if let Some(object) = value.as_object_mut() {
        object.remove("_id");
    }
    value
}

pub fn without_ids(documents: Vec<Document>) -> Vec<Document> {
    documents
        .into_iter()
        .map(|mut doc| {
            doc.remove("_id");
            doc
        })
        .collect()
}

/// Wraps a [`MemoryStore`] and misbehaves on request.
///
/// A command whose filter or document has `"fail": true` fails with a
/// connection error. `"sleep_ms": n` delays the command by `n` milliseconds.
#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub unreachable: bool,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    async fn before(&self, document: &Document) -> StoreResult<()> {
        if let Some(ms) = document.get("sleep_ms").and_then(Bson::as_i32) {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        if document.get_bool("fail").unwrap_or(false) {
            return Err(StoreError::connection("injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: &WriteOptions,
    ) -> StoreResult<InsertOneResult> {
        self.before(&document).await?;
        self.inner.insert_one(collection, document, options).await
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        self.before(&filter).await?;
        self.inner.delete_one(collection, filter, options).await
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        self.before(&filter).await?;
        self.inner.delete_many(collection, filter, options).await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        upsert: bool,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult> {
        self.before(&filter).await?;
        self.inner
            .replace_one(collection, filter, replacement, upsert, options)
            .await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult> {
        self.before(&filter).await?;
        self.inner.update_one(collection, filter, update, options).await
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: &FindOneOptions,
    ) -> StoreResult<Option<Document>> {
        self.before(&filter).await?;
        self.inner.find_one(collection, filter, options).await
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>> {
        self.before(&filter).await?;
        self.inner
            .find_one_and_update(collection, filter, update, options)
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.unreachable {
            return Err(StoreError::connection("connection refused"));
        }
        Ok(())
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`DocumentStore`] backed by the official MongoDB driver.
//!
//! The driver's `Client` owns a connection pool and is cheap to clone, so one
//! `MongoStore` is meant to be shared by every processor talking to the same
//! database.

use super::{
    DeleteResult, DocumentStore, FindOneAndUpdateOptions, FindOneOptions, InsertOneResult,
    ReturnDocument, UpdateResult, WriteOptions,
};
use crate::core::config::{Acknowledgment, ConnectionConfig, WriteConcern};
use crate::core::error::{StoreError, StoreResult};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use log::{info, warn};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{
    self, ClientOptions, Credential, DeleteOptions, InsertOneOptions, ReplaceOptions,
    UpdateOptions,
};
use mongodb::{Client, Collection, Database};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Build a client from connection settings. No I/O happens until the
    /// first command; call [`DocumentStore::ping`] to check reachability.
    pub async fn connect(config: &ConnectionConfig) -> StoreResult<Self> {
        config
            .validate()
            .map_err(|e| StoreError::connection(e.to_string()))?;

        let mut client_options = ClientOptions::parse(config.url.as_str())
            .await
            .map_err(map_error)?;
        if let Some(app_name) = &config.app_name {
            client_options.app_name = Some(app_name.clone());
        }
        if let Some(username) = &config.username {
            client_options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(config.password.clone())
                    .build(),
            );
        }

        let client = Client::with_options(client_options).map_err(map_error)?;
        info!(
            "[MongoStore] Configured client for database '{}'",
            config.database
        );
        Ok(Self::from_client(client, &config.database))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

fn write_concern(concern: &WriteConcern) -> Option<options::WriteConcern> {
    if concern.is_default() {
        return None;
    }
    let w = concern.acknowledgment.as_ref().map(|ack| match ack {
        Acknowledgment::Nodes(n) => options::Acknowledgment::Nodes(*n),
        Acknowledgment::Majority => options::Acknowledgment::Majority,
        Acknowledgment::Tag(tag) => options::Acknowledgment::Custom(tag.clone()),
    });
    Some(
        options::WriteConcern::builder()
            .w(w)
            .journal(concern.journal.then_some(true))
            .w_timeout(concern.timeout)
            .build(),
    )
}

fn comment(comment: &Option<String>) -> Option<Bson> {
    comment.clone().map(Bson::String)
}

fn return_document(mode: ReturnDocument) -> options::ReturnDocument {
    match mode {
        ReturnDocument::Before => options::ReturnDocument::Before,
        ReturnDocument::After => options::ReturnDocument::After,
    }
}

fn map_error(error: mongodb::error::Error) -> StoreError {
    match error.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. }
        | ErrorKind::DnsResolve { .. } => StoreError::connection(error.to_string()),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            StoreError::DuplicateKey(write_error.message.clone())
        }
        ErrorKind::Write(WriteFailure::WriteConcernError(_)) => {
            StoreError::Timeout(error.to_string())
        }
        ErrorKind::Write(_)
        | ErrorKind::Command(_)
        | ErrorKind::InvalidArgument { .. }
        | ErrorKind::BulkWrite(_) => StoreError::command_rejected(error.to_string()),
        _ => StoreError::internal(error.to_string()),
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_one(
        &self,
        collection: &str,
        document: Document,
        options: &WriteOptions,
    ) -> StoreResult<InsertOneResult> {
        let insert_options = InsertOneOptions::builder()
            .write_concern(write_concern(&options.write_concern))
            .comment(comment(&options.comment))
            .build();
        let result = self
            .collection(collection)
            .insert_one(document, insert_options)
            .await
            .map_err(map_error)?;
        Ok(InsertOneResult {
            inserted_id: result.inserted_id,
        })
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        let delete_options = DeleteOptions::builder()
            .write_concern(write_concern(&options.write_concern))
            .comment(comment(&options.comment))
            .build();
        let result = self
            .collection(collection)
            .delete_one(filter, delete_options)
            .await
            .map_err(map_error)?;
        Ok(DeleteResult {
            deleted_count: result.deleted_count,
        })
    }

    async fn delete_many(
        &self,
        collection: &str,
        filter: Document,
        options: &WriteOptions,
    ) -> StoreResult<DeleteResult> {
        let delete_options = DeleteOptions::builder()
            .write_concern(write_concern(&options.write_concern))
            .comment(comment(&options.comment))
            .build();
        let result = self
            .collection(collection)
            .delete_many(filter, delete_options)
            .await
            .map_err(map_error)?;
        Ok(DeleteResult {
            deleted_count: result.deleted_count,
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
        let replace_options = ReplaceOptions::builder()
            .upsert(upsert)
            .write_concern(write_concern(&options.write_concern))
            .comment(comment(&options.comment))
            .build();
        let result = self
            .collection(collection)
            .replace_one(filter, replacement, replace_options)
            .await
            .map_err(map_error)?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &WriteOptions,
    ) -> StoreResult<UpdateResult> {
        let update_options = UpdateOptions::builder()
            .write_concern(write_concern(&options.write_concern))
            .comment(comment(&options.comment))
            .build();
        let result = self
            .collection(collection)
            .update_one(filter, update, update_options)
            .await
            .map_err(map_error)?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        options: &FindOneOptions,
    ) -> StoreResult<Option<Document>> {
        let find_options = options::FindOneOptions::builder()
            .sort(options.sort.clone())
            .comment(options.comment.clone())
            .build();
        self.collection(collection)
            .find_one(filter, find_options)
            .await
            .map_err(map_error)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: &FindOneAndUpdateOptions,
    ) -> StoreResult<Option<Document>> {
        let find_options = options::FindOneAndUpdateOptions::builder()
            .sort(options.sort.clone())
            .return_document(return_document(options.return_document))
            .upsert(options.upsert)
            .write_concern(write_concern(&options.write.write_concern))
            .comment(comment(&options.write.comment))
            .build();
        self.collection(collection)
            .find_one_and_update(filter, update, find_options)
            .await
            .map_err(map_error)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.database
            .run_command(doc! {"ping": 1}, None)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!("[MongoStore] Ping failed: {}", e);
                map_error(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_write_concern_is_omitted() {
        assert!(write_concern(&WriteConcern::default()).is_none());
    }

    #[test]
    fn test_write_concern_conversion() {
        let concern = WriteConcern::parse("majority", true, "2s").unwrap();
        let converted = write_concern(&concern).unwrap();
        assert_eq!(converted.w, Some(options::Acknowledgment::Majority));
        assert_eq!(converted.journal, Some(true));
        assert_eq!(converted.w_timeout, Some(Duration::from_secs(2)));

        let concern = WriteConcern::parse("dc", false, "").unwrap();
        let converted = write_concern(&concern).unwrap();
        assert_eq!(
            converted.w,
            Some(options::Acknowledgment::Custom("dc".to_string()))
        );
        assert_eq!(converted.journal, None);
    }

    #[test]
    fn test_comment_conversion() {
        assert_eq!(
            comment(&Some("audit".to_string())),
            Some(Bson::String("audit".to_string()))
        );
        assert_eq!(comment(&None), None);

        let options = WriteOptions {
            comment: Some("audit".to_string()),
            ..Default::default()
        };
        let built = UpdateOptions::builder()
            .comment(comment(&options.comment))
            .build();
        assert_eq!(built.comment, Some(Bson::String("audit".to_string())));
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executes one [`RequestArgs`] against a [`DocumentStore`] and normalizes the
//! store's answer into an [`Outcome`].
//!
//! Deletes, replaces and updates that match nothing still pass the message
//! through. A find that matches nothing is a `NoDocuments` error.

use super::args::{Request, RequestArgs};
use crate::core::error::ProcessError;
use crate::core::store::{
    DocumentStore, FindOneAndUpdateOptions, FindOneOptions, ReturnDocument, WriteOptions,
};
use bson::Document;
use log::debug;

/// What happens to the message payload
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The original payload is kept
    PassThrough,
    /// The payload is replaced by this document
    Document(Document),
}

/// Run one store command.
///
/// `write` is attached to every write-class command; its comment is also
/// attached to reads.
pub async fn dispatch(
    store: &dyn DocumentStore,
    args: RequestArgs,
    write: &WriteOptions,
) -> Result<Outcome, ProcessError> {
    let RequestArgs {
        collection,
        request,
    } = args;

    match request {
        Request::InsertOne { document } => {
            let result = store.insert_one(&collection, document, write).await?;
            debug!(
                "[DocumentProcessor] Inserted {} into '{}'",
                result.inserted_id, collection
            );
            Ok(Outcome::PassThrough)
        }
        Request::DeleteOne { filter } => {
            let result = store.delete_one(&collection, filter, write).await?;
            debug!(
                "[DocumentProcessor] delete-one on '{}' removed {}",
                collection, result.deleted_count
            );
            Ok(Outcome::PassThrough)
        }
        Request::DeleteMany { filter } => {
            let result = store.delete_many(&collection, filter, write).await?;
            debug!(
                "[DocumentProcessor] delete-many on '{}' removed {}",
                collection, result.deleted_count
            );
            Ok(Outcome::PassThrough)
        }
        Request::ReplaceOne {
            filter,
            replacement,
            upsert,
        } => {
            let result = store
                .replace_one(&collection, filter, replacement, upsert, write)
                .await?;
            debug!(
                "[DocumentProcessor] replace-one on '{}': matched {}, modified {}",
                collection, result.matched_count, result.modified_count
            );
            Ok(Outcome::PassThrough)
        }
        Request::UpdateOne { filter, update } => {
            let result = store.update_one(&collection, filter, update, write).await?;
            debug!(
                "[DocumentProcessor] update-one on '{}': matched {}, modified {}",
                collection, result.matched_count, result.modified_count
            );
            Ok(Outcome::PassThrough)
        }
        Request::FindOne { filter, sort } => {
            let options = FindOneOptions {
                sort,
                comment: write.comment.clone(),
            };
            match store.find_one(&collection, filter, &options).await? {
                Some(document) => Ok(Outcome::Document(document)),
                None => Err(ProcessError::NoDocuments),
            }
        }
        Request::FindAndUpdate {
            filter,
            update,
            sort,
            return_document,
            upsert,
        } => {
            let options = FindOneAndUpdateOptions {
                sort,
                return_document,
                upsert,
                write: write.clone(),
            };
            match store
                .find_one_and_update(&collection, filter, update, &options)
                .await?
            {
                Some(document) => Ok(Outcome::Document(document)),
                // an upsert inserted a document that has no before-image
                None if upsert && return_document == ReturnDocument::Before => {
                    Ok(Outcome::PassThrough)
                }
                None => Err(ProcessError::NoDocuments),
            }
        }
    }
}

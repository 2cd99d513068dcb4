// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Document Processor
//!
//! A [`DocumentProcessor`] turns each message of a batch into one document
//! store command:
//!
//! 1. the operation's mappings are evaluated against the message
//!    ([`args`]),
//! 2. the command is executed against the shared [`DocumentStore`]
//!    ([`dispatch`]),
//! 3. a returned document replaces the payload, marshaled as extended JSON
//!    ([`marshal`]).
//!
//! Everything that can be checked without a message is checked in
//! [`DocumentProcessor::new`]. After construction, failures are attached to
//! the individual message and the batch always comes back whole.
//!
//! ```rust,ignore
//! let config = ProcessorConfig::new(OperationKind::FindOne, "orders")
//!     .with_filter_map("root.id = this.id")
//!     .with_marshal_mode(MarshalMode::Relaxed);
//! let processor = DocumentProcessor::new(config, Arc::new(MemoryStore::new()))?;
//! let out = processor.process_batch(vec![Message::new(r#"{"id":1}"#)]).await;
//! ```

pub mod args;
mod batch;
pub mod dispatch;
pub mod marshal;
pub mod message;
pub mod operation;

pub use args::{CollectionResolver, Request, RequestArgs};
pub use dispatch::Outcome;
pub use marshal::MarshalMode;
pub use message::Message;
pub use operation::{
    MappingSet, MappingSlot, Operation, OperationKind, OperationOptions, Requirement,
    SharedMapping,
};

use crate::core::config::ProcessorConfig;
use crate::core::error::{ConfigurationError, ProcessError, StoreError};
use crate::core::mapping::Program;
use crate::core::store::{DocumentStore, WriteOptions};
use crate::core::util::CancellationSignal;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

/// A pipeline stage that processes whole batches
#[async_trait]
pub trait BatchProcessor: Send + Sync {
    /// Process every message. The output has the same length and order as
    /// the input; failures are attached to the affected message.
    async fn process_batch(&self, messages: Vec<Message>) -> Vec<Message>;

    /// Verify the backing system is reachable before the pipeline starts.
    ///
    /// Defaults to `Ok` for processors without external dependencies.
    async fn validate_connectivity(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

#[derive(Debug)]
pub struct DocumentProcessor {
    name: String,
    operation: Operation,
    collection: CollectionResolver,
    write: WriteOptions,
    marshal_mode: MarshalMode,
    max_in_flight: usize,
    store: Arc<dyn DocumentStore>,
}

impl DocumentProcessor {
    /// Compile the configured mappings and build a processor on `store`.
    pub fn new(
        config: ProcessorConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let mappings = MappingSet {
            filter: compile(config.filter_source(), MappingSlot::Filter)?,
            document: compile(config.document_source(), MappingSlot::Document)?,
            sort: compile(config.sort_source(), MappingSlot::Sort)?,
        };
        Self::from_parts(&config, mappings, store)
    }

    /// Build a processor from already compiled mappings.
    ///
    /// Any [`Mapping`](crate::core::mapping::Mapping) implementation can be
    /// used. The mapping texts of `config` are ignored.
    pub fn from_parts(
        config: &ProcessorConfig,
        mappings: MappingSet,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let kind = config.operation_kind()?;
        let options = OperationOptions {
            upsert: config.upsert,
            return_document: config.return_document()?,
        };
        let operation = Operation::build(kind, mappings, options)?;
        let collection = CollectionResolver::parse(config.collection.trim())
            .map_err(ConfigurationError::CollectionTemplate)?;
        let write = WriteOptions {
            write_concern: config.resolved_write_concern()?,
            comment: config.comment().map(str::to_string),
        };
        let marshal_mode = config.marshal_mode()?;

        info!(
            "[DocumentProcessor] Created {} processor for collection '{}' (write concern: {}, marshal mode: {}, max in flight: {})",
            kind,
            config.collection.trim(),
            write.write_concern,
            marshal_mode,
            config.max_in_flight
        );

        Ok(Self {
            name: format!("docstore-{}", kind),
            operation,
            collection,
            write,
            marshal_mode,
            max_in_flight: config.max_in_flight,
            store,
        })
    }

    pub fn operation_kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn marshal_mode(&self) -> MarshalMode {
        self.marshal_mode
    }

    pub fn write_options(&self) -> &WriteOptions {
        &self.write
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Build and execute the command for one message, without touching it
    pub async fn process_message(&self, message: &Message) -> Result<Outcome, ProcessError> {
        let args = {
            let ctx = message.context();
            args::build_args(&self.operation, &self.collection, &ctx)?
        };
        dispatch::dispatch(self.store.as_ref(), args, &self.write).await
    }

    pub async fn process_batch(&self, messages: Vec<Message>) -> Vec<Message> {
        batch::execute(self, messages, None).await
    }

    /// Like [`process_batch`](Self::process_batch), but unfinished messages
    /// get [`ProcessError::Cancelled`] once `signal` fires. Messages that
    /// already finished keep their results.
    pub async fn process_batch_with_signal(
        &self,
        messages: Vec<Message>,
        signal: &CancellationSignal,
    ) -> Vec<Message> {
        batch::execute(self, messages, Some(signal)).await
    }
}

#[async_trait]
impl BatchProcessor for DocumentProcessor {
    async fn process_batch(&self, messages: Vec<Message>) -> Vec<Message> {
        batch::execute(self, messages, None).await
    }

    async fn validate_connectivity(&self) -> Result<(), StoreError> {
        self.store.ping().await.map_err(|e| {
            warn!("[DocumentProcessor] Store is not reachable: {}", e);
            e
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn compile(
    source: Option<&str>,
    slot: MappingSlot,
) -> Result<Option<SharedMapping>, ConfigurationError> {
    source
        .map(|source| {
            Program::compile(source)
                .map(|program| Arc::new(program) as SharedMapping)
                .map_err(|e| ConfigurationError::MappingCompile { slot, source: e })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MappingError;
    use crate::core::mapping::{Mapping, MessageContext};
    use crate::core::store::MemoryStore;
    use serde_json::{json, Value as JsonValue};

    fn memory() -> Arc<dyn DocumentStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_compile_errors_name_the_slot() {
        let config = ProcessorConfig::new(OperationKind::FindOne, "c").with_filter_map("root = ");
        let err = DocumentProcessor::new(config, memory()).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MappingCompile {
                slot: MappingSlot::Filter,
                ..
            }
        ));
    }

    #[test]
    fn test_construction_errors() {
        let missing = ProcessorConfig::new(OperationKind::UpdateOne, "c").with_filter_map("root = this");
        assert!(matches!(
            DocumentProcessor::new(missing, memory()),
            Err(ConfigurationError::MissingMapping {
                slot: MappingSlot::Document,
                ..
            })
        ));

        let template = ProcessorConfig::new(OperationKind::InsertOne, "${! nope() }")
            .with_document_map("root = this");
        assert!(matches!(
            DocumentProcessor::new(template, memory()),
            Err(ConfigurationError::CollectionTemplate(_))
        ));

        let concern = ProcessorConfig::new(OperationKind::InsertOne, "c")
            .with_document_map("root = this")
            .with_write_concern("-1", false, "");
        assert!(matches!(
            DocumentProcessor::new(concern, memory()),
            Err(ConfigurationError::WriteConcern(_))
        ));

        let upsert = ProcessorConfig::new(OperationKind::DeleteOne, "c")
            .with_filter_map("root = this")
            .with_upsert(true);
        assert!(matches!(
            DocumentProcessor::new(upsert, memory()),
            Err(ConfigurationError::UnsupportedOption {
                option: "upsert",
                ..
            })
        ));
    }

    #[derive(Debug)]
    struct Fixed(JsonValue);

    impl Mapping for Fixed {
        fn evaluate(&self, _ctx: &MessageContext<'_>) -> Result<JsonValue, MappingError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_from_parts_accepts_custom_mappings() {
        let store = Arc::new(MemoryStore::new());
        let config = ProcessorConfig::new(OperationKind::InsertOne, "c");
        let processor = DocumentProcessor::from_parts(
            &config,
            MappingSet {
                document: Some(Arc::new(Fixed(json!({"fixed": true})))),
                ..Default::default()
            },
            store.clone(),
        )
        .unwrap();

        assert_eq!(processor.name(), "docstore-insert-one");
        let out = processor.process_batch(vec![Message::new("not json")]).await;
        assert!(!out[0].is_error());
        assert_eq!(out[0].payload(), b"not json");
        let stored = store.documents("c").await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].get_bool("fixed").unwrap());
    }

    #[tokio::test]
    async fn test_validate_connectivity_uses_store_ping() {
        let config = ProcessorConfig::new(OperationKind::DeleteMany, "c").with_filter_map("root = {}");
        let processor = DocumentProcessor::new(config, memory()).unwrap();
        assert!(processor.validate_connectivity().await.is_ok());
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod config;
pub mod document;
pub mod error;
pub mod mapping;
pub mod processor;
pub mod store;
pub mod util;

pub use self::config::{ConnectionConfig, ProcessorConfig};
pub use self::error::{ConfigurationError, ErrorKind, MappingError, ProcessError, StoreError};
pub use self::processor::{BatchProcessor, DocumentProcessor, MarshalMode, Message, OperationKind};
pub use self::store::{DocumentStore, MemoryStore, ReturnDocument};
pub use self::util::{CancelReason, CancellationSignal};

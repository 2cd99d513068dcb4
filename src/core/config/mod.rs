// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod connection;
pub mod processor_config;
pub mod write_concern;

pub use connection::ConnectionConfig;
pub use processor_config::{ProcessorConfig, DEFAULT_MAX_IN_FLIGHT};
pub use write_concern::{Acknowledgment, WriteConcern, WriteConcernConfig};

/// Flat property keys understood by `from_properties`
pub mod keys {
    pub const OPERATION: &str = "docstore.operation";
    pub const COLLECTION: &str = "docstore.collection";
    pub const FILTER_MAP: &str = "docstore.filter.map";
    pub const DOCUMENT_MAP: &str = "docstore.document.map";
    pub const SORT_MAP: &str = "docstore.sort.map";
    pub const UPSERT: &str = "docstore.upsert";
    pub const JSON_MARSHAL_MODE: &str = "docstore.json.marshal.mode";
    pub const RETURN_MODE: &str = "docstore.find.and.update.return.mode";
    pub const COMMENT: &str = "docstore.comment";
    pub const MAX_IN_FLIGHT: &str = "docstore.max.in.flight";
    pub const WRITE_CONCERN_W: &str = "docstore.write.concern.w";
    pub const WRITE_CONCERN_J: &str = "docstore.write.concern.j";
    pub const WRITE_CONCERN_W_TIMEOUT: &str = "docstore.write.concern.w.timeout";

    pub const URL: &str = "docstore.url";
    pub const DATABASE: &str = "docstore.database";
    pub const USERNAME: &str = "docstore.username";
    pub const PASSWORD: &str = "docstore.password";
    pub const APP_NAME: &str = "docstore.app.name";
}

//! Backing log store
//!
//! Components:
//! - `store_trait`: the `LogStore` trait the retrieval layer queries.
//! - `types`: request, page and cursor types shared by backends.
//! - `query_builder`: JSON bodies for Elasticsearch-compatible endpoints.
//! - `elasticsearch_store`: HTTP backend using reqwest's blocking client.
//! - `memory_store`: in-memory backend, also loadable from an NDJSON file.

pub mod elasticsearch_store;
pub mod memory_store;
pub mod query_builder;
pub mod store_trait;
pub mod types;

pub use elasticsearch_store::ElasticsearchStore;
pub use memory_store::MemoryStore;
pub use store_trait::LogStore;

use std::sync::Arc;

use crate::configuration::types::{StoreBackend, StoreConfig};
use crate::error_handling::types::StoreError;

/// Builds the store handle selected by configuration.
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn LogStore>, StoreError> {
    match config.backend {
        StoreBackend::Elasticsearch => Ok(Arc::new(ElasticsearchStore::new(config)?)),
        StoreBackend::File => {
            let path = config
                .file_path
                .as_ref()
                .ok_or_else(|| StoreError::ConnectionFailed("file backend without file_path".into()))?;
            Ok(Arc::new(MemoryStore::from_ndjson_file(path)?))
        }
    }
}

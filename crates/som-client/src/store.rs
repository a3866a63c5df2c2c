//! The document-store seam
//!
//! Everything above this crate talks to the search engine through
//! [`DocumentStore`]. Implementations must map a 404 to
//! [`StoreError::NotFound`](crate::StoreError::NotFound).

use crate::error::StoreResult;
use crate::types::{
    AliasAction, BulkResponse, ClusterInfo, ComponentTemplateItem, DataStream, IndexInfo,
    IndexPrivileges, IndexTemplate, IndexTemplateItem, IngestPipeline, OpType, Query,
    SearchResponse, StoredDocument,
};
use async_trait::async_trait;
use serde_json::Value;

/// Async client for the external document store
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Cluster identity and version
    async fn info(&self) -> StoreResult<ClusterInfo>;

    /// Resolve an index or single-index alias
    async fn get_index(&self, index: &str) -> StoreResult<IndexInfo>;

    /// Create a concrete index; conflict if it exists
    async fn create_index(&self, index: &str, mappings: Value, settings: Value) -> StoreResult<()>;

    /// Delete a concrete index
    async fn delete_index(&self, index: &str) -> StoreResult<()>;

    /// Make recent writes searchable
    async fn refresh(&self, index: &str) -> StoreResult<()>;

    /// Concrete indices behind an alias
    async fn get_alias(&self, alias: &str) -> StoreResult<Vec<String>>;

    /// Apply alias actions atomically
    async fn update_aliases(&self, actions: Vec<AliasAction>) -> StoreResult<()>;

    /// Fetch one document
    async fn get_document(&self, index: &str, id: &str) -> StoreResult<StoredDocument>;

    /// Write one document
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        source: Value,
        op_type: OpType,
    ) -> StoreResult<()>;

    /// Delete one document
    async fn delete_document(&self, index: &str, id: &str) -> StoreResult<()>;

    /// Write many documents
    async fn bulk_index(&self, index: &str, documents: Vec<StoredDocument>)
        -> StoreResult<BulkResponse>;

    /// One page of matching documents
    async fn search(
        &self,
        index: &str,
        query: Query,
        from: usize,
        size: usize,
    ) -> StoreResult<SearchResponse>;

    /// Every document of an index, in a stable order, read `batch_size` at a time
    async fn scan_all(&self, index: &str, batch_size: usize) -> StoreResult<Vec<StoredDocument>>;

    /// Document count
    async fn count(&self, index: &str) -> StoreResult<u64>;

    /// Data streams matching `name`
    async fn get_data_stream(&self, name: &str) -> StoreResult<Vec<DataStream>>;

    /// Create a data stream from its matching index template
    async fn create_data_stream(&self, name: &str) -> StoreResult<()>;

    /// Delete a data stream and its backing indices
    async fn delete_data_stream(&self, name: &str) -> StoreResult<()>;

    /// Every index template
    async fn get_index_templates(&self) -> StoreResult<Vec<IndexTemplateItem>>;

    /// Index templates matching `name`
    async fn get_index_template(&self, name: &str) -> StoreResult<Vec<IndexTemplateItem>>;

    /// Create or replace an index template
    async fn put_index_template(&self, name: &str, template: IndexTemplate) -> StoreResult<()>;

    /// Delete an index template
    async fn delete_index_template(&self, name: &str) -> StoreResult<()>;

    /// Component templates matching `name`
    async fn get_component_templates(&self, name: &str) -> StoreResult<Vec<ComponentTemplateItem>>;

    /// Create or replace a component template
    async fn put_component_template(&self, name: &str, template: Value) -> StoreResult<()>;

    /// Delete a component template
    async fn delete_component_template(&self, name: &str) -> StoreResult<()>;

    /// Fetch an ingest pipeline
    async fn get_pipeline(&self, id: &str) -> StoreResult<IngestPipeline>;

    /// Create or replace an ingest pipeline
    async fn put_pipeline(&self, id: &str, pipeline: IngestPipeline) -> StoreResult<()>;

    /// Delete an ingest pipeline
    async fn delete_pipeline(&self, id: &str) -> StoreResult<()>;

    /// Index privileges of the current user
    async fn has_privileges(
        &self,
        names: &[String],
        privileges: &[String],
    ) -> StoreResult<IndexPrivileges>;
}

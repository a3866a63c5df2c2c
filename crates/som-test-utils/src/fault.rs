//! Store wrapper that fails chosen calls

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use som_client::{
    AliasAction, BulkResponse, ClusterInfo, ComponentTemplateItem, DataStream, DocumentStore, IndexInfo,
    IndexPrivileges, IndexTemplate, IndexTemplateItem, IngestPipeline, OpType, Query, SearchResponse, StoreError,
    StoreResult, StoredDocument,
};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
struct Fault {
    method: String,
    target: Option<String>,
    error: StoreError,
    remaining: Option<usize>,
}

/// Wraps a store and fails configured calls with a given [`StoreError`]
///
/// Faults match on the trait method name and optionally on the first
/// argument (index, pipeline, template...). The first matching fault wins.
pub struct FaultInjectingStore {
    inner: Arc<dyn DocumentStore>,
    faults: Mutex<Vec<Fault>>,
    injected: Mutex<Vec<String>>,
}

impl fmt::Debug for FaultInjectingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultInjectingStore")
            .field("faults", &self.faults.lock().len())
            .finish_non_exhaustive()
    }
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Vec::new()),
            injected: Mutex::new(Vec::new()),
        }
    }

    /// Fail every call to `method`
    #[must_use]
    pub fn fail_on(self, method: &str, error: StoreError) -> Self {
        self.push(method, None, error, None);
        self
    }

    /// Fail calls to `method` whose first argument is `target`
    #[must_use]
    pub fn fail_on_target(self, method: &str, target: &str, error: StoreError) -> Self {
        self.push(method, Some(target), error, None);
        self
    }

    /// Fail the next `times` calls to `method`, then pass through
    #[must_use]
    pub fn fail_times(self, method: &str, times: usize, error: StoreError) -> Self {
        self.push(method, None, error, Some(times));
        self
    }

    /// Remove every fault
    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    /// `"<method> <target>"` of every failed call
    pub fn injected(&self) -> Vec<String> {
        self.injected.lock().clone()
    }

    fn push(&self, method: &str, target: Option<&str>, error: StoreError, remaining: Option<usize>) {
        self.faults.lock().push(Fault {
            method: method.to_string(),
            target: target.map(str::to_string),
            error,
            remaining,
        });
    }

    fn check(&self, method: &str, target: &str) -> StoreResult<()> {
        let mut faults = self.faults.lock();
        let Some(position) = faults.iter().position(|f| {
            f.method == method
                && f.target.as_deref().map_or(true, |t| t == target)
                && f.remaining.map_or(true, |n| n > 0)
        }) else {
            return Ok(());
        };

        let fault = &mut faults[position];
        if let Some(remaining) = fault.remaining.as_mut() {
            *remaining -= 1;
        }
        let error = fault.error.clone();
        drop(faults);

        tracing::debug!(method, target, error = %error, "injecting store fault");
        self.injected.lock().push(format!("{method} {target}"));
        Err(error)
    }
}

#[async_trait]
impl DocumentStore for FaultInjectingStore {
    async fn info(&self) -> StoreResult<ClusterInfo> {
        self.check("info", "")?;
        self.inner.info().await
    }

    async fn get_index(&self, index: &str) -> StoreResult<IndexInfo> {
        self.check("get_index", index)?;
        self.inner.get_index(index).await
    }

    async fn create_index(&self, index: &str, mappings: Value, settings: Value) -> StoreResult<()> {
        self.check("create_index", index)?;
        self.inner.create_index(index, mappings, settings).await
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        self.check("delete_index", index)?;
        self.inner.delete_index(index).await
    }

    async fn refresh(&self, index: &str) -> StoreResult<()> {
        self.check("refresh", index)?;
        self.inner.refresh(index).await
    }

    async fn get_alias(&self, alias: &str) -> StoreResult<Vec<String>> {
        self.check("get_alias", alias)?;
        self.inner.get_alias(alias).await
    }

    async fn update_aliases(&self, actions: Vec<AliasAction>) -> StoreResult<()> {
        self.check("update_aliases", "")?;
        self.inner.update_aliases(actions).await
    }

    async fn get_document(&self, index: &str, id: &str) -> StoreResult<StoredDocument> {
        self.check("get_document", index)?;
        self.inner.get_document(index, id).await
    }

    async fn index_document(&self, index: &str, id: &str, source: Value, op_type: OpType) -> StoreResult<()> {
        self.check("index_document", index)?;
        self.inner.index_document(index, id, source, op_type).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> StoreResult<()> {
        self.check("delete_document", index)?;
        self.inner.delete_document(index, id).await
    }

    async fn bulk_index(&self, index: &str, documents: Vec<StoredDocument>) -> StoreResult<BulkResponse> {
        self.check("bulk_index", index)?;
        self.inner.bulk_index(index, documents).await
    }

    async fn search(&self, index: &str, query: Query, from: usize, size: usize) -> StoreResult<SearchResponse> {
        self.check("search", index)?;
        self.inner.search(index, query, from, size).await
    }

    async fn scan_all(&self, index: &str, batch_size: usize) -> StoreResult<Vec<StoredDocument>> {
        self.check("scan_all", index)?;
        self.inner.scan_all(index, batch_size).await
    }

    async fn count(&self, index: &str) -> StoreResult<u64> {
        self.check("count", index)?;
        self.inner.count(index).await
    }

    async fn get_data_stream(&self, name: &str) -> StoreResult<Vec<DataStream>> {
        self.check("get_data_stream", name)?;
        self.inner.get_data_stream(name).await
    }

    async fn create_data_stream(&self, name: &str) -> StoreResult<()> {
        self.check("create_data_stream", name)?;
        self.inner.create_data_stream(name).await
    }

    async fn delete_data_stream(&self, name: &str) -> StoreResult<()> {
        self.check("delete_data_stream", name)?;
        self.inner.delete_data_stream(name).await
    }

    async fn get_index_templates(&self) -> StoreResult<Vec<IndexTemplateItem>> {
        self.check("get_index_templates", "")?;
        self.inner.get_index_templates().await
    }

    async fn get_index_template(&self, name: &str) -> StoreResult<Vec<IndexTemplateItem>> {
        self.check("get_index_template", name)?;
        self.inner.get_index_template(name).await
    }

    async fn put_index_template(&self, name: &str, template: IndexTemplate) -> StoreResult<()> {
        self.check("put_index_template", name)?;
        self.inner.put_index_template(name, template).await
    }

    async fn delete_index_template(&self, name: &str) -> StoreResult<()> {
        self.check("delete_index_template", name)?;
        self.inner.delete_index_template(name).await
    }

    async fn get_component_templates(&self, name: &str) -> StoreResult<Vec<ComponentTemplateItem>> {
        self.check("get_component_templates", name)?;
        self.inner.get_component_templates(name).await
    }

    async fn put_component_template(&self, name: &str, template: Value) -> StoreResult<()> {
        self.check("put_component_template", name)?;
        self.inner.put_component_template(name, template).await
    }

    async fn delete_component_template(&self, name: &str) -> StoreResult<()> {
        self.check("delete_component_template", name)?;
        self.inner.delete_component_template(name).await
    }

    async fn get_pipeline(&self, id: &str) -> StoreResult<IngestPipeline> {
        self.check("get_pipeline", id)?;
        self.inner.get_pipeline(id).await
    }

    async fn put_pipeline(&self, id: &str, pipeline: IngestPipeline) -> StoreResult<()> {
        self.check("put_pipeline", id)?;
        self.inner.put_pipeline(id, pipeline).await
    }

    async fn delete_pipeline(&self, id: &str) -> StoreResult<()> {
        self.check("delete_pipeline", id)?;
        self.inner.delete_pipeline(id).await
    }

    async fn has_privileges(&self, names: &[String], privileges: &[String]) -> StoreResult<IndexPrivileges> {
        self.check("has_privileges", &names.join(","))?;
        self.inner.has_privileges(names, privileges).await
    }
}

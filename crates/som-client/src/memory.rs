//! In-memory document store
//!
//! Deterministic stand-in for the search engine: documents are kept sorted
//! by id, aliases resolve like the real thing, and deletes of assets still in
//! use are rejected the way the engine rejects them. Every trait call is
//! recorded as `"<method> <target>"` so tests can assert on ordering.

use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;
use crate::types::{
    wildcard_match, AliasAction, BulkResponse, ClusterInfo, ComponentTemplateItem, DataStream,
    DataStreamIndex, DataStreamLifecycle, IndexInfo, IndexPrivileges, IndexTemplate,
    IndexTemplateItem, IngestPipeline, OpType, Query, SearchResponse, StoredDocument,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use som_config::deep_merge;
use std::collections::{BTreeMap, BTreeSet};

/// Version reported by [`DocumentStore::info`]
const MEMORY_STORE_VERSION: &str = "8.18.0";

#[derive(Debug, Default)]
struct MemIndex {
    mappings: Value,
    settings: Value,
    docs: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, MemIndex>,
    /// alias -> concrete indices
    aliases: BTreeMap<String, BTreeSet<String>>,
    data_streams: BTreeMap<String, DataStream>,
    index_templates: BTreeMap<String, IndexTemplate>,
    component_templates: BTreeMap<String, Value>,
    pipelines: BTreeMap<String, IngestPipeline>,
    privileges: IndexPrivileges,
    calls: Vec<String>,
}

impl State {
    fn record(&mut self, method: &str, target: &str) {
        self.calls.push(format!("{method} {target}"));
    }

    fn aliases_of(&self, index: &str) -> BTreeSet<String> {
        self.aliases
            .iter()
            .filter(|(_, indices)| indices.contains(index))
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    /// Single concrete index behind a name
    fn resolve(&self, name: &str) -> StoreResult<String> {
        if self.indices.contains_key(name) {
            return Ok(name.to_string());
        }
        match self.aliases.get(name) {
            Some(indices) if indices.len() == 1 => Ok(indices.iter().next().cloned().unwrap_or_default()),
            Some(indices) if indices.len() > 1 => Err(StoreError::status(
                400,
                format!("alias [{name}] has more than one index associated with it"),
            )),
            _ => self
                .data_streams
                .get(name)
                .and_then(|ds| ds.write_index().map(str::to_string))
                .ok_or_else(|| StoreError::not_found(name)),
        }
    }

    /// Concrete indices behind a comma-separated, possibly wildcarded expression
    fn resolve_many(&self, expression: &str) -> StoreResult<BTreeSet<String>> {
        let mut resolved = BTreeSet::new();
        for part in expression.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.contains('*') {
                resolved.extend(
                    self.indices
                        .keys()
                        .filter(|index| wildcard_match(part, index))
                        .cloned(),
                );
                for (alias, indices) in &self.aliases {
                    if wildcard_match(part, alias) {
                        resolved.extend(indices.iter().cloned());
                    }
                }
            } else if self.indices.contains_key(part) {
                resolved.insert(part.to_string());
            } else if let Some(indices) = self.aliases.get(part) {
                resolved.extend(indices.iter().cloned());
            } else if let Some(ds) = self.data_streams.get(part) {
                resolved.extend(ds.indices.iter().map(|i| i.index_name.clone()));
            } else {
                return Err(StoreError::not_found(part));
            }
        }
        Ok(resolved)
    }

    /// Index for a write, auto-creating it like the engine does
    fn write_target(&mut self, name: &str) -> StoreResult<String> {
        match self.resolve(name) {
            Ok(index) => Ok(index),
            Err(e) if e.is_not_found() => {
                self.indices.insert(name.to_string(), MemIndex::default());
                Ok(name.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn documents(&self, expression: &str) -> StoreResult<Vec<StoredDocument>> {
        let indices = self.resolve_many(expression)?;
        Ok(indices
            .iter()
            .filter_map(|index| self.indices.get(index))
            .flat_map(|index| {
                index
                    .docs
                    .iter()
                    .map(|(id, source)| StoredDocument::new(id.clone(), source.clone()))
            })
            .collect())
    }

    /// Highest-priority data-stream template matching `name`
    fn data_stream_template(&self, name: &str) -> Option<(String, IndexTemplate)> {
        self.index_templates
            .iter()
            .filter(|(_, t)| t.data_stream.is_some() && t.matches(name))
            .max_by_key(|(_, t)| t.priority.unwrap_or(0))
            .map(|(n, t)| (n.clone(), t.clone()))
    }

    /// Component templates then the index template's own block, merged in order
    fn composed_template(&self, template: &IndexTemplate) -> Value {
        let mut composed = json!({});
        for component in &template.composed_of {
            if let Some(body) = self.component_templates.get(component).and_then(|c| c.get("template")) {
                composed = deep_merge(composed, body.clone());
            }
        }
        if let Some(own) = &template.template {
            composed = deep_merge(composed, own.clone());
        }
        composed
    }

    fn matches_names<'a, T>(
        items: &'a BTreeMap<String, T>,
        name: &str,
    ) -> StoreResult<Vec<(&'a String, &'a T)>> {
        let found: Vec<_> = items.iter().filter(|(n, _)| wildcard_match(name, n)).collect();
        if found.is_empty() && !name.contains('*') {
            return Err(StoreError::not_found(name));
        }
        Ok(found)
    }
}

/// Deterministic in-memory [`DocumentStore`]
#[derive(Debug)]
pub struct MemoryDocumentStore {
    state: Mutex<State>,
    default_access: bool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Empty store granting every privilege
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            default_access: true,
        }
    }

    /// Privilege reported for names without an explicit entry
    #[inline]
    #[must_use]
    pub fn with_default_access(mut self, granted: bool) -> Self {
        self.default_access = granted;
        self
    }

    /// Calls recorded so far, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Concrete index names
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.state.lock().indices.keys().cloned().collect()
    }

    /// Whether a concrete index exists
    #[must_use]
    pub fn has_index(&self, index: &str) -> bool {
        self.state.lock().indices.contains_key(index)
    }

    /// Documents behind an index expression, sorted by index then id; empty if absent
    #[must_use]
    pub fn documents(&self, index: &str) -> Vec<StoredDocument> {
        self.state.lock().documents(index).unwrap_or_default()
    }

    /// Seed a raw document without recording a call
    pub fn insert_document(&self, index: &str, id: &str, source: Value) {
        let mut state = self.state.lock();
        let target = state.write_target(index).unwrap_or_else(|_| index.to_string());
        if let Some(entry) = state.indices.get_mut(&target) {
            entry.docs.insert(id.to_string(), source);
        }
    }

    /// Seed a data stream; missing backing indices are created and the
    /// write index receives `write_index_settings`
    pub fn insert_data_stream(&self, stream: DataStream, write_index_settings: Value) {
        let mut state = self.state.lock();
        let write_index = stream.write_index().map(str::to_string);
        for backing in &stream.indices {
            state.indices.entry(backing.index_name.clone()).or_default();
        }
        if let Some(write_index) = write_index {
            if let Some(index) = state.indices.get_mut(&write_index) {
                index.settings = write_index_settings;
            }
        }
        state.data_streams.insert(stream.name.clone(), stream);
    }

    /// Set privileges reported for `name`
    pub fn set_privileges(&self, name: &str, privileges: BTreeMap<String, bool>) {
        self.state.lock().privileges.insert(name.to_string(), privileges);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn info(&self) -> StoreResult<ClusterInfo> {
        self.state.lock().record("info", "");
        Ok(ClusterInfo {
            cluster_name: "memory".to_string(),
            version: MEMORY_STORE_VERSION.to_string(),
        })
    }

    async fn get_index(&self, index: &str) -> StoreResult<IndexInfo> {
        let mut state = self.state.lock();
        state.record("get_index", index);
        let name = state.resolve(index)?;
        let aliases = state.aliases_of(&name);
        let entry = state
            .indices
            .get(&name)
            .ok_or_else(|| StoreError::not_found(index))?;
        Ok(IndexInfo {
            name: name.clone(),
            aliases,
            mappings: entry.mappings.clone(),
            settings: entry.settings.clone(),
        })
    }

    async fn create_index(&self, index: &str, mappings: Value, settings: Value) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("create_index", index);
        if state.indices.contains_key(index) || state.aliases.contains_key(index) {
            return Err(StoreError::conflict(index));
        }
        state.indices.insert(
            index.to_string(),
            MemIndex {
                mappings,
                settings,
                docs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_index", index);
        let targets = state.resolve_many(index)?;
        for target in targets {
            state.indices.remove(&target);
            for indices in state.aliases.values_mut() {
                indices.remove(&target);
            }
        }
        state.aliases.retain(|_, indices| !indices.is_empty());
        Ok(())
    }

    async fn refresh(&self, index: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("refresh", index);
        state.resolve_many(index).map(|_| ())
    }

    async fn get_alias(&self, alias: &str) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock();
        state.record("get_alias", alias);
        state
            .aliases
            .get(alias)
            .map(|indices| indices.iter().cloned().collect())
            .ok_or_else(|| StoreError::not_found(alias))
    }

    async fn update_aliases(&self, actions: Vec<AliasAction>) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("update_aliases", &actions.len().to_string());

        let removed: BTreeSet<&str> = actions
            .iter()
            .filter_map(|a| match a {
                AliasAction::RemoveIndex { index } => Some(index.as_str()),
                _ => None,
            })
            .collect();

        // validate the whole batch before applying any of it
        for action in &actions {
            match action {
                AliasAction::Add { index, alias } => {
                    if !state.indices.contains_key(index) || removed.contains(index.as_str()) {
                        return Err(StoreError::not_found(index.as_str()));
                    }
                    if state.indices.contains_key(alias) && !removed.contains(alias.as_str()) {
                        return Err(StoreError::status(
                            400,
                            format!("an index exists with the same name as the alias [{alias}]"),
                        ));
                    }
                }
                AliasAction::Remove { index, alias } => {
                    let attached = state
                        .aliases
                        .get(alias)
                        .is_some_and(|indices| indices.contains(index));
                    if !attached {
                        return Err(StoreError::not_found(format!("{index}/{alias}")));
                    }
                }
                AliasAction::RemoveIndex { index } => {
                    if !state.indices.contains_key(index) {
                        return Err(StoreError::not_found(index.as_str()));
                    }
                }
            }
        }

        // removals first so an alias may take over a removed index's name
        let (removals, others): (Vec<_>, Vec<_>) = actions
            .into_iter()
            .partition(|a| matches!(a, AliasAction::RemoveIndex { .. }));
        for action in removals {
            if let AliasAction::RemoveIndex { index } = action {
                state.indices.remove(&index);
                for indices in state.aliases.values_mut() {
                    indices.remove(&index);
                }
            }
        }

        for action in others {
            match action {
                AliasAction::Add { index, alias } => {
                    state.aliases.entry(alias).or_default().insert(index);
                }
                AliasAction::Remove { index, alias } => {
                    if let Some(indices) = state.aliases.get_mut(&alias) {
                        indices.remove(&index);
                    }
                }
                AliasAction::RemoveIndex { .. } => {}
            }
        }
        state.aliases.retain(|_, indices| !indices.is_empty());
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> StoreResult<StoredDocument> {
        let mut state = self.state.lock();
        state.record("get_document", &format!("{index}/{id}"));
        let name = state.resolve(index)?;
        state
            .indices
            .get(&name)
            .and_then(|entry| entry.docs.get(id))
            .map(|source| StoredDocument::new(id, source.clone()))
            .ok_or_else(|| StoreError::not_found(format!("{index}/{id}")))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        source: Value,
        op_type: OpType,
    ) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("index_document", &format!("{index}/{id}"));
        let name = state.write_target(index)?;
        let entry = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| StoreError::not_found(index))?;
        if op_type == OpType::Create && entry.docs.contains_key(id) {
            return Err(StoreError::conflict(format!("{index}/{id}")));
        }
        entry.docs.insert(id.to_string(), source);
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_document", &format!("{index}/{id}"));
        let name = state.resolve(index)?;
        state
            .indices
            .get_mut(&name)
            .and_then(|entry| entry.docs.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("{index}/{id}")))
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: Vec<StoredDocument>,
    ) -> StoreResult<BulkResponse> {
        let mut state = self.state.lock();
        state.record("bulk_index", index);
        let name = state.write_target(index)?;
        let entry = state
            .indices
            .get_mut(&name)
            .ok_or_else(|| StoreError::not_found(index))?;
        let items = documents.len();
        for document in documents {
            entry.docs.insert(document.id, document.source);
        }
        Ok(BulkResponse {
            items,
            errors: Vec::new(),
        })
    }

    async fn search(
        &self,
        index: &str,
        query: Query,
        from: usize,
        size: usize,
    ) -> StoreResult<SearchResponse> {
        let mut state = self.state.lock();
        state.record("search", index);
        let matching: Vec<StoredDocument> = state
            .documents(index)?
            .into_iter()
            .filter(|doc| query.matches(&doc.source))
            .collect();
        Ok(SearchResponse {
            total: matching.len() as u64,
            hits: matching.into_iter().skip(from).take(size).collect(),
        })
    }

    async fn scan_all(&self, index: &str, _batch_size: usize) -> StoreResult<Vec<StoredDocument>> {
        let mut state = self.state.lock();
        state.record("scan_all", index);
        state.documents(index)
    }

    async fn count(&self, index: &str) -> StoreResult<u64> {
        let mut state = self.state.lock();
        state.record("count", index);
        state.documents(index).map(|docs| docs.len() as u64)
    }

    async fn get_data_stream(&self, name: &str) -> StoreResult<Vec<DataStream>> {
        let mut state = self.state.lock();
        state.record("get_data_stream", name);
        State::matches_names(&state.data_streams, name)
            .map(|found| found.into_iter().map(|(_, ds)| ds.clone()).collect())
    }

    async fn create_data_stream(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("create_data_stream", name);
        if state.data_streams.contains_key(name) {
            return Err(StoreError::conflict(name));
        }
        let (template_name, template) = state.data_stream_template(name).ok_or_else(|| {
            StoreError::status(400, format!("no matching index template found for data stream [{name}]"))
        })?;

        let composed = state.composed_template(&template);
        let backing = format!(".ds-{name}-000001");
        state.indices.insert(
            backing.clone(),
            MemIndex {
                mappings: composed.get("mappings").cloned().unwrap_or_else(|| json!({})),
                settings: composed.get("settings").cloned().unwrap_or_else(|| json!({})),
                docs: BTreeMap::new(),
            },
        );

        let mut stream = DataStream::new(name, template_name);
        stream.indices.push(DataStreamIndex { index_name: backing });
        stream.lifecycle = composed
            .get("lifecycle")
            .and_then(|l| serde_json::from_value::<DataStreamLifecycle>(l.clone()).ok());
        stream.ilm_policy = composed
            .pointer("/settings/index/lifecycle/name")
            .or_else(|| composed.pointer("/settings/index.lifecycle.name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        state.data_streams.insert(name.to_string(), stream);
        Ok(())
    }

    async fn delete_data_stream(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_data_stream", name);
        let stream = state
            .data_streams
            .remove(name)
            .ok_or_else(|| StoreError::not_found(name))?;
        for backing in stream.indices {
            state.indices.remove(&backing.index_name);
        }
        Ok(())
    }

    async fn get_index_templates(&self) -> StoreResult<Vec<IndexTemplateItem>> {
        let mut state = self.state.lock();
        state.record("get_index_templates", "*");
        Ok(state
            .index_templates
            .iter()
            .map(|(name, template)| IndexTemplateItem {
                name: name.clone(),
                index_template: template.clone(),
            })
            .collect())
    }

    async fn get_index_template(&self, name: &str) -> StoreResult<Vec<IndexTemplateItem>> {
        let mut state = self.state.lock();
        state.record("get_index_template", name);
        State::matches_names(&state.index_templates, name).map(|found| {
            found
                .into_iter()
                .map(|(n, t)| IndexTemplateItem {
                    name: n.clone(),
                    index_template: t.clone(),
                })
                .collect()
        })
    }

    async fn put_index_template(&self, name: &str, template: IndexTemplate) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("put_index_template", name);
        let missing: Vec<&String> = template
            .composed_of
            .iter()
            .filter(|c| {
                !state.component_templates.contains_key(*c)
                    && !template.ignore_missing_component_templates.contains(*c)
            })
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::status(
                400,
                format!("index template [{name}] specifies component templates {missing:?} that do not exist"),
            ));
        }
        state.index_templates.insert(name.to_string(), template);
        Ok(())
    }

    async fn delete_index_template(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_index_template", name);
        if !state.index_templates.contains_key(name) {
            return Err(StoreError::not_found(name));
        }
        if let Some(stream) = state.data_streams.values().find(|ds| ds.template == name) {
            return Err(StoreError::status(
                400,
                format!("unable to remove index template [{name}], data stream [{}] uses it", stream.name),
            ));
        }
        state.index_templates.remove(name);
        Ok(())
    }

    async fn get_component_templates(&self, name: &str) -> StoreResult<Vec<ComponentTemplateItem>> {
        let mut state = self.state.lock();
        state.record("get_component_templates", name);
        State::matches_names(&state.component_templates, name).map(|found| {
            found
                .into_iter()
                .map(|(n, body)| ComponentTemplateItem {
                    name: n.clone(),
                    component_template: body.clone(),
                })
                .collect()
        })
    }

    async fn put_component_template(&self, name: &str, template: Value) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("put_component_template", name);
        state.component_templates.insert(name.to_string(), template);
        Ok(())
    }

    async fn delete_component_template(&self, name: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_component_template", name);
        if !state.component_templates.contains_key(name) {
            return Err(StoreError::not_found(name));
        }
        if let Some((user, _)) = state
            .index_templates
            .iter()
            .find(|(_, t)| t.composed_of.iter().any(|c| c == name))
        {
            return Err(StoreError::status(
                400,
                format!("component template [{name}] cannot be removed as it is still in use by index template [{user}]"),
            ));
        }
        state.component_templates.remove(name);
        Ok(())
    }

    async fn get_pipeline(&self, id: &str) -> StoreResult<IngestPipeline> {
        let mut state = self.state.lock();
        state.record("get_pipeline", id);
        state
            .pipelines
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn put_pipeline(&self, id: &str, pipeline: IngestPipeline) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("put_pipeline", id);
        state.pipelines.insert(id.to_string(), pipeline);
        Ok(())
    }

    async fn delete_pipeline(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.record("delete_pipeline", id);
        if !state.pipelines.contains_key(id) {
            return Err(StoreError::not_found(id));
        }
        let in_use = state.indices.iter().find(|(name, index)| {
            let info = IndexInfo {
                name: (*name).clone(),
                settings: index.settings.clone(),
                ..IndexInfo::default()
            };
            info.default_pipeline() == Some(id)
        });
        if let Some((index, _)) = in_use {
            return Err(StoreError::status(
                400,
                format!("pipeline [{id}] cannot be deleted because it is the default pipeline for index [{index}]"),
            ));
        }
        state.pipelines.remove(id);
        Ok(())
    }

    async fn has_privileges(
        &self,
        names: &[String],
        privileges: &[String],
    ) -> StoreResult<IndexPrivileges> {
        let mut state = self.state.lock();
        state.record("has_privileges", &names.join(","));
        let default_access = self.default_access;
        Ok(names
            .iter()
            .map(|name| {
                let granted = state.privileges.get(name);
                let per_privilege = privileges
                    .iter()
                    .map(|p| {
                        let allowed = granted.map_or(default_access, |g| g.get(p).copied().unwrap_or(false));
                        (p.clone(), allowed)
                    })
                    .collect();
                (name.clone(), per_privilege)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn alias_swap_is_atomic() {
        let store = MemoryDocumentStore::new();
        store.create_index("a_1", json!({}), json!({})).await.unwrap();
        store.create_index("a_2", json!({}), json!({})).await.unwrap();
        store.update_aliases(vec![AliasAction::add("a_1", "a")]).await.unwrap();

        // second action fails, first must not be applied
        let err = store
            .update_aliases(vec![
                AliasAction::remove("a_1", "a"),
                AliasAction::remove("a_2", "a"),
            ])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.get_alias("a").await.unwrap(), vec!["a_1".to_string()]);

        store
            .update_aliases(vec![AliasAction::remove("a_1", "a"), AliasAction::add("a_2", "a")])
            .await
            .unwrap();
        assert_eq!(store.get_index("a").await.unwrap().name, "a_2");
    }

    #[tokio::test]
    async fn remove_index_frees_name_for_alias() {
        let store = MemoryDocumentStore::new();
        store.insert_document(".kibana", "config:1", json!({"type": "config"}));
        store.create_index(".kibana_8.18.0_001", json!({}), json!({})).await.unwrap();

        let err = store
            .update_aliases(vec![AliasAction::add(".kibana_8.18.0_001", ".kibana")])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        store
            .update_aliases(vec![
                AliasAction::remove_index(".kibana"),
                AliasAction::add(".kibana_8.18.0_001", ".kibana"),
            ])
            .await
            .unwrap();
        assert!(!store.has_index(".kibana"));
        assert_eq!(store.get_index(".kibana").await.unwrap().name, ".kibana_8.18.0_001");
    }

    #[tokio::test]
    async fn create_conflicts_on_existing_index() {
        let store = MemoryDocumentStore::new();
        store.create_index("x", json!({}), json!({})).await.unwrap();
        let err = store.create_index("x", json!({}), json!({})).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn documents_are_sorted_and_searchable() {
        let store = MemoryDocumentStore::new();
        store.create_index("idx", json!({}), json!({})).await.unwrap();
        store
            .bulk_index(
                "idx",
                vec![
                    StoredDocument::new("b", json!({"type": "x"})),
                    StoredDocument::new("a", json!({"type": "y"})),
                    StoredDocument::new("c", json!({"type": "x"})),
                ],
            )
            .await
            .unwrap();

        let ids: Vec<String> = store.scan_all("idx", 2).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let page = store.search("idx", Query::term("type", "x"), 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].id, "c");
        assert_eq!(store.count("idx").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn op_type_create_conflicts() {
        let store = MemoryDocumentStore::new();
        store.index_document("idx", "1", json!({}), OpType::Create).await.unwrap();
        let err = store
            .index_document("idx", "1", json!({}), OpType::Create)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        store.index_document("idx", "1", json!({"v": 2}), OpType::Index).await.unwrap();
        assert_eq!(store.get_document("idx", "1").await.unwrap().source, json!({"v": 2}));
    }

    #[tokio::test]
    async fn missing_assets_are_not_found() {
        let store = MemoryDocumentStore::new();
        assert!(store.delete_data_stream("logs").await.unwrap_err().is_not_found());
        assert!(store.delete_index_template("logs@stream").await.unwrap_err().is_not_found());
        assert!(store.delete_component_template("c").await.unwrap_err().is_not_found());
        assert!(store.delete_pipeline("p").await.unwrap_err().is_not_found());
        assert!(store.get_pipeline("p").await.unwrap_err().is_not_found());
        assert!(store.get_data_stream("logs").await.unwrap_err().is_not_found());
        assert!(store.get_data_stream("logs-*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_stream_created_from_template() {
        let store = MemoryDocumentStore::new();
        store
            .put_component_template("logs@stream.layer", json!({"template": {"mappings": {"properties": {"a": {"type": "keyword"}}}}}))
            .await
            .unwrap();
        store
            .put_index_template(
                "logs@stream",
                IndexTemplate {
                    index_patterns: vec!["logs".into(), "logs.*".into()],
                    composed_of: vec!["logs@stream.layer".into()],
                    priority: Some(200),
                    data_stream: Some(json!({})),
                    template: Some(json!({
                        "settings": {"index": {"default_pipeline": "logs@stream.processing"}},
                        "lifecycle": {"enabled": true, "data_retention": "7d"}
                    })),
                    ..IndexTemplate::default()
                },
            )
            .await
            .unwrap();
        store.create_data_stream("logs").await.unwrap();

        let ds = store.get_data_stream("logs").await.unwrap().remove(0);
        assert_eq!(ds.template, "logs@stream");
        assert_eq!(ds.write_index(), Some(".ds-logs-000001"));
        assert_eq!(ds.lifecycle.unwrap().data_retention.as_deref(), Some("7d"));

        let write = store.get_index(".ds-logs-000001").await.unwrap();
        assert_eq!(write.default_pipeline(), Some("logs@stream.processing"));
        assert!(write.mappings.pointer("/properties/a").is_some());
    }

    #[tokio::test]
    async fn assets_in_use_cannot_be_deleted() {
        let store = MemoryDocumentStore::new();
        store.put_component_template("c", json!({"template": {}})).await.unwrap();
        store
            .put_index_template(
                "t",
                IndexTemplate {
                    index_patterns: vec!["s*".into()],
                    composed_of: vec!["c".into()],
                    data_stream: Some(json!({})),
                    ..IndexTemplate::default()
                },
            )
            .await
            .unwrap();
        store.create_data_stream("s").await.unwrap();

        assert_eq!(store.delete_component_template("c").await.unwrap_err().status_code(), Some(400));
        assert_eq!(store.delete_index_template("t").await.unwrap_err().status_code(), Some(400));

        store.delete_data_stream("s").await.unwrap();
        store.delete_index_template("t").await.unwrap();
        store.delete_component_template("c").await.unwrap();
    }

    #[tokio::test]
    async fn index_template_requires_components() {
        let store = MemoryDocumentStore::new();
        let template = IndexTemplate {
            index_patterns: vec!["x*".into()],
            composed_of: vec!["missing".into()],
            ..IndexTemplate::default()
        };
        let err = store.put_index_template("t", template.clone()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        let tolerant = IndexTemplate {
            ignore_missing_component_templates: vec!["missing".into()],
            ..template
        };
        store.put_index_template("t", tolerant).await.unwrap();
    }

    #[tokio::test]
    async fn privileges_default_and_explicit() {
        let store = MemoryDocumentStore::new();
        store.set_privileges("locked", BTreeMap::from([("read".to_string(), true)]));
        let result = store
            .has_privileges(
                &["open".to_string(), "locked".to_string()],
                &["read".to_string(), "write".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(result["open"]["write"], true);
        assert_eq!(result["locked"]["read"], true);
        assert_eq!(result["locked"]["write"], false);
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let store = MemoryDocumentStore::new();
        let _ = store.delete_data_stream("s").await;
        let _ = store.delete_pipeline("p").await;
        assert_eq!(store.calls(), vec!["delete_data_stream s", "delete_pipeline p"]);
        store.clear_calls();
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn wildcard_expression_spans_aliases() {
        let store = MemoryDocumentStore::new();
        store.insert_document(".kibana_1", "a", json!({}));
        store.insert_document(".kibana_task_manager_1", "b", json!({}));
        store.insert_document("other", "c", json!({}));
        assert_eq!(store.count(".kibana*").await.unwrap(), 2);
        assert!(store.count("missing").await.unwrap_err().is_not_found());
    }
}

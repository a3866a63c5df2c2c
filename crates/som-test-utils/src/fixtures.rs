//! Fixture types, documents and cluster helpers

use crate::kit::{DEFAULT_KIBANA_INDEX, DEFAULT_KIBANA_TASK_INDEX};
use serde_json::{json, Value};
use som_client::DocumentStore;
use som_registry::{ModelVersion, SavedObjectDoc, TransformError, TypeDefinition};
use std::collections::BTreeMap;

/// Every saved-object index alias a test may create
pub const ALL_SAVED_OBJECT_INDICES: [&str; 7] = [
    ".kibana",
    ".kibana_task_manager",
    ".kibana_alerting_cases",
    ".kibana_analytics",
    ".kibana_ingest",
    DEFAULT_KIBANA_INDEX,
    DEFAULT_KIBANA_TASK_INDEX,
];

/// Bucket for documents without a `type`
pub const UNKNOWN_TYPE: &str = "__UNKNOWN__";

/// Documents per `type` under `index`; empty when the index does not exist
///
/// # Errors
/// Any store error other than not-found.
pub async fn get_aggregated_types_count(
    store: &dyn DocumentStore,
    index: &str,
) -> anyhow::Result<BTreeMap<String, u64>> {
    let docs = match store.refresh(index).await {
        Ok(()) => store.scan_all(index, 1_000).await,
        Err(e) => Err(e),
    };
    let docs = match docs {
        Ok(docs) => docs,
        Err(e) if e.is_not_found() => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut counts = BTreeMap::new();
    for doc in &docs {
        let type_name = som_registry::raw_type(doc).unwrap_or(UNKNOWN_TYPE);
        *counts.entry(type_name.to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Delete every physical index behind `aliases`, ignoring missing ones
///
/// # Errors
/// Any store error other than not-found.
pub async fn delete_saved_object_indices(store: &dyn DocumentStore, aliases: &[&str]) -> anyhow::Result<Vec<String>> {
    let mut deleted = Vec::new();
    for alias in aliases {
        let concrete = match store.get_alias(alias).await {
            Ok(indices) => indices,
            Err(e) if e.is_not_found() => vec![(*alias).to_string()],
            Err(e) => return Err(e.into()),
        };
        for index in concrete {
            match store.delete_index(&index).await {
                Ok(()) => deleted.push(index),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(deleted)
}

/// `basic` at 1.0.0 and `complex` at 1.0.0, both in the default index
pub fn baseline_types() -> Vec<TypeDefinition> {
    vec![
        TypeDefinition::new("basic", ModelVersion::new(1, 0, 0))
            .with_mappings(json!({"properties": {"name": {"type": "keyword"}}})),
        TypeDefinition::new("complex", ModelVersion::new(1, 0, 0))
            .with_mappings(json!({"properties": {"name": {"type": "text"}, "value": {"type": "integer"}}})),
        TypeDefinition::new("task", ModelVersion::new(1, 0, 0))
            .with_index(DEFAULT_KIBANA_TASK_INDEX)
            .with_mappings(json!({"properties": {"status": {"type": "keyword"}}})),
    ]
}

/// Baseline types one release later
///
/// - `basic` 2.0.0 adds `updated: true`
/// - `complex` 2.0.0 doubles `value`; a document with `"value": "fail"` breaks the transform
/// - `task` is unchanged
pub fn updated_types() -> Vec<TypeDefinition> {
    vec![
        TypeDefinition::new("basic", ModelVersion::new(2, 0, 0))
            .with_mappings(json!({"properties": {"name": {"type": "keyword"}, "updated": {"type": "boolean"}}}))
            .with_migration(ModelVersion::new(2, 0, 0), |mut doc: SavedObjectDoc| {
                doc.attributes["updated"] = json!(true);
                Ok(doc)
            }),
        TypeDefinition::new("complex", ModelVersion::new(2, 0, 0))
            .with_mappings(json!({"properties": {"name": {"type": "text"}, "value": {"type": "long"}}}))
            .with_migration(ModelVersion::new(2, 0, 0), |mut doc: SavedObjectDoc| {
                let value = doc
                    .attributes
                    .get("value")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| TransformError::new(format!("{} has no numeric value", doc.id)))?;
                doc.attributes["value"] = json!(value * 2);
                Ok(doc)
            }),
        TypeDefinition::new("task", ModelVersion::new(1, 0, 0))
            .with_index(DEFAULT_KIBANA_TASK_INDEX)
            .with_mappings(json!({"properties": {"status": {"type": "keyword"}}})),
    ]
}

/// Replace some types of a set, keeping the rest
pub fn override_types(
    types: Vec<TypeDefinition>,
    transform: impl Fn(TypeDefinition) -> TypeDefinition,
) -> Vec<TypeDefinition> {
    types.into_iter().map(transform).collect()
}

/// Stored document of `type_name` at `version`
pub fn fixture_document(type_name: &str, id: &str, attributes: Value, version: ModelVersion) -> SavedObjectDoc {
    SavedObjectDoc::new(type_name, id, attributes)
        .with_namespaces(vec!["default".to_string()])
        .with_version(version)
}

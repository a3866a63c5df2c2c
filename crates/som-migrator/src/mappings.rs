//! Index layout and mappings derived from the type registry
//!
//! The `_meta` block of every saved-object index records what the index was
//! built for:
//! - `migrationMappingPropertyHashes`: SHA-256 of each type's mappings
//! - `docVersions`: model version per type
//! - `indexTypesMap`: alias -> types for the whole layout

use crate::error::MigratorError;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use som_registry::{ModelVersion, TypeRegistry};
use std::collections::{BTreeMap, BTreeSet};

/// Index alias -> type names stored there
pub type IndexTypesMap = BTreeMap<String, BTreeSet<String>>;

/// Per-type mapping hashes
pub type MappingHashes = BTreeMap<String, String>;

/// Per-type model versions
pub type DocVersions = BTreeMap<String, ModelVersion>;

/// Place every registered type under its alias
///
/// Aliases from `defaults` are kept even when no registered type remains in
/// them; types named in `defaults` but not registered are dropped. A
/// registered type always lands in the alias its definition asks for.
#[must_use]
pub fn compute_index_types_map(
    registry: &TypeRegistry,
    default_index: &str,
    defaults: &BTreeMap<String, Vec<String>>,
) -> IndexTypesMap {
    let mut map: IndexTypesMap = defaults.keys().map(|alias| (alias.clone(), BTreeSet::new())).collect();
    map.entry(default_index.to_string()).or_default();

    for definition in registry.get_all_types() {
        let alias = definition
            .index
            .clone()
            .or_else(|| {
                defaults
                    .iter()
                    .find(|(_, types)| types.contains(&definition.name))
                    .map(|(alias, _)| alias.clone())
            })
            .unwrap_or_else(|| default_index.to_string());
        map.entry(alias).or_default().insert(definition.name.clone());
    }
    map
}

/// SHA-256 hex of a JSON value
///
/// `serde_json` maps are key-sorted, so equal mappings hash equally.
#[must_use]
pub fn hash_value(value: &Value) -> String {
    hex::encode(Sha256::digest(value.to_string().as_bytes()))
}

/// Mapping hashes of the given types
#[must_use]
pub fn mapping_hashes<'a>(registry: &TypeRegistry, types: impl IntoIterator<Item = &'a String>) -> MappingHashes {
    types
        .into_iter()
        .filter_map(|name| registry.get_type(name))
        .map(|definition| (definition.name.clone(), hash_value(&definition.mappings)))
        .collect()
}

/// Current model versions of the given types
#[must_use]
pub fn doc_versions<'a>(registry: &TypeRegistry, types: impl IntoIterator<Item = &'a String>) -> DocVersions {
    types
        .into_iter()
        .filter_map(|name| registry.get_type(name))
        .map(|definition| (definition.name.clone(), definition.current_version))
        .collect()
}

/// Root fields every saved-object index carries
fn root_properties() -> Map<String, Value> {
    let root = json!({
        "type": { "type": "keyword" },
        "namespaces": { "type": "keyword" },
        "references": {
            "type": "nested",
            "properties": {
                "name": { "type": "keyword" },
                "type": { "type": "keyword" },
                "id": { "type": "keyword" }
            }
        },
        "typeMigrationVersion": { "type": "version" },
        "updated_at": { "type": "date" }
    });
    match root {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Mappings an index for `alias` should have
#[must_use]
pub fn build_index_mappings(registry: &TypeRegistry, alias: &str, index_types_map: &IndexTypesMap) -> Value {
    let empty = BTreeSet::new();
    let types = index_types_map.get(alias).unwrap_or(&empty);

    let mut properties = root_properties();
    for name in types {
        if let Some(definition) = registry.get_type(name) {
            properties.insert(name.clone(), definition.mappings.clone());
        }
    }

    json!({
        "dynamic": "strict",
        "properties": properties,
        "_meta": {
            "migrationMappingPropertyHashes": mapping_hashes(registry, types),
            "docVersions": doc_versions(registry, types),
            "indexTypesMap": index_types_map,
        }
    })
}

/// What an existing index says about itself
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredMeta {
    /// `_meta.migrationMappingPropertyHashes`
    pub hashes: MappingHashes,
    /// `_meta.docVersions`
    pub doc_versions: DocVersions,
}

impl StoredMeta {
    /// Read `_meta` from index mappings
    ///
    /// # Errors
    /// - `Registry(InvalidVersion)` if a recorded doc version does not parse
    pub fn from_mappings(mappings: &Value) -> Result<Self, MigratorError> {
        let meta = mappings.get("_meta");
        let hashes = meta
            .and_then(|m| m.get("migrationMappingPropertyHashes"))
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|h| (k.clone(), h.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        let mut doc_versions = DocVersions::new();
        if let Some(recorded) = meta.and_then(|m| m.get("docVersions")).and_then(Value::as_object) {
            for (name, version) in recorded {
                if let Some(raw) = version.as_str() {
                    doc_versions.insert(name.clone(), raw.parse()?);
                }
            }
        }
        Ok(Self { hashes, doc_versions })
    }

    /// Version recorded for a type, resolving legacy hashes through
    /// `hash_to_version` (keys are `"<type>|<hash>"`)
    #[must_use]
    pub fn version_of(&self, type_name: &str, hash_to_version: &BTreeMap<String, ModelVersion>) -> Option<ModelVersion> {
        self.doc_versions.get(type_name).copied().or_else(|| {
            let hash = self.hashes.get(type_name)?;
            hash_to_version.get(&format!("{type_name}|{hash}")).copied()
        })
    }
}

/// Whether an index built for `desired` mappings already matches `stored`
#[must_use]
pub fn mappings_match(stored: &StoredMeta, desired: &Value) -> bool {
    let Ok(desired) = StoredMeta::from_mappings(desired) else {
        return false;
    };
    stored.hashes == desired.hashes && stored.doc_versions == desired.doc_versions
}

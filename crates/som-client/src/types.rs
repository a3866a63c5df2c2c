//! Wire types exchanged with the document store
//!
//! Field names follow the store's REST payloads so the same structs serve
//! the HTTP adapter and the in-memory store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Cluster identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name
    pub cluster_name: String,
    /// Store version number
    pub version: String,
}

/// Concrete index with its aliases, mappings and settings
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexInfo {
    /// Concrete index name
    pub name: String,
    /// Aliases pointing at this index
    pub aliases: BTreeSet<String>,
    /// Mappings (`properties`, `_meta`, ...)
    pub mappings: Value,
    /// Index settings
    pub settings: Value,
}

impl IndexInfo {
    /// Mapping `_meta` block
    #[inline]
    #[must_use]
    pub fn meta(&self) -> Option<&Value> {
        self.mappings.get("_meta")
    }

    /// `index.default_pipeline` setting, nested or flattened
    #[must_use]
    pub fn default_pipeline(&self) -> Option<&str> {
        self.settings
            .pointer("/index/default_pipeline")
            .or_else(|| self.settings.get("index.default_pipeline"))
            .and_then(Value::as_str)
    }
}

/// Single alias action; a batch is applied atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasAction {
    /// Point alias at index
    Add {
        /// Concrete index
        index: String,
        /// Alias name
        alias: String,
    },
    /// Detach alias from index
    Remove {
        /// Concrete index
        index: String,
        /// Alias name
        alias: String,
    },
    /// Delete a concrete index as part of the batch
    RemoveIndex {
        /// Concrete index
        index: String,
    },
}

impl AliasAction {
    /// Add action
    #[inline]
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// Remove action
    #[inline]
    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }

    /// Remove-index action
    #[inline]
    pub fn remove_index(index: impl Into<String>) -> Self {
        Self::RemoveIndex {
            index: index.into(),
        }
    }
}

/// Stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document id
    #[serde(rename = "_id")]
    pub id: String,
    /// Document body
    #[serde(rename = "_source")]
    pub source: Value,
}

impl StoredDocument {
    /// Create document
    #[inline]
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// Write semantics for single-document indexing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    /// Create or overwrite
    Index,
    /// Fail with conflict if the id exists
    Create,
}

impl OpType {
    /// Query-string value
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
        }
    }
}

/// Failed item of a bulk request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemError {
    /// Document id
    pub id: String,
    /// Store-reported reason
    pub reason: String,
}

/// Bulk request outcome
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkResponse {
    /// Items acknowledged
    pub items: usize,
    /// Items rejected
    pub errors: Vec<BulkItemError>,
}

impl BulkResponse {
    /// Whether any item failed
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Subset of the query DSL used by this workspace
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every document
    MatchAll,
    /// Exact match on a (dotted) field
    Term {
        /// Dotted field path
        field: String,
        /// Expected value
        value: Value,
    },
    /// All sub-queries must match
    All(Vec<Query>),
}

impl Query {
    /// Term query
    #[inline]
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Query DSL JSON
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::MatchAll => serde_json::json!({ "match_all": {} }),
            Self::Term { field, value } => {
                let mut term = Map::new();
                term.insert(field.clone(), value.clone());
                serde_json::json!({ "term": term })
            }
            Self::All(queries) => serde_json::json!({
                "bool": { "filter": queries.iter().map(Query::to_json).collect::<Vec<_>>() }
            }),
        }
    }

    /// Evaluate against a document body
    #[must_use]
    pub fn matches(&self, source: &Value) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Term { field, value } => {
                let pointer = format!("/{}", field.replace('.', "/"));
                match source.pointer(&pointer) {
                    Some(Value::Array(items)) => items.contains(value),
                    Some(found) => found == value,
                    None => false,
                }
            }
            Self::All(queries) => queries.iter().all(|q| q.matches(source)),
        }
    }
}

/// Search page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchResponse {
    /// Total matching documents
    pub total: u64,
    /// Documents in this page
    pub hits: Vec<StoredDocument>,
}

/// Data stream description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStream {
    /// Data stream name
    pub name: String,
    /// Index template the stream was created from
    pub template: String,
    /// Backing indices, oldest first; the last one is the write index
    #[serde(default)]
    pub indices: Vec<DataStreamIndex>,
    /// ILM policy name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ilm_policy: Option<String>,
    /// Whether ILM wins over data stream lifecycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_ilm: Option<bool>,
    /// Data stream lifecycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<DataStreamLifecycle>,
}

impl DataStream {
    /// Create data stream description with no backing indices
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            indices: Vec::new(),
            ilm_policy: None,
            prefer_ilm: None,
            lifecycle: None,
        }
    }

    /// Current write index
    #[inline]
    #[must_use]
    pub fn write_index(&self) -> Option<&str> {
        self.indices.last().map(|i| i.index_name.as_str())
    }
}

/// Backing index of a data stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStreamIndex {
    /// Concrete index name
    pub index_name: String,
}

/// Data stream lifecycle block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataStreamLifecycle {
    /// Lifecycle enabled flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Retention period (`7d`, `30d`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_retention: Option<String>,
}

/// Composable index template body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexTemplate {
    /// Index name patterns
    pub index_patterns: Vec<String>,
    /// Component templates, applied in order
    #[serde(default)]
    pub composed_of: Vec<String>,
    /// Priority among overlapping templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
    /// Settings/mappings applied to matching indices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Value>,
    /// Present when matching names create data streams
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_stream: Option<Value>,
    /// Component templates that may be absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_missing_component_templates: Vec<String>,
    /// Free-form metadata
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl IndexTemplate {
    /// Whether any pattern matches `name` (`*` wildcards only)
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.index_patterns.iter().any(|p| wildcard_match(p, name))
    }
}

/// Named index template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexTemplateItem {
    /// Template name
    pub name: String,
    /// Template body
    pub index_template: IndexTemplate,
}

/// Named component template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTemplateItem {
    /// Template name
    pub name: String,
    /// Template body
    pub component_template: Value,
}

/// Ingest processor (`{"<kind>": {...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Processor(pub Map<String, Value>);

impl Processor {
    /// Processor of `kind` with `body`
    #[must_use]
    pub fn new(kind: &str, body: Value) -> Self {
        let mut map = Map::new();
        map.insert(kind.to_string(), body);
        Self(map)
    }

    /// `pipeline` processor invoking `name`
    #[must_use]
    pub fn pipeline(name: &str) -> Self {
        Self::new("pipeline", serde_json::json!({ "name": name }))
    }

    /// Target of a `pipeline` processor
    #[must_use]
    pub fn pipeline_name(&self) -> Option<&str> {
        self.0.get("pipeline")?.get("name")?.as_str()
    }
}

/// Ingest pipeline body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IngestPipeline {
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Processors in execution order
    #[serde(default)]
    pub processors: Vec<Processor>,
    /// Failure handlers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Vec<Processor>>,
    /// Free-form metadata
    #[serde(default, rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl IngestPipeline {
    /// Pipeline with the given processors
    #[inline]
    #[must_use]
    pub fn with_processors(processors: Vec<Processor>) -> Self {
        Self {
            processors,
            ..Self::default()
        }
    }
}

/// Privileges per index name (`{"logs-a": {"read": true, "write": false}}`)
pub type IndexPrivileges = BTreeMap<String, BTreeMap<String, bool>>;

/// `*`-only glob match
#[must_use]
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let mut rest = name;
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == last {
            return rest.ends_with(part);
        } else if let Some(pos) = rest.find(part) {
            rest = &rest[pos + part.len()..];
        } else {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_pipeline_nested_and_flat() {
        let nested = IndexInfo {
            settings: json!({"index": {"default_pipeline": "logs@custom"}}),
            ..IndexInfo::default()
        };
        assert_eq!(nested.default_pipeline(), Some("logs@custom"));

        let flat = IndexInfo {
            settings: json!({"index.default_pipeline": "flat"}),
            ..IndexInfo::default()
        };
        assert_eq!(flat.default_pipeline(), Some("flat"));
    }

    #[test]
    fn alias_action_wire_format() {
        let action = AliasAction::add(".kibana_8.18.0_001", ".kibana");
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"add": {"index": ".kibana_8.18.0_001", "alias": ".kibana"}})
        );
        assert_eq!(
            serde_json::to_value(AliasAction::remove_index(".kibana")).unwrap(),
            json!({"remove_index": {"index": ".kibana"}})
        );
    }

    #[test]
    fn processor_pipeline_name() {
        let p = Processor::pipeline("logs@custom");
        assert_eq!(p.pipeline_name(), Some("logs@custom"));

        let set = Processor::new("set", json!({"field": "a", "value": 1}));
        assert_eq!(set.pipeline_name(), None);
    }

    #[test]
    fn pipeline_roundtrip_keeps_processor_shape() {
        let raw = json!({"processors": [{"pipeline": {"name": "x"}}, {"set": {"field": "f"}}]});
        let pipeline: IngestPipeline = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(pipeline.processors.len(), 2);
        assert_eq!(serde_json::to_value(&pipeline).unwrap(), raw);
    }

    #[test]
    fn query_matching() {
        let doc = json!({"type": "dashboard", "namespaces": ["default", "space-a"]});
        assert!(Query::term("type", "dashboard").matches(&doc));
        assert!(Query::term("namespaces", "space-a").matches(&doc));
        assert!(!Query::term("type", "index-pattern").matches(&doc));
        assert!(Query::All(vec![Query::MatchAll, Query::term("type", "dashboard")]).matches(&doc));
    }

    #[test]
    fn query_json() {
        assert_eq!(
            Query::term("type", "config").to_json(),
            json!({"term": {"type": "config"}})
        );
    }

    #[test]
    fn wildcards() {
        assert!(wildcard_match("logs-*", "logs-test"));
        assert!(wildcard_match("logs-test.*", "logs-test.child"));
        assert!(!wildcard_match("logs-test.*", "logs-test"));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
        assert!(!wildcard_match("a*b*c", "axxbyy"));
        assert!(wildcard_match("exact", "exact"));
    }

    #[test]
    fn write_index_is_last() {
        let mut ds = DataStream::new("logs-test", "logs-test@stream");
        assert_eq!(ds.write_index(), None);
        ds.indices.push(DataStreamIndex { index_name: ".ds-1".into() });
        ds.indices.push(DataStreamIndex { index_name: ".ds-2".into() });
        assert_eq!(ds.write_index(), Some(".ds-2"));
    }
}

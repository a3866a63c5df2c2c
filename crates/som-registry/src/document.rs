//! Saved-object documents and their raw (stored) form
//!
//! Raw layout:
//!
//! ```text
//! _id:     "<type>:<id>"
//! _source: { "type": "<type>", "<type>": { ...attributes },
//!            "namespaces": [...], "references": [...],
//!            "typeMigrationVersion": "X.Y.Z", "updated_at": "<rfc3339>" }
//! ```

use crate::error::SerializationError;
use crate::version::ModelVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use som_client::StoredDocument;

/// Reference from one saved object to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Reference name within the owning object
    pub name: String,
    /// Referenced object's type
    #[serde(rename = "type")]
    pub type_name: String,
    /// Referenced object's id
    pub id: String,
}

/// Saved object in its logical form
#[derive(Debug, Clone, PartialEq)]
pub struct SavedObjectDoc {
    /// Object id (without the type prefix)
    pub id: String,
    /// Type name
    pub type_name: String,
    /// Spaces the object lives in
    pub namespaces: Vec<String>,
    /// Type-specific attributes
    pub attributes: Value,
    /// Outgoing references
    pub references: Vec<Reference>,
    /// Model version the attributes conform to; `None` means never migrated
    pub type_migration_version: Option<ModelVersion>,
    /// Last write time
    pub updated_at: Option<DateTime<Utc>>,
}

impl SavedObjectDoc {
    /// Create document with empty namespaces and references
    pub fn new(type_name: impl Into<String>, id: impl Into<String>, attributes: Value) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            namespaces: Vec::new(),
            attributes,
            references: Vec::new(),
            type_migration_version: None,
            updated_at: None,
        }
    }

    /// Set namespaces
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Set references
    #[must_use]
    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    /// Set model version
    #[must_use]
    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.type_migration_version = Some(version);
        self
    }

    /// Effective model version (`0.0.0` when unset)
    #[inline]
    #[must_use]
    pub fn version(&self) -> ModelVersion {
        self.type_migration_version.unwrap_or(ModelVersion::ZERO)
    }

    /// Stored `_id`
    #[inline]
    #[must_use]
    pub fn raw_id(&self) -> String {
        raw_id(&self.type_name, &self.id)
    }

    /// Convert from the stored form
    ///
    /// # Errors
    /// - `MissingType` if `_source.type` is absent
    /// - `InvalidField` if namespaces, references or `updated_at` are malformed
    /// - `InvalidVersion` if `typeMigrationVersion` does not parse
    pub fn from_raw(raw: &StoredDocument) -> Result<Self, SerializationError> {
        let source = &raw.source;
        let type_name = source
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SerializationError::MissingType { id: raw.id.clone() })?
            .to_string();

        let id = match parse_raw_id(&raw.id) {
            Some((prefix, id)) if prefix == type_name => id.to_string(),
            _ => raw.id.clone(),
        };

        let invalid = |field: &'static str, reason: String| SerializationError::InvalidField {
            id: raw.id.clone(),
            field,
            reason,
        };

        let namespaces = match source.get("namespaces") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| invalid("namespaces", e.to_string()))?,
        };
        let references = match source.get("references") {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| invalid("references", e.to_string()))?,
        };
        let type_migration_version = match source.get("typeMigrationVersion").and_then(Value::as_str) {
            None | Some("") => None,
            Some(value) => Some(value.parse().map_err(|_| SerializationError::InvalidVersion {
                id: raw.id.clone(),
                value: value.to_string(),
            })?),
        };
        let updated_at = match source.get("updated_at").and_then(Value::as_str) {
            None => None,
            Some(value) => Some(
                DateTime::parse_from_rfc3339(value)
                    .map_err(|e| invalid("updated_at", e.to_string()))?
                    .with_timezone(&Utc),
            ),
        };

        Ok(Self {
            attributes: source.get(&type_name).cloned().unwrap_or_else(|| Value::Object(Map::new())),
            id,
            type_name,
            namespaces,
            references,
            type_migration_version,
            updated_at,
        })
    }

    /// Convert to the stored form
    #[must_use]
    pub fn to_raw(&self) -> StoredDocument {
        let mut source = Map::new();
        source.insert("type".to_string(), Value::String(self.type_name.clone()));
        source.insert(self.type_name.clone(), self.attributes.clone());
        source.insert(
            "namespaces".to_string(),
            Value::Array(self.namespaces.iter().cloned().map(Value::String).collect()),
        );
        source.insert(
            "references".to_string(),
            serde_json::to_value(&self.references).unwrap_or_else(|_| Value::Array(Vec::new())),
        );
        if let Some(version) = self.type_migration_version {
            source.insert("typeMigrationVersion".to_string(), Value::String(version.to_string()));
        }
        if let Some(updated_at) = self.updated_at {
            source.insert("updated_at".to_string(), Value::String(updated_at.to_rfc3339()));
        }
        StoredDocument::new(self.raw_id(), Value::Object(source))
    }
}

/// Stored `_id` for an object
#[inline]
#[must_use]
pub fn raw_id(type_name: &str, id: &str) -> String {
    format!("{type_name}:{id}")
}

/// Split a stored `_id` into `(type, id)`
#[must_use]
pub fn parse_raw_id(raw: &str) -> Option<(&str, &str)> {
    raw.split_once(':').filter(|(t, id)| !t.is_empty() && !id.is_empty())
}

/// `_source.type` of a raw document
#[inline]
#[must_use]
pub fn raw_type(raw: &StoredDocument) -> Option<&str> {
    raw.source.get("type").and_then(Value::as_str)
}

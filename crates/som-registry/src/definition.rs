//! Saved-object type definitions and their migration transforms

use crate::document::SavedObjectDoc;
use crate::error::RegistryError;
use crate::version::ModelVersion;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Transform failure reported by a migration function
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct TransformError {
    /// Human-readable reason
    pub reason: String,
}

impl TransformError {
    /// Create transform error
    #[inline]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Document transform for one model version
pub type TransformFn =
    Arc<dyn Fn(SavedObjectDoc) -> Result<SavedObjectDoc, TransformError> + Send + Sync>;

/// Migration step: transform documents up to `version`
#[derive(Clone)]
pub struct Migration {
    /// Version documents are at after this step
    pub version: ModelVersion,
    /// The transform
    pub transform: TransformFn,
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Registered saved-object type
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// Unique type name
    pub name: String,
    /// Latest model version
    pub current_version: ModelVersion,
    /// Index alias override; `None` uses the default saved-object index
    pub index: Option<String>,
    /// Field mappings (`{"properties": {...}}` or `{"dynamic": false, ...}`)
    pub mappings: Value,
    /// Migrations, ascending by version
    pub migrations: Vec<Migration>,
}

impl TypeDefinition {
    /// Type with no migrations and empty mappings
    pub fn new(name: impl Into<String>, current_version: ModelVersion) -> Self {
        Self {
            name: name.into(),
            current_version,
            index: None,
            mappings: json!({ "properties": {} }),
            migrations: Vec::new(),
        }
    }

    /// Store in a dedicated index alias
    #[must_use]
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set field mappings
    #[must_use]
    pub fn with_mappings(mut self, mappings: Value) -> Self {
        self.mappings = mappings;
        self
    }

    /// Append a migration step
    #[must_use]
    pub fn with_migration<F>(mut self, version: ModelVersion, transform: F) -> Self
    where
        F: Fn(SavedObjectDoc) -> Result<SavedObjectDoc, TransformError> + Send + Sync + 'static,
    {
        self.migrations.push(Migration {
            version,
            transform: Arc::new(transform),
        });
        self
    }

    /// Migrations above `version`, in application order
    pub fn migrations_after(&self, version: ModelVersion) -> impl Iterator<Item = &Migration> {
        self.migrations.iter().filter(move |m| m.version > version)
    }

    /// Check migrations are strictly ascending and not ahead of `current_version`
    ///
    /// # Errors
    /// - `InvalidMigrations` describing the first offending step
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidMigrations {
            name: self.name.clone(),
            reason,
        };

        for pair in self.migrations.windows(2) {
            if pair[1].version <= pair[0].version {
                return Err(invalid(format!(
                    "{} is not greater than {}",
                    pair[1].version, pair[0].version
                )));
            }
        }
        if let Some(last) = self.migrations.last() {
            if last.version > self.current_version {
                return Err(invalid(format!(
                    "migration {} is ahead of current version {}",
                    last.version, self.current_version
                )));
            }
        }
        Ok(())
    }
}

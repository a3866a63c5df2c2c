//! Applies per-type transform chains to documents

use crate::error::MigratorError;
use som_client::StoredDocument;
use som_registry::{RegistryError, SavedObjectDoc, TypeRegistry};
use std::sync::Arc;

/// Migrates documents to their type's current model version
#[derive(Debug, Clone)]
pub struct DocumentMigrator {
    registry: Arc<TypeRegistry>,
}

impl DocumentMigrator {
    /// Create migrator over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// Check if a document is behind its type's current version
    ///
    /// # Errors
    /// - `Registry(UnknownType)` if the type is not registered
    pub fn is_outdated(&self, doc: &SavedObjectDoc) -> Result<bool, MigratorError> {
        let definition = self
            .registry
            .get_type(&doc.type_name)
            .ok_or_else(|| RegistryError::unknown(doc.type_name.as_str()))?;
        Ok(doc.type_migration_version != Some(definition.current_version))
    }

    /// Apply every transform above the document's version, in ascending order
    ///
    /// The result is stamped with the type's current version, so migrating
    /// an already migrated document returns it unchanged.
    ///
    /// # Errors
    /// - `Registry(RemovedType | UnknownType)` for types this node cannot handle
    /// - `DocumentVersionMismatch` if the document is newer than the type
    /// - `TransformFailure` if a transform fails
    pub fn migrate(&self, doc: SavedObjectDoc) -> Result<SavedObjectDoc, MigratorError> {
        if self.registry.is_removed_type(&doc.type_name) {
            return Err(RegistryError::RemovedType { name: doc.type_name }.into());
        }
        let definition = self
            .registry
            .get_type(&doc.type_name)
            .ok_or_else(|| RegistryError::unknown(doc.type_name.as_str()))?;

        let stored = doc.version();
        if stored > definition.current_version {
            return Err(MigratorError::DocumentVersionMismatch {
                type_name: doc.type_name.clone(),
                document_id: doc.raw_id(),
                stored,
                latest: definition.current_version,
            });
        }

        let mut current = doc;
        for migration in definition.migrations_after(stored) {
            let document_id = current.raw_id();
            let mut next = (migration.transform)(current).map_err(|e| MigratorError::TransformFailure {
                type_name: definition.name.clone(),
                version: migration.version,
                document_id,
                reason: e.reason,
            })?;
            next.type_migration_version = Some(migration.version);
            current = next;
        }
        current.type_migration_version = Some(definition.current_version);
        Ok(current)
    }

    /// Migrate a stored document
    ///
    /// # Errors
    /// - `Serialization` if the raw document cannot be read
    /// - anything [`DocumentMigrator::migrate`] returns
    pub fn migrate_raw(&self, raw: &StoredDocument) -> Result<StoredDocument, MigratorError> {
        let doc = SavedObjectDoc::from_raw(raw)?;
        Ok(self.migrate(doc)?.to_raw())
    }
}

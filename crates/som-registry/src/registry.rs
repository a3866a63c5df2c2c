//! Type registry
//!
//! Provides [`TypeRegistry`], the set of saved-object types known to this
//! node plus the legacy names that were removed and must stay unusable.

use crate::definition::TypeDefinition;
use crate::error::RegistryError;
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Registered types, in registration order
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDefinition>,
    removed: BTreeSet<String>,
}

impl TypeRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry that refuses the given legacy type names
    #[must_use]
    pub fn with_removed_types<I, S>(removed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: IndexMap::new(),
            removed: removed.into_iter().map(Into::into).collect(),
        }
    }

    /// Register a type
    ///
    /// # Errors
    /// - `RemovedType` if the name is a removed legacy type
    /// - `DuplicateType` if the name is already registered
    /// - `InvalidMigrations` if the migration list is invalid
    pub fn register_type(&mut self, definition: TypeDefinition) -> Result<(), RegistryError> {
        if self.removed.contains(&definition.name) {
            return Err(RegistryError::RemovedType {
                name: definition.name,
            });
        }
        if self.types.contains_key(&definition.name) {
            return Err(RegistryError::DuplicateType {
                name: definition.name,
            });
        }
        definition.validate()?;

        tracing::debug!(
            type_name = %definition.name,
            version = %definition.current_version,
            migrations = definition.migrations.len(),
            "registered saved object type"
        );
        self.types.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Look up a type
    #[inline]
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    /// Every registered type, in registration order
    #[must_use]
    pub fn get_all_types(&self) -> Vec<&TypeDefinition> {
        self.types.values().collect()
    }

    /// Registered type names, in registration order
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Check if a type is registered
    #[inline]
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Check if a name is a removed legacy type
    #[inline]
    #[must_use]
    pub fn is_removed_type(&self, name: &str) -> bool {
        self.removed.contains(name)
    }

    /// Removed legacy type names
    #[inline]
    #[must_use]
    pub fn removed_types(&self) -> &BTreeSet<String> {
        &self.removed
    }

    /// Index alias a type is stored in
    ///
    /// # Errors
    /// - `RemovedType` for removed legacy names
    /// - `UnknownType` for names never registered
    pub fn index_for_type(&self, name: &str, default_index: &str) -> Result<String, RegistryError> {
        if self.is_removed_type(name) {
            return Err(RegistryError::RemovedType {
                name: name.to_string(),
            });
        }
        let definition = self.get_type(name).ok_or_else(|| RegistryError::unknown(name))?;
        Ok(definition
            .index
            .clone()
            .unwrap_or_else(|| default_index.to_string()))
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

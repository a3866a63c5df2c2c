//! Error types for saved-object CRUD

use som_client::StoreError;
use som_migrator::MigratorError;
use som_registry::SerializationError;

/// Repository error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// Type is not registered
    #[error("unsupported saved object type: {type_name}")]
    UnsupportedType {
        /// Type name
        type_name: String,
    },

    /// Type was removed from the registry
    #[error("saved object type {type_name} has been removed")]
    RemovedType {
        /// Type name
        type_name: String,
    },

    /// Object does not exist
    #[error("saved object [{type_name}/{id}] not found")]
    NotFound {
        /// Type name
        type_name: String,
        /// Object id
        id: String,
    },

    /// Object already exists
    #[error("saved object [{type_name}/{id}] conflict")]
    Conflict {
        /// Type name
        type_name: String,
        /// Object id
        id: String,
    },

    /// Request body is unusable
    #[error("bad request: {reason}")]
    BadRequest {
        /// Reason
        reason: String,
    },

    /// Stored document could not be read
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Read-time migration failed
    #[error("migration error: {0}")]
    Migration(#[from] MigratorError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RepositoryError {
    /// Not-found error for an object
    #[inline]
    pub fn not_found(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Conflict error for an object
    #[inline]
    pub fn conflict(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Check if error is not found
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if error is a conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

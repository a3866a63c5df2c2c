//! Error types for the migrator
//!
//! Provides error handling for:
//! - Run lifecycle (already run, illegal transitions, wait timeouts)
//! - Stored state newer than this node
//! - Per-document transform failures
//! - Registry, serialization and store failures

use crate::state::RunStatus;
use som_client::StoreError;
use som_registry::{ModelVersion, RegistryError, SerializationError};

/// Migrator error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MigratorError {
    /// `run_migrations` was already invoked on this migrator
    #[error("migrations have already been run on this migrator")]
    AlreadyRun,

    /// Index records a type at a version newer than this node knows
    #[error("index {index} has type {type_name} at version {stored}, newer than latest known {latest}")]
    VersionMismatch {
        /// Index alias
        index: String,
        /// Type name
        type_name: String,
        /// Version recorded in the index
        stored: ModelVersion,
        /// Version registered on this node
        latest: ModelVersion,
    },

    /// Document is at a version newer than its type's current version
    #[error("document {document_id} of type {type_name} is at version {stored}, newer than latest known {latest}")]
    DocumentVersionMismatch {
        /// Type name
        type_name: String,
        /// Raw document id
        document_id: String,
        /// Document version
        stored: ModelVersion,
        /// Version registered on this node
        latest: ModelVersion,
    },

    /// A migration transform returned an error
    #[error("failed to transform document {document_id} of type {type_name} to version {version}: {reason}")]
    TransformFailure {
        /// Type name
        type_name: String,
        /// Version of the failing transform
        version: ModelVersion,
        /// Raw document id
        document_id: String,
        /// Transform-reported reason
        reason: String,
    },

    /// Index holds documents of types that are neither registered nor removed
    #[error("index {index} contains documents of unknown types: {}", types.join(", "))]
    UnknownDocumentTypes {
        /// Index alias
        index: String,
        /// Unknown type names, sorted
        types: Vec<String>,
    },

    /// Bulk write rejected some documents
    #[error("bulk write to {index} rejected {failed} documents: {reason}")]
    BulkWriteFailed {
        /// Target index
        index: String,
        /// Rejected document count
        failed: usize,
        /// First reported reason
        reason: String,
    },

    /// Non-migrator node gave up waiting for migrations to complete
    #[error("timed out after {waited_ms}ms waiting for migrations to complete")]
    WaitTimeout {
        /// Time waited
        waited_ms: u64,
    },

    /// Run state transition not allowed
    #[error("illegal run transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current status
        from: RunStatus,
        /// Requested status
        to: RunStatus,
    },

    /// Type registry error
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Raw document could not be read
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MigratorError {
    /// Check if error came from a document transform or document version
    #[inline]
    #[must_use]
    pub fn is_document_failure(&self) -> bool {
        matches!(
            self,
            Self::TransformFailure { .. } | Self::DocumentVersionMismatch { .. }
        )
    }

    /// Type name involved, if any
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::VersionMismatch { type_name, .. }
            | Self::DocumentVersionMismatch { type_name, .. }
            | Self::TransformFailure { type_name, .. } => Some(type_name),
            Self::Registry(e) => e.type_name(),
            _ => None,
        }
    }

    /// Version involved, if any
    #[must_use]
    pub fn version(&self) -> Option<ModelVersion> {
        match self {
            Self::VersionMismatch { stored, .. } | Self::DocumentVersionMismatch { stored, .. } => {
                Some(*stored)
            }
            Self::TransformFailure { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Document id involved, if any
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::DocumentVersionMismatch { document_id, .. }
            | Self::TransformFailure { document_id, .. } => Some(document_id),
            Self::Serialization(
                SerializationError::MissingType { id }
                | SerializationError::InvalidField { id, .. }
                | SerializationError::InvalidVersion { id, .. },
            ) => Some(id),
            _ => None,
        }
    }
}

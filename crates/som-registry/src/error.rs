//! Error types for the type registry
//!
//! Provides error handling for:
//! - Type registration (duplicates, removed names, bad migration lists)
//! - Model version parsing
//! - Raw document (de)serialization

/// Type registry error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Name already registered
    #[error("type '{name}' is already registered")]
    DuplicateType {
        /// Type name
        name: String,
    },

    /// Name belongs to a removed legacy type
    #[error("type '{name}' was removed and cannot be registered or used")]
    RemovedType {
        /// Type name
        name: String,
    },

    /// Migrations out of order or ahead of the current version
    #[error("invalid migrations for type '{name}': {reason}")]
    InvalidMigrations {
        /// Type name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Name not registered
    #[error("unknown type '{name}'")]
    UnknownType {
        /// Type name
        name: String,
    },

    /// Unparseable model version
    #[error("invalid model version '{0}'")]
    InvalidVersion(String),
}

impl RegistryError {
    /// Unknown-type error
    #[inline]
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    /// Name the error is about, if any
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::DuplicateType { name }
            | Self::RemovedType { name }
            | Self::InvalidMigrations { name, .. }
            | Self::UnknownType { name } => Some(name),
            Self::InvalidVersion(_) => None,
        }
    }
}

/// Raw document could not be converted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializationError {
    /// `_source.type` missing or not a string
    #[error("document '{id}' has no type")]
    MissingType {
        /// Raw document id
        id: String,
    },

    /// A field has the wrong shape
    #[error("document '{id}' has invalid field '{field}': {reason}")]
    InvalidField {
        /// Raw document id
        id: String,
        /// Field name
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// `typeMigrationVersion` is not a version
    #[error("document '{id}' has invalid typeMigrationVersion '{value}'")]
    InvalidVersion {
        /// Raw document id
        id: String,
        /// Offending value
        value: String,
    },
}

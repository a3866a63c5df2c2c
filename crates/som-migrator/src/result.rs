//! Per-index migration outcomes

use crate::error::MigratorError;
use serde::Serialize;
use som_registry::ModelVersion;

/// Outcome of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Documents were reindexed into a new physical index
    Migrated,
    /// No source index existed; the target was created empty
    Created,
    /// Index already up to date, or migrations skipped by configuration
    Skipped,
    /// Migration aborted; alias unchanged
    Failed,
}

/// Why an index failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    /// Failing type, for document-level failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Failing version, for document-level failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<ModelVersion>,
    /// Failing document, for document-level failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Human-readable reason
    pub reason: String,
}

impl From<&MigratorError> for MigrationFailure {
    fn from(error: &MigratorError) -> Self {
        let reason = match error {
            MigratorError::TransformFailure { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Self {
            type_name: error.type_name().map(str::to_string),
            version: error.version(),
            document_id: error.document_id().map(str::to_string),
            reason,
        }
    }
}

/// Result for one index alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationResult {
    /// Index alias
    pub index: String,
    /// Physical index the alias pointed at before the run
    pub source_index: Option<String>,
    /// Physical index the alias points at after a successful run
    pub target_index: String,
    /// Outcome
    pub status: MigrationStatus,
    /// Documents read from the source
    pub source_doc_count: u64,
    /// Documents in the target after refresh
    pub target_doc_count: u64,
    /// Removed-type documents left behind
    pub excluded_doc_count: u64,
    /// Wall time spent on this index
    pub elapsed_ms: u64,
    /// Failure details when `status` is `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<MigrationFailure>,
}

impl MigrationResult {
    /// Result with zero counts
    pub fn new(index: impl Into<String>, target_index: impl Into<String>, status: MigrationStatus) -> Self {
        Self {
            index: index.into(),
            source_index: None,
            target_index: target_index.into(),
            status,
            source_doc_count: 0,
            target_doc_count: 0,
            excluded_doc_count: 0,
            elapsed_ms: 0,
            failure: None,
        }
    }

    /// Check if this index failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == MigrationStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_from_transform_error() {
        let err = MigratorError::TransformFailure {
            type_name: "dashboard".into(),
            version: ModelVersion::new(2, 0, 0),
            document_id: "dashboard:a".into(),
            reason: "missing title".into(),
        };
        let failure = MigrationFailure::from(&err);
        assert_eq!(failure.type_name.as_deref(), Some("dashboard"));
        assert_eq!(failure.version, Some(ModelVersion::new(2, 0, 0)));
        assert_eq!(failure.document_id.as_deref(), Some("dashboard:a"));
        assert_eq!(failure.reason, "missing title");
    }

    #[test]
    fn backend_failure_has_only_reason() {
        let err = MigratorError::Store(som_client::StoreError::status(500, "boom"));
        let failure = MigrationFailure::from(&err);
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            json!({"reason": "store error: store responded with status 500: boom"})
        );
    }
}

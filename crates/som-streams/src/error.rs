//! Error types for stream asset management

use som_client::StoreError;

/// Stream asset error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// No data stream backs the stream
    #[error("stream definition for {name} not found")]
    DefinitionNotFound {
        /// Stream name
        name: String,
    },

    /// The data stream's index template is missing
    #[error("index template {name} not found")]
    IndexTemplateNotFound {
        /// Template name
        name: String,
    },

    /// Pipeline chain loops back on itself
    #[error("pipeline reference cycle at {pipeline}: {}", chain.join(" -> "))]
    PipelineReferenceCycle {
        /// Pipeline seen twice
        pipeline: String,
        /// Pipelines visited, in order
        chain: Vec<String>,
    },

    /// Pipeline chain is deeper than allowed
    #[error("pipeline chain from {start} exceeds max depth {max_depth}")]
    PipelineDepthExceeded {
        /// Pipeline the walk started at
        start: String,
        /// Configured bound
        max_depth: usize,
    },

    /// Store error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl StreamError {
    /// Definition-not-found error
    #[inline]
    pub fn definition_not_found(name: impl Into<String>) -> Self {
        Self::DefinitionNotFound { name: name.into() }
    }

    /// Check if error means something does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::DefinitionNotFound { .. } | Self::IndexTemplateNotFound { .. } => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(StreamError::definition_not_found("logs").is_not_found());
        assert!(StreamError::Store(StoreError::not_found("p")).is_not_found());
        assert!(!StreamError::Store(StoreError::status(500, "x")).is_not_found());
    }

    #[test]
    fn cycle_display() {
        let err = StreamError::PipelineReferenceCycle {
            pipeline: "a@custom".into(),
            chain: vec!["a@custom".into(), "b@custom".into()],
        };
        assert_eq!(err.to_string(), "pipeline reference cycle at a@custom: a@custom -> b@custom");
    }
}

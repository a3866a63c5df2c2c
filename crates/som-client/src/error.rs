//! Error types for document-store calls
//!
//! A 404 from the store is always [`StoreError::NotFound`]; callers that
//! treat absence as success check [`StoreError::is_not_found`].

/// Document-store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Resource absent (HTTP 404)
    #[error("resource not found: {resource}")]
    NotFound {
        /// Resource that was requested
        resource: String,
    },

    /// Resource already exists or version conflict (HTTP 409 / already-exists)
    #[error("resource conflict: {resource}")]
    Conflict {
        /// Resource that conflicted
        resource: String,
    },

    /// Caller lacks privileges (HTTP 401 / 403)
    #[error("permission denied: {reason}")]
    Forbidden {
        /// Store-reported reason
        reason: String,
    },

    /// Any other non-success status
    #[error("store responded with status {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Response body
        body: String,
    },

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded its timeout
    #[error("request timed out after {after_ms}ms")]
    Timeout {
        /// Configured timeout
        after_ms: u64,
    },

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Not-found error for resource
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Conflict error for resource
    #[inline]
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Status error
    #[inline]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if error is a 404
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

    /// Check if the request may succeed when retried
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// HTTP status equivalent
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Forbidden { .. } => Some(403),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Statuses worth retrying
#[inline]
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

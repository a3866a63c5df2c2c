//! Error types for settings and environment resolution

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Source document could not be parsed
    #[error("failed to parse {format} settings: {message}")]
    Parse {
        /// Source format (`toml`, `yaml`, `json`)
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// Merged settings do not match the recognized keys
    #[error("invalid settings: {0}")]
    Invalid(String),

    /// Stack version string is malformed
    #[error("invalid stack version '{0}'")]
    InvalidVersion(String),

    /// Tracing subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create parse error
    #[inline]
    pub fn parse(format: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}

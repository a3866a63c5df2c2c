//! Runtime settings
//!
//! Settings are an explicit struct tree. Callers supply a partial override
//! document which is deep-merged over the serialized defaults:
//! - objects merge key by key, recursively
//! - any other override value replaces the default
//! - `null` in the override keeps the default

use crate::error::ConfigError;
use crate::version::NodeRoles;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// Complete runtime settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Search-engine connection
    pub elasticsearch: ElasticsearchSettings,
    /// Migration behavior
    pub migrations: MigrationSettings,
    /// Saved-object index layout
    pub saved_objects: SavedObjectsSettings,
    /// Logging
    pub logging: LoggingSettings,
    /// Node roles
    pub node: NodeSettings,
}

impl Settings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-merge `overrides` over the defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the merged tree contains unknown
    /// keys or values of the wrong type.
    pub fn from_overrides(overrides: Value) -> Result<Self, ConfigError> {
        let defaults =
            serde_json::to_value(Self::default()).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let merged = deep_merge(defaults, overrides);
        serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Parse TOML overrides
    ///
    /// # Errors
    /// Returns error if the document is not valid TOML or not valid settings
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(source).map_err(|e| ConfigError::parse("toml", e.to_string()))?;
        Self::from_overrides(value)
    }

    /// Parse YAML overrides
    ///
    /// # Errors
    /// Returns error if the document is not valid YAML or not valid settings
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_yaml::from_str(source).map_err(|e| ConfigError::parse("yaml", e.to_string()))?;
        // an empty YAML document parses as null
        Self::from_overrides(value)
    }

    /// Parse JSON overrides
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON or not valid settings
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let value: Value =
            serde_json::from_str(source).map_err(|e| ConfigError::parse("json", e.to_string()))?;
        Self::from_overrides(value)
    }

    /// Saved-object task index (`<index>_tasks` unless configured)
    #[must_use]
    pub fn task_index(&self) -> String {
        self.saved_objects
            .task_index
            .clone()
            .unwrap_or_else(|| format!("{}_tasks", self.saved_objects.index))
    }
}

/// Merge `overrides` into `base`
///
/// Objects merge recursively; `null` overrides are ignored; every other
/// override value replaces the base value.
#[must_use]
pub fn deep_merge(base: Value, overrides: Value) -> Value {
    match (base, overrides) {
        (Value::Object(mut base_map), Value::Object(override_map)) => {
            for (key, override_value) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, override_value),
                    None => override_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overrides) => overrides,
    }
}

/// Search-engine connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticsearchSettings {
    /// Cluster URLs; the first reachable one is used
    pub hosts: Vec<String>,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<String>,
    /// API key (takes precedence over basic auth)
    pub api_key: Option<String>,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// Retries for transient failures
    pub max_retries: u32,
    /// First retry delay
    pub retry_initial_backoff_ms: u64,
    /// Retry delay ceiling
    pub retry_max_backoff_ms: u64,
    /// DNS cache TTL for the HTTP agent (0 disables)
    pub dns_cache_ttl_secs: u64,
}

impl ElasticsearchSettings {
    /// Request timeout as duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:9200".to_string()],
            username: None,
            password: None,
            api_key: None,
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_initial_backoff_ms: 100,
            retry_max_backoff_ms: 5_000,
            dns_cache_ttl_secs: 0,
        }
    }
}

/// Migration behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSettings {
    /// Skip migrations entirely
    pub skip: bool,
    /// Documents per bulk write / scan page
    pub batch_size: usize,
    /// Indices migrated concurrently
    pub max_concurrency: usize,
    /// Poll interval for nodes waiting on another migrator
    pub poll_interval_ms: u64,
    /// Give up waiting on another migrator after this long
    pub wait_timeout_ms: u64,
    /// Bound on pipeline reference chain walks
    pub max_pipeline_depth: usize,
}

impl MigrationSettings {
    /// Poll interval as duration
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait timeout as duration
    #[inline]
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            skip: false,
            batch_size: 1_000,
            max_concurrency: 4,
            poll_interval_ms: 1_500,
            wait_timeout_ms: 60_000,
            max_pipeline_depth: 10,
        }
    }
}

/// Saved-object index layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SavedObjectsSettings {
    /// Default saved-object index alias
    pub index: String,
    /// Task index alias
    pub task_index: Option<String>,
}

impl Default for SavedObjectsSettings {
    fn default() -> Self {
        Self {
            index: ".kibana".to_string(),
            task_index: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive (`info`, `som_migrator=debug,warn`, ...)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Append to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Node settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSettings {
    /// Node roles
    pub roles: NodeRoles,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn defaults() {
        let settings = Settings::new();
        assert_eq!(settings.saved_objects.index, ".kibana");
        assert_eq!(settings.task_index(), ".kibana_tasks");
        assert_eq!(settings.migrations.batch_size, 1_000);
        assert!(!settings.migrations.skip);
        assert!(settings.node.roles.migrator);
    }

    #[test]
    fn deep_merge_override_wins_recursively() {
        let base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        let overrides = json!({"a": {"b": 10}, "d": [3]});
        assert_eq!(
            deep_merge(base, overrides),
            json!({"a": {"b": 10, "c": 2}, "d": [3]})
        );
    }

    #[test]
    fn deep_merge_null_keeps_default() {
        let base = json!({"a": {"b": 1}});
        assert_eq!(deep_merge(base.clone(), json!({"a": null})), base);
        assert_eq!(deep_merge(base.clone(), Value::Null), base);
    }

    #[test]
    fn overrides_fill_from_defaults() {
        let settings = Settings::from_overrides(json!({
            "migrations": {"batch_size": 50},
            "saved_objects": {"index": ".kibana_migrator"}
        }))
        .unwrap();

        assert_eq!(settings.migrations.batch_size, 50);
        assert_eq!(settings.migrations.max_concurrency, 4);
        assert_eq!(settings.task_index(), ".kibana_migrator_tasks");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Settings::from_overrides(json!({"migrations": {"batchsize": 50}})).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn toml_loader() {
        let settings = Settings::from_toml_str(
            r#"
            [elasticsearch]
            hosts = ["http://es:9200"]
            username = "system"

            [node.roles]
            migrator = false
            ui = true
            background_tasks = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.elasticsearch.hosts, vec!["http://es:9200".to_string()]);
        assert_eq!(settings.elasticsearch.username.as_deref(), Some("system"));
        assert!(!settings.node.roles.migrator);
    }

    #[test]
    fn yaml_loader() {
        let settings = Settings::from_yaml_str(
            "logging:\n  level: debug\n  format: json\nmigrations:\n  skip: true\n",
        )
        .unwrap();

        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert!(settings.migrations.skip);
    }

    #[test]
    fn json_loader_rejects_garbage() {
        let err = Settings::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "json", .. }));
    }

    #[test]
    fn durations() {
        let settings = Settings::new();
        assert_eq!(settings.elasticsearch.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.migrations.poll_interval(), Duration::from_millis(1_500));
    }
}

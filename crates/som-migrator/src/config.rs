//! Migrator configuration

use som_config::{Env, MigrationSettings, NodeRoles, Settings, StackVersion};
use som_registry::ModelVersion;
use std::collections::BTreeMap;

/// Everything the migrator needs besides the registry and the store
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Default saved-object index alias
    pub kibana_index: String,
    /// Stack version new indices are named after
    pub stack_version: StackVersion,
    /// Batch size, concurrency, polling and skip flag
    pub migrations: MigrationSettings,
    /// Node roles; only `migrator` nodes write
    pub roles: NodeRoles,
    /// Initial alias -> types layout
    pub default_index_types_map: BTreeMap<String, Vec<String>>,
    /// `"<type>|<mapping hash>"` -> model version, for indices that predate `docVersions`
    pub hash_to_version_map: BTreeMap<String, ModelVersion>,
    /// Settings for newly created indices
    pub index_settings: serde_json::Value,
}

impl MigratorConfig {
    /// Config from settings and environment
    #[must_use]
    pub fn from_settings(settings: &Settings, env: &Env) -> Self {
        Self {
            kibana_index: settings.saved_objects.index.clone(),
            stack_version: env.version.release(),
            migrations: settings.migrations.clone(),
            roles: settings.node.roles,
            default_index_types_map: BTreeMap::new(),
            hash_to_version_map: BTreeMap::new(),
            index_settings: serde_json::json!({
                "number_of_shards": 1,
                "auto_expand_replicas": "0-1",
            }),
        }
    }

    /// Set the initial layout
    #[must_use]
    pub fn with_default_index_types_map(mut self, map: BTreeMap<String, Vec<String>>) -> Self {
        self.default_index_types_map = map;
        self
    }

    /// Set legacy hash resolution
    #[must_use]
    pub fn with_hash_to_version_map(mut self, map: BTreeMap<String, ModelVersion>) -> Self {
        self.hash_to_version_map = map;
        self
    }

    /// Physical index name for `alias` at this stack version with sequence `n`
    #[must_use]
    pub fn target_index_name(&self, alias: &str, n: u32) -> String {
        format!("{alias}_{}_{n:03}", self.stack_version)
    }

    /// Version alias (`<alias>_<stack version>`)
    #[must_use]
    pub fn version_alias(&self, alias: &str) -> String {
        format!("{alias}_{}", self.stack_version)
    }
}

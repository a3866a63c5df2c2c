//! Migration plan: what each index alias needs

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Plan for one index alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPlan {
    /// Index alias
    pub alias: String,
    /// Physical index currently behind the alias
    pub source_index: Option<String>,
    /// Source is a concrete index named like the alias (pre-alias layout)
    pub legacy_source: bool,
    /// Aliases currently on the source index
    pub source_aliases: BTreeSet<String>,
    /// Physical index to migrate into
    pub target_index: String,
    /// `<alias>_<stack version>`
    pub version_alias: String,
    /// Types stored under this alias
    pub types: BTreeSet<String>,
    /// Desired mappings, `_meta` included
    pub mappings: Value,
    /// Whether the source needs reindexing (or does not exist yet)
    pub requires_migration: bool,
}

/// Plan for every alias of the layout, sorted by alias
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MigrationPlan {
    /// Per-alias plans
    pub indices: Vec<IndexPlan>,
}

impl MigrationPlan {
    /// Check if any alias needs work
    #[inline]
    #[must_use]
    pub fn requires_migration(&self) -> bool {
        self.indices.iter().any(|p| p.requires_migration)
    }

    /// Plan for an alias
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&IndexPlan> {
        self.indices.iter().find(|p| p.alias == alias)
    }
}

/// Sequence number for the next physical index
///
/// `1` unless the source already is `<version_alias>_NNN`, in which case
/// `NNN + 1`.
#[must_use]
pub fn next_sequence(version_alias: &str, source_index: Option<&str>) -> u32 {
    source_index
        .and_then(|source| source.strip_prefix(version_alias))
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|n| n.parse::<u32>().ok())
        .map_or(1, |n| n + 1)
}

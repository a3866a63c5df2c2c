//! Migrator test kit
//!
//! One call wires settings, store, registry, migrator and repository the
//! way a node does at startup, so integration tests only describe what
//! differs (types, layout, versions, faults).

use anyhow::{bail, Context};
use serde_json::{json, Value};
use som_client::{DocumentStore, MemoryDocumentStore};
use som_config::{deep_merge, init_tracing, Env, NodeRoles, Settings, StackVersion, StaticVersion};
use som_migrator::{MigrationResult, Migrator, MigratorConfig};
use som_registry::{ModelVersion, TypeDefinition, TypeRegistry};
use som_repository::SavedObjectsRepository;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Saved-object index alias used by kits
pub const DEFAULT_KIBANA_INDEX: &str = ".kibana_migrator";

/// Task index alias used by kits
pub const DEFAULT_KIBANA_TASK_INDEX: &str = ".kibana_migrator_tasks";

/// Wraps the kit's store, e.g. with a [`FaultInjectingStore`](crate::FaultInjectingStore)
pub type ClientWrapper = Arc<dyn Fn(Arc<dyn DocumentStore>) -> Arc<dyn DocumentStore> + Send + Sync>;

/// Inputs of [`get_migrator_test_kit`]
#[derive(Clone)]
pub struct TestKitParams {
    /// Overrides deep-merged over the kit defaults
    pub settings: Value,
    /// Default saved-object index alias
    pub kibana_index: String,
    /// Stack version the migrator runs as
    pub kibana_version: StackVersion,
    /// Types to register
    pub types: Vec<TypeDefinition>,
    /// Removed legacy types
    pub removed_types: Vec<String>,
    /// Initial alias -> types layout
    pub default_index_types_map: BTreeMap<String, Vec<String>>,
    /// Legacy `type|hash` -> version resolution
    pub hash_to_version_map: BTreeMap<String, ModelVersion>,
    /// Node roles
    pub node_roles: NodeRoles,
    /// Backing store; a fresh in-memory one when `None`
    pub store: Option<Arc<dyn DocumentStore>>,
    /// Wrapper applied to the backing store
    pub client_wrapper: Option<ClientWrapper>,
    /// Write JSON logs here
    pub log_file_path: Option<PathBuf>,
}

impl Default for TestKitParams {
    fn default() -> Self {
        Self {
            settings: json!({}),
            kibana_index: DEFAULT_KIBANA_INDEX.to_string(),
            kibana_version: current_version(),
            types: Vec::new(),
            removed_types: Vec::new(),
            default_index_types_map: BTreeMap::new(),
            hash_to_version_map: BTreeMap::new(),
            node_roles: NodeRoles::default(),
            store: None,
            client_wrapper: None,
            log_file_path: None,
        }
    }
}

impl fmt::Debug for TestKitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestKitParams")
            .field("kibana_index", &self.kibana_index)
            .field("kibana_version", &self.kibana_version)
            .field("types", &self.types.len())
            .field("removed_types", &self.removed_types)
            .finish_non_exhaustive()
    }
}

/// Wired-up migrator and friends
pub struct MigratorTestKit {
    /// Defaults with the kit's overrides merged in
    pub settings: Settings,
    /// Environment resolved from the kit's version
    pub env: Env,
    /// Store the migrator and repository use (wrapped when a wrapper was given)
    pub client: Arc<dyn DocumentStore>,
    /// Registry holding the kit's types and removed types
    pub type_registry: Arc<TypeRegistry>,
    /// Migrator over `client` and `type_registry`
    pub migrator: Arc<Migrator>,
    /// Repository resolving indices through `migrator`
    pub saved_objects_repository: SavedObjectsRepository,
    has_run: AtomicBool,
}

impl fmt::Debug for MigratorTestKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigratorTestKit")
            .field("migrator", &self.migrator)
            .field("has_run", &self.has_run.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MigratorTestKit {
    /// Prepare and run the migrator; a kit runs once
    ///
    /// # Errors
    /// Fails on a second call, or when the migrator itself errors.
    pub async fn run_migrations(&self) -> anyhow::Result<Vec<MigrationResult>> {
        if self.has_run.swap(true, Ordering::SeqCst) {
            bail!("The test kit migrator can only be run once. Please instantiate it again.");
        }
        self.migrator.prepare_migrations().await?;
        Ok(self.migrator.run_migrations().await?)
    }
}

/// Build a kit
///
/// # Errors
/// Fails on invalid settings overrides, duplicate or removed type
/// registrations, or an unusable log file.
pub fn get_migrator_test_kit(params: TestKitParams) -> anyhow::Result<MigratorTestKit> {
    let defaults = json!({
        "saved_objects": { "index": params.kibana_index },
        "node": { "roles": params.node_roles },
        "logging": { "format": "json", "file": params.log_file_path },
    });
    let settings =
        Settings::from_overrides(deep_merge(defaults, params.settings)).context("invalid test kit settings")?;

    if settings.logging.file.is_some() {
        // The global subscriber is per process; later kits log through the first one
        if let Err(e) = init_tracing(&settings.logging) {
            tracing::debug!(error = %e, "tracing already initialised");
        }
    }

    let env = Env::from_provider(&StaticVersion::new(params.kibana_version, "main"));

    let mut registry = TypeRegistry::with_removed_types(params.removed_types);
    for definition in params.types {
        let name = definition.name.clone();
        registry
            .register_type(definition)
            .with_context(|| format!("registering type {name}"))?;
    }
    let type_registry = Arc::new(registry);

    let raw: Arc<dyn DocumentStore> = params
        .store
        .unwrap_or_else(|| Arc::new(MemoryDocumentStore::new()));
    let client = match &params.client_wrapper {
        Some(wrap) => wrap(raw),
        None => raw,
    };

    let config = MigratorConfig::from_settings(&settings, &env)
        .with_default_index_types_map(params.default_index_types_map)
        .with_hash_to_version_map(params.hash_to_version_map);
    let migrator = Arc::new(Migrator::new(Arc::clone(&type_registry), Arc::clone(&client), config));
    let saved_objects_repository =
        SavedObjectsRepository::create_repository(Arc::clone(&migrator), Arc::clone(&client));

    Ok(MigratorTestKit {
        settings,
        env,
        client,
        type_registry,
        migrator,
        saved_objects_repository,
        has_run: AtomicBool::new(false),
    })
}

/// Stack version of this build
#[must_use]
pub fn current_version() -> StackVersion {
    Env::default().version
}

/// Next minor after [`current_version`]
#[must_use]
pub fn next_minor() -> StackVersion {
    current_version().next_minor()
}

/// Read a kit log file
///
/// # Errors
/// Fails if the file cannot be read.
pub fn read_log(path: &std::path::Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Truncate a kit log file; a missing file is fine
pub fn clear_log(path: &std::path::Path) {
    if let Err(e) = std::fs::write(path, "") {
        tracing::debug!(path = %path.display(), error = %e, "could not clear log");
    }
}

//! Saved-object migrator
//!
//! One [`Migrator`] drives one migration run:
//! 1. `prepare_migrations` reads the cluster and builds a [`MigrationPlan`]
//! 2. `run_migrations` claims the run, then migrates every alias of the
//!    layout concurrently (bounded by `max_concurrency`)
//!
//! Per alias the outcome is `Created`, `Skipped`, `Migrated` or `Failed`.
//! A failed alias keeps pointing at its source index and the partially
//! written target is deleted.

use crate::config::MigratorConfig;
use crate::document_migrator::DocumentMigrator;
use crate::error::MigratorError;
use crate::mappings::{build_index_mappings, compute_index_types_map, mappings_match, IndexTypesMap, StoredMeta};
use crate::plan::{next_sequence, IndexPlan, MigrationPlan};
use crate::result::{MigrationFailure, MigrationResult, MigrationStatus};
use crate::state::{MigrationRun, RunState, RunStatus};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use som_client::{AliasAction, DocumentStore, StoredDocument};
use som_registry::{raw_type, RegistryError, SerializationError, TypeRegistry};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Saved-object migrator
pub struct Migrator {
    registry: Arc<TypeRegistry>,
    store: Arc<dyn DocumentStore>,
    document_migrator: DocumentMigrator,
    config: MigratorConfig,
    index_types_map: IndexTypesMap,
    state: RunState,
    run: Mutex<MigrationRun>,
    plan: Mutex<Option<MigrationPlan>>,
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("kibana_index", &self.config.kibana_index)
            .field("stack_version", &self.config.stack_version)
            .field("types", &self.registry.len())
            .field("status", &self.state.status())
            .finish_non_exhaustive()
    }
}

impl Migrator {
    /// Create migrator; the run starts out `NotStarted`
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>, store: Arc<dyn DocumentStore>, config: MigratorConfig) -> Self {
        let index_types_map =
            compute_index_types_map(&registry, &config.kibana_index, &config.default_index_types_map);
        Self {
            document_migrator: DocumentMigrator::new(Arc::clone(&registry)),
            registry,
            store,
            config,
            index_types_map,
            state: RunState::new(),
            run: Mutex::new(MigrationRun::new()),
            plan: Mutex::new(None),
        }
    }

    /// Type registry
    #[inline]
    #[must_use]
    pub fn get_type_registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Document migrator sharing this migrator's registry
    #[inline]
    #[must_use]
    pub fn document_migrator(&self) -> &DocumentMigrator {
        &self.document_migrator
    }

    /// Store this migrator writes to
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Default saved-object index alias
    #[inline]
    #[must_use]
    pub fn kibana_index(&self) -> &str {
        &self.config.kibana_index
    }

    /// Alias -> types layout
    #[inline]
    #[must_use]
    pub fn index_types_map(&self) -> &IndexTypesMap {
        &self.index_types_map
    }

    /// Alias a type is stored under
    ///
    /// # Errors
    /// - `Registry(RemovedType)` for removed legacy types
    /// - `Registry(UnknownType)` for types not in the layout
    pub fn index_for_type(&self, type_name: &str) -> Result<String, MigratorError> {
        if self.registry.is_removed_type(type_name) {
            return Err(RegistryError::RemovedType {
                name: type_name.to_string(),
            }
            .into());
        }
        self.index_types_map
            .iter()
            .find(|(_, types)| types.contains(type_name))
            .map(|(alias, _)| alias.clone())
            .ok_or_else(|| RegistryError::unknown(type_name).into())
    }

    /// Mappings the index behind `alias` is expected to have
    #[must_use]
    pub fn get_active_mappings(&self, alias: &str) -> Option<Value> {
        self.index_types_map
            .contains_key(alias)
            .then(|| build_index_mappings(&self.registry, alias, &self.index_types_map))
    }

    /// Current run status
    #[inline]
    #[must_use]
    pub fn run_status(&self) -> RunStatus {
        self.state.status()
    }

    /// Snapshot of the run
    #[must_use]
    pub fn run(&self) -> MigrationRun {
        let mut run = self.run.lock().clone();
        run.status = self.state.status();
        run
    }

    /// Cached plan, if prepared
    #[must_use]
    pub fn plan(&self) -> Option<MigrationPlan> {
        self.plan.lock().clone()
    }

    /// Read cluster state and build the migration plan
    ///
    /// Safe to call repeatedly; every call refreshes the cached plan.
    ///
    /// # Errors
    /// - `VersionMismatch` if an index records a type newer than registered
    /// - `Store` for backend failures other than a missing index
    pub async fn prepare_migrations(&self) -> Result<MigrationPlan, MigratorError> {
        let plan = self.build_plan().await?;
        tracing::debug!(
            indices = plan.indices.len(),
            requires_migration = plan.requires_migration(),
            "prepared migration plan"
        );
        *self.plan.lock() = Some(plan.clone());
        Ok(plan)
    }

    async fn build_plan(&self) -> Result<MigrationPlan, MigratorError> {
        let mut indices = Vec::with_capacity(self.index_types_map.len());
        for (alias, types) in &self.index_types_map {
            indices.push(self.plan_index(alias, types).await?);
        }
        Ok(MigrationPlan { indices })
    }

    async fn plan_index(&self, alias: &str, types: &BTreeSet<String>) -> Result<IndexPlan, MigratorError> {
        let mappings = build_index_mappings(&self.registry, alias, &self.index_types_map);
        let version_alias = self.config.version_alias(alias);

        let source = match self.store.get_index(alias).await {
            Ok(info) => Some(info),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let mut plan = IndexPlan {
            alias: alias.to_string(),
            source_index: None,
            legacy_source: false,
            source_aliases: BTreeSet::new(),
            target_index: String::new(),
            version_alias,
            types: types.clone(),
            mappings,
            requires_migration: true,
        };

        if let Some(info) = source {
            let stored = StoredMeta::from_mappings(&info.mappings)?;
            self.check_stored_versions(alias, &stored)?;
            plan.legacy_source = info.name == alias;
            plan.requires_migration = plan.legacy_source || !mappings_match(&stored, &plan.mappings);
            plan.source_aliases = info.aliases;
            plan.source_index = Some(info.name);
        }

        let mut sequence = next_sequence(&plan.version_alias, plan.source_index.as_deref());
        plan.target_index = self.config.target_index_name(alias, sequence);
        while plan.requires_migration && self.index_exists(&plan.target_index).await? {
            tracing::warn!(
                index = %alias,
                leftover = %plan.target_index,
                "target index already exists; using the next sequence"
            );
            sequence += 1;
            plan.target_index = self.config.target_index_name(alias, sequence);
        }
        Ok(plan)
    }

    /// Whether `name` is a concrete index, e.g. one left behind by a failed run
    async fn index_exists(&self, name: &str) -> Result<bool, MigratorError> {
        match self.store.get_index(name).await {
            Ok(info) => Ok(info.name == name),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn check_stored_versions(&self, alias: &str, stored: &StoredMeta) -> Result<(), MigratorError> {
        let recorded: BTreeSet<&String> = stored.doc_versions.keys().chain(stored.hashes.keys()).collect();
        for type_name in recorded {
            let Some(definition) = self.registry.get_type(type_name) else {
                continue;
            };
            let Some(version) = stored.version_of(type_name, &self.config.hash_to_version_map) else {
                continue;
            };
            if version > definition.current_version {
                return Err(MigratorError::VersionMismatch {
                    index: alias.to_string(),
                    type_name: type_name.clone(),
                    stored: version,
                    latest: definition.current_version,
                });
            }
        }
        Ok(())
    }

    /// Run migrations once
    ///
    /// Per-index failures are reported in the returned results and mark the
    /// run `Failed`; they do not make this call return `Err`.
    ///
    /// # Errors
    /// - `AlreadyRun` on every call after the first, whatever its outcome
    /// - `VersionMismatch` / `Store` from planning
    /// - `WaitTimeout` on a non-migrator node
    pub async fn run_migrations(&self) -> Result<Vec<MigrationResult>, MigratorError> {
        self.state.begin()?;
        let run_id = {
            let mut run = self.run.lock();
            run.started_at = Some(Utc::now());
            run.id
        };
        tracing::info!(
            run_id = %run_id,
            stack_version = %self.config.stack_version,
            indices = self.index_types_map.len(),
            "starting saved object migrations"
        );

        let outcome = self.execute().await;
        let status = match &outcome {
            Ok(results) if !results.iter().any(MigrationResult::is_failed) => RunStatus::Completed,
            _ => RunStatus::Failed,
        };
        self.state.transition(RunStatus::Running, status)?;

        {
            let mut run = self.run.lock();
            run.completed_at = Some(Utc::now());
            if let Ok(results) = &outcome {
                run.results.clone_from(results);
            }
        }

        match &outcome {
            Ok(results) => tracing::info!(
                run_id = %run_id,
                status = ?status,
                failed = results.iter().filter(|r| r.is_failed()).count(),
                "saved object migrations finished"
            ),
            Err(e) => tracing::error!(run_id = %run_id, error = %e, "saved object migrations aborted"),
        }
        outcome
    }

    async fn execute(&self) -> Result<Vec<MigrationResult>, MigratorError> {
        if self.config.migrations.skip {
            tracing::warn!("migrations.skip is set, not touching saved object indices");
            return Ok(self.skipped_results());
        }
        if !self.config.roles.migrator {
            return self.wait_for_migrations().await;
        }

        let plan = match self.plan() {
            Some(plan) => plan,
            None => self.prepare_migrations().await?,
        };
        let concurrency = self.config.migrations.max_concurrency.max(1);
        let mut results: Vec<MigrationResult> = stream::iter(plan.indices)
            .map(|index_plan| self.migrate_index(index_plan))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by(|a, b| a.index.cmp(&b.index));
        Ok(results)
    }

    fn skipped_results(&self) -> Vec<MigrationResult> {
        self.index_types_map
            .keys()
            .map(|alias| {
                MigrationResult::new(alias, self.config.target_index_name(alias, 1), MigrationStatus::Skipped)
            })
            .collect()
    }

    /// Poll until a migrator node has brought every alias up to date
    async fn wait_for_migrations(&self) -> Result<Vec<MigrationResult>, MigratorError> {
        let started = tokio::time::Instant::now();
        let timeout = self.config.migrations.wait_timeout();
        loop {
            let plan = self.build_plan().await?;
            if !plan.requires_migration() {
                *self.plan.lock() = Some(plan.clone());
                return Ok(plan.indices.into_iter().map(up_to_date_result).collect());
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(MigratorError::WaitTimeout {
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tracing::debug!(
                waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                "waiting for another node to complete migrations"
            );
            tokio::time::sleep(self.config.migrations.poll_interval()).await;
        }
    }

    async fn migrate_index(&self, plan: IndexPlan) -> MigrationResult {
        let started = Instant::now();
        if !plan.requires_migration {
            tracing::debug!(index = %plan.alias, "index is up to date");
            return up_to_date_result(plan);
        }

        let mut result = MigrationResult::new(&plan.alias, &plan.target_index, MigrationStatus::Created);
        result.source_index.clone_from(&plan.source_index);

        let outcome = match plan.source_index.as_deref() {
            None => self.create_target(&plan).await.map(|()| MigrationStatus::Created),
            Some(source) => self
                .reindex(&plan, source, &mut result)
                .await
                .map(|()| MigrationStatus::Migrated),
        };

        match outcome {
            Ok(status) => {
                result.status = status;
                tracing::info!(
                    index = %plan.alias,
                    target = %plan.target_index,
                    status = ?status,
                    documents = result.target_doc_count,
                    excluded = result.excluded_doc_count,
                    "index migration finished"
                );
            }
            Err(error) => {
                tracing::error!(index = %plan.alias, target = %plan.target_index, error = %error, "index migration failed");
                result.status = MigrationStatus::Failed;
                result.failure = Some(MigrationFailure::from(&error));
            }
        }
        result.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        result
    }

    async fn create_target(&self, plan: &IndexPlan) -> Result<(), MigratorError> {
        self.store
            .create_index(&plan.target_index, plan.mappings.clone(), self.config.index_settings.clone())
            .await?;
        let aliased = self
            .store
            .update_aliases(vec![
                AliasAction::add(&plan.target_index, &plan.alias),
                AliasAction::add(&plan.target_index, &plan.version_alias),
            ])
            .await;
        if let Err(e) = aliased {
            self.discard_target(plan).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn reindex(&self, plan: &IndexPlan, source: &str, result: &mut MigrationResult) -> Result<(), MigratorError> {
        let batch_size = self.config.migrations.batch_size.max(1);
        let documents = self.store.scan_all(source, batch_size).await?;
        result.source_doc_count = documents.len() as u64;

        let mut kept = Vec::with_capacity(documents.len());
        let mut unknown = BTreeSet::new();
        for raw in documents {
            match raw_type(&raw) {
                Some(type_name) if self.registry.is_removed_type(type_name) => result.excluded_doc_count += 1,
                Some(type_name) if plan.types.contains(type_name) => kept.push(raw),
                Some(type_name) => {
                    unknown.insert(type_name.to_string());
                }
                None => return Err(SerializationError::MissingType { id: raw.id }.into()),
            }
        }
        if result.excluded_doc_count > 0 {
            tracing::warn!(
                index = %plan.alias,
                excluded = result.excluded_doc_count,
                "excluding documents of removed types from reindex"
            );
        }
        if !unknown.is_empty() {
            return Err(MigratorError::UnknownDocumentTypes {
                index: plan.alias.clone(),
                types: unknown.into_iter().collect(),
            });
        }

        self.store
            .create_index(&plan.target_index, plan.mappings.clone(), self.config.index_settings.clone())
            .await?;
        match self.fill_target(plan, source, kept, batch_size).await {
            Ok(count) => {
                result.target_doc_count = count;
                Ok(())
            }
            Err(e) => {
                self.discard_target(plan).await;
                Err(e)
            }
        }
    }

    /// Transform, write, refresh, count and swap aliases; returns the target count
    async fn fill_target(
        &self,
        plan: &IndexPlan,
        source: &str,
        documents: Vec<StoredDocument>,
        batch_size: usize,
    ) -> Result<u64, MigratorError> {
        for batch in documents.chunks(batch_size) {
            let migrated = batch
                .iter()
                .map(|raw| self.document_migrator.migrate_raw(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let response = self.store.bulk_index(&plan.target_index, migrated).await?;
            if let Some(first) = response.errors.first() {
                return Err(MigratorError::BulkWriteFailed {
                    index: plan.target_index.clone(),
                    failed: response.errors.len(),
                    reason: format!("{}: {}", first.id, first.reason),
                });
            }
            tracing::debug!(index = %plan.alias, written = response.items, "wrote batch");
        }

        self.store.refresh(&plan.target_index).await?;
        let count = self.store.count(&plan.target_index).await?;

        let mut actions = Vec::with_capacity(4);
        if plan.legacy_source {
            actions.push(AliasAction::remove_index(source));
        } else {
            for alias in [&plan.alias, &plan.version_alias] {
                if plan.source_aliases.contains(alias) {
                    actions.push(AliasAction::remove(source, alias.as_str()));
                }
            }
        }
        actions.push(AliasAction::add(&plan.target_index, &plan.alias));
        actions.push(AliasAction::add(&plan.target_index, &plan.version_alias));
        self.store.update_aliases(actions).await?;
        Ok(count)
    }

    async fn discard_target(&self, plan: &IndexPlan) {
        match self.store.delete_index(&plan.target_index).await {
            Ok(()) => tracing::debug!(target = %plan.target_index, "deleted partially written index"),
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::warn!(target = %plan.target_index, error = %e, "failed to delete partially written index"),
        }
    }
}

fn up_to_date_result(plan: IndexPlan) -> MigrationResult {
    let target = plan.source_index.clone().unwrap_or(plan.target_index);
    let mut result = MigrationResult::new(plan.alias, target, MigrationStatus::Skipped);
    result.source_index = plan.source_index;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use som_client::{MemoryDocumentStore, MockDocumentStore, StoreError};
    use som_config::{Env, Settings, StackVersion};
    use som_registry::{ModelVersion, SavedObjectDoc, TransformError, TypeDefinition};

    fn registry() -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::with_removed_types(["server"]);
        registry
            .register_type(
                TypeDefinition::new("dashboard", ModelVersion::new(2, 0, 0))
                    .with_mappings(json!({"properties": {"title": {"type": "text"}}}))
                    .with_migration(ModelVersion::new(2, 0, 0), |mut doc: SavedObjectDoc| {
                        if doc.attributes.get("poison").is_some() {
                            return Err(TransformError::new("poisoned document"));
                        }
                        doc.attributes["migrated"] = json!(true);
                        Ok(doc)
                    }),
            )
            .unwrap();
        registry
            .register_type(TypeDefinition::new("task", ModelVersion::new(1, 0, 0)).with_index(".kibana_task_manager"))
            .unwrap();
        Arc::new(registry)
    }

    fn config(settings: &Settings) -> MigratorConfig {
        let env = Env {
            version: StackVersion::new(8, 18, 0),
            ..Env::default()
        };
        MigratorConfig::from_settings(settings, &env)
    }

    fn migrator_with(store: Arc<dyn DocumentStore>, settings: &Settings) -> Migrator {
        Migrator::new(registry(), store, config(settings))
    }

    fn raw(type_name: &str, id: &str, attributes: serde_json::Value, version: Option<ModelVersion>) -> StoredDocument {
        let mut doc = SavedObjectDoc::new(type_name, id, attributes);
        doc.type_migration_version = version;
        doc.to_raw()
    }

    async fn seed_index(store: &MemoryDocumentStore, index: &str, alias: &str, mappings: serde_json::Value, docs: Vec<StoredDocument>) {
        store.create_index(index, mappings, json!({})).await.unwrap();
        store.update_aliases(vec![AliasAction::add(index, alias)]).await.unwrap();
        store.bulk_index(index, docs).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_cluster_creates_indices() {
        let store = Arc::new(MemoryDocumentStore::new());
        let migrator = migrator_with(store.clone(), &Settings::default());

        let results = migrator.run_migrations().await.unwrap();
        let summary: Vec<(&str, MigrationStatus)> = results.iter().map(|r| (r.index.as_str(), r.status)).collect();
        assert_eq!(
            summary,
            vec![
                (".kibana", MigrationStatus::Created),
                (".kibana_task_manager", MigrationStatus::Created)
            ]
        );
        assert_eq!(store.get_alias(".kibana").await.unwrap(), vec![".kibana_8.18.0_001".to_string()]);
        assert_eq!(store.get_alias(".kibana_8.18.0").await.unwrap(), vec![".kibana_8.18.0_001".to_string()]);

        let info = store.get_index(".kibana").await.unwrap();
        assert_eq!(info.mappings["_meta"]["docVersions"]["dashboard"], "2.0.0");
        assert_eq!(migrator.run_status(), RunStatus::Completed);
        assert_eq!(migrator.run().results, results);
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let store = Arc::new(MemoryDocumentStore::new());
        let migrator = migrator_with(store, &Settings::default());
        migrator.run_migrations().await.unwrap();
        assert_eq!(migrator.run_migrations().await.unwrap_err(), MigratorError::AlreadyRun);
    }

    #[tokio::test]
    async fn second_run_is_rejected_after_failure() {
        let mut mock = MockDocumentStore::new();
        mock.expect_get_index()
            .returning(|_| Err(StoreError::status(500, "cluster unavailable")));
        let migrator = migrator_with(Arc::new(mock), &Settings::default());

        assert!(matches!(migrator.run_migrations().await, Err(MigratorError::Store(_))));
        assert_eq!(migrator.run_status(), RunStatus::Failed);
        assert_eq!(migrator.run_migrations().await.unwrap_err(), MigratorError::AlreadyRun);
    }

    #[tokio::test]
    async fn outdated_documents_are_reindexed() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.17.0_001",
            ".kibana",
            json!({"_meta": {"docVersions": {"dashboard": "1.0.0"}}}),
            vec![
                raw("dashboard", "a", json!({"title": "A"}), Some(ModelVersion::new(1, 0, 0))),
                raw("dashboard", "b", json!({"title": "B"}), None),
                raw("server", "legacy", json!({}), None),
            ],
        )
        .await;
        let migrator = migrator_with(store.clone(), &Settings::default());

        let results = migrator.run_migrations().await.unwrap();
        let kibana = &results[0];
        assert_eq!(kibana.status, MigrationStatus::Migrated);
        assert_eq!(kibana.source_index.as_deref(), Some(".kibana_8.17.0_001"));
        assert_eq!(kibana.target_index, ".kibana_8.18.0_001");
        assert_eq!(kibana.source_doc_count, 3);
        assert_eq!(kibana.excluded_doc_count, 1);
        assert_eq!(kibana.target_doc_count, 2);

        assert_eq!(store.get_alias(".kibana").await.unwrap(), vec![".kibana_8.18.0_001".to_string()]);
        let migrated = store.documents(".kibana");
        assert_eq!(migrated.len(), 2);
        for doc in &migrated {
            assert_eq!(doc.source["typeMigrationVersion"], "2.0.0");
            assert_eq!(doc.source["dashboard"]["migrated"], true);
        }
        // source index is kept
        assert_eq!(store.documents(".kibana_8.17.0_001").len(), 3);
    }

    #[tokio::test]
    async fn leftover_target_index_is_stepped_over() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.17.0_001",
            ".kibana",
            json!({"_meta": {"docVersions": {"dashboard": "1.0.0"}}}),
            vec![raw("dashboard", "a", json!({"title": "A"}), Some(ModelVersion::new(1, 0, 0)))],
        )
        .await;
        // left behind by an earlier run whose cleanup failed
        store
            .create_index(".kibana_8.18.0_001", json!({}), json!({}))
            .await
            .unwrap();

        let migrator = migrator_with(store.clone(), &Settings::default());
        let results = migrator.run_migrations().await.unwrap();
        let kibana = &results[0];
        assert_eq!(kibana.status, MigrationStatus::Migrated);
        assert_eq!(kibana.target_index, ".kibana_8.18.0_002");
        assert_eq!(store.get_alias(".kibana").await.unwrap(), vec![".kibana_8.18.0_002".to_string()]);
        assert_eq!(store.documents(".kibana").len(), 1);
    }

    #[tokio::test]
    async fn transform_failure_leaves_alias_and_other_indices_alone() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.17.0_001",
            ".kibana",
            json!({}),
            vec![
                raw("dashboard", "bad", json!({"poison": true}), Some(ModelVersion::new(1, 0, 0))),
                raw("dashboard", "ok", json!({}), Some(ModelVersion::new(1, 0, 0))),
            ],
        )
        .await;
        seed_index(
            &store,
            ".kibana_task_manager_8.17.0_001",
            ".kibana_task_manager",
            json!({}),
            vec![raw("task", "t1", json!({}), None)],
        )
        .await;
        let migrator = migrator_with(store.clone(), &Settings::default());

        let results = migrator.run_migrations().await.unwrap();
        let kibana = &results[0];
        assert_eq!(kibana.status, MigrationStatus::Failed);
        assert_eq!(
            kibana.failure,
            Some(MigrationFailure {
                type_name: Some("dashboard".into()),
                version: Some(ModelVersion::new(2, 0, 0)),
                document_id: Some("dashboard:bad".into()),
                reason: "poisoned document".into(),
            })
        );
        assert_eq!(store.get_alias(".kibana").await.unwrap(), vec![".kibana_8.17.0_001".to_string()]);
        assert!(!store.has_index(".kibana_8.18.0_001"));

        assert_eq!(results[1].status, MigrationStatus::Migrated);
        assert_eq!(
            store.get_alias(".kibana_task_manager").await.unwrap(),
            vec![".kibana_task_manager_8.18.0_001".to_string()]
        );
        assert_eq!(migrator.run_status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn up_to_date_indices_are_skipped() {
        let store = Arc::new(MemoryDocumentStore::new());
        migrator_with(store.clone(), &Settings::default()).run_migrations().await.unwrap();

        let next = migrator_with(store.clone(), &Settings::default());
        let results = next.run_migrations().await.unwrap();
        assert!(results.iter().all(|r| r.status == MigrationStatus::Skipped));
        assert_eq!(results[0].target_index, ".kibana_8.18.0_001");
        assert!(!store.has_index(".kibana_8.18.0_002"));
    }

    #[tokio::test]
    async fn same_version_remigration_bumps_sequence() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.18.0_001",
            ".kibana",
            json!({"_meta": {"docVersions": {"dashboard": "1.0.0"}}}),
            vec![raw("dashboard", "a", json!({}), Some(ModelVersion::new(1, 0, 0)))],
        )
        .await;
        store
            .update_aliases(vec![AliasAction::add(".kibana_8.18.0_001", ".kibana_8.18.0")])
            .await
            .unwrap();

        let migrator = migrator_with(store.clone(), &Settings::default());
        let results = migrator.run_migrations().await.unwrap();
        assert_eq!(results[0].target_index, ".kibana_8.18.0_002");
        assert_eq!(store.get_alias(".kibana_8.18.0").await.unwrap(), vec![".kibana_8.18.0_002".to_string()]);
    }

    #[tokio::test]
    async fn newer_stored_version_fails_preparation() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_9.0.0_001",
            ".kibana",
            json!({"_meta": {"docVersions": {"dashboard": "5.0.0"}}}),
            vec![],
        )
        .await;
        let migrator = migrator_with(store, &Settings::default());

        let err = migrator.prepare_migrations().await.unwrap_err();
        assert_eq!(
            err,
            MigratorError::VersionMismatch {
                index: ".kibana".into(),
                type_name: "dashboard".into(),
                stored: ModelVersion::new(5, 0, 0),
                latest: ModelVersion::new(2, 0, 0),
            }
        );
        assert!(migrator.run_migrations().await.is_err());
        assert_eq!(migrator.run_status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn legacy_hashes_resolve_through_hash_map() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.0.0_001",
            ".kibana",
            json!({"_meta": {"migrationMappingPropertyHashes": {"dashboard": "abc"}}}),
            vec![],
        )
        .await;
        let config = config(&Settings::default()).with_hash_to_version_map(
            [("dashboard|abc".to_string(), ModelVersion::new(3, 0, 0))].into_iter().collect(),
        );
        let migrator = Migrator::new(registry(), store, config);
        assert!(matches!(
            migrator.prepare_migrations().await,
            Err(MigratorError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_types_fail_the_index() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed_index(
            &store,
            ".kibana_8.17.0_001",
            ".kibana",
            json!({}),
            vec![raw("mystery", "m", json!({}), None)],
        )
        .await;
        let migrator = migrator_with(store.clone(), &Settings::default());

        let results = migrator.run_migrations().await.unwrap();
        assert_eq!(results[0].status, MigrationStatus::Failed);
        assert!(results[0].failure.as_ref().unwrap().reason.contains("unknown types: mystery"));
        assert!(!store.has_index(".kibana_8.18.0_001"));
    }

    #[tokio::test]
    async fn legacy_concrete_index_is_replaced() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert_document(".kibana", "dashboard:a", raw("dashboard", "a", json!({}), None).source);
        let migrator = migrator_with(store.clone(), &Settings::default());

        let results = migrator.run_migrations().await.unwrap();
        assert_eq!(results[0].status, MigrationStatus::Migrated);
        assert!(!store.has_index(".kibana"));
        assert_eq!(store.get_index(".kibana").await.unwrap().name, ".kibana_8.18.0_001");
    }

    #[tokio::test]
    async fn skip_setting_touches_nothing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let settings = Settings::from_overrides(json!({"migrations": {"skip": true}})).unwrap();
        let migrator = migrator_with(store.clone(), &settings);

        let results = migrator.run_migrations().await.unwrap();
        assert!(results.iter().all(|r| r.status == MigrationStatus::Skipped));
        assert!(store.calls().is_empty());
        assert_eq!(migrator.run_status(), RunStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn non_migrator_node_times_out() {
        let store = Arc::new(MemoryDocumentStore::new());
        let settings = Settings::from_overrides(json!({
            "node": {"roles": {"migrator": false}},
            "migrations": {"poll_interval_ms": 100, "wait_timeout_ms": 1000}
        }))
        .unwrap();
        let migrator = migrator_with(store.clone(), &settings);

        let err = migrator.run_migrations().await.unwrap_err();
        assert!(matches!(err, MigratorError::WaitTimeout { .. }));
        assert!(!store.calls().iter().any(|c| c.starts_with("create_index")));
    }

    #[tokio::test]
    async fn non_migrator_node_returns_once_up_to_date() {
        let store = Arc::new(MemoryDocumentStore::new());
        migrator_with(store.clone(), &Settings::default()).run_migrations().await.unwrap();

        let settings = Settings::from_overrides(json!({"node": {"roles": {"migrator": false}}})).unwrap();
        let follower = migrator_with(store, &settings);
        let results = follower.run_migrations().await.unwrap();
        assert!(results.iter().all(|r| r.status == MigrationStatus::Skipped));
    }

    #[test]
    fn layout_accessors() {
        let migrator = migrator_with(Arc::new(MemoryDocumentStore::new()), &Settings::default());
        assert_eq!(migrator.index_for_type("task").unwrap(), ".kibana_task_manager");
        assert_eq!(migrator.index_for_type("dashboard").unwrap(), ".kibana");
        assert!(matches!(
            migrator.index_for_type("server"),
            Err(MigratorError::Registry(RegistryError::RemovedType { .. }))
        ));
        assert!(migrator.get_active_mappings(".kibana").is_some());
        assert!(migrator.get_active_mappings(".nope").is_none());
        assert_eq!(migrator.run_status(), RunStatus::NotStarted);
        assert_eq!(migrator.get_type_registry().len(), 2);
    }
}

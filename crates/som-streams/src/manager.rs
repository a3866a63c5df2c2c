//! Stream asset manager
//!
//! A managed stream owns five assets, all named after the stream:
//! - data stream `<name>`
//! - index template `<name>@stream`
//! - component template `<name>@stream.layer`
//! - processing pipeline `<name>@stream.processing`
//! - reroute pipeline `<name>@stream.reroutes`
//!
//! An unmanaged (classic) stream only borrows the processing pipeline by
//! way of a `pipeline` processor somewhere in its `@custom` chain.

use crate::assets::{
    AccessPrivileges, ComponentTemplateDetails, NamedIndexTemplate, NamedPipeline, PipelineReference,
    StreamDefinition, UnmanagedElasticsearchAssetDetails, UnmanagedElasticsearchAssets,
};
use crate::error::StreamError;
use crate::lifecycle::get_data_stream_lifecycle;
use crate::locks::StreamLocks;
use crate::names::{
    component_template_name, index_template_name, index_patterns, is_custom_pipeline, processing_pipeline_name,
    reroute_pipeline_name,
};
use crate::EffectiveLifecycle;
use futures::future::try_join_all;
use serde_json::json;
use som_client::{DataStream, DocumentStore, IndexTemplate, IngestPipeline, Processor, StoreError, StoreResult};
use som_config::Settings;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Priority of managed index templates; above the built-in `logs-*-*` ones
pub const MANAGED_TEMPLATE_PRIORITY: u64 = 200;

/// Default bound on pipeline chain walks
pub const DEFAULT_MAX_PIPELINE_DEPTH: usize = 10;

const ACCESS_PRIVILEGES: [&str; 2] = ["read", "write"];

/// Creates, inspects and deletes stream assets
pub struct StreamAssetManager {
    store: Arc<dyn DocumentStore>,
    locks: StreamLocks,
    max_pipeline_depth: usize,
}

impl fmt::Debug for StreamAssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAssetManager")
            .field("locked_streams", &self.locks.len())
            .field("max_pipeline_depth", &self.max_pipeline_depth)
            .finish_non_exhaustive()
    }
}

impl StreamAssetManager {
    /// Create manager over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            locks: StreamLocks::new(),
            max_pipeline_depth: DEFAULT_MAX_PIPELINE_DEPTH,
        }
    }

    /// Create manager honoring `migrations.max_pipeline_depth`
    #[must_use]
    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: &Settings) -> Self {
        Self::new(store).with_max_pipeline_depth(settings.migrations.max_pipeline_depth)
    }

    /// Set pipeline chain bound
    #[must_use]
    pub fn with_max_pipeline_depth(mut self, depth: usize) -> Self {
        self.max_pipeline_depth = depth.max(1);
        self
    }

    /// Per-stream locks used by the mutating operations
    #[inline]
    #[must_use]
    pub fn locks(&self) -> &StreamLocks {
        &self.locks
    }

    /// Data stream backing `name`
    pub async fn get_data_stream(&self, name: &str) -> Result<DataStream, StreamError> {
        match self.store.get_data_stream(name).await {
            Ok(streams) => {
                let mut streams = streams.into_iter();
                let first = streams.next();
                let exact = first
                    .filter(|ds| ds.name == name)
                    .or_else(|| streams.find(|ds| ds.name == name));
                exact.ok_or_else(|| StreamError::definition_not_found(name))
            }
            Err(e) if e.is_not_found() => Err(StreamError::definition_not_found(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Effective lifecycle of `name`; the `error` variant when it has no data stream
    pub async fn get_effective_lifecycle(&self, name: &str) -> Result<EffectiveLifecycle, StreamError> {
        match self.get_data_stream(name).await {
            Ok(ds) => Ok(get_data_stream_lifecycle(Some(&ds))),
            Err(StreamError::DefinitionNotFound { .. }) => Ok(get_data_stream_lifecycle(None)),
            Err(e) => Err(e),
        }
    }

    /// Names of the assets behind an unmanaged data stream
    pub async fn get_unmanaged_elasticsearch_assets(
        &self,
        data_stream: &DataStream,
    ) -> Result<UnmanagedElasticsearchAssets, StreamError> {
        let template_name = &data_stream.template;
        let not_found = || StreamError::IndexTemplateNotFound {
            name: template_name.clone(),
        };

        let templates = match self.store.get_index_template(template_name).await {
            Ok(templates) => templates,
            Err(e) if e.is_not_found() => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let template = if templates.len() == 1 {
            templates.into_iter().next()
        } else {
            templates.into_iter().find(|t| &t.name == template_name)
        }
        .ok_or_else(not_found)?;

        let ingest_pipeline = match data_stream.write_index() {
            Some(write_index) => self
                .store
                .get_index(write_index)
                .await?
                .default_pipeline()
                .map(str::to_string),
            None => None,
        };

        Ok(UnmanagedElasticsearchAssets {
            index_template: template.name,
            component_templates: template.index_template.composed_of,
            ingest_pipeline,
            data_stream: data_stream.name.clone(),
        })
    }

    /// Full bodies of unmanaged assets; component templates that no longer exist come back without a body
    pub async fn get_unmanaged_elasticsearch_asset_details(
        &self,
        assets: &UnmanagedElasticsearchAssets,
    ) -> Result<UnmanagedElasticsearchAssetDetails, StreamError> {
        let all_templates = self.store.get_index_templates().await?;
        let index_template = all_templates
            .iter()
            .find(|t| t.name == assets.index_template)
            .map(|t| NamedIndexTemplate {
                name: t.name.clone(),
                index_template: t.index_template.clone(),
            })
            .ok_or_else(|| StreamError::IndexTemplateNotFound {
                name: assets.index_template.clone(),
            })?;

        let pipeline = async {
            match &assets.ingest_pipeline {
                Some(id) => Ok::<_, StreamError>(Some(NamedPipeline {
                    name: id.clone(),
                    pipeline: self.store.get_pipeline(id).await?,
                })),
                None => Ok(None),
            }
        };

        let components = try_join_all(assets.component_templates.iter().map(|name| {
            let all_templates = &all_templates;
            async move {
                let found = match self.store.get_component_templates(name).await {
                    Ok(items) => items.into_iter().find(|c| &c.name == name),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(StreamError::from(e)),
                };
                Ok(ComponentTemplateDetails {
                    name: name.clone(),
                    component_template: found.map(|c| c.component_template),
                    used_by: all_templates
                        .iter()
                        .filter(|t| t.index_template.composed_of.contains(name))
                        .map(|t| t.name.clone())
                        .collect(),
                })
            }
        }));

        let (ingest_pipeline, component_templates, data_stream) =
            futures::try_join!(pipeline, components, self.get_data_stream(&assets.data_stream))?;

        Ok(UnmanagedElasticsearchAssetDetails {
            ingest_pipeline,
            component_templates,
            index_template,
            data_stream,
        })
    }

    /// Walk from `pipeline_name` through trailing `@custom` pipelines until one
    /// invokes the processing pipeline of `stream`
    ///
    /// A missing pipeline counts as empty. Revisiting a pipeline or walking
    /// past `max_pipeline_depth` pipelines fails.
    pub async fn find_stream_managed_pipeline_reference(
        &self,
        pipeline_name: &str,
        stream: &str,
    ) -> Result<PipelineReference, StreamError> {
        let managed = processing_pipeline_name(stream);
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        let mut current = pipeline_name.to_string();

        loop {
            if !visited.insert(current.clone()) {
                chain.push(current.clone());
                return Err(StreamError::PipelineReferenceCycle { pipeline: current, chain });
            }
            if chain.len() >= self.max_pipeline_depth {
                return Err(StreamError::PipelineDepthExceeded {
                    start: pipeline_name.to_string(),
                    max_depth: self.max_pipeline_depth,
                });
            }
            chain.push(current.clone());

            let pipeline = match self.store.get_pipeline(&current).await {
                Ok(pipeline) => pipeline,
                Err(e) if e.is_not_found() => IngestPipeline::default(),
                Err(e) => return Err(e.into()),
            };

            if pipeline.processors.iter().any(|p| p.pipeline_name() == Some(managed.as_str())) {
                return Ok(PipelineReference {
                    target_pipeline_name: current,
                    target_pipeline: pipeline,
                    references_stream_managed_pipeline: true,
                });
            }

            let next = pipeline
                .processors
                .iter()
                .rev()
                .filter_map(Processor::pipeline_name)
                .find(|name| is_custom_pipeline(name))
                .map(str::to_string);

            match next {
                Some(next) => {
                    tracing::trace!(from = %current, to = %next, "following custom pipeline");
                    current = next;
                }
                None => {
                    return Ok(PipelineReference {
                        target_pipeline_name: current,
                        target_pipeline: pipeline,
                        references_stream_managed_pipeline: false,
                    })
                }
            }
        }
    }

    /// Read/write access to one stream
    pub async fn check_access(&self, name: &str) -> Result<AccessPrivileges, StreamError> {
        let mut bulk = self.check_access_bulk(&[name.to_string()]).await?;
        Ok(bulk.remove(name).unwrap_or_default())
    }

    /// Read/write access per stream; no request for an empty list
    pub async fn check_access_bulk(&self, names: &[String]) -> Result<BTreeMap<String, AccessPrivileges>, StreamError> {
        if names.is_empty() {
            return Ok(BTreeMap::new());
        }
        let privileges: Vec<String> = ACCESS_PRIVILEGES.iter().map(ToString::to_string).collect();
        let granted = self.store.has_privileges(names, &privileges).await?;

        Ok(names
            .iter()
            .map(|name| {
                let per_index = granted.get(name);
                let allowed = |p: &str| per_index.and_then(|m| m.get(p)).copied().unwrap_or(false);
                (
                    name.clone(),
                    AccessPrivileges {
                        read: allowed("read"),
                        write: allowed("write"),
                    },
                )
            })
            .collect())
    }

    /// Create or update every managed asset of `definition`
    ///
    /// Template and pipeline writes are idempotent puts; the data stream is
    /// only created when missing.
    pub async fn upsert_managed_stream_objects(&self, definition: &StreamDefinition) -> Result<(), StreamError> {
        let name = definition.name.as_str();
        let _guard = self.locks.lock(name).await;
        tracing::info!(stream = %name, "upserting stream objects");

        let mut layer = json!({ "mappings": { "properties": definition.fields } });
        if let Some(lifecycle) = &definition.lifecycle {
            layer["lifecycle"] = serde_json::to_value(lifecycle).map_err(|e| StoreError::Decode(e.to_string()))?;
        }
        self.store
            .put_component_template(
                &component_template_name(name),
                json!({ "template": layer, "_meta": { "managed": true } }),
            )
            .await?;

        let mut processors = definition.processors.clone();
        processors.push(Processor::pipeline(&reroute_pipeline_name(name)));
        self.store
            .put_pipeline(&processing_pipeline_name(name), managed_pipeline(processors, "processing"))
            .await?;

        let reroutes = definition.routing.iter().map(|r| r.to_processor()).collect();
        self.store
            .put_pipeline(&reroute_pipeline_name(name), managed_pipeline(reroutes, "reroutes"))
            .await?;

        let template = IndexTemplate {
            index_patterns: index_patterns(name),
            composed_of: vec![component_template_name(name)],
            priority: Some(MANAGED_TEMPLATE_PRIORITY),
            template: Some(json!({
                "settings": { "index": { "default_pipeline": processing_pipeline_name(name) } }
            })),
            data_stream: Some(json!({})),
            ignore_missing_component_templates: Vec::new(),
            meta: Some(json!({ "managed": true, "description": format!("Index template for stream {name}") })),
        };
        self.store.put_index_template(&index_template_name(name), template).await?;

        self.ensure_data_stream(name).await
    }

    async fn ensure_data_stream(&self, name: &str) -> Result<(), StreamError> {
        match self.get_data_stream(name).await {
            Ok(_) => {
                tracing::debug!(stream = %name, "data stream exists; mapping changes apply on rollover");
                Ok(())
            }
            Err(StreamError::DefinitionNotFound { .. }) => match self.store.create_data_stream(name).await {
                Err(e) if e.is_conflict() => Ok(()),
                other => other.map_err(StreamError::from),
            },
            Err(e) => Err(e),
        }
    }

    /// Delete every managed asset of `name`; already-absent ones are skipped
    pub async fn delete_managed_stream_objects(&self, name: &str) -> Result<(), StreamError> {
        let _guard = self.locks.lock(name).await;
        tracing::info!(stream = %name, "deleting managed stream objects");

        ignore_missing(self.store.delete_data_stream(name).await, "data_stream", name)?;
        let template = index_template_name(name);
        ignore_missing(self.store.delete_index_template(&template).await, "index_template", &template)?;
        let component = component_template_name(name);
        ignore_missing(
            self.store.delete_component_template(&component).await,
            "component_template",
            &component,
        )?;
        let processing = processing_pipeline_name(name);
        ignore_missing(self.store.delete_pipeline(&processing).await, "pipeline", &processing)?;
        let reroutes = reroute_pipeline_name(name);
        ignore_missing(self.store.delete_pipeline(&reroutes).await, "pipeline", &reroutes)
    }

    /// Alias of [`Self::delete_managed_stream_objects`]
    pub async fn delete_stream_objects(&self, name: &str) -> Result<(), StreamError> {
        self.delete_managed_stream_objects(name).await
    }

    /// Detach an unmanaged stream from its processing pipeline, then delete
    /// its data stream and the processing pipeline
    ///
    /// The index and component templates belong to whoever installed them
    /// and are left alone.
    pub async fn delete_unmanaged_stream_objects(&self, name: &str) -> Result<(), StreamError> {
        let _guard = self.locks.lock(name).await;
        let data_stream = self.get_data_stream(name).await?;
        let assets = self.get_unmanaged_elasticsearch_assets(&data_stream).await?;
        tracing::info!(stream = %name, template = %assets.index_template, "deleting unmanaged stream objects");

        if let Some(pipeline) = &assets.ingest_pipeline {
            let reference = self.find_stream_managed_pipeline_reference(pipeline, name).await?;
            if reference.references_stream_managed_pipeline {
                let managed = processing_pipeline_name(name);
                let mut body = reference.target_pipeline;
                body.processors.retain(|p| p.pipeline_name() != Some(managed.as_str()));
                tracing::debug!(pipeline = %reference.target_pipeline_name, "removing processing pipeline reference");
                self.store.put_pipeline(&reference.target_pipeline_name, body).await?;
            }
        }

        ignore_missing(self.store.delete_data_stream(name).await, "data_stream", name)?;
        let processing = processing_pipeline_name(name);
        ignore_missing(self.store.delete_pipeline(&processing).await, "pipeline", &processing)
    }
}

fn managed_pipeline(processors: Vec<Processor>, role: &str) -> IngestPipeline {
    IngestPipeline {
        description: Some(format!("Managed stream {role} pipeline")),
        meta: Some(json!({ "managed": true })),
        ..IngestPipeline::with_processors(processors)
    }
}

fn ignore_missing(result: StoreResult<()>, kind: &'static str, name: &str) -> Result<(), StreamError> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!(kind, name, "already absent");
            Ok(())
        }
        other => other.map_err(StreamError::from),
    }
}

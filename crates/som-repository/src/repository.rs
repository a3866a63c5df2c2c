//! Saved-object repository
//!
//! CRUD over the indices laid out by the [`Migrator`]. Every write is
//! stamped with the type's current model version; every read passes through
//! the document migrator so callers never see outdated attributes.

use crate::error::RepositoryError;
use crate::options::{BulkCreateObject, BulkGetObject, CreateOptions, FindOptions, FindResponse};
use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use som_client::{DocumentStore, OpType, Query, StoredDocument};
use som_migrator::Migrator;
use som_registry::{raw_id, SavedObjectDoc};
use std::fmt;
use std::sync::Arc;

/// Saved-object CRUD facade
pub struct SavedObjectsRepository {
    migrator: Arc<Migrator>,
    store: Arc<dyn DocumentStore>,
}

impl fmt::Debug for SavedObjectsRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavedObjectsRepository")
            .field("kibana_index", &self.migrator.kibana_index())
            .finish_non_exhaustive()
    }
}

impl SavedObjectsRepository {
    /// Create repository resolving indices through `migrator`
    #[must_use]
    pub fn create_repository(migrator: Arc<Migrator>, store: Arc<dyn DocumentStore>) -> Self {
        Self { migrator, store }
    }

    /// Migrator this repository reads its layout from
    #[inline]
    #[must_use]
    pub fn migrator(&self) -> &Arc<Migrator> {
        &self.migrator
    }

    fn index_for(&self, type_name: &str) -> Result<String, RepositoryError> {
        let registry = self.migrator.get_type_registry();
        if registry.is_removed_type(type_name) {
            return Err(RepositoryError::RemovedType {
                type_name: type_name.to_string(),
            });
        }
        if !registry.is_registered(type_name) {
            return Err(RepositoryError::UnsupportedType {
                type_name: type_name.to_string(),
            });
        }
        Ok(self.migrator.index_for_type(type_name)?)
    }

    fn current_version_stamp(&self, mut doc: SavedObjectDoc) -> SavedObjectDoc {
        if let Some(definition) = self.migrator.get_type_registry().get_type(&doc.type_name) {
            doc.type_migration_version = Some(definition.current_version);
        }
        doc.updated_at = Some(Utc::now());
        doc
    }

    fn read(&self, raw: &StoredDocument, type_name: &str, id: &str) -> Result<SavedObjectDoc, RepositoryError> {
        let doc = SavedObjectDoc::from_raw(raw)?;
        if doc.type_name != type_name {
            return Err(RepositoryError::not_found(type_name, id));
        }
        let migrator = self.migrator.document_migrator();
        if migrator.is_outdated(&doc)? {
            tracing::debug!(type_name, id, from = %doc.version(), "migrating document on read");
            return Ok(migrator.migrate(doc)?);
        }
        Ok(doc)
    }

    async fn write(&self, index: &str, doc: &SavedObjectDoc, op_type: OpType) -> Result<(), RepositoryError> {
        let raw = doc.to_raw();
        self.store
            .index_document(index, &raw.id, raw.source, op_type)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    RepositoryError::conflict(&doc.type_name, &doc.id)
                } else {
                    e.into()
                }
            })
    }

    /// Create an object
    ///
    /// # Errors
    /// - `UnsupportedType` / `RemovedType` for types this node cannot write
    /// - `Conflict` if the id exists and `overwrite` is off
    pub async fn create(
        &self,
        type_name: &str,
        attributes: Value,
        options: CreateOptions,
    ) -> Result<SavedObjectDoc, RepositoryError> {
        let index = self.index_for(type_name)?;
        let id = options.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let doc = self.current_version_stamp(
            SavedObjectDoc::new(type_name, id, attributes)
                .with_namespaces(options.namespaces)
                .with_references(options.references),
        );

        let op_type = if options.overwrite { OpType::Index } else { OpType::Create };
        self.write(&index, &doc, op_type).await?;
        tracing::debug!(type_name, id = %doc.id, index = %index, "created saved object");
        Ok(doc)
    }

    /// Create many objects; one result per input, in input order
    pub async fn bulk_create(&self, objects: Vec<BulkCreateObject>) -> Vec<Result<SavedObjectDoc, RepositoryError>> {
        join_all(
            objects
                .into_iter()
                .map(|o| async move { self.create(&o.type_name, o.attributes, o.options).await }),
        )
        .await
    }

    /// Fetch an object, migrated to its type's current version
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    /// - `Migration` if the stored document cannot be migrated
    pub async fn get(&self, type_name: &str, id: &str) -> Result<SavedObjectDoc, RepositoryError> {
        let index = self.index_for(type_name)?;
        let raw = match self.store.get_document(&index, &raw_id(type_name, id)).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => return Err(RepositoryError::not_found(type_name, id)),
            Err(e) => return Err(e.into()),
        };
        self.read(&raw, type_name, id)
    }

    /// Fetch many objects; one result per input, in input order
    pub async fn bulk_get(&self, objects: &[BulkGetObject]) -> Vec<Result<SavedObjectDoc, RepositoryError>> {
        join_all(objects.iter().map(|o| self.get(&o.type_name, &o.id))).await
    }

    /// Shallow-merge `attributes` into an existing object
    ///
    /// # Errors
    /// - `BadRequest` if `attributes` is not an object
    /// - `NotFound` if the object does not exist
    pub async fn update(&self, type_name: &str, id: &str, attributes: Value) -> Result<SavedObjectDoc, RepositoryError> {
        let Value::Object(partial) = attributes else {
            return Err(RepositoryError::BadRequest {
                reason: "update attributes must be an object".to_string(),
            });
        };
        let index = self.index_for(type_name)?;
        let mut doc = self.get(type_name, id).await?;

        match &mut doc.attributes {
            Value::Object(existing) => existing.extend(partial),
            other => *other = Value::Object(partial),
        }
        let doc = self.current_version_stamp(doc);
        self.write(&index, &doc, OpType::Index).await?;
        Ok(doc)
    }

    /// Delete an object
    ///
    /// # Errors
    /// - `NotFound` if the object does not exist
    pub async fn delete(&self, type_name: &str, id: &str) -> Result<(), RepositoryError> {
        let index = self.index_for(type_name)?;
        match self.store.delete_document(&index, &raw_id(type_name, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(RepositoryError::not_found(type_name, id)),
            Err(e) => Err(e.into()),
        }
    }

    /// One page of objects of a type
    ///
    /// A missing index yields an empty page.
    pub async fn find(&self, options: &FindOptions) -> Result<FindResponse<SavedObjectDoc>, RepositoryError> {
        let index = self.index_for(&options.type_name)?;
        let mut filters = vec![Query::term("type", options.type_name.as_str())];
        if let Some(namespace) = &options.namespace {
            filters.push(Query::term("namespaces", namespace.as_str()));
        }

        let page = match self
            .store
            .search(&index, Query::All(filters), options.from(), options.per_page)
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_not_found() => som_client::SearchResponse::default(),
            Err(e) => return Err(e.into()),
        };

        let saved_objects = page
            .hits
            .iter()
            .map(|raw| {
                let id = som_registry::parse_raw_id(&raw.id).map_or(raw.id.as_str(), |(_, id)| id);
                self.read(raw, &options.type_name, id)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FindResponse {
            page: options.page,
            per_page: options.per_page,
            total: page.total,
            saved_objects,
        })
    }
}

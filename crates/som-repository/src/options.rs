//! Request options and response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use som_registry::Reference;

/// Default page size of [`FindOptions`]
pub const DEFAULT_PER_PAGE: usize = 20;

/// Options for `create`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateOptions {
    /// Object id; generated when absent
    pub id: Option<String>,
    /// Replace an existing object instead of failing
    pub overwrite: bool,
    /// Outgoing references
    pub references: Vec<Reference>,
    /// Spaces the object lives in
    pub namespaces: Vec<String>,
}

impl CreateOptions {
    /// Create with a fixed id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Allow replacing an existing object
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set references
    #[must_use]
    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    /// Set namespaces
    #[must_use]
    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }
}

/// One object of a `bulk_create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkCreateObject {
    /// Type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Attributes
    pub attributes: Value,
    /// Id, references, namespaces, overwrite
    #[serde(default, flatten)]
    pub options: CreateOptions,
}

/// One object of a `bulk_get`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGetObject {
    /// Type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Object id
    pub id: String,
}

impl BulkGetObject {
    /// Create lookup key
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// Options for `find`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Type to list
    #[serde(rename = "type")]
    pub type_name: String,
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: usize,
    /// Page size
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    /// Only objects in this space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl FindOptions {
    /// First page of `type_name`
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            namespace: None,
        }
    }

    /// Set page and page size
    #[must_use]
    pub fn with_page(mut self, page: usize, per_page: usize) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Restrict to a space
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Offset of the first hit
    #[inline]
    #[must_use]
    pub fn from(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of `find`
#[derive(Debug, Clone, PartialEq)]
pub struct FindResponse<T> {
    /// Page number
    pub page: usize,
    /// Page size
    pub per_page: usize,
    /// Total matching objects
    pub total: u64,
    /// Objects on this page
    pub saved_objects: Vec<T>,
}

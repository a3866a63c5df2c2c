//! SOM Client - document-store adapter
//!
//! Every interaction with the search engine goes through the
//! [`DocumentStore`] trait:
//! - [`HttpDocumentStore`]: `reqwest` client with auth, timeouts and retries
//! - [`MemoryDocumentStore`]: deterministic in-process store for tests
//! - `MockDocumentStore`: `mockall` mock (feature `mock`)
//!
//! # Example
//!
//! ```rust,ignore
//! use som_client::{DocumentStore, HttpDocumentStore};
//! use som_config::Settings;
//!
//! let settings = Settings::default();
//! let store = HttpDocumentStore::from_settings(&settings.elasticsearch)?;
//! let info = store.info().await?;
//! println!("connected to {} {}", info.cluster_name, info.version);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod store;
pub mod types;

pub use error::{is_retryable_status, StoreError, StoreResult};
pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;
pub use retry::RetryPolicy;
#[cfg(any(test, feature = "mock"))]
pub use store::MockDocumentStore;
pub use store::DocumentStore;
pub use types::{
    wildcard_match, AliasAction, BulkItemError, BulkResponse, ClusterInfo, ComponentTemplateItem,
    DataStream, DataStreamIndex, DataStreamLifecycle, IndexInfo, IndexPrivileges, IndexTemplate,
    IndexTemplateItem, IngestPipeline, OpType, Processor, Query, SearchResponse, StoredDocument,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! SOM Streams - index-asset lifecycle for log streams
//!
//! Provides:
//! - [`StreamAssetManager`]: upsert/delete managed stream assets, inspect
//!   unmanaged ones, check access
//! - [`get_data_stream_lifecycle`]: effective ILM/DSL lifecycle of a data stream
//! - [`StreamLocks`]: per-stream write serialization
//!
//! # Example
//!
//! ```rust,ignore
//! use som_streams::{RoutingRule, StreamAssetManager, StreamDefinition};
//!
//! let manager = StreamAssetManager::from_settings(store, &settings);
//! let definition = StreamDefinition::new("logs")
//!     .with_route(RoutingRule::new("logs.nginx", "ctx.service == 'nginx'"));
//! manager.upsert_managed_stream_objects(&definition).await?;
//! manager.delete_managed_stream_objects("logs").await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod assets;
pub mod error;
pub mod lifecycle;
pub mod locks;
pub mod manager;
pub mod names;

pub use assets::{
    AccessPrivileges, ComponentTemplateDetails, EffectiveLifecycle, NamedIndexTemplate, NamedPipeline,
    PipelineReference, RoutingRule, StreamDefinition, UnmanagedElasticsearchAssetDetails,
    UnmanagedElasticsearchAssets,
};
pub use error::StreamError;
pub use lifecycle::get_data_stream_lifecycle;
pub use locks::StreamLocks;
pub use manager::{StreamAssetManager, DEFAULT_MAX_PIPELINE_DEPTH, MANAGED_TEMPLATE_PRIORITY};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

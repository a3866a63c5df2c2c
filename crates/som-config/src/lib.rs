//! SOM Config - runtime environment for the migration and stream layers
//!
//! Provides:
//! - [`Settings`]: explicit configuration with deep-merge over defaults
//! - [`Env`] / [`StackVersion`]: the stack version the migrator targets
//! - [`VersionProvider`]: injectable source of the stack version
//! - [`init_tracing`]: `tracing-subscriber` wiring driven by [`LoggingSettings`]
//!
//! # Example
//!
//! ```rust,ignore
//! use som_config::{Settings, Env};
//! use serde_json::json;
//!
//! let settings = Settings::from_overrides(json!({
//!     "migrations": { "batch_size": 50 }
//! }))?;
//! assert_eq!(settings.migrations.batch_size, 50);
//!
//! let env = Env::from_provider(&|| "8.18.0".parse().unwrap());
//! assert_eq!(env.version.next_minor().to_string(), "8.19.0");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod logging;
pub mod settings;
pub mod version;

pub use error::ConfigError;
pub use logging::{build_env_filter, init_tracing};
pub use settings::{
    deep_merge, ElasticsearchSettings, LogFormat, LoggingSettings, MigrationSettings, NodeSettings,
    SavedObjectsSettings, Settings,
};
pub use version::{BuildFlavor, Env, NodeRoles, StackVersion, StaticVersion, VersionProvider};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

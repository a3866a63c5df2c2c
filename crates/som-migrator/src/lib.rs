//! SOM Migrator - versioned saved-object migrations
//!
//! Provides:
//! - [`Migrator`]: plans and runs one migration run (at most once)
//! - [`DocumentMigrator`]: ordered per-type transform chains
//! - [`RunState`]: `NotStarted -> Running -> {Completed, Failed}` state machine
//! - [`mappings`]: index layout, mapping hashes and `_meta` bookkeeping
//!
//! # Example
//!
//! ```rust,ignore
//! use som_migrator::{Migrator, MigratorConfig};
//!
//! let config = MigratorConfig::from_settings(&settings, &env);
//! let migrator = Migrator::new(registry, store, config);
//! migrator.prepare_migrations().await?;
//! for result in migrator.run_migrations().await? {
//!     println!("{} -> {} ({:?})", result.index, result.target_index, result.status);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod document_migrator;
pub mod error;
pub mod mappings;
pub mod migrator;
pub mod plan;
pub mod result;
pub mod state;

pub use config::MigratorConfig;
pub use document_migrator::DocumentMigrator;
pub use error::MigratorError;
pub use mappings::{IndexTypesMap, StoredMeta};
pub use migrator::Migrator;
pub use plan::{IndexPlan, MigrationPlan};
pub use result::{MigrationFailure, MigrationResult, MigrationStatus};
pub use state::{allowed_transitions, validate_transition, MigrationRun, RunState, RunStatus};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! SOM Repository - saved-object CRUD
//!
//! [`SavedObjectsRepository`] reads and writes saved objects in the indices
//! laid out by a [`som_migrator::Migrator`], stamping writes with the current
//! model version and migrating outdated documents on read.
//!
//! # Example
//!
//! ```rust,ignore
//! use som_repository::{CreateOptions, FindOptions, SavedObjectsRepository};
//!
//! let repository = SavedObjectsRepository::create_repository(migrator, store);
//! repository.create("dashboard", json!({"title": "Overview"}), CreateOptions::with_id("d1")).await?;
//! let page = repository.find(&FindOptions::new("dashboard")).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod options;
pub mod repository;

pub use error::RepositoryError;
pub use options::{BulkCreateObject, BulkGetObject, CreateOptions, FindOptions, FindResponse, DEFAULT_PER_PAGE};
pub use repository::SavedObjectsRepository;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

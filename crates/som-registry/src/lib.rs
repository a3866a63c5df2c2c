//! SOM Registry - saved-object types and raw document layout
//!
//! Provides:
//! - [`TypeRegistry`]: registered types plus removed legacy names
//! - [`TypeDefinition`] / [`Migration`]: per-type model version and transforms
//! - [`ModelVersion`]: numerically ordered `major.minor.patch`
//! - [`SavedObjectDoc`]: logical document and its stored form
//!
//! # Example
//!
//! ```rust,ignore
//! use som_registry::{ModelVersion, TypeDefinition, TypeRegistry};
//!
//! let mut registry = TypeRegistry::with_removed_types(["server"]);
//! registry.register_type(
//!     TypeDefinition::new("dashboard", ModelVersion::new(2, 0, 0))
//!         .with_migration(ModelVersion::new(2, 0, 0), |mut doc| {
//!             doc.attributes["version"] = 2.into();
//!             Ok(doc)
//!         }),
//! )?;
//! assert!(registry.is_registered("dashboard"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod definition;
pub mod document;
pub mod error;
pub mod registry;
pub mod version;

pub use definition::{Migration, TransformError, TransformFn, TypeDefinition};
pub use document::{parse_raw_id, raw_id, raw_type, Reference, SavedObjectDoc};
pub use error::{RegistryError, SerializationError};
pub use registry::TypeRegistry;
pub use version::ModelVersion;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

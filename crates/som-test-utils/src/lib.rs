//! Testing utilities for the SOM workspace
//!
//! Shared kit, fixtures and fault injection for cross-crate tests.

#![allow(missing_docs)]

pub mod fault;
pub mod fixtures;
pub mod kit;

pub use fault::FaultInjectingStore;
pub use fixtures::{
    baseline_types, delete_saved_object_indices, fixture_document, get_aggregated_types_count, override_types,
    updated_types, ALL_SAVED_OBJECT_INDICES, UNKNOWN_TYPE,
};
pub use kit::{
    clear_log, current_version, get_migrator_test_kit, next_minor, read_log, ClientWrapper, MigratorTestKit,
    TestKitParams, DEFAULT_KIBANA_INDEX, DEFAULT_KIBANA_TASK_INDEX,
};

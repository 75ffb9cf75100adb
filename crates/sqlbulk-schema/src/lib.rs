//! Relational metadata for sqlbulk.
//!
//! This crate provides:
//! - `DbContext` and `MetadataFactory`, which turn entity field metadata into
//!   validated `TableMapping`s for one logical database context
//! - `MetadataCache`, the frozen process-wide snapshot of those mappings
//! - `TimeoutRegistry`, per-context and per-entity command timeouts
//! - `verify_mappings`, a check of mappings against a live database

pub mod cache;
pub mod mapping;
pub mod timeout;
pub mod verify;

pub use cache::{MetadataCache, MetadataCacheBuilder};
pub use mapping::{
    ColumnMapping, ContextTableMappings, DbContext, ForeignKeyReference, MetadataFactory,
    ModelBuilder, ReferencingColumn, TableMapping,
};
pub use timeout::{ContextTimeouts, TimeoutConfig, TimeoutRegistry, TimeoutRegistryBuilder};
pub use verify::{CatalogColumn, verify_mappings};

//! Core types and traits for sqlbulk.
//!
//! This crate provides the foundational abstractions the bulk engine is built on:
//!
//! - `Entity` and `Projection` traits describing mapped structs and result shapes
//! - `FieldInfo` column metadata produced by the derive macros
//! - `Connection` and `BulkConnection` traits implemented by drivers
//! - `StagingBuffer`, the columnar holding area for bulk loads
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod entity;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod row;
pub mod staging;
pub mod types;
pub mod value;

pub use connection::{BulkConnection, Connection, IsolationLevel};
pub use entity::{Entity, Projection, ProjectionField};
pub use error::{Error, Result};
pub use field::{FieldInfo, ReferentialAction};
pub use identifiers::{TableName, is_valid_identifier, quote_ident};
pub use row::{FromValue, Row};
pub use staging::{StagedColumn, StagingBuffer};
pub use types::{Affinity, SqlType};
pub use value::Value;

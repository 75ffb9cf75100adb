//! Set-based bulk SQL operations from typed predicates and projections.
//!
//! `sqlbulk` turns typed requests (delete these rows, update those, copy
//! the output of this query into that table) into parameterized SQL that
//! runs the whole operation inside the database, with no row-by-row round
//! trips. Large in-memory datasets go through a staging table loaded by the
//! driver's bulk path instead of becoming SQL text.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlbulk::prelude::*;
//! use sqlbulk_sqlite::SqliteConnection;
//!
//! #[derive(Entity, Debug, Clone)]
//! #[bulk(table = "users")]
//! struct User {
//!     #[bulk(primary_key, identity)]
//!     id: Option<i64>,
//!     name: String,
//!     is_active: bool,
//! }
//!
//! struct App;
//!
//! impl DbContext for App {
//!     const NAME: &'static str = "app";
//!
//!     fn configure(model: &mut ModelBuilder) {
//!         model.entity::<User>();
//!     }
//! }
//!
//! async fn example(cx: &Cx) -> Outcome<u64, Error> {
//!     let cache = MetadataCacheBuilder::new().register::<App>()?.freeze();
//!     let conn = SqliteConnection::open_memory()?;
//!     let ctx = BulkContext::<App, _>::new(
//!         Session::new(conn),
//!         &cache,
//!         Arc::new(TimeoutRegistry::unlimited()),
//!     );
//!
//!     ctx.bulk_delete::<User>(cx, !User::is_active).await
//! }
//! ```
//!
//! # Crates
//!
//! - `sqlbulk-core`: values, rows, errors, the `Entity`/`Projection` traits
//!   and the `Connection`/`BulkConnection` driver contract
//! - `sqlbulk-macros`: `#[derive(Entity)]` and `#[derive(Projection)]`
//! - `sqlbulk-schema`: table mappings, the metadata cache and timeouts
//! - `sqlbulk-query`: typed expressions and their translation to SQL
//! - `sqlbulk-session`: connection ownership, transactions, timeouts
//! - `sqlbulk-sqlite`: the SQLite driver
//!
//! Code generated by the derives names `sqlbulk_core` and `sqlbulk_query`
//! directly, so crates using them depend on both.

pub mod compose;
pub mod context;
pub mod transfer;

pub use compose::{BulkMode, BulkOperationPlan, PlanStep, Statement};
pub use context::BulkContext;

pub use sqlbulk_core::{
    BulkConnection, Connection, Cx, Entity, Error, FieldInfo, FromValue, IsolationLevel, Outcome,
    Projection, ProjectionField, ReferentialAction, Result, Row, SqlType, StagingBuffer,
    TableName, Value,
};
pub use sqlbulk_macros::{Entity, Projection};
pub use sqlbulk_query::{
    Assignments, Column, Expr, Filter, OrderBy, Predicate, Query, SelectQuery, SqlFragment,
};
pub use sqlbulk_schema::{
    ContextTableMappings, DbContext, MetadataCache, MetadataCacheBuilder, ModelBuilder,
    TableMapping, TimeoutConfig, TimeoutRegistry, verify_mappings,
};
pub use sqlbulk_session::{OperationGuard, Session, SessionConfig};

/// Everything an application typically needs.
pub mod prelude {
    pub use crate::{
        Assignments, BulkConnection, BulkContext, Column, Connection, Cx, DbContext, Entity,
        Error, Expr, Filter, MetadataCache, MetadataCacheBuilder, ModelBuilder, Outcome,
        Predicate, Projection, Query, Result, Row, SelectQuery, Session, SessionConfig,
        TimeoutRegistry, Value,
    };
    pub use std::sync::Arc;
}

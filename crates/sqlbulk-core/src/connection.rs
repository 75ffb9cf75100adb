//! Database connection traits.
//!
//! - [`Connection`] - executing statements and reading rows
//! - [`BulkConnection`] - the extra primitives the bulk engine needs from a
//!   driver: staging tables, bulk loading, identity reset
//! - [`IsolationLevel`] - transaction begin modes
//!
//! All operations integrate with asupersync's structured concurrency via `Cx`
//! context for proper cancellation.

use crate::error::Error;
use crate::identifiers::{TableName, quote_ident};
use crate::row::Row;
use crate::staging::StagingBuffer;
use crate::value::Value;
use asupersync::{Cx, Outcome};
use std::time::Duration;

/// Transaction begin mode.
///
/// SQLite serializes writers, so these control when the write lock is taken
/// rather than which anomalies are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Locks are acquired lazily on first read/write.
    #[default]
    Deferred,
    /// The write lock is taken at BEGIN.
    Immediate,
    /// No other connection may read or write until COMMIT.
    Exclusive,
}

impl IsolationLevel {
    /// Get the BEGIN statement for this level.
    #[must_use]
    pub const fn begin_sql(&self) -> &'static str {
        match self {
            IsolationLevel::Deferred => "BEGIN DEFERRED",
            IsolationLevel::Immediate => "BEGIN IMMEDIATE",
            IsolationLevel::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// A database connection capable of executing statements.
///
/// All operations are async and take a `Cx` context for cancellation support.
/// Implementations must be `Send + Sync` for use across async boundaries.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query(&cx, "SELECT * FROM users WHERE id = ?1", &[Value::Int(1)]).await?;
/// ```
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send;

    /// Execute a statement (INSERT, UPDATE, DELETE) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Arm (`Some`) or disarm (`None`) the statement timeout.
    ///
    /// While armed, a statement running past the deadline is aborted and
    /// reported as `Error::Timeout`. The deadline is measured from each
    /// statement's start.
    fn set_statement_timeout(&self, timeout: Option<Duration>);
}

/// Driver primitives for set-based bulk work.
pub trait BulkConnection: Connection {
    /// Create an empty transient table with the given columns of `target`.
    ///
    /// Returns the schema-qualified name of the new table.
    fn create_staging_table(
        &self,
        cx: &Cx,
        name: &str,
        target: &TableName,
        columns: &[&str],
    ) -> impl Future<Output = Outcome<TableName, Error>> + Send {
        let cols = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "CREATE TEMP TABLE {} AS SELECT {} FROM {} WHERE 0",
            quote_ident(name),
            cols,
            target.to_sql()
        );
        let staging = TableName::qualified("temp", name);
        async move {
            match self.execute(cx, &sql, &[]).await {
                Outcome::Ok(_) => Outcome::Ok(staging),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    /// Load every row of `buffer` into `table` without composing per-row SQL.
    ///
    /// Returns the number of rows loaded.
    fn copy_in(
        &self,
        cx: &Cx,
        table: &TableName,
        buffer: &StagingBuffer,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Drop a table if it exists.
    fn drop_table(
        &self,
        cx: &Cx,
        table: &TableName,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        let sql = format!("DROP TABLE IF EXISTS {}", table.to_sql());
        async move {
            match self.execute(cx, &sql, &[]).await {
                Outcome::Ok(_) => Outcome::Ok(()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    /// Reset the identity (auto-increment) counter of `table` so the next
    /// generated key starts over.
    fn reset_identity(
        &self,
        cx: &Cx,
        table: &TableName,
    ) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Check whether `table` exists.
    fn table_exists(
        &self,
        cx: &Cx,
        table: &TableName,
    ) -> impl Future<Output = Outcome<bool, Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolation_level_default() {
        assert_eq!(IsolationLevel::default(), IsolationLevel::Deferred);
    }

    #[test]
    fn test_isolation_level_begin_sql() {
        assert_eq!(IsolationLevel::Deferred.begin_sql(), "BEGIN DEFERRED");
        assert_eq!(IsolationLevel::Immediate.begin_sql(), "BEGIN IMMEDIATE");
        assert_eq!(IsolationLevel::Exclusive.begin_sql(), "BEGIN EXCLUSIVE");
    }
}

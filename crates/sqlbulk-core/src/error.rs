//! Error types for bulk operations.

use std::fmt;
use std::time::Duration;

/// The primary error type for all sqlbulk operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close, lost handle)
    Connection(ConnectionError),
    /// Statement execution errors reported by the driver
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Metadata or timeout configuration missing or malformed
    Config(ConfigError),
    /// Operation issued before the metadata cache was populated
    NotInitialized(NotInitializedError),
    /// Expression node without a SQL translation
    Translation(TranslationError),
    /// Projection outputs do not line up with the target columns
    ProjectionShape(ProjectionShapeError),
    /// Unbounded delete/update without explicit full-table intent
    MissingPredicate(MissingPredicateError),
    /// Plain truncate on a table other tables reference
    ForeignKeyConstraint(ForeignKeyError),
    /// Staging load or merge failure (staging artifacts already removed)
    BulkTransfer(BulkTransferError),
    /// A second operation was issued on a session that is already busy
    SessionInUse,
    /// I/O errors
    Io(std::io::Error),
    /// Statement exceeded its configured timeout and was aborted
    Timeout(TimeoutError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Handle closed or unusable
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database locked or busy
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on the session
    AlreadyActive,
    /// Commit or rollback without an open transaction
    NotActive,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug)]
pub struct NotInitializedError {
    /// What was looked up (a context or cache name)
    pub what: String,
}

#[derive(Debug)]
pub struct TranslationError {
    /// Short description of the offending expression node
    pub node: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ProjectionShapeError {
    /// Projection (wrapper) type name
    pub projection: &'static str,
    /// Target table name
    pub table: String,
    /// Number of assignable target columns
    pub expected: usize,
    /// Number of projection outputs
    pub actual: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct MissingPredicateError {
    pub operation: &'static str,
    pub table: String,
}

#[derive(Debug)]
pub struct ForeignKeyError {
    pub table: String,
    /// `table.column` pairs referencing `table`
    pub referenced_by: Vec<String>,
}

#[derive(Debug)]
pub struct BulkTransferError {
    pub table: String,
    pub staging_table: Option<String>,
    pub message: String,
    pub source: Option<Box<Error>>,
}

#[derive(Debug)]
pub struct TimeoutError {
    pub timeout: Option<Duration>,
    pub sql: Option<String>,
}

impl Error {
    /// Shorthand for a configuration error without a source.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Shorthand for a translation error.
    pub fn translation(node: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Translation(TranslationError {
            node: node.into(),
            message: message.into(),
        })
    }

    /// Timeouts are never retried by the engine; callers decide.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Timeout(t) => t.sql.as_deref(),
            Error::BulkTransfer(b) => b.source.as_deref().and_then(Error::sql),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a constraint violation (unique, foreign key, not null, check)?
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == QueryErrorKind::Constraint
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            Error::Translation(e) => write!(f, "Translation error: {}", e),
            Error::ProjectionShape(e) => write!(f, "Projection shape error: {}", e),
            Error::MissingPredicate(e) => write!(f, "Missing predicate: {}", e),
            Error::ForeignKeyConstraint(e) => write!(f, "Foreign key constraint: {}", e),
            Error::BulkTransfer(e) => write!(f, "Bulk transfer error: {}", e),
            Error::SessionInUse => write!(f, "Session is already in use by another operation"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout(e) => write!(f, "Operation timed out: {}", e),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::BulkTransfer(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for NotInitializedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} has not been populated", self.what)
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.node)
    }
}

impl fmt::Display for ProjectionShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projection {} against table '{}' (expected {}, got {}): {}",
            self.projection, self.table, self.expected, self.actual, self.message
        )
    }
}

impl fmt::Display for MissingPredicateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on '{}' has no predicate; use truncate for a full-table delete",
            self.operation, self.table
        )
    }
}

impl fmt::Display for ForeignKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot truncate '{}': referenced by {}; use truncate_with_foreign_keys",
            self.table,
            self.referenced_by.join(", ")
        )
    }
}

impl fmt::Display for BulkTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (table '{}'", self.message, self.table)?;
        if let Some(staging) = &self.staging_table {
            write!(f, ", staging '{}'", staging)?;
        }
        write!(f, ")")?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timeout {
            Some(timeout) => write!(f, "statement exceeded {} ms", timeout.as_millis()),
            None => write!(f, "statement exceeded its timeout"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<TranslationError> for Error {
    fn from(err: TranslationError) -> Self {
        Error::Translation(err)
    }
}

impl From<ProjectionShapeError> for Error {
    fn from(err: ProjectionShapeError) -> Self {
        Error::ProjectionShape(err)
    }
}

impl From<BulkTransferError> for Error {
    fn from(err: BulkTransferError) -> Self {
        Error::BulkTransfer(err)
    }
}

/// Result type alias for sqlbulk operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn bulk_transfer_error_exposes_cause() {
        let cause = Error::Query(QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO t SELECT * FROM s".to_string()),
            message: "NOT NULL constraint failed: t.name".to_string(),
            source: None,
        });
        let err = Error::BulkTransfer(BulkTransferError {
            table: "t".to_string(),
            staging_table: Some("bulk_stage_t_1".to_string()),
            message: "merge from staging failed".to_string(),
            source: Some(Box::new(cause)),
        });

        assert!(err.source().is_some());
        assert_eq!(err.sql(), Some("INSERT INTO t SELECT * FROM s"));
        let text = err.to_string();
        assert!(text.contains("bulk_stage_t_1"));
        assert!(text.contains("NOT NULL constraint failed"));
    }

    #[test]
    fn foreign_key_error_lists_referencing_tables() {
        let err = Error::ForeignKeyConstraint(ForeignKeyError {
            table: "customers".to_string(),
            referenced_by: vec!["orders.customer_id".to_string()],
        });
        let text = err.to_string();
        assert!(text.contains("customers"));
        assert!(text.contains("orders.customer_id"));
    }

    #[test]
    fn timeout_flag() {
        let err = Error::Timeout(TimeoutError {
            timeout: Some(Duration::from_millis(250)),
            sql: None,
        });
        assert!(err.is_timeout());
        assert!(err.to_string().contains("250 ms"));
        assert!(!Error::SessionInUse.is_timeout());
    }
}

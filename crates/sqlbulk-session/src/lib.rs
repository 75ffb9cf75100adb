//! Session and transaction coordination for sqlbulk.
//!
//! `sqlbulk-session` is the **unit-of-work layer**. A [`Session`] owns one
//! connection for the lifetime of a unit of work and coordinates:
//!
//! - **Exclusive use**: every operation holds an [`OperationGuard`]; a second
//!   operation issued while one is running fails immediately with
//!   `Error::SessionInUse` instead of interleaving statements.
//! - **Transactions**: at most one open transaction, begun with an explicit
//!   isolation level and ended by `commit`/`rollback`.
//! - **Timeouts**: a guard can arm the connection's statement timeout for the
//!   duration of one operation. Expiry surfaces as `Error::Timeout` and is
//!   never retried.
//! - **Staging names**: a per-session sequence for transient table names.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(SqliteConnection::open_memory()?);
//! session.begin(&cx).await?;
//! {
//!     let op = session.acquire()?.with_timeout(Some(Duration::from_secs(5)));
//!     op.connection().execute(&cx, "DELETE FROM logs", &[]).await?;
//! }
//! session.commit(&cx).await?;
//! ```

use asupersync::{Cx, Outcome};
use sqlbulk_core::error::{TransactionError, TransactionErrorKind};
use sqlbulk_core::{Connection, Error, IsolationLevel};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Begin mode used by [`Session::begin`].
    pub isolation: IsolationLevel,
    /// Statement timeout applied when an operation does not resolve one.
    pub default_timeout: Option<Duration>,
    /// Prefix of transient staging table names.
    pub staging_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationLevel::Deferred,
            default_timeout: None,
            staging_prefix: "bulk_stage".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn staging_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.staging_prefix = prefix.into();
        self
    }
}

/// One connection, owned for a unit of work.
pub struct Session<C: Connection> {
    connection: C,
    config: SessionConfig,
    in_use: AtomicBool,
    in_transaction: TransactionFlag,
    staging_seq: AtomicU64,
}

/// Open-transaction flag; warns when a session is dropped mid-transaction.
#[derive(Debug, Default)]
struct TransactionFlag(AtomicBool);

impl TransactionFlag {
    fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, open: bool) {
        self.0.store(open, Ordering::Release);
    }
}

impl Drop for TransactionFlag {
    fn drop(&mut self) {
        if self.get() {
            tracing::warn!(
                "session dropped with an open transaction; the driver rolls it back on close"
            );
        }
    }
}

impl<C: Connection> Session<C> {
    /// Create a new session from an existing connection.
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, SessionConfig::default())
    }

    /// Create a new session with custom configuration.
    pub fn with_config(connection: C, config: SessionConfig) -> Self {
        Self {
            connection,
            config,
            in_use: AtomicBool::new(false),
            in_transaction: TransactionFlag::default(),
            staging_seq: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// Whether an operation currently holds the session.
    pub fn is_busy(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Claim the session for one operation.
    ///
    /// Fails with `Error::SessionInUse` while another guard is alive.
    pub fn acquire(&self) -> Result<OperationGuard<'_, C>, Error> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("rejected concurrent session use");
            return Err(Error::SessionInUse);
        }
        Ok(OperationGuard {
            session: self,
            timeout_armed: false,
        })
    }

    /// Next transient table name for `table`: `<prefix>_<table>_<n>`.
    pub fn next_staging_name(&self, table: &str) -> String {
        let n = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{}", self.config.staging_prefix, table, n)
    }

    /// Begin a transaction with the configured isolation level.
    pub async fn begin(&self, cx: &Cx) -> Outcome<(), Error> {
        self.begin_with(cx, self.config.isolation).await
    }

    /// Begin a transaction with an explicit isolation level.
    pub async fn begin_with(&self, cx: &Cx, isolation: IsolationLevel) -> Outcome<(), Error> {
        let guard = match self.acquire() {
            Ok(guard) => guard,
            Err(e) => return Outcome::Err(e),
        };
        if self.in_transaction() {
            return Outcome::Err(transaction_error(
                TransactionErrorKind::AlreadyActive,
                "a transaction is already open on this session",
            ));
        }

        match guard.connection().execute(cx, isolation.begin_sql(), &[]).await {
            Outcome::Ok(_) => {
                self.in_transaction.set(true);
                tracing::debug!(isolation = ?isolation, "transaction begun");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Commit the open transaction.
    pub async fn commit(&self, cx: &Cx) -> Outcome<(), Error> {
        self.finish(cx, "COMMIT").await
    }

    /// Roll back the open transaction.
    pub async fn rollback(&self, cx: &Cx) -> Outcome<(), Error> {
        self.finish(cx, "ROLLBACK").await
    }

    async fn finish(&self, cx: &Cx, sql: &'static str) -> Outcome<(), Error> {
        let guard = match self.acquire() {
            Ok(guard) => guard,
            Err(e) => return Outcome::Err(e),
        };
        if !self.in_transaction() {
            return Outcome::Err(transaction_error(
                TransactionErrorKind::NotActive,
                format!("{} without an open transaction", sql),
            ));
        }

        match guard.connection().execute(cx, sql, &[]).await {
            Outcome::Ok(_) => {
                self.in_transaction.set(false);
                tracing::debug!(action = sql, "transaction finished");
                Outcome::Ok(())
            }
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Release the session, rolling back an open transaction first.
    ///
    /// Returns the connection so callers can reuse it.
    pub async fn close(self, cx: &Cx) -> Outcome<C, Error> {
        if self.in_transaction() {
            match self.rollback(cx).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }
        let Session { connection, .. } = self;
        Outcome::Ok(connection)
    }
}

impl<C: Connection> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("in_use", &self.is_busy())
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

/// Exclusive claim on a session for one operation.
///
/// Dropping the guard disarms any timeout it armed and frees the session.
pub struct OperationGuard<'s, C: Connection> {
    session: &'s Session<C>,
    timeout_armed: bool,
}

impl<'s, C: Connection> OperationGuard<'s, C> {
    /// Arm the statement timeout for this operation.
    ///
    /// `None` falls back to the session's default; with neither, statements
    /// run unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        let effective = timeout.or(self.session.config.default_timeout);
        if let Some(limit) = effective {
            self.session.connection.set_statement_timeout(Some(limit));
            self.timeout_armed = true;
            tracing::trace!(timeout_ms = limit.as_millis() as u64, "statement timeout armed");
        }
        self
    }

    pub fn connection(&self) -> &'s C {
        &self.session.connection
    }

    pub fn session(&self) -> &'s Session<C> {
        self.session
    }
}

impl<C: Connection> Drop for OperationGuard<'_, C> {
    fn drop(&mut self) {
        if self.timeout_armed {
            self.session.connection.set_statement_timeout(None);
        }
        self.session.in_use.store(false, Ordering::Release);
    }
}

fn transaction_error(kind: TransactionErrorKind, message: impl Into<String>) -> Error {
    Error::Transaction(TransactionError {
        kind,
        message: message.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use sqlbulk_core::{Row, Value};
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockState {
        executed: Vec<String>,
        timeouts: Vec<Option<Duration>>,
    }

    #[derive(Debug, Clone)]
    struct MockConnection {
        state: Arc<Mutex<MockState>>,
    }

    impl MockConnection {
        fn new() -> (Self, Arc<Mutex<MockState>>) {
            let state = Arc::new(Mutex::new(MockState::default()));
            (
                Self {
                    state: Arc::clone(&state),
                },
                state,
            )
        }
    }

    impl Connection for MockConnection {
        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
            async { Outcome::Ok(vec![]) }
        }

        fn query_one(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
            async { Outcome::Ok(None) }
        }

        fn execute(
            &self,
            _cx: &Cx,
            sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, Error>> + Send {
            let state = Arc::clone(&self.state);
            let sql = sql.to_string();
            async move {
                state.lock().expect("lock poisoned").executed.push(sql);
                Outcome::Ok(0)
            }
        }

        fn set_statement_timeout(&self, timeout: Option<Duration>) {
            self.state.lock().expect("lock poisoned").timeouts.push(timeout);
        }
    }

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.isolation, IsolationLevel::Deferred);
        assert_eq!(config.default_timeout, None);
        assert_eq!(config.staging_prefix, "bulk_stage");
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let (conn, _) = MockConnection::new();
        let session = Session::new(conn);

        let guard = session.acquire().unwrap();
        assert!(session.is_busy());
        assert!(matches!(session.acquire(), Err(Error::SessionInUse)));
        drop(guard);

        assert!(!session.is_busy());
        assert!(session.acquire().is_ok());
    }

    #[test]
    fn test_begin_while_busy_fails_without_sql() {
        let rt = RuntimeBuilder::current_thread().build().unwrap();
        let cx = Cx::for_testing();
        let (conn, state) = MockConnection::new();
        let session = Session::new(conn);

        rt.block_on(async {
            let _guard = session.acquire().unwrap();
            match session.begin(&cx).await {
                Outcome::Err(Error::SessionInUse) => {}
                other => panic!("unexpected {other:?}"),
            }
        });
        assert!(state.lock().unwrap().executed.is_empty());
        assert!(!session.in_transaction());
    }

    #[test]
    fn test_transaction_lifecycle() {
        let rt = RuntimeBuilder::current_thread().build().unwrap();
        let cx = Cx::for_testing();
        let (conn, state) = MockConnection::new();
        let session =
            Session::with_config(conn, SessionConfig::default().isolation(IsolationLevel::Immediate));

        rt.block_on(async {
            unwrap_outcome(session.begin(&cx).await);
            assert!(session.in_transaction());

            match session.begin(&cx).await {
                Outcome::Err(Error::Transaction(e)) => {
                    assert_eq!(e.kind, TransactionErrorKind::AlreadyActive);
                }
                other => panic!("unexpected {other:?}"),
            }

            unwrap_outcome(session.commit(&cx).await);
            assert!(!session.in_transaction());

            match session.rollback(&cx).await {
                Outcome::Err(Error::Transaction(e)) => {
                    assert_eq!(e.kind, TransactionErrorKind::NotActive);
                }
                other => panic!("unexpected {other:?}"),
            }

            unwrap_outcome(session.begin_with(&cx, IsolationLevel::Exclusive).await);
            unwrap_outcome(session.rollback(&cx).await);
        });

        assert_eq!(
            state.lock().unwrap().executed,
            ["BEGIN IMMEDIATE", "COMMIT", "BEGIN EXCLUSIVE", "ROLLBACK"]
        );
    }

    #[test]
    fn test_timeout_armed_for_one_operation() {
        let (conn, state) = MockConnection::new();
        let session = Session::new(conn);

        {
            let _op = session
                .acquire()
                .unwrap()
                .with_timeout(Some(Duration::from_millis(250)));
        }
        {
            // Neither an operation timeout nor a session default: untouched.
            let _op = session.acquire().unwrap().with_timeout(None);
        }

        assert_eq!(
            state.lock().unwrap().timeouts,
            [Some(Duration::from_millis(250)), None]
        );
    }

    #[test]
    fn test_default_timeout_fallback() {
        let (conn, state) = MockConnection::new();
        let session = Session::with_config(
            conn,
            SessionConfig::default().default_timeout(Duration::from_secs(3)),
        );
        drop(session.acquire().unwrap().with_timeout(None));
        assert_eq!(
            state.lock().unwrap().timeouts,
            [Some(Duration::from_secs(3)), None]
        );
    }

    #[test]
    fn test_staging_names_are_sequential() {
        let (conn, _) = MockConnection::new();
        let session = Session::with_config(conn, SessionConfig::default().staging_prefix("stg"));
        assert_eq!(session.next_staging_name("users"), "stg_users_0");
        assert_eq!(session.next_staging_name("users"), "stg_users_1");
        assert_eq!(session.next_staging_name("teams"), "stg_teams_2");
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let rt = RuntimeBuilder::current_thread().build().unwrap();
        let cx = Cx::for_testing();
        let (conn, state) = MockConnection::new();
        let session = Session::new(conn);

        rt.block_on(async {
            unwrap_outcome(session.begin(&cx).await);
            let _conn = unwrap_outcome(session.close(&cx).await);
        });
        assert_eq!(
            state.lock().unwrap().executed,
            ["BEGIN DEFERRED", "ROLLBACK"]
        );
    }
}

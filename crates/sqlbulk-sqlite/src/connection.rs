//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing [`Connection`] and
//! [`BulkConnection`] from sqlbulk-core.
//!
//! Statement timeouts use SQLite's progress handler: the VM polls a shared
//! deadline every few hundred instructions and aborts the statement once it
//! has passed. An abort caused by the deadline is reported as
//! `Error::Timeout`; any other interrupt stays a query error.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers
#![allow(clippy::if_not_else)] // Clearer for error handling

use crate::ffi;
use crate::types;
use sqlbulk_core::{
    BulkConnection, Connection, Cx, Error, Outcome, Row, StagingBuffer, TableName, Value,
    error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, TimeoutError},
    quote_ident,
    row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_int, c_void};
use std::future::Future;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// VM instructions between deadline checks.
const PROGRESS_OPS: c_int = 256;

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Enforce `REFERENCES` clauses (`PRAGMA foreign_keys = ON`).
    pub foreign_keys: bool,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            foreign_keys: false,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Turn foreign key enforcement on or off.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}

/// Deadline shared with the progress handler.
///
/// Times are nanoseconds since `origin`; `u64::MAX` means no deadline.
struct Watchdog {
    origin: Instant,
    timeout_ns: AtomicU64,
    deadline_ns: AtomicU64,
    fired: AtomicBool,
}

impl Watchdog {
    const NONE: u64 = u64::MAX;

    fn new() -> Self {
        Self {
            origin: Instant::now(),
            timeout_ns: AtomicU64::new(Self::NONE),
            deadline_ns: AtomicU64::new(Self::NONE),
            fired: AtomicBool::new(false),
        }
    }

    fn now_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX - 1)
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        let ns = timeout.map_or(Self::NONE, |t| {
            u64::try_from(t.as_nanos()).unwrap_or(Self::NONE - 1)
        });
        self.timeout_ns.store(ns, Ordering::Release);
    }

    fn timeout(&self) -> Option<Duration> {
        match self.timeout_ns.load(Ordering::Acquire) {
            Self::NONE => None,
            ns => Some(Duration::from_nanos(ns)),
        }
    }

    /// Start the clock for one statement.
    fn arm(&self) -> ArmedStatement<'_> {
        self.fired.store(false, Ordering::Release);
        let deadline = match self.timeout_ns.load(Ordering::Acquire) {
            Self::NONE => Self::NONE,
            ns => self.now_ns().saturating_add(ns),
        };
        self.deadline_ns.store(deadline, Ordering::Release);
        ArmedStatement { watchdog: self }
    }

    fn expired(&self) -> bool {
        let deadline = self.deadline_ns.load(Ordering::Acquire);
        if deadline != Self::NONE && self.now_ns() >= deadline {
            self.fired.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Clears the statement deadline when the statement finishes.
struct ArmedStatement<'a> {
    watchdog: &'a Watchdog,
}

impl Drop for ArmedStatement<'_> {
    fn drop(&mut self) {
        self.watchdog
            .deadline_ns
            .store(Watchdog::NONE, Ordering::Release);
    }
}

unsafe extern "C" fn progress_tick(arg: *mut c_void) -> c_int {
    // SAFETY: arg is the Watchdog registered in `open`, which is boxed and
    // outlives the database handle.
    let watchdog = unsafe { &*arg.cast::<Watchdog>() };
    c_int::from(watchdog.expired())
}

/// Inner state of the SQLite connection, protected by a mutex for thread safety.
struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: SQLite handles can be safely sent between threads when properly
// synchronized. We use a Mutex to ensure synchronization.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// This is a thread-safe wrapper around a SQLite database handle.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
    watchdog: Box<Watchdog>,
}

// SqliteConnection is Send + Sync because all handle access goes through the
// Mutex and the watchdog is only touched through atomics.
unsafe impl Send for SqliteConnection {}
unsafe impl Sync for SqliteConnection {}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if !db.is_null() {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            } else {
                ffi::error_string(rc).to_string()
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        let watchdog = Box::new(Watchdog::new());

        // SAFETY: db is valid; the watchdog is heap allocated and dropped
        // only after the handle is closed (see Drop).
        unsafe {
            if config.busy_timeout_ms > 0 {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
            ffi::sqlite3_progress_handler(
                db,
                PROGRESS_OPS,
                Some(progress_tick),
                ptr::from_ref::<Watchdog>(&*watchdog).cast_mut().cast(),
            );
        }

        let conn = Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
            watchdog,
        };

        if config.foreign_keys {
            conn.execute_raw("PRAGMA foreign_keys = ON")?;
        }

        tracing::debug!(path = %conn.path, "opened sqlite database");
        Ok(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        // The handle stays consistent even if a holder panicked mid-call.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing (for DDL, multi-statement
    /// scripts, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock();
        let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;

        let mut errmsg_ptr: *mut std::ffi::c_char = ptr::null_mut();
        let _armed = self.watchdog.arm();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(
                inner.db,
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg_ptr,
            )
        };

        if rc != ffi::SQLITE_OK {
            let msg = if !errmsg_ptr.is_null() {
                // SAFETY: errmsg_ptr is a sqlite-allocated C string we own
                unsafe {
                    let msg = CStr::from_ptr(errmsg_ptr).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg_ptr.cast());
                    msg
                }
            } else {
                ffi::error_string(rc).to_string()
            };
            return Err(self.classify(rc, sql, msg));
        }

        Ok(())
    }

    /// Whether a transaction is open on this handle.
    pub fn in_transaction(&self) -> bool {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(inner.db) == 0 }
    }

    /// Prepare and execute a query, returning all rows.
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let inner = self.lock();
        let _armed = self.watchdog.arm();
        let stmt = prepare_stmt(inner.db, sql)?;

        if let Err(err) = check_param_count(stmt, sql, params) {
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(err);
        }
        // SAFETY: stmt is valid
        if let Err(index) = unsafe { types::bind_all(stmt, params) } {
            let err = bind_error(inner.db, sql, index);
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(err);
        }

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i < col_count
            let name =
                unsafe { types::column_name(stmt, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => {
                    let err = self.step_error(inner.db, sql);
                    // SAFETY: stmt is valid
                    unsafe { ffi::sqlite3_finalize(stmt) };
                    return Err(err);
                }
            }
        }

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };

        tracing::trace!(sql = %sql, rows = rows.len(), "query");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected.
    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let inner = self.lock();
        let _armed = self.watchdog.arm();
        let stmt = prepare_stmt(inner.db, sql)?;

        if let Err(err) = check_param_count(stmt, sql, params) {
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(err);
        }
        // SAFETY: stmt is valid
        if let Err(index) = unsafe { types::bind_all(stmt, params) } {
            let err = bind_error(inner.db, sql, index);
            // SAFETY: stmt is valid
            unsafe { ffi::sqlite3_finalize(stmt) };
            return Err(err);
        }

        // Step until done so statements with RETURNING or PRAGMAs that
        // yield rows still run to completion.
        let rc = loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            if rc != ffi::SQLITE_ROW {
                break rc;
            }
        };

        let result = match rc {
            ffi::SQLITE_DONE => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                Ok(changes as u64)
            }
            _ => Err(self.step_error(inner.db, sql)),
        };

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };

        if let Ok(changes) = &result {
            tracing::trace!(sql = %sql, rows = *changes, "execute");
        }
        result
    }

    /// Load every row of `buffer` into `table` through one prepared INSERT.
    fn copy_in_sync(&self, table: &TableName, buffer: &StagingBuffer) -> Result<u64, Error> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let columns: Vec<String> = buffer.column_names().map(quote_ident).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.to_sql(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let inner = self.lock();
        let _armed = self.watchdog.arm();
        let stmt = prepare_stmt(inner.db, &sql)?;

        let mut loaded = 0u64;
        let mut failure = None;
        for index in 0..buffer.row_count() {
            let Some(row) = buffer.row(index) else {
                break;
            };
            for (i, value) in row.into_iter().enumerate() {
                // SAFETY: stmt is valid, i + 1 <= column count
                let rc = unsafe { types::bind_value(stmt, (i + 1) as c_int, value) };
                if rc != ffi::SQLITE_OK {
                    failure = Some(bind_error(inner.db, &sql, i + 1));
                    break;
                }
            }
            if failure.is_some() {
                break;
            }

            // SAFETY: stmt is valid and fully bound
            let rc = unsafe { ffi::sqlite3_step(stmt) };
            if rc != ffi::SQLITE_DONE {
                failure = Some(self.step_error(inner.db, &sql));
                break;
            }
            loaded += 1;

            // SAFETY: stmt is valid; reset keeps the compiled program
            unsafe {
                ffi::sqlite3_reset(stmt);
                ffi::sqlite3_clear_bindings(stmt);
            }
        }

        // SAFETY: stmt is valid
        unsafe { ffi::sqlite3_finalize(stmt) };

        match failure {
            Some(err) => Err(err),
            None => {
                tracing::debug!(table = %table, rows = loaded, "bulk load");
                Ok(loaded)
            }
        }
    }

    fn reset_identity_sync(&self, table: &TableName) -> Result<(), Error> {
        let schema = table.schema_or_main();
        if !self.table_exists_sync(&TableName::qualified(schema, "sqlite_sequence"))? {
            // No AUTOINCREMENT table exists in this schema; plain rowids
            // restart on their own once the table is empty.
            return Ok(());
        }
        let sql = format!(
            "DELETE FROM {}.\"sqlite_sequence\" WHERE name = ?1",
            quote_ident(schema)
        );
        self.execute_sync(&sql, &[Value::Text(table.name.clone())])?;
        Ok(())
    }

    fn table_exists_sync(&self, table: &TableName) -> Result<bool, Error> {
        let master = match table.schema_or_main() {
            "temp" => "sqlite_temp_master".to_string(),
            schema => format!("{}.sqlite_master", quote_ident(schema)),
        };
        let sql = format!(
            "SELECT 1 FROM {} WHERE type = 'table' AND name = ?1",
            master
        );
        let rows = self.query_sync(&sql, &[Value::Text(table.name.clone())])?;
        Ok(!rows.is_empty())
    }

    fn step_error(&self, db: *mut ffi::sqlite3, sql: &str) -> Error {
        // SAFETY: db is valid
        let (code, msg) = unsafe { (ffi::sqlite3_errcode(db), errmsg(db)) };
        self.classify(code, sql, msg)
    }

    fn classify(&self, code: c_int, sql: &str, message: String) -> Error {
        if code == ffi::SQLITE_INTERRUPT && self.watchdog.fired() {
            tracing::debug!(sql = %sql, "statement aborted by timeout");
            return Error::Timeout(TimeoutError {
                timeout: self.watchdog.timeout(),
                sql: Some(sql.to_string()),
            });
        }
        Error::Query(QueryError {
            kind: error_code_to_kind(code),
            sql: Some(sql.to_string()),
            message,
            source: None,
        })
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid. close_v2 rolls back any open transaction
            // and finalizes the handle; the watchdog outlives this call.
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
        }
    }
}

/// Wrap a synchronous driver result into a ready future.
fn ready<T: Send>(result: Result<T, Error>) -> impl Future<Output = Outcome<T, Error>> + Send {
    async move { result.map_or_else(Outcome::Err, Outcome::Ok) }
}

impl Connection for SqliteConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        ready(self.query_sync(sql, params))
    }

    fn query_one(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        ready(
            self.query_sync(sql, params)
                .map(|rows| rows.into_iter().next()),
        )
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        ready(self.execute_sync(sql, params))
    }

    fn set_statement_timeout(&self, timeout: Option<Duration>) {
        self.watchdog.set_timeout(timeout);
    }
}

impl BulkConnection for SqliteConnection {
    fn copy_in(
        &self,
        _cx: &Cx,
        table: &TableName,
        buffer: &StagingBuffer,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        ready(self.copy_in_sync(table, buffer))
    }

    fn reset_identity(
        &self,
        _cx: &Cx,
        table: &TableName,
    ) -> impl Future<Output = Outcome<(), Error>> + Send {
        ready(self.reset_identity_sync(table))
    }

    fn table_exists(
        &self,
        _cx: &Cx,
        table: &TableName,
    ) -> impl Future<Output = Outcome<bool, Error>> + Send {
        ready(self.table_exists_sync(table))
    }
}

// Helper functions

/// # Safety
/// `db` must be a valid, open handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: errmsg always returns a valid NUL-terminated string for an
    // open handle
    unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn nul_in_sql(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<*mut ffi::sqlite3_stmt, Error> {
    let c_sql = CString::new(sql).map_err(|_| nul_in_sql(sql))?;

    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            db,
            c_sql.as_ptr(),
            c_sql.as_bytes().len() as c_int,
            &mut stmt,
            ptr::null_mut(),
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(prepare_error(db, sql));
    }
    if stmt.is_null() {
        // Empty or comment-only SQL compiles to no program.
        return Err(Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some(sql.to_string()),
            message: "SQL contains no statement".to_string(),
            source: None,
        }));
    }

    Ok(stmt)
}

fn prepare_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (code, msg) = unsafe { (ffi::sqlite3_errcode(db), errmsg(db)) };

    // Prepare failures are mostly syntax or unknown objects.
    let kind = match error_code_to_kind(code) {
        QueryErrorKind::Database if msg.starts_with("no such") => QueryErrorKind::NotFound,
        QueryErrorKind::Database if msg.contains("syntax error") => QueryErrorKind::Syntax,
        kind => kind,
    };

    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message: msg,
        source: None,
    })
}

// Unbound placeholders would silently read as NULL.
fn check_param_count(stmt: *mut ffi::sqlite3_stmt, sql: &str, params: &[Value]) -> Result<(), Error> {
    // SAFETY: stmt is a valid prepared statement
    let expected = unsafe { ffi::sqlite3_bind_parameter_count(stmt) };
    if usize::try_from(expected).is_ok_and(|n| n == params.len()) {
        return Ok(());
    }
    Err(Error::Query(QueryError {
        kind: QueryErrorKind::Database,
        sql: Some(sql.to_string()),
        message: format!(
            "statement expects {} parameters, {} supplied",
            expected,
            params.len()
        ),
        source: None,
    }))
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { errmsg(db) };

    Error::Query(QueryError {
        kind: QueryErrorKind::Database,
        sql: Some(sql.to_string()),
        message: format!("Failed to bind parameter {}: {}", param_index, msg),
        source: None,
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    // Extended codes carry the primary code in the low byte.
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    }
}

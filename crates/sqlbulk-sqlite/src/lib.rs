//! SQLite driver for sqlbulk.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! Implements `Connection` and `BulkConnection` from sqlbulk-core over FFI
//! bindings to a bundled libsqlite3.
//!
//! # Features
//!
//! - Parameter binding for every `Value` variant
//! - Bulk loading through one prepared `INSERT`, re-bound per row
//! - Temporary staging tables and `sqlite_sequence` identity reset
//! - Per-statement timeouts backed by the progress handler
//! - In-memory and file-based databases with configurable open flags
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlbulk_sqlite::{SqliteConnection, SqliteConfig};
//! use sqlbulk_core::{Connection, Value, Cx, Outcome};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//! let cx = Cx::for_testing();
//! match conn.insert(&cx, "INSERT INTO users (name) VALUES (?1)", &[Value::from("Alice")]).await {
//!     Outcome::Ok(id) => println!("Inserted user with id: {}", id),
//!     Outcome::Err(e) => eprintln!("Error: {}", e),
//!     _ => {}
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite storage |
//! |-------|----------------|
//! | `Bool` | INTEGER (0/1) |
//! | `TinyInt`, `SmallInt`, `Int`, `BigInt` | INTEGER |
//! | `Float`, `Double` | REAL |
//! | `Text`, `Json` | TEXT |
//! | `Bytes` | BLOB |
//! | `Null` | NULL |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`; the handle sits behind a
//! mutex and the timeout state is atomic.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}

//! SQLite executor for tablemap.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate implements the `Connection` trait from tablemap-core on top of
//! the bundled libsqlite3, so the mapper can run against an in-memory or
//! file database without any server.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablemap_sqlite::SqliteConnection;
//! use tablemap_core::{Connection, Cx, Outcome, Value};
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE authors (id TEXT PRIMARY KEY, name TEXT)").unwrap();
//!
//! let cx = Cx::for_testing();
//! match conn.execute(&cx, "INSERT INTO authors VALUES (?1, ?2)", &[Value::from("a1"), Value::from("Ada")]).await {
//!     Outcome::Ok(n) => println!("inserted {n} row(s)"),
//!     Outcome::Err(e) => eprintln!("Error: {}", e),
//!     _ => {}
//! }
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Timestamp` | INTEGER (microseconds) |
//! | `Json` | TEXT |
//! | `Null` | NULL |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

pub mod connection;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// The SQLite library version.
pub fn sqlite_version() -> String {
    // SAFETY: sqlite3_libversion returns a static NUL-terminated string
    unsafe { std::ffi::CStr::from_ptr(libsqlite3_sys::sqlite3_libversion()) }
        .to_string_lossy()
        .into_owned()
}

/// The SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    // SAFETY: no preconditions
    unsafe { libsqlite3_sys::sqlite3_libversion_number() }
}

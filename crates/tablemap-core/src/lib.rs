//! Core types and traits for tablemap.
//!
//! This crate provides the foundational abstractions shared by the mapper
//! engine and its executors:
//!
//! - `Value` and `Row` for data exchanged with the store
//! - `TableSchema` and `Record` for binding a struct to a table
//! - `Relation` for foreign-key links between record types
//! - `Connection` trait for executors
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod relation;
pub mod row;
pub mod schema;
pub mod time;
pub mod value;

pub use connection::{Connection, Dialect};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, NotFoundError, QueryError, QueryErrorKind,
    Result, TypeError, ValidationError, ValidationErrorKind,
};
pub use relation::Relation;
pub use row::{ColumnInfo, FromValue, Row};
pub use schema::{Column, PrimaryKey, Record, TableSchema};
pub use time::Timestamp;
pub use value::{Value, ValueKey, Zero};

//! tablemap - a generic typed table mapper.
//!
//! One engine, parameterized by an explicit [`TableSchema`], binds records
//! to the rows of one table and provides:
//!
//! - cached INSERT / UPDATE / upsert statement generation driven by
//!   [`Columns`] policies
//! - primary-key find / exists / reload / delete
//! - soft delete through a nullable `deleted_at` column
//! - an ordered before/after hook registry per lifecycle event
//! - a small query builder and batched slice operations
//! - foreign-key accessors, eager loaders and relation setters via [`Link`]
//!
//! Every operation takes a caller-supplied executor implementing
//! [`Connection`]; the mapper never opens connections or transactions.
//!
//! # Quick Start
//!
//! ```ignore
//! use tablemap::column;
//! use tablemap::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Author {
//!     id: String,
//!     name: String,
//!     created_at: Timestamp,
//!     updated_at: Timestamp,
//!     deleted_at: Option<Timestamp>,
//! }
//!
//! impl Record for Author {
//!     fn schema() -> TableSchema<Self> {
//!         TableSchema::new("authors", vec![
//!             column!(Self, id).primary_key().with_default(),
//!             column!(Self, name),
//!             column!(Self, created_at).with_default(),
//!             column!(Self, updated_at).with_default(),
//!             column!(Self, deleted_at).with_default(),
//!         ])
//!     }
//! }
//!
//! async fn example(cx: &Cx, conn: &impl Connection) {
//!     let authors = Mapper::<Author>::new();
//!     let mut ada = Author { name: "Ada".into(), ..Author::default() };
//!     match authors.insert(cx, conn, &mut ada, &Columns::infer()).await {
//!         Outcome::Ok(()) => println!("inserted {}", ada.id),
//!         Outcome::Err(e) => eprintln!("Error: {e}"),
//!         _ => {}
//!     }
//! }
//! ```

#![allow(clippy::result_large_err)] // Error type is defined in tablemap-core

/// Unwrap an `Outcome`, returning early from the enclosing async fn on
/// anything but `Ok`. With a format string, errors get that context.
macro_rules! try_outcome {
    ($e:expr) => {
        match $e {
            $crate::Outcome::Ok(v) => v,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
    ($e:expr, $($context:tt)+) => {
        match $e {
            $crate::Outcome::Ok(v) => v,
            $crate::Outcome::Err(e) => {
                return $crate::Outcome::Err(e.context(format!($($context)+)));
            }
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
macro_rules! try_result {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return $crate::Outcome::Err(e),
        }
    };
}

pub mod cache;
pub mod columns;
pub mod config;
pub mod hooks;
pub mod mapper;
pub mod query;
pub mod relation;
pub mod sql;

pub use tablemap_core::{
    Column, Connection, Cx, Dialect, Error, FromValue, Outcome, PrimaryKey, Record, Relation,
    Result, Row, TableSchema, Timestamp, Value, ValidationErrorKind, Zero, column,
};

pub use cache::{CacheKey, CachedStatement, ColumnsKey, StatementCache};
pub use columns::{Columns, ColumnsKind, InsertSet};
pub use config::MapperConfig;
pub use hooks::{HookPoint, Hooks};
pub use mapper::{Mapper, UpsertOptions};
pub use query::Query;
pub use relation::Link;

/// Commonly used types, for glob import.
///
/// The `column!` macro is not included: a glob import of it is ambiguous
/// with `std::column!`, so import it by name.
pub mod prelude {
    pub use crate::{
        Column, Columns, Connection, Cx, Error, HookPoint, Link, Mapper, MapperConfig, Outcome,
        PrimaryKey, Query, Record, Relation, TableSchema, Timestamp, UpsertOptions, Value,
    };
}

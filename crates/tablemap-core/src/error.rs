//! Error types for mapper operations.

use std::fmt;

/// The primary error type for all tablemap operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, lost handle)
    Connection(ConnectionError),
    /// Statement execution errors reported by the store
    Query(QueryError),
    /// Type conversion errors while binding rows to records
    Type(TypeError),
    /// Preconditions rejected before touching the store
    Validation(ValidationError),
    /// A single-record fetch matched no row
    NotFound(NotFoundError),
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Custom error with message, typically raised by a hook
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
    /// Failed to open the store
    Connect,
    /// The handle is no longer usable
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
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Store busy or locked
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

/// A precondition failure detected by the mapper itself.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The update column set came out empty
    EmptyWhitelist,
    /// Upsert asked to update on conflict but no update columns remain
    EmptyConflictUpdate,
    /// A bulk update was given no columns to set
    EmptyUpdateSet,
    /// A column name is not part of the table schema
    UnknownColumn,
    /// A primary key value list does not match the key columns
    KeyMismatch,
    /// The table schema declares no primary key
    MissingPrimaryKey,
    /// A raw condition's `?` markers do not match its arguments
    ArgumentCount,
}

/// No row matched a single-record fetch.
#[derive(Debug, Clone)]
pub struct NotFoundError {
    pub table: String,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            table: table.into(),
            message: message.into(),
        }
    }
}

impl Error {
    /// Shorthand for a validation error.
    pub fn validation(
        kind: ValidationErrorKind,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Validation(ValidationError::new(kind, table, message))
    }

    pub fn not_found(table: impl Into<String>) -> Self {
        Error::NotFound(NotFoundError {
            table: table.into(),
        })
    }

    /// Is this the distinguished "no row" signal?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Is this a validation failure of the given kind?
    pub fn is_validation(&self, kind: ValidationErrorKind) -> bool {
        matches!(self, Error::Validation(v) if v.kind == kind)
    }

    /// Prefix store-reported messages with operation context.
    ///
    /// The variant and kind stay the same, so callers can still branch on
    /// constraint violations and the like.
    #[must_use]
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            Error::Query(mut e) => {
                e.message = format!("{context}: {}", e.message);
                Error::Query(e)
            }
            Error::Connection(mut e) => {
                e.message = format!("{context}: {}", e.message);
                Error::Connection(e)
            }
            other => other,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a unique or other constraint violation?
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == QueryErrorKind::Constraint
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::NotFound(e) => write!(f, "{}", e),
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.message)
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no rows in {}", self.table)
    }
}

impl std::error::Error for ValidationError {}

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

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

/// Result type alias for tablemap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_error() -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Constraint,
            sql: Some("INSERT INTO \"authors\" DEFAULT VALUES".to_string()),
            message: "UNIQUE constraint failed: authors.email".to_string(),
            source: None,
        })
    }

    #[test]
    fn context_keeps_kind() {
        let err = constraint_error().context("unable to insert into authors");
        match &err {
            Error::Query(q) => {
                assert!(q.is_constraint_violation());
                assert_eq!(
                    q.message,
                    "unable to insert into authors: UNIQUE constraint failed: authors.email"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.sql(), Some("INSERT INTO \"authors\" DEFAULT VALUES"));
    }

    #[test]
    fn context_leaves_validation_untouched() {
        let err = Error::validation(
            ValidationErrorKind::EmptyWhitelist,
            "authors",
            "could not build whitelist",
        )
        .context("ignored");
        assert!(err.is_validation(ValidationErrorKind::EmptyWhitelist));
        assert_eq!(
            err.to_string(),
            "Validation error: authors: could not build whitelist"
        );
    }

    #[test]
    fn not_found_is_distinct() {
        let err = Error::not_found("authors");
        assert!(err.is_not_found());
        assert!(!constraint_error().is_not_found());
        assert_eq!(err.to_string(), "no rows in authors");
    }
}

//! Table schema descriptors.
//!
//! A [`TableSchema`] is an ordered list of [`Column`]s, each carrying a pair
//! of plain function pointers that read a field into a [`Value`] and write a
//! [`Value`] back into the field. The mapper engine is driven entirely by
//! this value; there is no per-table generated code.
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, Default)]
//! struct Author {
//!     id: String,
//!     name: String,
//!     created_at: Timestamp,
//! }
//!
//! impl Record for Author {
//!     fn schema() -> TableSchema<Self> {
//!         TableSchema::new("authors", vec![
//!             column!(Self, id).primary_key().with_default(),
//!             column!(Self, name),
//!             column!(Self, created_at).with_default(),
//!         ])
//!     }
//! }
//! ```

use crate::error::{Error, ValidationErrorKind};
use crate::row::{Row, with_column};
use crate::{Result, Value};
use std::fmt;

/// Reads a column value out of a record.
pub type Getter<R> = fn(&R) -> Value;

/// Writes a column value into a record.
pub type Setter<R> = fn(&mut R, &Value) -> Result<()>;

/// Tests whether a record field holds its zero value.
pub type ZeroTest<R> = fn(&R) -> bool;

/// One column of a table, bound to a record field.
pub struct Column<R> {
    name: &'static str,
    get: Getter<R>,
    set: Setter<R>,
    zero: Option<ZeroTest<R>>,
    primary_key: bool,
    has_default: bool,
}

impl<R> Column<R> {
    pub const fn new(name: &'static str, get: Getter<R>, set: Setter<R>) -> Self {
        Self {
            name,
            get,
            set,
            zero: None,
            primary_key: false,
            has_default: false,
        }
    }

    /// Test zero-ness on the field itself instead of on its [`Value`].
    ///
    /// Without one, a column is zero when [`Value::is_zero`] says so, which
    /// cannot tell `Some(false)` from `None`.
    pub const fn zero_test(mut self, test: ZeroTest<R>) -> Self {
        self.zero = Some(test);
        self
    }

    /// Mark this column as (part of) the primary key.
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark this column as having a store-side default.
    ///
    /// Such columns are only written on insert when non-zero and are
    /// otherwise read back through `RETURNING`.
    pub const fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub const fn has_default(&self) -> bool {
        self.has_default
    }

    /// Read this column from a record.
    pub fn read(&self, record: &R) -> Value {
        (self.get)(record)
    }

    /// Whether the record's field holds its zero value.
    pub fn is_zero(&self, record: &R) -> bool {
        match self.zero {
            Some(test) => test(record),
            None => self.read(record).is_zero(),
        }
    }

    /// Write a value into this column of a record.
    #[allow(clippy::result_large_err)]
    pub fn write(&self, record: &mut R, value: &Value) -> Result<()> {
        (self.set)(record, value).map_err(|e| with_column(e, self.name))
    }
}

impl<R> Clone for Column<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Column<R> {}

impl<R> fmt::Debug for Column<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .field("has_default", &self.has_default)
            .finish()
    }
}

/// Ordered column metadata for one table.
pub struct TableSchema<R> {
    table: &'static str,
    columns: Vec<Column<R>>,
}

impl<R> TableSchema<R> {
    pub fn new(table: &'static str, columns: Vec<Column<R>>) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// All columns in declared order.
    pub fn columns(&self) -> &[Column<R>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column<R>> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Resolve a column name to its index, or fail with `UnknownColumn`.
    #[allow(clippy::result_large_err)]
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            Error::validation(
                ValidationErrorKind::UnknownColumn,
                self.table,
                format!("unknown column \"{name}\""),
            )
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Indices of the primary-key columns.
    pub fn primary_key(&self) -> Vec<usize> {
        self.indices_where(Column::is_primary_key)
    }

    /// Indices of columns with a store-side default.
    pub fn with_default(&self) -> Vec<usize> {
        self.indices_where(Column::has_default)
    }

    /// Indices of columns without a store-side default.
    pub fn without_default(&self) -> Vec<usize> {
        self.indices_where(|c| !c.has_default())
    }

    fn indices_where(&self, pred: impl Fn(&Column<R>) -> bool) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn name_at(&self, index: usize) -> &'static str {
        self.columns[index].name
    }

    /// Read the primary key of a record.
    pub fn key_of(&self, record: &R) -> PrimaryKey {
        PrimaryKey(
            self.columns
                .iter()
                .filter(|c| c.primary_key)
                .map(|c| c.read(record))
                .collect(),
        )
    }

    /// Copy every column present in `row` into `record`.
    ///
    /// Row columns unknown to the schema are ignored, so partial selects
    /// and `RETURNING` subsets both work.
    #[allow(clippy::result_large_err)]
    pub fn scan_into(&self, record: &mut R, row: &Row) -> Result<()> {
        for (name, value) in row.iter() {
            if let Some(column) = self.column(name) {
                column.write(record, value)?;
            }
        }
        Ok(())
    }
}

impl<R: Default> TableSchema<R> {
    /// Decode a row into a fresh record; missing columns keep their defaults.
    #[allow(clippy::result_large_err)]
    pub fn from_row(&self, row: &Row) -> Result<R> {
        let mut record = R::default();
        self.scan_into(&mut record, row)?;
        Ok(record)
    }
}

impl<R> fmt::Debug for TableSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchema")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish()
    }
}

/// A type bound to one table through its schema.
pub trait Record: Clone + Default + Send + Sync + 'static {
    /// Build the schema descriptor. Called once per mapper.
    fn schema() -> TableSchema<Self>;
}

/// Primary-key values of one row, in key column order.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey(pub Vec<Value>);

impl PrimaryKey {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Value> for PrimaryKey {
    fn from(v: Value) -> Self {
        PrimaryKey(vec![v])
    }
}

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        PrimaryKey(vec![Value::from(v)])
    }
}

impl From<String> for PrimaryKey {
    fn from(v: String) -> Self {
        PrimaryKey(vec![Value::from(v)])
    }
}

impl From<&String> for PrimaryKey {
    fn from(v: &String) -> Self {
        PrimaryKey(vec![Value::from(v.as_str())])
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        PrimaryKey(vec![Value::from(v)])
    }
}

impl From<i32> for PrimaryKey {
    fn from(v: i32) -> Self {
        PrimaryKey(vec![Value::from(v)])
    }
}

impl From<Vec<Value>> for PrimaryKey {
    fn from(v: Vec<Value>) -> Self {
        PrimaryKey(v)
    }
}

/// Build a [`Column`] bound to a struct field.
///
/// The field type must convert into [`Value`] and implement
/// [`FromValue`](crate::FromValue) and [`Zero`](crate::Zero).
///
/// ```rust,ignore
/// column!(Self, id)                    // column "id" <-> field `id`
/// column!(Self, "author_id" => author) // column name differs from field
/// ```
#[macro_export]
macro_rules! column {
    ($record:ty, $field:ident) => {
        $crate::column!($record, ::std::stringify!($field) => $field)
    };
    ($record:ty, $name:expr => $field:ident) => {
        $crate::Column::<$record>::new(
            $name,
            |r: &$record| $crate::Value::from(::std::clone::Clone::clone(&r.$field)),
            |r: &mut $record, v: &$crate::Value| {
                r.$field = $crate::FromValue::from_value(v)?;
                Ok(())
            },
        )
        .zero_test(|r: &$record| $crate::Zero::is_zero(&r.$field))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Author {
        id: String,
        name: String,
        rating: i64,
        created_at: Timestamp,
        deleted_at: Option<Timestamp>,
    }

    impl Record for Author {
        fn schema() -> TableSchema<Self> {
            TableSchema::new(
                "authors",
                vec![
                    column!(Self, id).primary_key().with_default(),
                    column!(Self, "full_name" => name),
                    column!(Self, rating),
                    column!(Self, created_at).with_default(),
                    column!(Self, deleted_at).with_default(),
                ],
            )
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Flag {
        id: i64,
        active: Option<bool>,
    }

    #[test]
    fn zero_test_reads_the_field_not_the_value() {
        let active = column!(Flag, active).with_default();
        let mut flag = Flag::default();
        assert!(active.is_zero(&flag));

        flag.active = Some(false);
        assert_eq!(active.read(&flag), Value::Bool(false));
        assert!(!active.is_zero(&flag));

        let id = column!(Flag, id);
        assert!(id.is_zero(&flag));
        flag.id = 3;
        assert!(!id.is_zero(&flag));

        let plain = Column::<Flag>::new("active", |f| Value::from(f.active), |_, _| Ok(()));
        assert!(plain.is_zero(&Flag {
            id: 0,
            active: Some(false),
        }));
    }

    #[test]
    fn derived_column_views() {
        let schema = Author::schema();
        assert_eq!(schema.table(), "authors");
        assert_eq!(schema.primary_key(), vec![0]);
        assert_eq!(schema.with_default(), vec![0, 3, 4]);
        assert_eq!(schema.without_default(), vec![1, 2]);
        assert_eq!(schema.name_at(1), "full_name");
        assert!(schema.has_column("deleted_at"));
        assert!(schema.require("nope").is_err());
    }

    #[test]
    fn accessors_roundtrip_through_values() {
        let schema = Author::schema();
        let mut author = Author {
            id: "a1".into(),
            name: "Ada".into(),
            rating: 5,
            ..Author::default()
        };
        assert_eq!(schema.columns()[1].read(&author), Value::Text("Ada".into()));
        assert_eq!(schema.columns()[4].read(&author), Value::Null);

        schema.columns()[4]
            .write(&mut author, &Value::Timestamp(9))
            .unwrap();
        assert_eq!(author.deleted_at, Some(Timestamp::from_micros(9)));
        assert_eq!(schema.key_of(&author), PrimaryKey::from("a1"));
    }

    #[test]
    fn from_row_ignores_unknown_and_missing_columns() {
        let schema = Author::schema();
        let row = Row::new(
            vec!["id".into(), "full_name".into(), "extra".into()],
            vec![Value::Text("a2".into()), Value::Text("Grace".into()), Value::Int(1)],
        );
        let author = schema.from_row(&row).unwrap();
        assert_eq!(author.id, "a2");
        assert_eq!(author.name, "Grace");
        assert_eq!(author.rating, 0);
    }

    #[test]
    fn write_errors_name_the_column() {
        let schema = Author::schema();
        let mut author = Author::default();
        let err = schema.columns()[2]
            .write(&mut author, &Value::Text("high".into()))
            .unwrap_err();
        match err {
            Error::Type(te) => assert_eq!(te.column.as_deref(), Some("rating")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

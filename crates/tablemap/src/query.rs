//! Default-scoped query builder.
//!
//! A [`Query`] borrows its [`Mapper`] and renders a single statement against
//! the mapper's table. Unless [`Query::with_deleted`] is called, rows whose
//! soft-delete column is set are filtered out.

use crate::mapper::Mapper;
use crate::sql::quote;
use tablemap_core::{
    Connection, Cx, Dialect, Error, Outcome, Record, Result, ValidationErrorKind, Value,
};

#[derive(Debug, Clone)]
enum Filter {
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    IsNull(String),
    IsNotNull(String),
    Raw {
        sql: String,
        args: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Selection {
    Rows,
    Count,
    Exists,
}

/// A query over one table.
///
/// ```rust,ignore
/// let recent = authors
///     .query()
///     .eq("name", "Ada")
///     .order_by("created_at", true)
///     .limit(10)
///     .all(&cx, &conn)
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct Query<'m, R: Record> {
    mapper: &'m Mapper<R>,
    filters: Vec<Filter>,
    columns: Vec<String>,
    order_by: Vec<(String, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
    with_deleted: bool,
}

impl<'m, R: Record> Query<'m, R> {
    pub(crate) fn new(mapper: &'m Mapper<R>) -> Self {
        Self {
            mapper,
            filters: Vec::new(),
            columns: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            with_deleted: false,
        }
    }

    fn compare(mut self, column: &str, op: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "=", value)
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<>", value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<", value)
    }

    pub fn le(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<=", value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">", value)
    }

    pub fn ge(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">=", value)
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn is_in<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNotNull(column.to_string()));
        self
    }

    /// A raw condition with `?` markers for `args`.
    ///
    /// Markers are renumbered into the executor's placeholder syntax; a `?`
    /// inside a quoted literal or identifier is left alone. The number of
    /// markers must equal the number of arguments.
    pub fn raw(mut self, sql: impl Into<String>, args: Vec<Value>) -> Self {
        self.filters.push(Filter::Raw {
            sql: sql.into(),
            args,
        });
        self
    }

    /// Restrict the selected columns. Unselected fields keep their defaults.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order_by.push((column.to_string(), descending));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Include soft-deleted rows.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    fn check_column(&self, name: &str) -> Result<()> {
        self.mapper.schema().require(name).map(|_| ())
    }

    fn raw_arity_error(&self, sql: &str, given: usize) -> Error {
        Error::validation(
            ValidationErrorKind::ArgumentCount,
            self.mapper.table(),
            format!("raw condition \"{sql}\" does not take {given} argument(s)"),
        )
    }

    /// Render the WHERE clause (with leading space) and its arguments.
    fn render_where(&self, dialect: Dialect, start: usize) -> Result<(String, Vec<Value>)> {
        let mut parts = Vec::with_capacity(self.filters.len() + 1);
        let mut args = Vec::new();
        let mut next = start;
        let mut placeholder = |args: &mut Vec<Value>, value: &Value| {
            args.push(value.clone());
            let p = dialect.placeholder(next);
            next += 1;
            p
        };

        for filter in &self.filters {
            let part = match filter {
                Filter::Compare { column, op, value } => {
                    self.check_column(column)?;
                    if value.is_null() && (*op == "=" || *op == "<>") {
                        let test = if *op == "=" { "IS NULL" } else { "IS NOT NULL" };
                        format!("{} {test}", quote(dialect, column))
                    } else {
                        let p = placeholder(&mut args, value);
                        format!("{} {op} {p}", quote(dialect, column))
                    }
                }
                Filter::In { column, values } => {
                    self.check_column(column)?;
                    if values.is_empty() {
                        "1=0".to_string()
                    } else {
                        let list = values
                            .iter()
                            .map(|v| placeholder(&mut args, v))
                            .collect::<Vec<_>>()
                            .join(",");
                        format!("{} IN ({list})", quote(dialect, column))
                    }
                }
                Filter::IsNull(column) => {
                    self.check_column(column)?;
                    format!("{} IS NULL", quote(dialect, column))
                }
                Filter::IsNotNull(column) => {
                    self.check_column(column)?;
                    format!("{} IS NOT NULL", quote(dialect, column))
                }
                Filter::Raw { sql, args: raw_args } => {
                    let mut out = String::with_capacity(sql.len());
                    let mut raw = raw_args.iter();
                    let mut quoted: Option<char> = None;
                    for ch in sql.chars() {
                        match (quoted, ch) {
                            (Some(q), c) if c == q => quoted = None,
                            (Some(_), _) => {}
                            (None, '\'' | '"') => quoted = Some(ch),
                            (None, '?') => {
                                let Some(value) = raw.next() else {
                                    return Err(self.raw_arity_error(sql, raw_args.len()));
                                };
                                out.push_str(&placeholder(&mut args, value));
                                continue;
                            }
                            (None, _) => {}
                        }
                        out.push(ch);
                    }
                    if raw.next().is_some() {
                        return Err(self.raw_arity_error(sql, raw_args.len()));
                    }
                    format!("({out})")
                }
            };
            parts.push(part);
        }

        if !self.with_deleted {
            if let Some(deleted_at) = self.mapper.soft_delete_column() {
                parts.push(format!("{} IS NULL", quote(dialect, deleted_at)));
            }
        }

        if parts.is_empty() {
            Ok((String::new(), args))
        } else {
            Ok((format!(" WHERE {}", parts.join(" AND ")), args))
        }
    }

    fn build(&self, dialect: Dialect, selection: Selection) -> Result<(String, Vec<Value>)> {
        let table = quote(dialect, self.mapper.table());
        let (where_clause, args) = self.render_where(dialect, 1)?;

        let sql = match selection {
            Selection::Count => format!("SELECT COUNT(*) AS \"count\" FROM {table}{where_clause}"),
            Selection::Exists => {
                format!("SELECT EXISTS(SELECT 1 FROM {table}{where_clause} LIMIT 1)")
            }
            Selection::Rows => {
                let list = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    for column in &self.columns {
                        self.check_column(column)?;
                    }
                    self.columns
                        .iter()
                        .map(|c| quote(dialect, c))
                        .collect::<Vec<_>>()
                        .join(",")
                };
                let mut sql = format!("SELECT {list} FROM {table}{where_clause}");
                if !self.order_by.is_empty() {
                    let mut order = Vec::with_capacity(self.order_by.len());
                    for (column, descending) in &self.order_by {
                        self.check_column(column)?;
                        let dir = if *descending { "DESC" } else { "ASC" };
                        order.push(format!("{} {dir}", quote(dialect, column)));
                    }
                    sql.push_str(" ORDER BY ");
                    sql.push_str(&order.join(", "));
                }
                match (self.limit, self.offset, dialect) {
                    (Some(n), _, _) => sql.push_str(&format!(" LIMIT {n}")),
                    (None, Some(_), Dialect::Sqlite) => sql.push_str(" LIMIT -1"),
                    _ => {}
                }
                if let Some(n) = self.offset {
                    sql.push_str(&format!(" OFFSET {n}"));
                }
                sql
            }
        };
        Ok((sql, args))
    }

    /// Render the row-selecting statement for a dialect.
    pub fn to_sql(&self, dialect: Dialect) -> Result<(String, Vec<Value>)> {
        self.build(dialect, Selection::Rows)
    }

    /// Execute the query and return all matching records.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table()))]
    pub async fn all<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<Vec<R>, Error> {
        let table = self.mapper.table();
        let (sql, args) = try_result!(self.build(conn.dialect(), Selection::Rows));
        tracing::debug!(sql = %sql, "query all");
        tracing::trace!(params = ?args);

        let rows = try_outcome!(
            conn.query(cx, &sql, &args).await,
            "unable to select from {table}"
        );
        self.mapper
            .decode_rows(&rows)
            .map_or_else(Outcome::Err, Outcome::Ok)
    }

    /// Execute the query and return the first record.
    ///
    /// Returns `Error::NotFound` when nothing matches.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table()))]
    pub async fn one<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<R, Error> {
        let table = self.mapper.table();
        let query = self.limit(1);
        let (sql, args) = try_result!(query.build(conn.dialect(), Selection::Rows));
        tracing::debug!(sql = %sql, "query one");

        let row = try_outcome!(
            conn.query_one(cx, &sql, &args).await,
            "unable to select from {table}"
        );
        let Some(row) = row else {
            return Outcome::Err(Error::not_found(table));
        };
        match query.mapper.decode_rows(std::slice::from_ref(&row)) {
            Ok(mut records) => records
                .pop()
                .map_or_else(|| Outcome::Err(Error::not_found(table)), Outcome::Ok),
            Err(e) => Outcome::Err(e),
        }
    }

    /// Count matching rows.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table()))]
    pub async fn count<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<u64, Error> {
        let table = self.mapper.table();
        let (sql, args) = try_result!(self.build(conn.dialect(), Selection::Count));
        tracing::debug!(sql = %sql, "query count");

        let row = try_outcome!(
            conn.query_one(cx, &sql, &args).await,
            "unable to count {table} rows"
        );
        match row {
            Some(row) => match row.get_named::<i64>("count") {
                Ok(count) => Outcome::Ok(u64::try_from(count).unwrap_or(0)),
                Err(e) => Outcome::Err(e),
            },
            None => Outcome::Ok(0),
        }
    }

    /// Check whether any row matches.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table()))]
    pub async fn exists<C: Connection>(self, cx: &Cx, conn: &C) -> Outcome<bool, Error> {
        let table = self.mapper.table();
        let (sql, args) = try_result!(self.build(conn.dialect(), Selection::Exists));
        tracing::debug!(sql = %sql, "query exists");

        let row = try_outcome!(
            conn.query_one(cx, &sql, &args).await,
            "unable to check if {table} exists"
        );
        match row {
            Some(row) => row.get_as::<bool>(0).map_or_else(Outcome::Err, Outcome::Ok),
            None => Outcome::Ok(false),
        }
    }

    /// Set columns on every matching row. Hooks are not run.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table()))]
    pub async fn update_all<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
        set: &[(&str, Value)],
    ) -> Outcome<u64, Error> {
        let table = self.mapper.table();
        if set.is_empty() {
            return Outcome::Err(Error::validation(
                ValidationErrorKind::EmptyUpdateSet,
                table,
                "update all requires at least one column argument",
            ));
        }
        let dialect = conn.dialect();
        let mut assignments = Vec::with_capacity(set.len());
        let mut params = Vec::with_capacity(set.len());
        for (i, (column, value)) in set.iter().enumerate() {
            try_result!(self.check_column(column));
            assignments.push(format!(
                "{}={}",
                quote(dialect, column),
                dialect.placeholder(i + 1)
            ));
            params.push(value.clone());
        }
        let (where_clause, args) = try_result!(self.render_where(dialect, set.len() + 1));
        params.extend(args);

        let sql = format!(
            "UPDATE {} SET {}{}",
            quote(dialect, table),
            assignments.join(","),
            where_clause
        );
        tracing::debug!(sql = %sql, "query update all");
        tracing::trace!(params = ?params);

        let affected = try_outcome!(
            conn.execute(cx, &sql, &params).await,
            "unable to update all for {table}"
        );
        Outcome::Ok(affected)
    }

    /// Delete every matching row.
    ///
    /// On soft-delete tables `hard = false` stamps the soft-delete column
    /// instead. Hooks are not run.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.mapper.table(), hard = hard))]
    pub async fn delete_all<C: Connection>(
        self,
        cx: &Cx,
        conn: &C,
        hard: bool,
    ) -> Outcome<u64, Error> {
        let table = self.mapper.table();
        let soft = self.mapper.soft_delete_column().filter(|_| !hard);
        if let Some(deleted_at) = soft {
            let now = Value::from(tablemap_core::Timestamp::now());
            return self.update_all(cx, conn, &[(deleted_at, now)]).await;
        }

        let dialect = conn.dialect();
        let (where_clause, args) = try_result!(self.render_where(dialect, 1));
        let sql = format!("DELETE FROM {}{}", quote(dialect, table), where_clause);
        tracing::debug!(sql = %sql, "query delete all");
        tracing::trace!(params = ?args);

        let affected = try_outcome!(
            conn.execute(cx, &sql, &args).await,
            "unable to delete all from {table}"
        );
        Outcome::Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemap_core::{TableSchema, Timestamp, column};

    #[derive(Debug, Clone, Default)]
    struct Post {
        id: i64,
        author_id: Option<String>,
        title: String,
        deleted_at: Option<Timestamp>,
    }

    impl Record for Post {
        fn schema() -> TableSchema<Self> {
            TableSchema::new(
                "posts",
                vec![
                    column!(Self, id).primary_key().with_default(),
                    column!(Self, author_id),
                    column!(Self, title),
                    column!(Self, deleted_at).with_default(),
                ],
            )
        }
    }

    #[test]
    fn default_scope_adds_soft_delete_filter() {
        let posts = Mapper::<Post>::new();
        let (sql, args) = posts
            .query()
            .eq("title", "hello")
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"posts\" WHERE \"title\" = $1 AND \"deleted_at\" IS NULL"
        );
        assert_eq!(args, vec![Value::Text("hello".into())]);

        let (sql, _) = posts.query().with_deleted().to_sql(Dialect::Postgres).unwrap();
        assert_eq!(sql, "SELECT * FROM \"posts\"");
    }

    #[test]
    fn filters_number_placeholders_in_order() {
        let posts = Mapper::<Post>::new();
        let (sql, args) = posts
            .query()
            .is_in("author_id", ["a1", "a2"])
            .raw("length(\"title\") > ? OR \"id\" = ?", vec![Value::from(3), Value::from(9_i64)])
            .gt("id", 1_i64)
            .is_not_null("author_id")
            .order_by("id", true)
            .limit(5)
            .offset(10)
            .to_sql(Dialect::Sqlite)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"posts\" WHERE \"author_id\" IN (?1,?2) AND \
             (length(\"title\") > ?3 OR \"id\" = ?4) AND \"id\" > ?5 AND \
             \"author_id\" IS NOT NULL AND \"deleted_at\" IS NULL \
             ORDER BY \"id\" DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(args.len(), 5);
    }

    #[test]
    fn eq_null_renders_is_null() {
        let posts = Mapper::<Post>::new();
        let (sql, args) = posts
            .query()
            .eq("author_id", Value::Null)
            .with_deleted()
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"posts\" WHERE \"author_id\" IS NULL");
        assert!(args.is_empty());
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let posts = Mapper::<Post>::new();
        let (sql, _) = posts
            .query()
            .is_in("id", Vec::<i64>::new())
            .with_deleted()
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"posts\" WHERE 1=0");
    }

    #[test]
    fn unknown_columns_fail_at_build() {
        let posts = Mapper::<Post>::new();
        let err = posts
            .query()
            .eq("nope", 1)
            .to_sql(Dialect::Postgres)
            .unwrap_err();
        assert!(err.is_validation(ValidationErrorKind::UnknownColumn));

        let err = posts
            .query()
            .raw("\"id\" = ? AND \"id\" = ?", vec![Value::from(1)])
            .to_sql(Dialect::Postgres)
            .unwrap_err();
        assert!(err.is_validation(ValidationErrorKind::ArgumentCount));

        let err = posts
            .query()
            .raw("\"id\" = ?", vec![Value::from(1), Value::from(2)])
            .to_sql(Dialect::Postgres)
            .unwrap_err();
        assert!(err.is_validation(ValidationErrorKind::ArgumentCount));
    }

    #[test]
    fn raw_markers_inside_quotes_are_literal() {
        let posts = Mapper::<Post>::new();
        let (sql, args) = posts
            .query()
            .with_deleted()
            .raw(
                "\"title\" = 'why?' OR \"title\" = 'it''s ?' OR \"id\" = ?",
                vec![Value::from(4_i64)],
            )
            .to_sql(Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"posts\" WHERE (\"title\" = 'why?' OR \"title\" = 'it''s ?' OR \"id\" = $1)"
        );
        assert_eq!(args, vec![Value::BigInt(4)]);
    }

    #[test]
    fn sqlite_offset_without_limit() {
        let posts = Mapper::<Post>::new();
        let (sql, _) = posts
            .query()
            .with_deleted()
            .offset(2)
            .to_sql(Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM \"posts\" LIMIT -1 OFFSET 2");
    }
}

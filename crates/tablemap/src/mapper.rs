//! The generic table mapper.
//!
//! A [`Mapper`] owns everything one table needs: the schema descriptor, the
//! configuration, the hook registry and the statement cache. Construct it
//! once and share it by reference or `Arc`.

use crate::cache::{CacheKey, CachedStatement, ColumnsKey, StatementCache, sorted};
use crate::columns::Columns;
use crate::config::MapperConfig;
use crate::hooks::{HookPoint, Hooks};
use crate::query::Query;
use crate::sql;
use std::collections::HashMap;
use std::sync::Arc;
use tablemap_core::{
    Connection, Cx, Error, Outcome, PrimaryKey, Record, Result, Row, TableSchema, Timestamp,
    ValidationErrorKind, Value, ValueKey,
};

/// Options for [`Mapper::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    update_on_conflict: bool,
    conflict_columns: Vec<String>,
    update: Columns,
    insert: Columns,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            update_on_conflict: true,
            conflict_columns: Vec::new(),
            update: Columns::infer(),
            insert: Columns::infer(),
        }
    }
}

impl UpsertOptions {
    /// Update every non-key column on a primary-key conflict.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave the existing row untouched on conflict.
    pub fn do_nothing() -> Self {
        Self {
            update_on_conflict: false,
            ..Self::default()
        }
    }

    /// Columns of the unique constraint to resolve conflicts on.
    ///
    /// Defaults to the primary key.
    pub fn conflict_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Policy for the columns updated on conflict.
    pub fn update(mut self, columns: Columns) -> Self {
        self.update = columns;
        self
    }

    /// Policy for the columns written by the insert branch.
    pub fn insert(mut self, columns: Columns) -> Self {
        self.insert = columns;
        self
    }

    pub fn update_on_conflict(&self) -> bool {
        self.update_on_conflict
    }
}

/// Maps records of type `R` to rows of one table.
pub struct Mapper<R: Record> {
    schema: TableSchema<R>,
    config: MapperConfig,
    hooks: Hooks<R>,
    cache: StatementCache,
    primary_key: Vec<usize>,
    created_at: Option<usize>,
    updated_at: Option<usize>,
    deleted_at: Option<usize>,
}

impl<R: Record> std::fmt::Debug for Mapper<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("table", &self.schema.table())
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .field("cached_statements", &self.cache.len())
            .finish()
    }
}

impl<R: Record> Default for Mapper<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Mapper<R> {
    /// Create a mapper with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MapperConfig::default())
    }

    /// Create a mapper with a custom configuration.
    pub fn with_config(config: MapperConfig) -> Self {
        let schema = R::schema();
        let primary_key = schema.primary_key();
        let created_at = schema.index_of(&config.created_at_column);
        let updated_at = schema.index_of(&config.updated_at_column);
        let deleted_at = schema.index_of(&config.deleted_at_column);
        Self {
            schema,
            config,
            hooks: Hooks::default(),
            cache: StatementCache::new(),
            primary_key,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    pub fn schema(&self) -> &TableSchema<R> {
        &self.schema
    }

    pub fn table(&self) -> &'static str {
        self.schema.table()
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn hooks(&self) -> &Hooks<R> {
        &self.hooks
    }

    /// The generated-statement cache.
    pub fn statement_cache(&self) -> &StatementCache {
        &self.cache
    }

    /// Register a lifecycle hook. Hooks run in registration order.
    pub fn add_hook(
        &mut self,
        point: HookPoint,
        hook: impl Fn(&mut R) -> Result<()> + Send + Sync + 'static,
    ) {
        self.hooks.add(point, hook);
    }

    /// Start a query scoped to this table.
    pub fn query(&self) -> Query<'_, R> {
        Query::new(self)
    }

    // ========================================================================
    // Helpers shared with Query and Link
    // ========================================================================

    /// The soft-delete column, when the table has one and it is enabled.
    pub fn soft_delete_column(&self) -> Option<&'static str> {
        self.soft_delete_index().map(|i| self.schema.name_at(i))
    }

    fn soft_delete_index(&self) -> Option<usize> {
        self.deleted_at.filter(|_| self.config.soft_delete)
    }

    pub(crate) fn key_names(&self) -> Vec<&'static str> {
        self.names(&self.primary_key)
    }

    pub(crate) fn names(&self, indices: &[usize]) -> Vec<&'static str> {
        indices.iter().map(|&i| self.schema.name_at(i)).collect()
    }

    pub(crate) fn values_of(&self, record: &R, indices: &[usize]) -> Vec<Value> {
        indices
            .iter()
            .map(|&i| self.schema.columns()[i].read(record))
            .collect()
    }

    pub(crate) fn key_values(&self, record: &R) -> Vec<Value> {
        self.values_of(record, &self.primary_key)
    }

    fn key_fingerprint(values: &[Value]) -> Vec<ValueKey> {
        values.iter().map(Value::key).collect()
    }

    pub(crate) fn require_primary_key(&self) -> Result<()> {
        if self.primary_key.is_empty() {
            return Err(Error::validation(
                ValidationErrorKind::MissingPrimaryKey,
                self.table(),
                "table has no primary key",
            ));
        }
        Ok(())
    }

    fn check_key(&self, key: &PrimaryKey) -> Result<()> {
        self.require_primary_key()?;
        if key.values().len() != self.primary_key.len() {
            return Err(Error::validation(
                ValidationErrorKind::KeyMismatch,
                self.table(),
                format!(
                    "expected {} primary key value(s), got {}",
                    self.primary_key.len(),
                    key.values().len()
                ),
            ));
        }
        Ok(())
    }

    /// Decode rows into records and run after-select hooks on each.
    pub(crate) fn decode_rows(&self, rows: &[Row]) -> Result<Vec<R>> {
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = self.schema.from_row(row)?;
            self.hooks.fire(HookPoint::AfterSelect, &mut record)?;
            records.push(record);
        }
        Ok(records)
    }

    fn stamp(&self, record: &mut R, column: Option<usize>, now: &Value, if_zero: bool) -> Result<()> {
        let Some(idx) = column else {
            return Ok(());
        };
        let column = &self.schema.columns()[idx];
        if !if_zero || column.is_zero(record) {
            column.write(record, now)?;
        }
        Ok(())
    }

    /// Put back a value overwritten by a write that never reached the store.
    fn restore(&self, record: &mut R, stamped: Option<(usize, Value)>) {
        if let Some((idx, previous)) = stamped {
            let column = &self.schema.columns()[idx];
            if let Err(e) = column.write(record, &previous) {
                tracing::warn!(column = column.name(), error = %e, "unable to restore column");
            }
        }
    }

    /// With-default columns whose current value is not the zero value.
    fn non_zero_defaults(&self, record: &R) -> Vec<usize> {
        self.schema
            .with_default()
            .into_iter()
            .filter(|&i| !self.schema.columns()[i].is_zero(record))
            .collect()
    }

    fn non_zero_key(&self, non_zero_defaults: &[usize]) -> Vec<&'static str> {
        sorted(&self.names(non_zero_defaults))
    }

    // ========================================================================
    // Single-record operations
    // ========================================================================

    /// Fetch one record by primary key.
    ///
    /// Returns `Error::NotFound` when no (visible) row matches.
    pub async fn find<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        key: impl Into<PrimaryKey>,
    ) -> Outcome<R, Error> {
        self.find_columns(cx, conn, key, &[]).await
    }

    /// Fetch one record by primary key, reading only `columns`.
    ///
    /// Columns not selected keep their default values.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table()))]
    pub async fn find_columns<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        key: impl Into<PrimaryKey>,
        columns: &[&str],
    ) -> Outcome<R, Error> {
        let table = self.table();
        let key = key.into();
        try_result!(self.check_key(&key));
        for name in columns {
            try_result!(self.schema.require(name));
        }

        let sql = sql::select_by_key(
            conn.dialect(),
            table,
            columns,
            &self.key_names(),
            self.soft_delete_column(),
        );
        tracing::debug!(sql = %sql, "find");
        tracing::trace!(params = ?key.values());

        let row = try_outcome!(
            conn.query_one(cx, &sql, key.values()).await,
            "unable to select from {table}"
        );
        let Some(row) = row else {
            return Outcome::Err(Error::not_found(table));
        };

        let mut record = try_result!(self.schema.from_row(&row));
        try_result!(self.hooks.fire(HookPoint::AfterSelect, &mut record));
        Outcome::Ok(record)
    }

    /// Check whether a (visible) row with this primary key exists.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table()))]
    pub async fn exists<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        key: impl Into<PrimaryKey>,
    ) -> Outcome<bool, Error> {
        let table = self.table();
        let key = key.into();
        try_result!(self.check_key(&key));

        let sql = sql::exists_by_key(
            conn.dialect(),
            table,
            &self.key_names(),
            self.soft_delete_column(),
        );
        tracing::debug!(sql = %sql, "exists");

        let row = try_outcome!(
            conn.query_one(cx, &sql, key.values()).await,
            "unable to check if {table} exists"
        );
        match row {
            Some(row) => row.get_as::<bool>(0).map_or_else(Outcome::Err, Outcome::Ok),
            None => Outcome::Ok(false),
        }
    }

    /// Insert a record.
    ///
    /// Sets `created_at`/`updated_at` when zero, runs before-insert hooks,
    /// writes the columns chosen by `columns` and scans store-generated
    /// defaults back through `RETURNING`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table()))]
    pub async fn insert<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut R,
        columns: &Columns,
    ) -> Outcome<(), Error> {
        let table = self.table();
        if self.config.manage_timestamps {
            let now = Value::from(Timestamp::now());
            try_result!(self.stamp(record, self.created_at, &now, true));
            try_result!(self.stamp(record, self.updated_at, &now, true));
        }
        try_result!(self.hooks.fire(HookPoint::BeforeInsert, record));

        let non_zero_defaults = self.non_zero_defaults(record);
        let dialect = conn.dialect();
        let key = CacheKey::Insert {
            dialect,
            columns: ColumnsKey::from(columns),
            non_zero_defaults: self.non_zero_key(&non_zero_defaults),
        };

        let cached = self.cache.get(&key);
        let statement = match &cached {
            Some(statement) => Arc::clone(statement),
            None => {
                let set = try_result!(columns.insert_set(&self.schema, &non_zero_defaults));
                let sql = sql::insert(
                    dialect,
                    table,
                    &self.names(&set.columns),
                    &self.names(&set.returning),
                );
                tracing::debug!(sql = %sql, "insert statement cache miss");
                Arc::new(CachedStatement {
                    sql,
                    values: set.columns,
                    returning: set.returning,
                })
            }
        };

        let params = self.values_of(record, &statement.values);
        tracing::debug!(sql = %statement.sql, "insert");
        tracing::trace!(params = ?params);

        if statement.returning.is_empty() {
            try_outcome!(
                conn.execute(cx, &statement.sql, &params).await,
                "unable to insert into {table}"
            );
        } else {
            let row = try_outcome!(
                conn.query_one(cx, &statement.sql, &params).await,
                "unable to insert into {table}"
            );
            let Some(row) = row else {
                return Outcome::Err(Error::Custom(format!(
                    "unable to insert into {table}: no row returned"
                )));
            };
            try_result!(self.schema.scan_into(record, &row));
        }

        if cached.is_none() {
            self.cache.insert(key, statement);
        }

        try_result!(self.hooks.fire(HookPoint::AfterInsert, record));
        Outcome::Ok(())
    }

    /// Update a record by primary key, returning the number of rows affected.
    ///
    /// `updated_at` is always refreshed. Primary-key columns are never
    /// written, and `created_at` is only written when explicitly
    /// whitelisted. An empty resulting column set fails with
    /// `ValidationErrorKind::EmptyWhitelist` before touching the store.
    /// If the row is never written, the record keeps its old `updated_at`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table()))]
    pub async fn update<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut R,
        columns: &Columns,
    ) -> Outcome<u64, Error> {
        let table = self.table();
        try_result!(self.require_primary_key());

        let dialect = conn.dialect();
        let key = CacheKey::Update {
            dialect,
            columns: ColumnsKey::from(columns),
        };

        let cached = self.cache.get(&key);
        let statement = match &cached {
            Some(statement) => Arc::clone(statement),
            None => {
                let mut set = try_result!(columns.update_set(&self.schema));
                if !columns.is_whitelist() {
                    if let Some(created_at) = self.created_at {
                        set.retain(|&i| i != created_at);
                    }
                }
                if set.is_empty() {
                    return Outcome::Err(Error::validation(
                        ValidationErrorKind::EmptyWhitelist,
                        table,
                        "update could not build a whitelist for row",
                    ));
                }
                let sql = sql::update(dialect, table, &self.names(&set), &self.key_names());
                tracing::debug!(sql = %sql, "update statement cache miss");
                Arc::new(CachedStatement {
                    sql,
                    values: set,
                    returning: Vec::new(),
                })
            }
        };

        let stamped = match self.updated_at.filter(|_| self.config.manage_timestamps) {
            Some(idx) => {
                let previous = self.schema.columns()[idx].read(record);
                let now = Value::from(Timestamp::now());
                try_result!(self.stamp(record, Some(idx), &now, false));
                Some((idx, previous))
            }
            None => None,
        };
        if let Err(e) = self.hooks.fire(HookPoint::BeforeUpdate, record) {
            self.restore(record, stamped);
            return Outcome::Err(e);
        }

        let mut params = self.values_of(record, &statement.values);
        params.extend(self.key_values(record));
        tracing::debug!(sql = %statement.sql, "update");
        tracing::trace!(params = ?params);

        let outcome = conn.execute(cx, &statement.sql, &params).await;
        if !matches!(outcome, Outcome::Ok(_)) {
            self.restore(record, stamped);
        }
        let affected = try_outcome!(outcome, "unable to update {table} row");

        if cached.is_none() {
            self.cache.insert(key, statement);
        }

        try_result!(self.hooks.fire(HookPoint::AfterUpdate, record));
        Outcome::Ok(affected)
    }

    /// Insert a record, or resolve a unique conflict by updating or ignoring.
    ///
    /// When the statement has a `RETURNING` clause and the store yields no
    /// row (a `DO NOTHING` or no-op conflict branch), the upsert still
    /// succeeds and the record keeps its in-memory values.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table()))]
    pub async fn upsert<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut R,
        options: &UpsertOptions,
    ) -> Outcome<(), Error> {
        let table = self.table();
        if self.config.manage_timestamps {
            let now = Value::from(Timestamp::now());
            try_result!(self.stamp(record, self.created_at, &now, true));
            try_result!(self.stamp(record, self.updated_at, &now, false));
        }
        try_result!(self.hooks.fire(HookPoint::BeforeUpsert, record));

        let non_zero_defaults = self.non_zero_defaults(record);
        let dialect = conn.dialect();
        let key = CacheKey::Upsert {
            dialect,
            update_on_conflict: options.update_on_conflict,
            conflict: sorted(&options.conflict_columns),
            update: ColumnsKey::from(&options.update),
            insert: ColumnsKey::from(&options.insert),
            non_zero_defaults: self.non_zero_key(&non_zero_defaults),
        };

        let cached = self.cache.get(&key);
        let statement = match &cached {
            Some(statement) => Arc::clone(statement),
            None => {
                let set = try_result!(options.insert.insert_set(&self.schema, &non_zero_defaults));
                let mut update = try_result!(options.update.update_set(&self.schema));
                if !options.update.is_whitelist() {
                    if let Some(created_at) = self.created_at {
                        update.retain(|&i| i != created_at);
                    }
                }
                if options.update_on_conflict && update.is_empty() {
                    return Outcome::Err(Error::validation(
                        ValidationErrorKind::EmptyConflictUpdate,
                        table,
                        "could not build update column list",
                    ));
                }

                let conflict = if options.conflict_columns.is_empty() {
                    try_result!(self.require_primary_key());
                    self.key_names()
                } else {
                    let mut names = Vec::with_capacity(options.conflict_columns.len());
                    for name in &options.conflict_columns {
                        let idx = try_result!(self.schema.require(name));
                        names.push(self.schema.name_at(idx));
                    }
                    names
                };

                let sql = sql::upsert(
                    dialect,
                    table,
                    &sql::Upsert {
                        insert: &self.names(&set.columns),
                        conflict: &conflict,
                        update: &self.names(&update),
                        update_on_conflict: options.update_on_conflict,
                        returning: &self.names(&set.returning),
                    },
                );
                tracing::debug!(sql = %sql, "upsert statement cache miss");
                Arc::new(CachedStatement {
                    sql,
                    values: set.columns,
                    returning: set.returning,
                })
            }
        };

        let params = self.values_of(record, &statement.values);
        tracing::debug!(sql = %statement.sql, "upsert");
        tracing::trace!(params = ?params);

        if statement.returning.is_empty() {
            try_outcome!(
                conn.execute(cx, &statement.sql, &params).await,
                "unable to upsert {table}"
            );
        } else {
            let row = try_outcome!(
                conn.query_one(cx, &statement.sql, &params).await,
                "unable to upsert {table}"
            );
            match row {
                Some(row) => try_result!(self.schema.scan_into(record, &row)),
                None => tracing::debug!("upsert returned no row, treating as success"),
            }
        }

        if cached.is_none() {
            self.cache.insert(key, statement);
        }

        try_result!(self.hooks.fire(HookPoint::AfterUpsert, record));
        Outcome::Ok(())
    }

    /// Delete a record by primary key, returning the number of rows affected.
    ///
    /// On soft-delete tables `hard = false` stamps `deleted_at` (in memory
    /// and in the store) instead of removing the row. A failed statement
    /// leaves the in-memory `deleted_at` as it was.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table(), hard = hard))]
    pub async fn delete<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut R,
        hard: bool,
    ) -> Outcome<u64, Error> {
        let table = self.table();
        try_result!(self.require_primary_key());
        try_result!(self.hooks.fire(HookPoint::BeforeDelete, record));

        let dialect = conn.dialect();
        let (sql, params, stamped) = match self.soft_delete_index().filter(|_| !hard) {
            Some(idx) => {
                let previous = self.schema.columns()[idx].read(record);
                let now = Value::from(Timestamp::now());
                try_result!(self.schema.columns()[idx].write(record, &now));
                let mut params = vec![now];
                params.extend(self.key_values(record));
                let sql =
                    sql::soft_delete(dialect, table, self.schema.name_at(idx), &self.key_names());
                (sql, params, Some((idx, previous)))
            }
            None => (
                sql::delete(dialect, table, &self.key_names()),
                self.key_values(record),
                None,
            ),
        };
        tracing::debug!(sql = %sql, "delete");
        tracing::trace!(params = ?params);

        let outcome = conn.execute(cx, &sql, &params).await;
        if !matches!(outcome, Outcome::Ok(_)) {
            self.restore(record, stamped);
        }
        let affected = try_outcome!(outcome, "unable to delete from {table}");

        try_result!(self.hooks.fire(HookPoint::AfterDelete, record));
        Outcome::Ok(affected)
    }

    /// Re-read a record from the store by its own primary key.
    pub async fn reload<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        record: &mut R,
    ) -> Outcome<(), Error> {
        let key = self.schema.key_of(record);
        let fresh = try_outcome!(self.find(cx, conn, key).await);
        *record = fresh;
        Outcome::Ok(())
    }

    // ========================================================================
    // Slice operations
    // ========================================================================

    /// Re-read every record in one query.
    ///
    /// The slice keeps its input order; records whose row is gone (or
    /// soft-deleted) are dropped.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table(), count = records.len()))]
    pub async fn reload_all<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        records: &mut Vec<R>,
    ) -> Outcome<(), Error> {
        if records.is_empty() {
            return Outcome::Ok(());
        }
        let table = self.table();
        try_result!(self.require_primary_key());

        let params: Vec<Value> = records.iter().flat_map(|r| self.key_values(r)).collect();
        let sql = sql::select_many(
            conn.dialect(),
            table,
            &self.key_names(),
            records.len(),
            self.soft_delete_column(),
        );
        tracing::debug!(sql = %sql, "reload all");

        let rows = try_outcome!(
            conn.query(cx, &sql, &params).await,
            "unable to reload all in {table} slice"
        );
        let fetched = try_result!(self.decode_rows(&rows));

        let by_key: HashMap<Vec<ValueKey>, R> = fetched
            .into_iter()
            .map(|r| (Self::key_fingerprint(&self.key_values(&r)), r))
            .collect();
        let reloaded: Vec<R> = records
            .iter()
            .filter_map(|r| {
                by_key
                    .get(&Self::key_fingerprint(&self.key_values(r)))
                    .cloned()
            })
            .collect();
        *records = reloaded;
        Outcome::Ok(())
    }

    /// Set the given columns to the given values on every record's row.
    ///
    /// Hooks are not run and the in-memory records are not modified.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table(), count = records.len()))]
    pub async fn update_all<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        records: &[R],
        set: &[(&str, Value)],
    ) -> Outcome<u64, Error> {
        if records.is_empty() {
            return Outcome::Ok(0);
        }
        let table = self.table();
        if set.is_empty() {
            return Outcome::Err(Error::validation(
                ValidationErrorKind::EmptyUpdateSet,
                table,
                "update all requires at least one column argument",
            ));
        }
        try_result!(self.require_primary_key());

        let mut columns = Vec::with_capacity(set.len());
        let mut params = Vec::with_capacity(set.len() + records.len() * self.primary_key.len());
        for (name, value) in set {
            let idx = try_result!(self.schema.require(name));
            columns.push(self.schema.name_at(idx));
            params.push(value.clone());
        }
        params.extend(records.iter().flat_map(|r| self.key_values(r)));

        let sql = sql::update_many(
            conn.dialect(),
            table,
            &columns,
            &self.key_names(),
            records.len(),
        );
        tracing::debug!(sql = %sql, "update all");
        tracing::trace!(params = ?params);

        let affected = try_outcome!(
            conn.execute(cx, &sql, &params).await,
            "unable to update all in {table} slice"
        );
        Outcome::Ok(affected)
    }

    /// Delete (or soft-delete) every record in one statement.
    ///
    /// Before-delete hooks run for every record first, then the statement,
    /// then after-delete hooks for every record.
    #[tracing::instrument(level = "debug", skip_all, fields(table = self.table(), count = records.len(), hard = hard))]
    pub async fn delete_all<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        records: &mut [R],
        hard: bool,
    ) -> Outcome<u64, Error> {
        if records.is_empty() {
            return Outcome::Ok(0);
        }
        let table = self.table();
        try_result!(self.require_primary_key());
        try_result!(self.hooks.fire_all(HookPoint::BeforeDelete, records));

        let dialect = conn.dialect();
        let key_names = self.key_names();
        let mut stamped = Vec::new();
        let (sql, params) = match self.soft_delete_index().filter(|_| !hard) {
            Some(idx) => {
                let now = Value::from(Timestamp::now());
                let column = &self.schema.columns()[idx];
                let mut params = vec![now.clone()];
                for record in records.iter_mut() {
                    stamped.push((idx, column.read(record)));
                    try_result!(column.write(record, &now));
                    params.extend(self.key_values(record));
                }
                let sql = sql::update_many(
                    dialect,
                    table,
                    &[column.name()],
                    &key_names,
                    records.len(),
                );
                (sql, params)
            }
            None => {
                let params = records.iter().flat_map(|r| self.key_values(r)).collect();
                (
                    sql::delete_many(dialect, table, &key_names, records.len()),
                    params,
                )
            }
        };
        tracing::debug!(sql = %sql, "delete all");
        tracing::trace!(params = ?params);

        let outcome = conn.execute(cx, &sql, &params).await;
        if !matches!(outcome, Outcome::Ok(_)) {
            for (record, previous) in records.iter_mut().zip(stamped) {
                self.restore(record, Some(previous));
            }
        }
        let affected = try_outcome!(outcome, "unable to delete all from {table} slice");

        try_result!(self.hooks.fire_all(HookPoint::AfterDelete, records));
        Outcome::Ok(affected)
    }
}

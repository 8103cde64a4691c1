//! SQL text generation for mapper statements.
//!
//! Every builder takes the target [`Dialect`] and plain column names, and
//! numbers placeholders left to right starting at the given index. Values
//! are always bound, never inlined.

use std::fmt::Write;
use tablemap_core::Dialect;

/// Quote an identifier for the dialect.
pub fn quote(dialect: Dialect, name: &str) -> String {
    dialect.quote_identifier(name)
}

/// Comma-separated quoted identifiers.
pub fn column_list(dialect: Dialect, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote(dialect, c))
        .collect::<Vec<_>>()
        .join(",")
}

/// Comma-separated placeholders `start..start + count`.
pub fn placeholders(dialect: Dialect, start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(",")
}

/// `"a"=$1,"b"=$2` style assignments (or `AND`-joined comparisons).
fn assignments(dialect: Dialect, columns: &[&str], start: usize, sep: &str) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}={}", quote(dialect, c), dialect.placeholder(start + i)))
        .collect::<Vec<_>>()
        .join(sep)
}

/// `"id"=$1 AND "k"=$2` for one primary key.
pub fn where_key(dialect: Dialect, key: &[&str], start: usize) -> String {
    assignments(dialect, key, start, " AND ")
}

/// `("id"=$1) OR ("id"=$2)` repeated for `count` keys.
pub fn where_keys(dialect: Dialect, key: &[&str], start: usize, count: usize) -> String {
    (0..count)
        .map(|n| format!("({})", where_key(dialect, key, start + n * key.len())))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn soft_filter(dialect: Dialect, deleted_at: Option<&str>) -> String {
    deleted_at
        .map(|c| format!(" AND {} IS NULL", quote(dialect, c)))
        .unwrap_or_default()
}

fn returning_clause(dialect: Dialect, returning: &[&str]) -> String {
    if returning.is_empty() {
        String::new()
    } else {
        format!(" RETURNING {}", column_list(dialect, returning))
    }
}

/// `INSERT INTO "t" ("a","b") VALUES ($1,$2) [RETURNING ...]`, or
/// `DEFAULT VALUES` when no column is written.
pub fn insert(dialect: Dialect, table: &str, columns: &[&str], returning: &[&str]) -> String {
    let mut sql = format!("INSERT INTO {}", quote(dialect, table));
    if columns.is_empty() {
        sql.push_str(" DEFAULT VALUES");
    } else {
        let _ = write!(
            sql,
            " ({}) VALUES ({})",
            column_list(dialect, columns),
            placeholders(dialect, 1, columns.len())
        );
    }
    sql.push_str(&returning_clause(dialect, returning));
    sql
}

/// `UPDATE "t" SET "a"=$1,"b"=$2 WHERE "id"=$3`.
pub fn update(dialect: Dialect, table: &str, set: &[&str], key: &[&str]) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        quote(dialect, table),
        assignments(dialect, set, 1, ","),
        where_key(dialect, key, set.len() + 1)
    )
}

/// Shape of an `ON CONFLICT` clause.
#[derive(Debug, Clone, Copy)]
pub struct Upsert<'a> {
    pub insert: &'a [&'a str],
    pub conflict: &'a [&'a str],
    pub update: &'a [&'a str],
    pub update_on_conflict: bool,
    pub returning: &'a [&'a str],
}

/// `INSERT ... ON CONFLICT ("c") DO UPDATE SET "a" = EXCLUDED."a"` or
/// `INSERT ... ON CONFLICT DO NOTHING`, with an optional `RETURNING`.
pub fn upsert(dialect: Dialect, table: &str, shape: &Upsert<'_>) -> String {
    let mut sql = insert(dialect, table, shape.insert, &[]);
    if shape.update_on_conflict {
        let set = shape
            .update
            .iter()
            .map(|c| {
                let q = quote(dialect, c);
                format!("{q} = EXCLUDED.{q}")
            })
            .collect::<Vec<_>>()
            .join(",");
        let _ = write!(
            sql,
            " ON CONFLICT ({}) DO UPDATE SET {}",
            column_list(dialect, shape.conflict),
            set
        );
    } else {
        sql.push_str(" ON CONFLICT DO NOTHING");
    }
    sql.push_str(&returning_clause(dialect, shape.returning));
    sql
}

/// `DELETE FROM "t" WHERE "id"=$1`.
pub fn delete(dialect: Dialect, table: &str, key: &[&str]) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote(dialect, table),
        where_key(dialect, key, 1)
    )
}

/// `UPDATE "t" SET "deleted_at"=$1 WHERE "id"=$2`.
pub fn soft_delete(dialect: Dialect, table: &str, deleted_at: &str, key: &[&str]) -> String {
    update(dialect, table, &[deleted_at], key)
}

/// `DELETE FROM "t" WHERE ("id"=$1) OR ("id"=$2)`.
pub fn delete_many(dialect: Dialect, table: &str, key: &[&str], count: usize) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote(dialect, table),
        where_keys(dialect, key, 1, count)
    )
}

/// `UPDATE "t" SET "a"=$1 WHERE ("id"=$2) OR ("id"=$3)`.
pub fn update_many(
    dialect: Dialect,
    table: &str,
    set: &[&str],
    key: &[&str],
    count: usize,
) -> String {
    format!(
        "UPDATE {} SET {} WHERE {}",
        quote(dialect, table),
        assignments(dialect, set, 1, ","),
        where_keys(dialect, key, set.len() + 1, count)
    )
}

/// `SELECT <cols|*> FROM "t" WHERE "id"=$1 [AND "deleted_at" IS NULL]`.
pub fn select_by_key(
    dialect: Dialect,
    table: &str,
    columns: &[&str],
    key: &[&str],
    deleted_at: Option<&str>,
) -> String {
    let list = if columns.is_empty() {
        "*".to_string()
    } else {
        column_list(dialect, columns)
    };
    format!(
        "SELECT {} FROM {} WHERE {}{}",
        list,
        quote(dialect, table),
        where_key(dialect, key, 1),
        soft_filter(dialect, deleted_at)
    )
}

/// `SELECT EXISTS(SELECT 1 FROM "t" WHERE "id"=$1 [AND ...] LIMIT 1)`.
pub fn exists_by_key(
    dialect: Dialect,
    table: &str,
    key: &[&str],
    deleted_at: Option<&str>,
) -> String {
    format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {}{} LIMIT 1)",
        quote(dialect, table),
        where_key(dialect, key, 1),
        soft_filter(dialect, deleted_at)
    )
}

/// `SELECT "t".* FROM "t" WHERE (("id"=$1) OR ("id"=$2)) [AND ...]`.
pub fn select_many(
    dialect: Dialect,
    table: &str,
    key: &[&str],
    count: usize,
    deleted_at: Option<&str>,
) -> String {
    let t = quote(dialect, table);
    format!(
        "SELECT {t}.* FROM {t} WHERE ({}){}",
        where_keys(dialect, key, 1, count),
        soft_filter(dialect, deleted_at)
    )
}

//! Shared fixtures for the SQLite-backed integration tests.

#![allow(dead_code)]

use asupersync::runtime::RuntimeBuilder;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tablemap::column;
use tablemap::prelude::*;
use tablemap::{Dialect, Row};
use tablemap_sqlite::SqliteConnection;

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected error, got {other:?}"),
    }
}

/// Run an async test body on a fresh current-thread runtime.
pub fn run<F, Fut>(body: F)
where
    F: FnOnce(Cx) -> Fut,
    Fut: Future<Output = ()>,
{
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    rt.block_on(body(cx));
}

const SCHEMA: &str = "
    CREATE TABLE authors (
        id TEXT PRIMARY KEY NOT NULL DEFAULT (lower(hex(randomblob(16)))),
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0,
        deleted_at INTEGER
    );
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        author_id TEXT REFERENCES authors(id),
        title TEXT NOT NULL,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0,
        deleted_at INTEGER
    );
    CREATE TABLE flags (
        id INTEGER PRIMARY KEY,
        active BOOLEAN DEFAULT 1,
        weight INTEGER DEFAULT 5
    );
    CREATE TABLE tags (
        name TEXT PRIMARY KEY NOT NULL,
        uses INTEGER NOT NULL DEFAULT 0
    );
";

pub fn open_db() -> SqliteConnection {
    let conn = SqliteConnection::open_memory().expect("open sqlite memory db");
    conn.execute_raw(SCHEMA).expect("create schema");
    conn
}

#[derive(Debug, Clone, Default)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub posts: Vec<Post>,
}

impl Author {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: Some(email.to_string()),
            ..Self::default()
        }
    }
}

impl Record for Author {
    fn schema() -> TableSchema<Self> {
        TableSchema::new(
            "authors",
            vec![
                column!(Self, id).primary_key().with_default(),
                column!(Self, name),
                column!(Self, email),
                column!(Self, created_at).with_default(),
                column!(Self, updated_at).with_default(),
                column!(Self, deleted_at).with_default(),
            ],
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub id: i64,
    pub author_id: Option<String>,
    pub title: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub author: Option<Arc<Author>>,
}

impl Post {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }
}

impl Record for Post {
    fn schema() -> TableSchema<Self> {
        TableSchema::new(
            "posts",
            vec![
                column!(Self, id).primary_key().with_default(),
                column!(Self, author_id),
                column!(Self, title),
                column!(Self, created_at).with_default(),
                column!(Self, updated_at).with_default(),
                column!(Self, deleted_at).with_default(),
            ],
        )
    }
}

/// A table without timestamps or soft delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub name: String,
    pub uses: i64,
}

impl Record for Tag {
    fn schema() -> TableSchema<Self> {
        TableSchema::new(
            "tags",
            vec![
                column!(Self, name).primary_key(),
                column!(Self, uses).with_default(),
            ],
        )
    }
}

/// Nullable columns with store defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flag {
    pub id: i64,
    pub active: Option<bool>,
    pub weight: Option<i64>,
}

impl Record for Flag {
    fn schema() -> TableSchema<Self> {
        TableSchema::new(
            "flags",
            vec![
                column!(Self, id).primary_key().with_default(),
                column!(Self, active).with_default(),
                column!(Self, weight).with_default(),
            ],
        )
    }
}

pub const POST_AUTHOR: Relation<Post, Author> = Relation::new(
    "author",
    "author_id",
    "id",
    |p| &mut p.author,
    |a| &mut a.posts,
);

/// Counts the statements sent to the wrapped connection.
pub struct Counting<'a> {
    inner: &'a SqliteConnection,
    statements: AtomicUsize,
}

impl<'a> Counting<'a> {
    pub fn new(inner: &'a SqliteConnection) -> Self {
        Self {
            inner,
            statements: AtomicUsize::new(0),
        }
    }

    pub fn statements(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.statements.store(0, Ordering::SeqCst);
    }

    fn bump(&self) {
        self.statements.fetch_add(1, Ordering::SeqCst);
    }
}

impl Connection for Counting<'_> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        self.bump();
        self.inner.query(cx, sql, params)
    }

    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, Error>> + Send {
        self.bump();
        self.inner.query_one(cx, sql, params)
    }

    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        self.bump();
        self.inner.execute(cx, sql, params)
    }
}

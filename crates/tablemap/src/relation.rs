//! Foreign-key links between two mappers.
//!
//! A [`Link`] binds a [`Relation`] descriptor to the child and parent
//! mappers and provides accessors, batched eager loaders and setters.
//!
//! Loaded relations live in plain fields of the records: each child's
//! parent slot holds an `Arc` snapshot of its parent, and each parent's
//! children slot holds clones of its children. Snapshots are taken at load
//! time and go stale when either side changes afterwards.

use crate::columns::Columns;
use crate::mapper::Mapper;
use crate::query::Query;
use crate::sql;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tablemap_core::{Connection, Cx, Error, Outcome, Record, Relation, Result, Value, ValueKey};

/// A relation bound to its child and parent mappers.
///
/// ```rust,ignore
/// const POST_AUTHOR: Relation<Post, Author> =
///     Relation::new("author", "author_id", "id", |p| &mut p.author, |a| &mut a.posts);
///
/// let link = Link::new(POST_AUTHOR, &posts, &authors)?;
/// link.load_parents(&cx, &conn, &mut all_posts).await;
/// ```
pub struct Link<'m, C: Record, P: Record> {
    relation: Relation<C, P>,
    children: &'m Mapper<C>,
    parents: &'m Mapper<P>,
    foreign_key: usize,
    references: usize,
}

impl<C: Record, P: Record> std::fmt::Debug for Link<'_, C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("relation", &self.relation)
            .field("child_table", &self.children.table())
            .field("parent_table", &self.parents.table())
            .finish()
    }
}

impl<'m, C: Record, P: Record> Link<'m, C, P> {
    /// Bind a relation, checking that both columns exist.
    pub fn new(
        relation: Relation<C, P>,
        children: &'m Mapper<C>,
        parents: &'m Mapper<P>,
    ) -> Result<Self> {
        let foreign_key = children.schema().require(relation.foreign_key)?;
        let references = parents.schema().require(relation.references)?;
        Ok(Self {
            relation,
            children,
            parents,
            foreign_key,
            references,
        })
    }

    pub fn relation(&self) -> &Relation<C, P> {
        &self.relation
    }

    fn foreign_key_of(&self, child: &C) -> Value {
        self.children.schema().columns()[self.foreign_key].read(child)
    }

    fn key_of(&self, parent: &P) -> Value {
        self.parents.schema().columns()[self.references].read(parent)
    }

    fn detached_child(&self, child: &C) -> C {
        let mut copy = child.clone();
        *(self.relation.parent)(&mut copy) = None;
        copy
    }

    /// Query for the parent a child points at.
    ///
    /// A NULL foreign key yields a query that matches nothing.
    pub fn parent_of(&self, child: &C) -> Query<'m, P> {
        let fk = self.foreign_key_of(child);
        let values = if fk.is_null() { Vec::new() } else { vec![fk] };
        self.parents.query().is_in(self.relation.references, values)
    }

    /// Query for the children pointing at a parent.
    pub fn children_of(&self, parent: &P) -> Query<'m, C> {
        let key = self.key_of(parent);
        let values = if key.is_null() { Vec::new() } else { vec![key] };
        self.children.query().is_in(self.relation.foreign_key, values)
    }

    /// Load the parents of every child with one batched query.
    ///
    /// Each child's parent slot is set to its matching parent, or cleared
    /// when nothing matched. Each fetched parent's children slot holds the
    /// children that point at it. Returns the number of parents fetched.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = self.relation.name, children = children.len()))]
    pub async fn load_parents<Conn: Connection>(
        &self,
        cx: &Cx,
        conn: &Conn,
        children: &mut [C],
    ) -> Outcome<usize, Error> {
        let parent_table = self.parents.table();
        let mut seen = HashSet::new();
        let mut args = Vec::new();
        for child in children.iter() {
            let fk = self.foreign_key_of(child);
            if !fk.is_null() && seen.insert(fk.key()) {
                args.push(fk);
            }
        }

        if args.is_empty() {
            for child in children.iter_mut() {
                *(self.relation.parent)(child) = None;
            }
            return Outcome::Ok(0);
        }

        let key_count = args.len();
        let mut fetched = try_outcome!(
            self.parents
                .query()
                .is_in(self.relation.references, args)
                .all(cx, conn)
                .await,
            "failed to eager load {parent_table}"
        );
        tracing::info!(
            relation = self.relation.name,
            children = children.len(),
            keys = key_count,
            fetched = fetched.len(),
            "eager loaded parents"
        );

        let by_key: HashMap<ValueKey, usize> = fetched
            .iter()
            .enumerate()
            .map(|(i, p)| (self.key_of(p).key(), i))
            .collect();

        for child in children.iter() {
            if let Some(&i) = by_key.get(&self.foreign_key_of(child).key()) {
                let copy = self.detached_child(child);
                (self.relation.children)(&mut fetched[i]).push(copy);
            }
        }

        let shared: Vec<Arc<P>> = fetched.into_iter().map(Arc::new).collect();
        for child in children.iter_mut() {
            let slot = by_key
                .get(&self.foreign_key_of(child).key())
                .map(|&i| Arc::clone(&shared[i]));
            *(self.relation.parent)(child) = slot;
        }

        Outcome::Ok(shared.len())
    }

    /// Load the children of every parent with one batched query.
    ///
    /// Each parent's children slot is replaced with its matching children,
    /// and every loaded child links back to a snapshot of its parent.
    /// Returns the number of children fetched.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = self.relation.name, parents = parents.len()))]
    pub async fn load_children<Conn: Connection>(
        &self,
        cx: &Cx,
        conn: &Conn,
        parents: &mut [P],
    ) -> Outcome<usize, Error> {
        let child_table = self.children.table();
        let mut seen = HashSet::new();
        let mut args = Vec::new();
        for parent in parents.iter() {
            let key = self.key_of(parent);
            if !key.is_null() && seen.insert(key.key()) {
                args.push(key);
            }
        }

        if args.is_empty() {
            for parent in parents.iter_mut() {
                (self.relation.children)(parent).clear();
            }
            return Outcome::Ok(0);
        }

        let key_count = args.len();
        let fetched = try_outcome!(
            self.children
                .query()
                .is_in(self.relation.foreign_key, args)
                .all(cx, conn)
                .await,
            "failed to eager load {child_table}"
        );
        tracing::info!(
            relation = self.relation.name,
            parents = parents.len(),
            keys = key_count,
            fetched = fetched.len(),
            "eager loaded children"
        );

        let mut by_key: HashMap<ValueKey, Vec<&C>> = HashMap::new();
        for child in &fetched {
            by_key
                .entry(self.foreign_key_of(child).key())
                .or_default()
                .push(child);
        }

        for parent in parents.iter_mut() {
            let plain: Vec<C> = by_key
                .get(&self.key_of(parent).key())
                .map(|matched| matched.iter().map(|c| self.detached_child(c)).collect())
                .unwrap_or_default();

            let mut snapshot = parent.clone();
            *(self.relation.children)(&mut snapshot) = plain.clone();
            let snapshot = Arc::new(snapshot);

            *(self.relation.children)(parent) = plain
                .into_iter()
                .map(|mut c| {
                    *(self.relation.parent)(&mut c) = Some(Arc::clone(&snapshot));
                    c
                })
                .collect();
        }

        Outcome::Ok(fetched.len())
    }

    async fn update_foreign_key<Conn: Connection>(
        &self,
        cx: &Cx,
        conn: &Conn,
        child: &C,
        value: &Value,
    ) -> Outcome<u64, Error> {
        try_result!(self.children.require_primary_key());
        let sql = sql::update(
            conn.dialect(),
            self.children.table(),
            &[self.relation.foreign_key],
            &self.children.key_names(),
        );
        let mut params = vec![value.clone()];
        params.extend(self.children.key_values(child));
        tracing::debug!(sql = %sql, "update foreign key");
        tracing::trace!(params = ?params);

        let affected = try_outcome!(
            conn.execute(cx, &sql, &params).await,
            "failed to update local table"
        );
        Outcome::Ok(affected)
    }

    /// Point a child at a parent.
    ///
    /// With `insert`, the parent is inserted first (inferred columns). The
    /// child's foreign key is then updated in the store and in memory, and
    /// both relationship slots are updated. The two statements are not
    /// atomic; wrap the call in a transaction when that matters.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = self.relation.name, insert = insert))]
    pub async fn set_parent<Conn: Connection>(
        &self,
        cx: &Cx,
        conn: &Conn,
        child: &mut C,
        insert: bool,
        parent: &mut P,
    ) -> Outcome<(), Error> {
        if insert {
            try_outcome!(
                self.parents
                    .insert(cx, conn, parent, &Columns::infer())
                    .await,
                "failed to insert into foreign table"
            );
        }

        let key = self.key_of(parent);
        try_outcome!(self.update_foreign_key(cx, conn, child, &key).await);
        try_result!(self.children.schema().columns()[self.foreign_key].write(child, &key));

        (self.relation.children)(parent).push(self.detached_child(child));
        *(self.relation.parent)(child) = Some(Arc::new(parent.clone()));
        Outcome::Ok(())
    }

    /// Attach children to a parent.
    ///
    /// With `insert`, each child gets the foreign key set and is inserted
    /// (inferred columns); otherwise each child's foreign key is updated
    /// with one statement per child. Both relationship slots are updated.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = self.relation.name, insert = insert, children = children.len()))]
    pub async fn add_children<Conn: Connection>(
        &self,
        cx: &Cx,
        conn: &Conn,
        parent: &mut P,
        insert: bool,
        children: &mut [C],
    ) -> Outcome<(), Error> {
        let key = self.key_of(parent);
        let fk_column = &self.children.schema().columns()[self.foreign_key];

        for child in children.iter_mut() {
            if insert {
                try_result!(fk_column.write(child, &key));
                try_outcome!(
                    self.children
                        .insert(cx, conn, child, &Columns::infer())
                        .await,
                    "failed to insert into foreign table"
                );
            } else {
                try_outcome!(self.update_foreign_key(cx, conn, child, &key).await);
                try_result!(fk_column.write(child, &key));
            }
        }

        let slot = (self.relation.children)(parent);
        slot.extend(children.iter().map(|c| self.detached_child(c)));
        let snapshot = Arc::new(parent.clone());
        for child in children.iter_mut() {
            *(self.relation.parent)(child) = Some(Arc::clone(&snapshot));
        }
        Outcome::Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablemap_core::{Dialect, TableSchema, Timestamp, column};

    #[derive(Debug, Clone, Default)]
    struct Author {
        id: String,
        name: String,
        deleted_at: Option<Timestamp>,
        posts: Vec<Post>,
    }

    #[derive(Debug, Clone, Default)]
    struct Post {
        id: i64,
        author_id: Option<String>,
        author: Option<Arc<Author>>,
    }

    impl Record for Author {
        fn schema() -> TableSchema<Self> {
            TableSchema::new(
                "authors",
                vec![
                    column!(Self, id).primary_key(),
                    column!(Self, name),
                    column!(Self, deleted_at).with_default(),
                ],
            )
        }
    }

    impl Record for Post {
        fn schema() -> TableSchema<Self> {
            TableSchema::new(
                "posts",
                vec![
                    column!(Self, id).primary_key().with_default(),
                    column!(Self, author_id),
                ],
            )
        }
    }

    const POST_AUTHOR: Relation<Post, Author> =
        Relation::new("author", "author_id", "id", |p| &mut p.author, |a| &mut a.posts);

    #[test]
    fn new_validates_columns() {
        let posts = Mapper::<Post>::new();
        let authors = Mapper::<Author>::new();
        assert!(Link::new(POST_AUTHOR, &posts, &authors).is_ok());

        let bad: Relation<Post, Author> =
            Relation::new("author", "writer_id", "id", |p| &mut p.author, |a| &mut a.posts);
        let err = Link::new(bad, &posts, &authors).unwrap_err();
        assert!(err.is_validation(tablemap_core::ValidationErrorKind::UnknownColumn));
    }

    #[test]
    fn accessors_are_scoped_queries() {
        let posts = Mapper::<Post>::new();
        let authors = Mapper::<Author>::new();
        let link = Link::new(POST_AUTHOR, &posts, &authors).unwrap();

        let post = Post {
            id: 1,
            author_id: Some("a1".into()),
            author: None,
        };
        let (sql, args) = link.parent_of(&post).to_sql(Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM \"authors\" WHERE \"id\" IN ($1) AND \"deleted_at\" IS NULL"
        );
        assert_eq!(args, vec![Value::Text("a1".into())]);

        let orphan = Post::default();
        let (sql, _) = link.parent_of(&orphan).to_sql(Dialect::Postgres).unwrap();
        assert!(sql.contains("1=0"));

        let author = Author {
            id: "a1".into(),
            ..Author::default()
        };
        let (sql, _) = link.children_of(&author).to_sql(Dialect::Sqlite).unwrap();
        assert_eq!(sql, "SELECT * FROM \"posts\" WHERE \"author_id\" IN (?1)");
    }
}

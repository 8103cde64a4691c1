//! Statement caching for generated write statements.
//!
//! Each mapper owns one [`StatementCache`]. Entries are keyed by a
//! structured [`CacheKey`] and are never evicted: the key space is bounded
//! by the table's column set.

use crate::columns::{Columns, ColumnsKind};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tablemap_core::Dialect;

/// Fingerprint of a column policy, independent of name order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnsKey {
    pub kind: ColumnsKind,
    pub columns: Vec<String>,
}

impl From<&Columns> for ColumnsKey {
    fn from(columns: &Columns) -> Self {
        let mut names = columns.names().to_vec();
        names.sort();
        names.dedup();
        Self {
            kind: columns.kind(),
            columns: names,
        }
    }
}

/// Identifies one generated statement shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Insert {
        dialect: Dialect,
        columns: ColumnsKey,
        non_zero_defaults: Vec<&'static str>,
    },
    Update {
        dialect: Dialect,
        columns: ColumnsKey,
    },
    Upsert {
        dialect: Dialect,
        update_on_conflict: bool,
        conflict: Vec<String>,
        update: ColumnsKey,
        insert: ColumnsKey,
        non_zero_defaults: Vec<&'static str>,
    },
}

/// Sort a set of column names for use in a key.
pub(crate) fn sorted<S: Clone + Ord>(names: &[S]) -> Vec<S> {
    let mut out = names.to_vec();
    out.sort();
    out.dedup();
    out
}

/// A generated statement plus the schema column indices it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStatement {
    /// The SQL text, with placeholders for the target dialect.
    pub sql: String,
    /// Columns whose values are bound, in placeholder order. Key values for
    /// a WHERE clause follow these.
    pub values: Vec<usize>,
    /// Columns named in the `RETURNING` clause, in order.
    pub returning: Vec<usize>,
}

/// Unbounded read-mostly statement cache.
///
/// Probes take the shared lock; inserts take the exclusive lock. Two tasks
/// racing on the same key both build an equal entry and the later write
/// wins.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: RwLock<HashMap<CacheKey, Arc<CachedStatement>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Arc<CachedStatement>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            tracing::warn!("statement cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Arc<CachedStatement>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            tracing::warn!("statement cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Look up a cached statement.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedStatement>> {
        self.read().get(key).cloned()
    }

    /// Store a statement. An existing entry for the key is replaced.
    pub fn insert(&self, key: CacheKey, statement: Arc<CachedStatement>) {
        self.write().insert(key, statement);
    }

    /// Check if a statement is cached.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn stmt(sql: &str) -> Arc<CachedStatement> {
        Arc::new(CachedStatement {
            sql: sql.to_string(),
            values: vec![1, 2],
            returning: vec![0],
        })
    }

    #[test]
    fn columns_key_ignores_order_and_duplicates() {
        let a = ColumnsKey::from(&Columns::whitelist(["name", "email"]));
        let b = ColumnsKey::from(&Columns::whitelist(["email", "name", "email"]));
        assert_eq!(a, b);
        let c = ColumnsKey::from(&Columns::blacklist(["email", "name"]));
        assert_ne!(a, c);
    }

    #[test]
    fn operation_kinds_never_collide() {
        let columns = ColumnsKey::from(&Columns::infer());
        let insert = CacheKey::Insert {
            dialect: Dialect::Sqlite,
            columns: columns.clone(),
            non_zero_defaults: Vec::new(),
        };
        let update = CacheKey::Update {
            dialect: Dialect::Sqlite,
            columns,
        };
        let cache = StatementCache::new();
        cache.insert(insert.clone(), stmt("INSERT"));
        assert!(cache.contains(&insert));
        assert!(!cache.contains(&update));
        assert_eq!(cache.get(&insert).unwrap().sql, "INSERT");
    }

    #[test]
    fn dialect_is_part_of_the_key() {
        let key = |dialect| CacheKey::Update {
            dialect,
            columns: ColumnsKey::from(&Columns::infer()),
        };
        let cache = StatementCache::new();
        cache.insert(key(Dialect::Postgres), stmt("$1"));
        assert!(cache.get(&key(Dialect::Sqlite)).is_none());
    }

    #[test]
    fn racing_writers_leave_one_entry() {
        let cache = Arc::new(StatementCache::new());
        let key = CacheKey::Update {
            dialect: Dialect::Postgres,
            columns: ColumnsKey::from(&Columns::infer()),
        };
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                thread::spawn(move || {
                    if cache.get(&key).is_none() {
                        cache.insert(key.clone(), stmt("UPDATE"));
                    }
                    cache.get(&key).map(|s| s.sql.clone())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("UPDATE"));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sorted_dedups() {
        assert_eq!(sorted(&["b", "a", "b"]), vec!["a", "b"]);
    }
}

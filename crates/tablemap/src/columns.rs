//! Column policies for write operations.
//!
//! A [`Columns`] value tells the mapper which columns an INSERT or UPDATE
//! writes. Resolution always happens against a [`TableSchema`] and produces
//! column indices, never names.

use tablemap_core::{Result, TableSchema};

/// How the explicit column list of a [`Columns`] policy is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnsKind {
    /// Write nothing explicitly.
    None,
    /// Derive the columns from the schema and the record's values.
    #[default]
    Infer,
    /// Write exactly the listed columns.
    Whitelist,
    /// Write every column except the listed ones.
    Blacklist,
    /// Write the inferred columns plus the listed ones.
    Greylist,
}

/// A column policy.
///
/// ```rust,ignore
/// mapper.insert(&cx, &conn, &mut author, &Columns::infer()).await;
/// mapper.update(&cx, &conn, &mut author, &Columns::whitelist(["name"])).await;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    kind: ColumnsKind,
    names: Vec<String>,
}

/// Columns written by an INSERT and columns read back through `RETURNING`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertSet {
    pub columns: Vec<usize>,
    pub returning: Vec<usize>,
}

impl Columns {
    pub fn none() -> Self {
        Self {
            kind: ColumnsKind::None,
            names: Vec::new(),
        }
    }

    pub fn infer() -> Self {
        Self::default()
    }

    pub fn whitelist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::listed(ColumnsKind::Whitelist, names)
    }

    pub fn blacklist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::listed(ColumnsKind::Blacklist, names)
    }

    pub fn greylist<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::listed(ColumnsKind::Greylist, names)
    }

    fn listed<I, S>(kind: ColumnsKind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> ColumnsKind {
        self.kind
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_whitelist(&self) -> bool {
        self.kind == ColumnsKind::Whitelist
    }

    /// Resolve the listed names to indices, keeping caller order and
    /// dropping duplicates.
    fn listed_indices<R>(&self, schema: &TableSchema<R>) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let idx = schema.require(name)?;
            if !out.contains(&idx) {
                out.push(idx);
            }
        }
        Ok(out)
    }

    /// Columns to write on INSERT and columns to read back.
    ///
    /// `non_zero_defaults` are the with-default columns whose current value
    /// is not the zero value; those are written instead of left to the
    /// store.
    pub fn insert_set<R>(
        &self,
        schema: &TableSchema<R>,
        non_zero_defaults: &[usize],
    ) -> Result<InsertSet> {
        let all = 0..schema.columns().len();
        let listed = self.listed_indices(schema)?;
        let inferred = |i: &usize| {
            !schema.columns()[*i].has_default() || non_zero_defaults.contains(i)
        };

        let set = match self.kind {
            ColumnsKind::None => return Ok(InsertSet::default()),
            ColumnsKind::Whitelist => {
                return Ok(InsertSet {
                    columns: listed,
                    returning: Vec::new(),
                });
            }
            ColumnsKind::Blacklist => {
                return Ok(InsertSet {
                    columns: all.filter(|i| !listed.contains(i)).collect(),
                    returning: Vec::new(),
                });
            }
            ColumnsKind::Infer => all.filter(inferred).collect::<Vec<_>>(),
            ColumnsKind::Greylist => all
                .filter(|i| inferred(i) || listed.contains(i))
                .collect::<Vec<_>>(),
        };

        let returning = schema
            .with_default()
            .into_iter()
            .filter(|i| !set.contains(i))
            .collect();
        Ok(InsertSet {
            columns: set,
            returning,
        })
    }

    /// Columns to write on UPDATE. Primary-key columns are never included.
    pub fn update_set<R>(&self, schema: &TableSchema<R>) -> Result<Vec<usize>> {
        let listed = self.listed_indices(schema)?;
        let non_pk = |i: &usize| !schema.columns()[*i].is_primary_key();
        let all = 0..schema.columns().len();

        Ok(match self.kind {
            ColumnsKind::None => Vec::new(),
            ColumnsKind::Whitelist => listed.into_iter().filter(non_pk).collect(),
            ColumnsKind::Blacklist => all
                .filter(|i| non_pk(i) && !listed.contains(i))
                .collect(),
            ColumnsKind::Infer | ColumnsKind::Greylist => all.filter(non_pk).collect(),
        })
    }
}

//! Lifecycle hook registry.
//!
//! Each [`HookPoint`] holds an ordered list of callbacks. Callbacks run in
//! registration order; the first error aborts the rest of the chain and the
//! enclosing mapper operation.

use tablemap_core::Error;

type HookFn<R> = Box<dyn Fn(&mut R) -> Result<(), Error> + Send + Sync>;

/// Points in a record's lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// After a record was read by `find`, `reload`, a query or an eager load.
    AfterSelect,
    /// Before an INSERT, after timestamps were set.
    BeforeInsert,
    /// After a successful INSERT.
    AfterInsert,
    /// Before an UPDATE, after `updated_at` was set.
    BeforeUpdate,
    /// After a successful UPDATE.
    AfterUpdate,
    /// Before a DELETE or soft-delete UPDATE.
    BeforeDelete,
    /// After a successful DELETE or soft-delete UPDATE.
    AfterDelete,
    /// Before an upsert, after timestamps were set.
    BeforeUpsert,
    /// After a successful upsert.
    AfterUpsert,
}

/// Ordered hook lists for one record type.
pub struct Hooks<R> {
    after_select: Vec<HookFn<R>>,
    before_insert: Vec<HookFn<R>>,
    after_insert: Vec<HookFn<R>>,
    before_update: Vec<HookFn<R>>,
    after_update: Vec<HookFn<R>>,
    before_delete: Vec<HookFn<R>>,
    after_delete: Vec<HookFn<R>>,
    before_upsert: Vec<HookFn<R>>,
    after_upsert: Vec<HookFn<R>>,
}

impl<R> Default for Hooks<R> {
    fn default() -> Self {
        Self {
            after_select: Vec::new(),
            before_insert: Vec::new(),
            after_insert: Vec::new(),
            before_update: Vec::new(),
            after_update: Vec::new(),
            before_delete: Vec::new(),
            after_delete: Vec::new(),
            before_upsert: Vec::new(),
            after_upsert: Vec::new(),
        }
    }
}

impl<R> std::fmt::Debug for Hooks<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("after_select", &self.after_select.len())
            .field("before_insert", &self.before_insert.len())
            .field("after_insert", &self.after_insert.len())
            .field("before_update", &self.before_update.len())
            .field("after_update", &self.after_update.len())
            .field("before_delete", &self.before_delete.len())
            .field("after_delete", &self.after_delete.len())
            .field("before_upsert", &self.before_upsert.len())
            .field("after_upsert", &self.after_upsert.len())
            .finish()
    }
}

impl<R> Hooks<R> {
    fn list(&self, point: HookPoint) -> &Vec<HookFn<R>> {
        match point {
            HookPoint::AfterSelect => &self.after_select,
            HookPoint::BeforeInsert => &self.before_insert,
            HookPoint::AfterInsert => &self.after_insert,
            HookPoint::BeforeUpdate => &self.before_update,
            HookPoint::AfterUpdate => &self.after_update,
            HookPoint::BeforeDelete => &self.before_delete,
            HookPoint::AfterDelete => &self.after_delete,
            HookPoint::BeforeUpsert => &self.before_upsert,
            HookPoint::AfterUpsert => &self.after_upsert,
        }
    }

    fn list_mut(&mut self, point: HookPoint) -> &mut Vec<HookFn<R>> {
        match point {
            HookPoint::AfterSelect => &mut self.after_select,
            HookPoint::BeforeInsert => &mut self.before_insert,
            HookPoint::AfterInsert => &mut self.after_insert,
            HookPoint::BeforeUpdate => &mut self.before_update,
            HookPoint::AfterUpdate => &mut self.after_update,
            HookPoint::BeforeDelete => &mut self.before_delete,
            HookPoint::AfterDelete => &mut self.after_delete,
            HookPoint::BeforeUpsert => &mut self.before_upsert,
            HookPoint::AfterUpsert => &mut self.after_upsert,
        }
    }

    /// Append a hook. Hooks are never removed.
    pub fn add(
        &mut self,
        point: HookPoint,
        hook: impl Fn(&mut R) -> Result<(), Error> + Send + Sync + 'static,
    ) {
        self.list_mut(point).push(Box::new(hook));
    }

    pub fn len(&self, point: HookPoint) -> usize {
        self.list(point).len()
    }

    pub fn is_empty(&self, point: HookPoint) -> bool {
        self.list(point).is_empty()
    }

    /// Run every hook registered at `point`, stopping at the first error.
    #[allow(clippy::result_large_err)]
    pub fn fire(&self, point: HookPoint, record: &mut R) -> Result<(), Error> {
        for hook in self.list(point) {
            hook(record)?;
        }
        Ok(())
    }

    /// Fire `point` for every record in a slice.
    #[allow(clippy::result_large_err)]
    pub fn fire_all(&self, point: HookPoint, records: &mut [R]) -> Result<(), Error> {
        if self.is_empty(point) {
            return Ok(());
        }
        for record in records {
            self.fire(point, record)?;
        }
        Ok(())
    }
}

//! Lifecycle hooks and statement caching against in-memory SQLite.

mod common;

use common::{Author, Tag, expect_err, open_db, run, unwrap_outcome};
use std::sync::{Arc, Mutex};
use tablemap::prelude::*;

fn recorder(
    log: &Arc<Mutex<Vec<String>>>,
    label: &'static str,
) -> impl Fn(&mut Author) -> Result<(), Error> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |a: &mut Author| {
        log.lock().unwrap().push(format!("{label}:{}", a.name));
        Ok(())
    }
}

#[test]
fn hooks_run_in_registration_order_around_each_operation() {
    run(|cx| async move {
        let conn = open_db();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut authors = Mapper::<Author>::new();
        authors.add_hook(HookPoint::BeforeInsert, recorder(&log, "before_insert_1"));
        authors.add_hook(HookPoint::BeforeInsert, recorder(&log, "before_insert_2"));
        authors.add_hook(HookPoint::AfterInsert, recorder(&log, "after_insert"));
        authors.add_hook(HookPoint::AfterSelect, recorder(&log, "after_select"));
        authors.add_hook(HookPoint::BeforeUpdate, recorder(&log, "before_update"));
        authors.add_hook(HookPoint::AfterUpdate, recorder(&log, "after_update"));
        authors.add_hook(HookPoint::BeforeUpsert, recorder(&log, "before_upsert"));
        authors.add_hook(HookPoint::AfterUpsert, recorder(&log, "after_upsert"));
        authors.add_hook(HookPoint::BeforeDelete, recorder(&log, "before_delete"));
        authors.add_hook(HookPoint::AfterDelete, recorder(&log, "after_delete"));

        let mut ada = Author::new("Ada", "ada@example.com");
        unwrap_outcome(authors.insert(&cx, &conn, &mut ada, &Columns::infer()).await);
        let _ = unwrap_outcome(authors.find(&cx, &conn, ada.id.as_str()).await);
        unwrap_outcome(authors.update(&cx, &conn, &mut ada, &Columns::infer()).await);
        let by_email = UpsertOptions::new()
            .conflict_on(["email"])
            .insert(Columns::whitelist(["name", "email"]));
        unwrap_outcome(authors.upsert(&cx, &conn, &mut ada, &by_email).await);
        unwrap_outcome(authors.delete(&cx, &conn, &mut ada, false).await);

        assert_eq!(
            *log.lock().unwrap(),
            [
                "before_insert_1:Ada",
                "before_insert_2:Ada",
                "after_insert:Ada",
                "after_select:Ada",
                "before_update:Ada",
                "after_update:Ada",
                "before_upsert:Ada",
                "after_upsert:Ada",
                "before_delete:Ada",
                "after_delete:Ada",
            ]
        );
    });
}

#[test]
fn before_hook_error_aborts_without_touching_the_store() {
    run(|cx| async move {
        let conn = open_db();
        let mut authors = Mapper::<Author>::new();
        authors.add_hook(HookPoint::BeforeInsert, |a| {
            if a.name.is_empty() {
                return Err(Error::Custom("name is required".into()));
            }
            Ok(())
        });

        let mut nameless = Author::new("", "anon@example.com");
        let err = expect_err(authors.insert(&cx, &conn, &mut nameless, &Columns::infer()).await);
        assert!(err.to_string().contains("name is required"));
        assert_eq!(
            unwrap_outcome(authors.query().with_deleted().count(&cx, &conn).await),
            0
        );
    });
}

#[test]
fn after_hook_error_is_reported_but_the_write_persists() {
    run(|cx| async move {
        let conn = open_db();
        let mut authors = Mapper::<Author>::new();
        authors.add_hook(HookPoint::AfterInsert, |_| {
            Err(Error::Custom("audit log unavailable".into()))
        });
        authors.add_hook(HookPoint::AfterUpdate, |a| {
            Err(Error::Custom(format!("rejected rename to {}", a.name)))
        });

        let mut ada = Author::new("Ada", "ada@example.com");
        let err = expect_err(authors.insert(&cx, &conn, &mut ada, &Columns::infer()).await);
        assert!(err.to_string().contains("audit log unavailable"));
        assert!(!ada.id.is_empty(), "RETURNING was scanned before the hook ran");
        assert_eq!(
            unwrap_outcome(authors.query().with_deleted().count(&cx, &conn).await),
            1
        );

        ada.name = "Ada Lovelace".into();
        let err = expect_err(authors.update(&cx, &conn, &mut ada, &Columns::infer()).await);
        assert!(err.to_string().contains("rejected rename to Ada Lovelace"));
        let stored = unwrap_outcome(authors.find(&cx, &conn, ada.id.as_str()).await);
        assert_eq!(stored.name, "Ada Lovelace");
    });
}

#[test]
fn hooks_can_modify_records_before_writing() {
    run(|cx| async move {
        let conn = open_db();
        let mut authors = Mapper::<Author>::new();
        authors.add_hook(HookPoint::BeforeInsert, |a| {
            a.name = a.name.trim().to_string();
            Ok(())
        });
        authors.add_hook(HookPoint::AfterSelect, |a| {
            a.name = a.name.to_uppercase();
            Ok(())
        });

        let mut ada = Author::new("  Ada  ", "ada@example.com");
        unwrap_outcome(authors.insert(&cx, &conn, &mut ada, &Columns::infer()).await);
        assert_eq!(ada.name, "Ada");

        let loaded = unwrap_outcome(authors.query().all(&cx, &conn).await);
        assert_eq!(loaded[0].name, "ADA");
    });
}

#[test]
fn after_delete_runs_for_every_record_in_a_slice() {
    run(|cx| async move {
        let conn = open_db();
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let mut tags = Mapper::<Tag>::new();
        let sink = Arc::clone(&deleted);
        tags.add_hook(HookPoint::AfterDelete, move |t| {
            sink.lock().unwrap().push(t.name.clone());
            Ok(())
        });

        let mut all = vec![
            Tag { name: "a".into(), uses: 1 },
            Tag { name: "b".into(), uses: 2 },
        ];
        for tag in &mut all {
            unwrap_outcome(tags.insert(&cx, &conn, tag, &Columns::infer()).await);
        }
        unwrap_outcome(tags.delete_all(&cx, &conn, &mut all, false).await);
        assert_eq!(*deleted.lock().unwrap(), ["a", "b"]);
    });
}

#[test]
fn statements_are_cached_per_shape() {
    run(|cx| async move {
        let conn = open_db();
        let authors = Mapper::<Author>::new();

        let mut ada = Author::new("Ada", "ada@example.com");
        let mut bob = Author::new("Bob", "bob@example.com");
        unwrap_outcome(authors.insert(&cx, &conn, &mut ada, &Columns::infer()).await);
        unwrap_outcome(authors.insert(&cx, &conn, &mut bob, &Columns::infer()).await);
        assert_eq!(authors.statement_cache().len(), 1);

        let mut cat = Author::new("Cat", "cat@example.com");
        unwrap_outcome(authors.insert(&cx, &conn, &mut cat, &Columns::whitelist(["name", "email"])).await);
        assert_eq!(authors.statement_cache().len(), 2);

        unwrap_outcome(authors.update(&cx, &conn, &mut ada, &Columns::infer()).await);
        unwrap_outcome(authors.update(&cx, &conn, &mut bob, &Columns::infer()).await);
        assert_eq!(authors.statement_cache().len(), 3);

        let mut dan = Author::new("Dan", "dan@example.com");
        dan.id = "preset-id".into();
        unwrap_outcome(authors.insert(&cx, &conn, &mut dan, &Columns::infer()).await);
        assert_eq!(authors.statement_cache().len(), 4, "non-zero default changes the shape");
        assert_eq!(dan.id, "preset-id");
    });
}

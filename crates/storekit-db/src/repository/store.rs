//! # Generic Store
//!
//! CRUD for any entity type, driven by three converter functions instead of
//! reflection.
//!
//! ## Operations
//! ```text
//! ┌──────────┬────────┬───────────────────────┬─────────────────────────────┐
//! │ Method   │ Mode   │ Parameters from       │ Result                      │
//! ├──────────┼────────┼───────────────────────┼─────────────────────────────┤
//! │ find     │ view   │ the output object     │ scanned into the object     │
//! │ create   │ lock   │ the new object        │ engine identity             │
//! │ list     │ view   │ a filter object       │ Vec<T> in result order      │
//! │ update   │ lock   │ the model             │ ()                          │
//! │ delete   │ lock   │ the model             │ ()                          │
//! │ count    │ view   │ none (no binding)     │ first column of first row   │
//! └──────────┴────────┴───────────────────────┴─────────────────────────────┘
//! ```
//!
//! Binding happens before any statement is sent: a missing parameter fails
//! with `DbError::Bind` and executes nothing.

use std::fmt;
use std::sync::Arc;

use sqlx::any::AnyRow;
use storekit_core::{Page, Params};
use tracing::debug;

use crate::capability::{Binder, ExecResult, Execer, Queryer, ScanExt, Scanner};
use crate::error::{DbError, DbResult};
use crate::pool::Db;

/// Entity → named parameters.
pub type ToParamsFn<T> = Arc<dyn Fn(&T) -> Params + Send + Sync>;

/// One row → entity, filling an existing value.
pub type ScanRowFn<T> = Arc<dyn Fn(&dyn Scanner, &mut T) -> DbResult<()> + Send + Sync>;

/// Every row of a result set → entities, in order.
pub type ScanRowsFn<T> = Arc<dyn Fn(&[AnyRow]) -> DbResult<Vec<T>> + Send + Sync>;

/// CRUD store for one entity type.
///
/// ## Usage
/// ```rust,ignore
/// #[derive(Default)]
/// struct Note { id: i64, name: String }
///
/// let notes = Store::with_row_scanner(
///     db.clone(),
///     |note: &Note| Params::new().with("id", note.id).with("name", note.name.clone()),
///     |row, note| {
///         note.id = row.get("id")?;
///         note.name = row.get("name")?;
///         Ok(())
///     },
/// );
///
/// let id = notes.create("INSERT INTO notes (name) VALUES (:name)", &note).await?;
/// ```
pub struct Store<T> {
    db: Db,
    to_params: ToParamsFn<T>,
    scan_row: ScanRowFn<T>,
    scan_rows: ScanRowsFn<T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Store {
            db: self.db.clone(),
            to_params: self.to_params.clone(),
            scan_row: self.scan_row.clone(),
            scan_rows: self.scan_rows.clone(),
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Store<T> {
    pub fn new<P, S, L>(db: Db, to_params: P, scan_row: S, scan_rows: L) -> Self
    where
        P: Fn(&T) -> Params + Send + Sync + 'static,
        S: Fn(&dyn Scanner, &mut T) -> DbResult<()> + Send + Sync + 'static,
        L: Fn(&[AnyRow]) -> DbResult<Vec<T>> + Send + Sync + 'static,
    {
        Store {
            db,
            to_params: Arc::new(to_params),
            scan_row: Arc::new(scan_row),
            scan_rows: Arc::new(scan_rows),
        }
    }

    /// Builds the rows converter from the row converter, one default value
    /// per row.
    pub fn with_row_scanner<P, S>(db: Db, to_params: P, scan_row: S) -> Self
    where
        T: Default,
        P: Fn(&T) -> Params + Send + Sync + 'static,
        S: Fn(&dyn Scanner, &mut T) -> DbResult<()> + Send + Sync + 'static,
    {
        let scan_row: ScanRowFn<T> = Arc::new(scan_row);
        let per_row = scan_row.clone();

        let scan_rows: ScanRowsFn<T> = Arc::new(move |rows: &[AnyRow]| {
            rows.iter()
                .map(|row| {
                    let mut item = T::default();
                    per_row(row as &dyn Scanner, &mut item)?;
                    Ok(item)
                })
                .collect::<DbResult<Vec<T>>>()
        });

        Store {
            db,
            to_params: Arc::new(to_params),
            scan_row,
            scan_rows,
        }
    }

    /// The shared handle, for access modes the store does not wrap.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Loads one row into `out`.
    ///
    /// Parameters come from `out` itself, so the caller fills in the key
    /// fields first. `out` is left untouched unless a row is found.
    ///
    /// ## Returns
    /// * `Ok(())` - `out` was filled by the row converter
    /// * `Err(DbError::NoRows)` - Nothing matched
    /// * `Err(DbError::Bind)` - The template names a missing parameter
    pub async fn find(&self, sql: &str, out: &mut T) -> DbResult<()> {
        let params = (self.to_params)(out);
        let sql = sql.to_string();

        let row = self
            .db
            .view(move |conn, binder| Box::pin(fetch_row(conn, binder, sql, params)))
            .await?;

        (self.scan_row)(&row, out)
    }

    /// Inserts `obj` and returns the identity the engine generated.
    ///
    /// ## Returns
    /// * `Ok(id)` - Last inserted id
    /// * `Err(DbError::IdentityUnsupported)` - Engine reports no identity
    ///   (PostgreSQL; use `RETURNING` through [`Db::update`] instead)
    pub async fn create(&self, sql: &str, obj: &T) -> DbResult<i64> {
        let params = (self.to_params)(obj);
        let sql = sql.to_string();
        let dialect = self.db.dialect();

        let result = self
            .db
            .lock(move |conn, binder| Box::pin(insert(conn, binder, sql, params)))
            .await?;

        debug!(id = ?result.last_insert_id, "Created row");
        result
            .last_insert_id
            .ok_or(DbError::IdentityUnsupported(dialect))
    }

    /// Lists every row the query returns, parameters taken from a filter
    /// object.
    pub async fn list(&self, sql: &str, param_object: &T) -> DbResult<Vec<T>> {
        let params = (self.to_params)(param_object);
        self.list_with(sql, params).await
    }

    /// Lists with an explicit parameter map.
    pub async fn list_with(&self, sql: &str, params: Params) -> DbResult<Vec<T>> {
        let sql = sql.to_string();

        let rows = self
            .db
            .view(move |conn, binder| Box::pin(fetch_rows(conn, binder, sql, params)))
            .await?;

        debug!(rows = rows.len(), "Listed rows");
        (self.scan_rows)(&rows)
    }

    /// Lists one page: `sql` is wrapped with the page's ordering and limit.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let page = Page::from_query("page=2&size=10&sort=name,desc", &PageOptions::default());
    /// let notes = store.list_page("SELECT id, name FROM notes", &page, Params::new()).await?;
    /// ```
    pub async fn list_page(&self, sql: &str, page: &Page, params: Params) -> DbResult<Vec<T>> {
        let wrapped = page.wrap(self.db.dialect(), sql);
        self.list_with(&wrapped, params).await
    }

    pub async fn update(&self, sql: &str, model: &T) -> DbResult<()> {
        self.write(sql, model).await
    }

    pub async fn delete(&self, sql: &str, model: &T) -> DbResult<()> {
        self.write(sql, model).await
    }

    /// Runs a scalar query as-is (no parameter binding).
    pub async fn count(&self, sql: &str) -> DbResult<i64> {
        let sql = sql.to_string();

        self.db
            .view(move |conn, _| Box::pin(fetch_count(conn, sql)))
            .await
    }

    async fn write(&self, sql: &str, model: &T) -> DbResult<()> {
        let params = (self.to_params)(model);
        let sql = sql.to_string();

        let result = self
            .db
            .lock(move |conn, binder| Box::pin(execute(conn, binder, sql, params)))
            .await?;

        debug!(rows_affected = result.rows_affected, "Wrote rows");
        Ok(())
    }
}

// =============================================================================
// Statement Helpers
// =============================================================================

async fn fetch_row(
    conn: &mut dyn Queryer,
    binder: &dyn Binder,
    sql: String,
    params: Params,
) -> DbResult<AnyRow> {
    let (stmt, args) = binder.bind_named(&sql, &params)?;
    conn.query_row(&stmt, args).await
}

async fn fetch_rows(
    conn: &mut dyn Queryer,
    binder: &dyn Binder,
    sql: String,
    params: Params,
) -> DbResult<Vec<AnyRow>> {
    let (stmt, args) = binder.bind_named(&sql, &params)?;
    conn.query(&stmt, args).await
}

async fn fetch_count(conn: &mut dyn Queryer, sql: String) -> DbResult<i64> {
    let row = conn.query_row(&sql, Vec::new()).await?;
    row.get_at(0)
}

async fn insert(
    conn: &mut dyn Execer,
    binder: &dyn Binder,
    sql: String,
    params: Params,
) -> DbResult<ExecResult> {
    let (stmt, args) = binder.bind_named(&sql, &params)?;
    conn.insert(binder.dialect(), &stmt, args).await
}

async fn execute(
    conn: &mut dyn Execer,
    binder: &dyn Binder,
    sql: String,
    params: Params,
) -> DbResult<ExecResult> {
    let (stmt, args) = binder.bind_named(&sql, &params)?;
    conn.exec(&stmt, args).await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbConfig;
    use crate::migrations::Migration;
    use std::time::Duration;
    use storekit_core::{Dialect, PageOptions};
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        id: i64,
        name: String,
    }

    impl Note {
        fn named(name: &str) -> Self {
            Note {
                id: 0,
                name: name.to_string(),
            }
        }
    }

    const INSERT: &str = "INSERT INTO notes (name) VALUES (:name)";
    const SELECT_ONE: &str = "SELECT id, name FROM notes WHERE id = :id";
    const SELECT_ALL: &str = "SELECT id, name FROM notes ORDER BY id";
    const COUNT: &str = "SELECT COUNT(*) FROM notes";

    fn note_params(note: &Note) -> Params {
        Params::new()
            .with("id", note.id)
            .with("name", note.name.clone())
    }

    fn scan_note(row: &dyn Scanner, note: &mut Note) -> DbResult<()> {
        note.id = row.get("id")?;
        note.name = row.get("name")?;
        Ok(())
    }

    async fn note_store() -> Store<Note> {
        let schema = Migration::statements(
            Dialect::Sqlite,
            ["CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)"],
        );
        let db = Db::connect_with(DbConfig::in_memory(), &[schema])
            .await
            .unwrap();
        Store::with_row_scanner(db, note_params, scan_note)
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = note_store().await;

        let id = store.create(INSERT, &Note::named("milk")).await.unwrap();

        let mut found = Note { id, ..Note::default() };
        store.find(SELECT_ONE, &mut found).await.unwrap();

        assert_eq!(found, Note { id, name: "milk".to_string() });
    }

    #[tokio::test]
    async fn test_create_returns_sequential_ids() {
        let store = note_store().await;

        let first = store.create(INSERT, &Note::named("a")).await.unwrap();
        let second = store.create(INSERT, &Note::named("b")).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_find_missing_row_leaves_output_untouched() {
        let store = note_store().await;

        let mut out = Note {
            id: 42,
            name: "keep".to_string(),
        };
        let err = store.find(SELECT_ONE, &mut out).await.unwrap_err();

        assert!(matches!(err, DbError::NoRows));
        assert_eq!(out.name, "keep");
    }

    #[tokio::test]
    async fn test_list_in_result_order() {
        let store = note_store().await;
        for name in ["a", "b", "c"] {
            store.create(INSERT, &Note::named(name)).await.unwrap();
        }

        let notes = store.list(SELECT_ALL, &Note::default()).await.unwrap();
        let names: Vec<_> = notes.iter().map(|n| n.name.as_str()).collect();

        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_page() {
        let store = note_store().await;
        for name in ["a", "b", "c", "d", "e"] {
            store.create(INSERT, &Note::named(name)).await.unwrap();
        }

        let page = Page::from_query("page=2&size=2&sort=name,desc", &PageOptions::default());
        let notes = store
            .list_page("SELECT id, name FROM notes", &page, Params::new())
            .await
            .unwrap();
        let names: Vec<_> = notes.iter().map(|n| n.name.as_str()).collect();

        assert_eq!(names, ["c", "b"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = note_store().await;
        let id = store.create(INSERT, &Note::named("old")).await.unwrap();

        let renamed = Note {
            id,
            name: "new".to_string(),
        };
        store
            .update("UPDATE notes SET name = :name WHERE id = :id", &renamed)
            .await
            .unwrap();

        let mut found = Note { id, ..Note::default() };
        store.find(SELECT_ONE, &mut found).await.unwrap();
        assert_eq!(found.name, "new");

        store
            .delete("DELETE FROM notes WHERE id = :id", &renamed)
            .await
            .unwrap();
        assert_eq!(store.count(COUNT).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_parameter_executes_nothing() {
        let store = note_store().await;
        store.create(INSERT, &Note::named("a")).await.unwrap();

        let err = store
            .update("UPDATE notes SET name = :title WHERE id = :id", &Note::named("b"))
            .await
            .unwrap_err();

        assert!(err.is_bind());
        assert_eq!(store.count(COUNT).await.unwrap(), 1);

        let mut found = Note { id: 1, ..Note::default() };
        store.find(SELECT_ONE, &mut found).await.unwrap();
        assert_eq!(found.name, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_get_distinct_ids() {
        let store = note_store().await;

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.create(INSERT, &Note::named("a")).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.create(INSERT, &Note::named("a")).await }
        });
        let reader = tokio::spawn({
            let store = store.clone();
            async move { store.list(SELECT_ALL, &Note::default()).await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        let seen = reader.await.unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(store.count(COUNT).await.unwrap(), 2);
        assert!(seen.len() <= 2);
        assert!(seen.iter().all(|n| n.id > 0 && n.name == "a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_wait_for_uncommitted_write() {
        let store = note_store().await;
        let (inserted_tx, inserted_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let writer = tokio::spawn({
            let db = store.db().clone();
            async move {
                db.update(move |tx, _| {
                    Box::pin(async move {
                        tx.exec("INSERT INTO notes (name) VALUES ('half')", vec![])
                            .await?;
                        let _ = inserted_tx.send(());
                        let _ = release_rx.await;
                        tx.exec("UPDATE notes SET name = 'whole' WHERE name = 'half'", vec![])
                            .await?;
                        Ok(())
                    })
                })
                .await
            }
        });

        inserted_rx.await.unwrap();

        let count = tokio::time::timeout(Duration::from_millis(100), store.count(COUNT)).await;
        assert!(count.is_err(), "count ran inside an open write");
        let listed = tokio::time::timeout(
            Duration::from_millis(100),
            store.list(SELECT_ALL, &Note::default()),
        )
        .await;
        assert!(listed.is_err(), "list ran inside an open write");

        release_tx.send(()).unwrap();
        writer.await.unwrap().unwrap();

        let notes = store.list(SELECT_ALL, &Note::default()).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].name, "whole");
        assert_eq!(store.count(COUNT).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scan_failure_is_conversion_error() {
        let store = note_store().await;
        store.create(INSERT, &Note::named("a")).await.unwrap();

        let err = store
            .list("SELECT id FROM notes", &Note::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Conversion(_)));
    }

    #[derive(Debug, Default, serde::Serialize)]
    struct Tagged {
        id: i64,
        name: String,
    }

    #[tokio::test]
    async fn test_params_from_serialize() {
        let store = note_store().await;
        let tagged = Store::with_row_scanner(
            store.db().clone(),
            |t: &Tagged| Params::from_serialize(t).unwrap_or_default(),
            |row, t: &mut Tagged| {
                t.id = row.get("id")?;
                t.name = row.get("name")?;
                Ok(())
            },
        );

        let id = tagged
            .create(INSERT, &Tagged { id: 0, name: "json".to_string() })
            .await
            .unwrap();

        let mut found = Tagged { id, ..Tagged::default() };
        tagged.find(SELECT_ONE, &mut found).await.unwrap();
        assert_eq!(found.name, "json");
    }

    #[tokio::test]
    async fn test_custom_rows_converter() {
        let store = note_store().await;
        let names = Store::new(
            store.db().clone(),
            |_: &String| Params::new(),
            |row, name: &mut String| {
                *name = row.get("name")?;
                Ok(())
            },
            |rows: &[AnyRow]| {
                rows.iter()
                    .map(|row| row.get::<String>("name").map(|n| n.to_uppercase()))
                    .collect()
            },
        );
        store.create(INSERT, &Note::named("shout")).await.unwrap();

        let listed = names
            .list("SELECT name FROM notes", &String::new())
            .await
            .unwrap();

        assert_eq!(listed, ["SHOUT"]);
    }
}

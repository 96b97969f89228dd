//! # Access Modes
//!
//! Every database touch goes through one of three modes. Each mode takes the
//! guard, hands the closure a capability and a binder, and catches panics.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬──────────────────────────────┐
//! │ Mode     │ Guard        │ Closure gets     │ On completion                │
//! ├──────────┼──────────────┼──────────────────┼──────────────────────────────┤
//! │ view     │ shared       │ &mut dyn Queryer │ release                      │
//! │ lock     │ exclusive    │ &mut dyn Execer  │ release                      │
//! │ update   │ exclusive    │ &mut dyn Execer  │ Ok → commit, Err → rollback, │
//! │          │              │ (transaction)    │ panic → rollback, release    │
//! └──────────┴──────────────┴──────────────────┴──────────────────────────────┘
//! ```
//!
//! Closures return a boxed future borrowing the capability, the same shape
//! `sqlx::Connection::transaction` takes:
//!
//! ```rust,ignore
//! let total: i64 = db
//!     .view(|q, _| Box::pin(async move {
//!         q.query_row("SELECT COUNT(*) FROM notes", vec![]).await?.get_at(0)
//!     }))
//!     .await?;
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::capability::{Binder, Execer, Queryer};
use crate::error::{DbError, DbResult};
use crate::pool::Db;

impl Db {
    /// Read-only access under the shared guard.
    ///
    /// ## Returns
    /// Whatever the closure returns, or `DbError::Panicked` if it panicked.
    pub async fn view<F, R>(&self, f: F) -> DbResult<R>
    where
        F: for<'c> FnOnce(&'c mut dyn Queryer, &'c dyn Binder) -> BoxFuture<'c, DbResult<R>>
            + Send,
        R: Send,
    {
        let permit = self.guard().acquire_shared().await;
        debug!("view");

        let mut conn = self.pool().clone();
        let dialect = self.dialect();
        let queryer: &mut dyn Queryer = &mut conn;
        let binder: &dyn Binder = &dialect;

        let result = catch_panics(move || f(queryer, binder)).await;

        permit.release();
        result
    }

    /// Direct write access under the exclusive guard, without a transaction.
    pub async fn lock<F, R>(&self, f: F) -> DbResult<R>
    where
        F: for<'c> FnOnce(&'c mut dyn Execer, &'c dyn Binder) -> BoxFuture<'c, DbResult<R>>
            + Send,
        R: Send,
    {
        let permit = self.guard().acquire_exclusive().await;
        debug!("lock");

        let mut conn = self.pool().clone();
        let dialect = self.dialect();
        let execer: &mut dyn Execer = &mut conn;
        let binder: &dyn Binder = &dialect;

        let result = catch_panics(move || f(execer, binder)).await;

        permit.release();
        result
    }

    /// Transacted write access under the exclusive guard.
    ///
    /// ## Outcome
    /// ```text
    /// closure Ok(v)     → commit          → Ok(v) or CommitFailed
    /// closure Err(e)    → rollback        → Err(e)  (rollback failure is logged)
    /// closure panicked  → rollback        → Panicked, or RollbackFailed
    /// ```
    pub async fn update<F, R>(&self, f: F) -> DbResult<R>
    where
        F: for<'c> FnOnce(&'c mut dyn Execer, &'c dyn Binder) -> BoxFuture<'c, DbResult<R>>
            + Send,
        R: Send,
    {
        let permit = self.guard().acquire_exclusive().await;
        debug!("update");

        let result = self.transact(f).await;

        permit.release();
        result
    }

    async fn transact<F, R>(&self, f: F) -> DbResult<R>
    where
        F: for<'c> FnOnce(&'c mut dyn Execer, &'c dyn Binder) -> BoxFuture<'c, DbResult<R>>
            + Send,
        R: Send,
    {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::BeginFailed(e.to_string()))?;

        let dialect = self.dialect();
        let outcome = {
            let execer: &mut dyn Execer = &mut tx;
            let binder: &dyn Binder = &dialect;
            catch_panics(move || f(execer, binder)).await
        };

        match outcome {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| DbError::CommitFailed(e.to_string()))?;
                Ok(value)
            }
            Err(DbError::Panicked(message)) => match tx.rollback().await {
                Ok(()) => Err(DbError::Panicked(message)),
                Err(err) => {
                    error!(error = %err, panic = %message, "Rollback after panic failed");
                    Err(DbError::RollbackFailed(format!("{err} (after panic: {message})")))
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, cause = %err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Runs a closure-built future, turning a panic at either stage into
/// `DbError::Panicked`.
async fn catch_panics<'c, S, R>(start: S) -> DbResult<R>
where
    S: FnOnce() -> BoxFuture<'c, DbResult<R>>,
{
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(fut) => fut,
        Err(panic) => return Err(panicked(&panic)),
    };

    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(panicked(&panic)),
    }
}

fn panicked(panic: &Box<dyn Any + Send>) -> DbError {
    let message = panic_message(panic);
    error!(panic = %message, "Database closure panicked");
    DbError::Panicked(message)
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ScanExt;
    use crate::config::DbConfig;
    use crate::migrations::Migration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use storekit_core::{Dialect, Params};

    async fn notes_db() -> Db {
        let schema = Migration::statements(
            Dialect::Sqlite,
            ["CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)"],
        );
        Db::connect_with(DbConfig::in_memory(), &[schema]).await.unwrap()
    }

    async fn count_notes(db: &Db) -> i64 {
        db.view(|q, _| {
            Box::pin(async move {
                q.query_row("SELECT COUNT(*) FROM notes", vec![])
                    .await?
                    .get_at(0)
            })
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_commits_every_statement() {
        let db = notes_db().await;

        db.update(|tx, _| {
            Box::pin(async move {
                tx.exec("INSERT INTO notes (name) VALUES ('a')", vec![]).await?;
                tx.exec("INSERT INTO notes (name) VALUES ('b')", vec![]).await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        assert_eq!(count_notes(&db).await, 2);
    }

    #[tokio::test]
    async fn test_update_rolls_back_on_error() {
        let db = notes_db().await;

        let err = db
            .update(|tx, _| {
                Box::pin(async move {
                    tx.exec("INSERT INTO notes (name) VALUES ('a')", vec![]).await?;
                    Err::<(), _>(DbError::Internal("abort".to_string()))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Internal(msg) if msg == "abort"));
        assert_eq!(count_notes(&db).await, 0);
    }

    #[tokio::test]
    async fn test_update_binds_named_parameters() {
        let db = notes_db().await;

        let inserted = db
            .update(|tx, binder| {
                Box::pin(async move {
                    let params = Params::new().with("name", "milk");
                    let (sql, args) =
                        binder.bind_named("INSERT INTO notes (name) VALUES (:name)", &params)?;
                    tx.insert(binder.dialect(), &sql, args).await
                })
            })
            .await
            .unwrap();

        assert_eq!(inserted.rows_affected, 1);
        assert_eq!(inserted.last_insert_id, Some(1));
    }

    #[tokio::test]
    async fn test_lock_insert_reports_identity() {
        let db = notes_db().await;

        let ids: Vec<Option<i64>> = db
            .lock(|conn, binder| {
                Box::pin(async move {
                    let mut ids = Vec::new();
                    for _ in 0..2 {
                        let result = conn
                            .insert(binder.dialect(), "INSERT INTO notes (name) VALUES ('a')", vec![])
                            .await?;
                        ids.push(result.last_insert_id);
                    }
                    Ok(ids)
                })
            })
            .await
            .unwrap();

        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn test_panic_in_update_rolls_back_and_releases_guard() {
        let db = notes_db().await;

        let err = db
            .update(|tx, _| {
                Box::pin(async move {
                    tx.exec("INSERT INTO notes (name) VALUES ('a')", vec![]).await?;
                    if tx.exec("SELECT 1", vec![]).await.is_ok() {
                        panic!("closure exploded");
                    }
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Panicked(msg) if msg.contains("closure exploded")));

        let count = tokio::time::timeout(Duration::from_secs(1), count_notes(&db))
            .await
            .expect("guard leaked after panic");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_panic_before_future_is_built() {
        let db = notes_db().await;

        let err = db
            .lock::<_, ()>(|_, _| panic!("eager panic"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Panicked(msg) if msg == "eager panic"));
        assert_eq!(count_notes(&db).await, 0);
    }

    #[tokio::test]
    async fn test_lock_writes_without_transaction() {
        let db = notes_db().await;

        let result = db
            .lock(|conn, _| {
                Box::pin(async move {
                    conn.exec("INSERT INTO notes (name) VALUES ('a')", vec![]).await
                })
            })
            .await
            .unwrap();

        assert_eq!(result.rows_affected, 1);
        assert_eq!(count_notes(&db).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_sections_never_overlap() {
        let db = notes_db().await;
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    db.lock(move |conn, _| {
                        Box::pin(async move {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            conn.exec("INSERT INTO notes (name) VALUES ('n')", vec![]).await?;
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(count_notes(&db).await, 16);
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&borrowed), "borrowed");
        assert_eq!(panic_message(&other), "unknown panic");
    }
}

//! # Database Migrations
//!
//! Per-dialect schema setup registered at connect time.
//!
//! ## How Migrations Are Chosen
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Dispatch                                 │
//! │                                                                         │
//! │  Db::connect(Dialect::Sqlite, url, &[                                  │
//! │      Migration(MySql,    ...),   ✗ dialect differs, skipped            │
//! │      Migration(Sqlite,   A),     ✓ first match, runs                   │
//! │      Migration(Sqlite,   B),     ✗ never runs (only the first match)   │
//! │  ])                                                                     │
//! │                                                                         │
//! │  A fails?  → DbError::MigrationFailed, connect aborts,                 │
//! │              nothing already applied is undone                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Migrations should be idempotent (`CREATE TABLE IF NOT EXISTS`) or
//! tracked, like sqlx's own [`sqlx::migrate::Migrator`], which can be
//! registered directly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use sqlx::any::Any;
use sqlx::AnyPool;
use storekit_core::Dialect;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

// =============================================================================
// Migrator
// =============================================================================

/// A schema setup procedure.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn migrate(&self, pool: &AnyPool) -> DbResult<()>;
}

/// Plain SQL statements executed in order.
#[derive(Debug, Clone)]
pub struct Statements(pub Vec<String>);

#[async_trait]
impl Migrator for Statements {
    async fn migrate(&self, pool: &AnyPool) -> DbResult<()> {
        for (index, statement) in self.0.iter().enumerate() {
            debug!(step = index + 1, "Applying migration statement");
            sqlx::query::<Any>(statement).execute(pool).await?;
        }
        Ok(())
    }
}

/// Adapts an async function into a [`Migrator`].
pub struct MigratorFn<F>(pub F);

#[async_trait]
impl<F> Migrator for MigratorFn<F>
where
    F: Fn(AnyPool) -> BoxFuture<'static, DbResult<()>> + Send + Sync,
{
    async fn migrate(&self, pool: &AnyPool) -> DbResult<()> {
        (self.0)(pool.clone()).await
    }
}

/// sqlx's embedded/tracked migrations (`sqlx::migrate!("./migrations")`).
#[async_trait]
impl Migrator for sqlx::migrate::Migrator {
    async fn migrate(&self, pool: &AnyPool) -> DbResult<()> {
        self.run(pool).await?;
        Ok(())
    }
}

// =============================================================================
// Migration
// =============================================================================

/// A migrator registered for one dialect.
#[derive(Clone)]
pub struct Migration {
    pub dialect: Dialect,
    pub migrator: Arc<dyn Migrator>,
}

impl Migration {
    pub fn new(dialect: Dialect, migrator: impl Migrator + 'static) -> Self {
        Migration {
            dialect,
            migrator: Arc::new(migrator),
        }
    }

    /// Registers SQL statements run in order.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let schema = Migration::statements(Dialect::Sqlite, [
    ///     "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY, name TEXT)",
    /// ]);
    /// ```
    pub fn statements<I, S>(dialect: Dialect, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Migration::new(
            dialect,
            Statements(statements.into_iter().map(Into::into).collect()),
        )
    }

    /// Registers an async function.
    pub fn from_fn<F>(dialect: Dialect, f: F) -> Self
    where
        F: Fn(AnyPool) -> BoxFuture<'static, DbResult<()>> + Send + Sync + 'static,
    {
        Migration::new(dialect, MigratorFn(f))
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

/// Runs the first migration registered for `dialect`.
///
/// ## Returns
/// * `Ok(true)` - a migration matched and succeeded
/// * `Ok(false)` - nothing registered for this dialect
/// * `Err(DbError::MigrationFailed)` - the matched migration failed
pub(crate) async fn run_matching(
    pool: &AnyPool,
    dialect: Dialect,
    migrations: &[Migration],
) -> DbResult<bool> {
    let Some(migration) = migrations.iter().find(|m| m.dialect == dialect) else {
        debug!(dialect = %dialect, "No migration registered");
        return Ok(false);
    };

    info!(dialect = %dialect, "Running database migration");

    migration
        .migrator
        .migrate(pool)
        .await
        .map_err(|err| match err {
            DbError::MigrationFailed(_) => err,
            other => DbError::MigrationFailed(other.to_string()),
        })?;

    info!("Migration complete");
    Ok(true)
}

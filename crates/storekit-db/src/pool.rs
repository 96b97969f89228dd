//! # Connection Manager
//!
//! Opens the pool, waits for the engine to come up, applies the dialect's
//! migration and picks the concurrency guard.
//!
//! ## Connect Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Db::connect(dialect, url, migrations)              │
//! │                                                                         │
//! │  1. Parse URL            ✗ → ConnectionFailed (no retry)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Build lazy pool with per-dialect tuning                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  3. Ping ──✗──► warn!, sleep interval, ping again                      │
//! │       │         (ping_attempts times, then Unreachable)                 │
//! │       ▼                                                                 │
//! │  4. First migration registered for the dialect                          │
//! │       │                  ✗ → MigrationFailed                            │
//! │       ▼                                                                 │
//! │  5. Guard: Sqlite → Serializing, others → PassThrough                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Db { pool, dialect, guard }  (cheap to clone, share across tasks)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::str::FromStr;
use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyConnectOptions};
use sqlx::{AnyPool, Connection};
use storekit_core::Dialect;
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::guard::ConcurrencyGuard;
use crate::migrations::{self, Migration};

// =============================================================================
// Db
// =============================================================================

/// Database handle: pool, dialect and concurrency guard.
///
/// Clones share the pool and the guard, so a clone handed to another task
/// is serialized against the original.
///
/// ## Usage
/// ```rust,ignore
/// let db = Db::connect(Dialect::Sqlite, "sqlite://notes.db?mode=rwc", &[schema]).await?;
/// let notes = Store::with_row_scanner(db.clone(), note_params, scan_note);
/// ```
#[derive(Debug, Clone)]
pub struct Db {
    pool: AnyPool,
    dialect: Dialect,
    guard: ConcurrencyGuard,
}

impl Db {
    /// Connects with default pool and probe settings.
    ///
    /// ## Arguments
    /// * `dialect` - Engine family
    /// * `url` - Connection URL (`sqlite::memory:`, `postgres://...`, `mysql://...`)
    /// * `migrations` - Candidates; only the first one for `dialect` runs
    ///
    /// ## Returns
    /// * `Ok(Db)` - Reachable, migrated, ready to use
    /// * `Err(DbError::ConnectionFailed)` - URL rejected
    /// * `Err(DbError::Unreachable)` - Every ping failed
    /// * `Err(DbError::MigrationFailed)` - The matching migration failed
    pub async fn connect(dialect: Dialect, url: &str, migrations: &[Migration]) -> DbResult<Self> {
        Db::connect_with(DbConfig::new(dialect, url), migrations).await
    }

    /// Connects with explicit configuration.
    pub async fn connect_with(config: DbConfig, migrations: &[Migration]) -> DbResult<Self> {
        info!(dialect = %config.dialect, "Initializing database connection");

        install_default_drivers();

        match Dialect::from_url(&config.url) {
            Some(scheme) if scheme == config.dialect => {}
            _ => {
                return Err(DbError::ConnectionFailed(format!(
                    "url does not name a {} database",
                    config.dialect
                )))
            }
        }

        let options = AnyConnectOptions::from_str(&config.url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let pool = config.pool_options().connect_lazy_with(options);

        debug!(
            max_connections = pool.options().get_max_connections(),
            "Database pool created"
        );

        if let Err(err) = wait_until_reachable(&pool, config.ping_attempts, config.ping_interval).await
        {
            pool.close().await;
            return Err(err);
        }

        if let Err(err) = migrations::run_matching(&pool, config.dialect, migrations).await {
            pool.close().await;
            return Err(err);
        }

        let guard = ConcurrencyGuard::for_dialect(config.dialect);

        info!(
            dialect = %config.dialect,
            serializing = guard.is_serializing(),
            "Database ready"
        );

        Ok(Db {
            pool,
            dialect: config.dialect,
            guard,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    /// Returns a reference to the connection pool.
    ///
    /// ## Usage
    /// For work the executor does not cover. Bypasses the guard.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Closes the pool. Every later operation fails with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        ping(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Liveness Probe
// =============================================================================

async fn ping(pool: &AnyPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

/// Pings until the engine answers or the attempts run out.
async fn wait_until_reachable(pool: &AnyPool, attempts: u32, interval: Duration) -> DbResult<()> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match ping(pool).await {
            Ok(()) => {
                debug!(attempt, "Database is reachable");
                return Ok(());
            }
            Err(err) => {
                warn!(attempt, attempts, error = %err, "Database not reachable yet");
                last_error = err.to_string();
            }
        }

        if attempt < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(DbError::Unreachable {
        attempts,
        message: last_error,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const NOTES_TABLE: &str =
        "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)";

    async fn table_exists(db: &Db, name: &str) -> bool {
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name.to_string())
            .fetch_optional(db.pool())
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Db::connect_with(DbConfig::in_memory(), &[]).await.unwrap();

        assert!(db.health_check().await);
        assert_eq!(db.dialect(), Dialect::Sqlite);
        assert!(db.guard().is_serializing());
    }

    #[tokio::test]
    async fn test_only_first_matching_migration_runs() {
        let migrations = [
            Migration::statements(Dialect::MySql, ["THIS IS NOT SQL"]),
            Migration::statements(Dialect::Sqlite, [NOTES_TABLE]),
            Migration::statements(Dialect::Sqlite, ["CREATE TABLE second (x INTEGER)"]),
        ];

        let db = Db::connect(Dialect::Sqlite, "sqlite::memory:", &migrations)
            .await
            .unwrap();

        assert!(table_exists(&db, "notes").await);
        assert!(!table_exists(&db, "second").await);
    }

    #[tokio::test]
    async fn test_migration_function_receives_pool() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let migration = Migration::from_fn(Dialect::Sqlite, move |pool| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                sqlx::query(NOTES_TABLE).execute(&pool).await?;
                Ok::<_, DbError>(())
            }
            .boxed()
        });

        let db = Db::connect(Dialect::Sqlite, "sqlite::memory:", &[migration])
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(table_exists(&db, "notes").await);
    }

    #[tokio::test]
    async fn test_failing_migration_aborts_connect() {
        let migrations = [Migration::statements(
            Dialect::Sqlite,
            [NOTES_TABLE, "CREATE TABLE broken ("],
        )];

        let err = Db::connect(Dialect::Sqlite, "sqlite::memory:", &migrations)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::MigrationFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_after_attempts() {
        let config = DbConfig::new(
            Dialect::Sqlite,
            "sqlite:///nonexistent-storekit-dir/notes.db?mode=ro",
        )
        .ping_attempts(2)
        .ping_interval(Duration::from_millis(10))
        .acquire_timeout(Duration::from_millis(500));

        let err = Db::connect_with(config, &[]).await.unwrap_err();

        assert!(matches!(err, DbError::Unreachable { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_mismatched_url_fails_without_retry() {
        let config = DbConfig::new(Dialect::Postgres, "sqlite::memory:")
            .ping_interval(Duration::from_secs(60));

        let err = tokio::time::timeout(Duration::from_secs(1), Db::connect_with(config, &[]))
            .await
            .expect("connect must not retry")
            .unwrap_err();

        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_closed_pool_fails_health_check() {
        let db = Db::connect_with(DbConfig::in_memory(), &[]).await.unwrap();
        db.close().await;

        assert!(db.is_closed());
        assert!(!db.health_check().await);
    }
}

//! # Connection Configuration
//!
//! Dialect, URL, pool sizing and liveness-probe policy for a [`crate::Db`].
//!
//! Configuration is built in code with [`DbConfig::new`] or loaded from
//! environment variables with fallback to defaults via [`DbConfig::from_env`].
//!
//! ## Environment Variables
//! ```text
//! DATABASE_URL                 connection URL          default sqlite::memory:
//! DATABASE_DRIVER              mysql|postgres|sqlite   default from URL scheme
//! DATABASE_MAX_CONNECTIONS     pool size               default 10
//! DATABASE_PING_ATTEMPTS       liveness probes         default 30
//! DATABASE_PING_INTERVAL_MS    delay between probes    default 1000
//! ```

use std::env;
use std::time::Duration;

use sqlx::any::Any;
use sqlx::pool::PoolOptions;
use storekit_core::Dialect;
use thiserror::Error;

/// Attempts made by the liveness probe before giving up.
pub const DEFAULT_PING_ATTEMPTS: u32 = 30;

/// Fixed delay between liveness probes.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Idle timeout for dialects that close idle connections instead of pooling them.
const IDLE_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new(Dialect::Postgres, "postgres://localhost/app")
///     .max_connections(20)
///     .ping_attempts(5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine family. Fixes the guard variant and pool tuning.
    pub dialect: Dialect,

    /// Connection URL understood by sqlx.
    pub url: String,

    /// Maximum number of pooled connections.
    /// Default: 10. SQLite always uses a single connection.
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 0. MySQL never keeps idle connections.
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub acquire_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Liveness probes before connect gives up.
    /// Default: 30
    pub ping_attempts: u32,

    /// Delay between liveness probes.
    /// Default: 1 second
    pub ping_interval: Duration,
}

impl DbConfig {
    /// Creates a configuration with default pool and probe settings.
    pub fn new(dialect: Dialect, url: impl Into<String>) -> Self {
        DbConfig {
            dialect,
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            ping_attempts: DEFAULT_PING_ATTEMPTS,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    /// Creates an in-memory SQLite configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Db::connect_with(DbConfig::in_memory(), &[]).await?;
    /// // Database is isolated and lives as long as the handle
    /// ```
    pub fn in_memory() -> Self {
        DbConfig::new(Dialect::Sqlite, "sqlite::memory:").acquire_timeout(Duration::from_secs(5))
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the pool acquire timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how many liveness probes connect makes. Zero is treated as one.
    pub fn ping_attempts(mut self, attempts: u32) -> Self {
        self.ping_attempts = attempts;
        self
    }

    /// Sets the delay between liveness probes.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        DbConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, file, map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| "sqlite::memory:".to_string());

        let dialect = match lookup("DATABASE_DRIVER") {
            Some(driver) => driver
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_DRIVER".to_string()))?,
            None => Dialect::from_url(&url)
                .ok_or_else(|| ConfigError::MissingRequired("DATABASE_DRIVER".to_string()))?,
        };

        let mut config = DbConfig::new(dialect, url);

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = max
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string()))?;
        }

        if let Some(attempts) = lookup("DATABASE_PING_ATTEMPTS") {
            config.ping_attempts = attempts
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_PING_ATTEMPTS".to_string()))?;
        }

        if let Some(interval) = lookup("DATABASE_PING_INTERVAL_MS") {
            let millis: u64 = interval
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DATABASE_PING_INTERVAL_MS".to_string()))?;
            config.ping_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Pool options with the per-dialect tuning applied.
    ///
    /// ## Tuning Rules
    /// ```text
    /// Sqlite   → one connection, never reaped or recycled (serial use;
    ///            keeps `sqlite::memory:` alive for the handle's lifetime)
    /// MySql    → no idle connections kept (min 0, 1 s idle timeout)
    /// Postgres → configured sizes and idle timeout
    /// ```
    pub(crate) fn pool_options(&self) -> PoolOptions<Any> {
        let options = PoolOptions::<Any>::new().acquire_timeout(self.acquire_timeout);

        if self.dialect.is_single_writer() {
            options
                .max_connections(1)
                .min_connections(0)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else if self.dialect.disables_idle_pooling() {
            options
                .max_connections(self.max_connections)
                .min_connections(0)
                .idle_timeout(Some(IDLE_CLOSE_TIMEOUT))
        } else {
            options
                .max_connections(self.max_connections)
                .min_connections(self.min_connections)
                .idle_timeout(Some(self.idle_timeout))
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================

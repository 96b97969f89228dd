//! # SQL Dialects
//!
//! The engine families a storekit handle can be connected to.
//!
//! ## Dialect Matrix
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────────────────────┐
//! │ Dialect      │ Placeholder  │ Writers      │ Identity after INSERT   │
//! ├──────────────┼──────────────┼──────────────┼─────────────────────────┤
//! │ MySql        │ ?            │ concurrent   │ LAST_INSERT_ID()        │
//! │ Postgres     │ $1, $2, ...  │ concurrent   │ not reported            │
//! │ Sqlite       │ ?            │ single       │ last_insert_rowid()     │
//! └──────────────┴──────────────┴──────────────┴─────────────────────────┘
//! ```
//!
//! "Single" writers means the engine does not serialize concurrent writers
//! itself, so storekit-db puts a reader/writer lock in front of it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A SQL engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Maps a driver name to a dialect.
    ///
    /// `"mysql"` and `"postgres"` (or `"postgresql"`) select those engines;
    /// every other name falls back to SQLite. Use [`str::parse`] when an
    /// unknown name should be rejected instead.
    pub fn from_driver(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" => Dialect::MySql,
            "postgres" | "postgresql" | "pgx" => Dialect::Postgres,
            _ => Dialect::Sqlite,
        }
    }

    /// Infers the dialect from a connection URL scheme.
    ///
    /// ## Example
    /// ```rust
    /// use storekit_core::Dialect;
    ///
    /// assert_eq!(Dialect::from_url("sqlite::memory:"), Some(Dialect::Sqlite));
    /// assert_eq!(Dialect::from_url("postgres://localhost/app"), Some(Dialect::Postgres));
    /// assert_eq!(Dialect::from_url("redis://localhost"), None);
    /// ```
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?;
        scheme.parse().ok()
    }

    /// Driver name, also the URL scheme sqlx expects.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Whether the engine lets only one writer in at a time without
    /// coordinating concurrent writers itself.
    pub fn is_single_writer(self) -> bool {
        matches!(self, Dialect::Sqlite)
    }

    /// Whether idle pooled connections are closed instead of kept around.
    pub fn disables_idle_pooling(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Query returning the identity of the row last inserted on the current
    /// connection, for engines whose driver result does not carry it.
    ///
    /// MySQL reports the identity with the statement result; PostgreSQL has
    /// no implicit identity (use `RETURNING`).
    pub fn last_insert_id_query(self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => Some("SELECT last_insert_rowid()"),
            Dialect::MySql | Dialect::Postgres => None,
        }
    }

    /// Positional placeholder for the 1-based argument `position`.
    pub fn placeholder(self, position: usize) -> String {
        match self {
            Dialect::Postgres => format!("${position}"),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(ValueError::UnknownDialect(other.to_string())),
        }
    }
}

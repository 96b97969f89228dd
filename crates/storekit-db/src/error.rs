//! # Database Error Types
//!
//! Error types for connection, migration, binding, execution, transaction
//! and conversion failures.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / BindError / ValueError / panic payload                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Store / executor caller, never swallowed, never retried               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use storekit_core::{BindError, Dialect, ValueError};
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    // -------------------------------------------------------------------------
    // Connectivity
    // -------------------------------------------------------------------------
    /// The connection could not be opened.
    ///
    /// ## When This Occurs
    /// - Malformed connection URL
    /// - Driver not compiled in
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Every liveness probe failed.
    #[error("Database unreachable after {attempts} attempts: {message}")]
    Unreachable { attempts: u32, message: String },

    /// Pool exhausted (all connections in use past the acquire timeout).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    // -------------------------------------------------------------------------
    // Migration
    // -------------------------------------------------------------------------
    /// A registered migration failed. Partial work is not undone.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    // -------------------------------------------------------------------------
    // Binding
    // -------------------------------------------------------------------------
    /// A named template referenced a parameter the converter did not supply.
    /// No statement was executed.
    #[error("Binding failed: {0}")]
    Bind(#[from] BindError),

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------
    /// A single-row query matched nothing.
    #[error("no rows in result set")]
    NoRows,

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate key
    /// - Any UNIQUE index violation
    ///
    /// `field` is the offending `table.column` when the engine names it,
    /// else the constraint name.
    #[error("Duplicate {field}: {message}")]
    UniqueViolation { field: String, message: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The engine rejected a statement.
    ///
    /// ## When This Occurs
    /// - SQL syntax error
    /// - Missing table or column
    /// - Other constraint failures (NOT NULL, CHECK)
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The engine did not report an identity for the inserted row.
    #[error("{0} does not report the identity of inserted rows")]
    IdentityUnsupported(Dialect),

    // -------------------------------------------------------------------------
    // Transactions
    // -------------------------------------------------------------------------
    #[error("Transaction could not begin: {0}")]
    BeginFailed(String),

    #[error("Transaction commit failed: {0}")]
    CommitFailed(String),

    #[error("Transaction rollback failed: {0}")]
    RollbackFailed(String),

    /// The access-mode closure panicked. Locks were released and any
    /// transaction was rolled back.
    #[error("Operation panicked: {0}")]
    Panicked(String),

    // -------------------------------------------------------------------------
    // Conversion
    // -------------------------------------------------------------------------
    /// A scanned row did not fit the destination (missing column, type
    /// mismatch).
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// True for errors raised before any statement reached the engine.
    pub fn is_bind(&self) -> bool {
        matches!(self, DbError::Bind(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NoRows
/// sqlx::Error::Database       → constraint kind, else QueryFailed
/// sqlx::Error::Column*/Decode → DbError::Conversion
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::Io/Tls/Closed  → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NoRows,

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => {
                        // SQLite: "UNIQUE constraint failed: <table>.<column>"
                        let field = msg
                            .split("UNIQUE constraint failed: ")
                            .nth(1)
                            .or(db_err.constraint())
                            .unwrap_or("unknown")
                            .to_string();
                        DbError::UniqueViolation { field, message: msg }
                    }
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        DbError::ForeignKeyViolation { message: msg }
                    }
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::ColumnNotFound(column) => {
                DbError::Conversion(format!("no column named '{column}'"))
            }

            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                DbError::Conversion(format!("column index {index} out of range ({len} columns)"))
            }

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Conversion(err.to_string())
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Configuration(_) | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DbError::ConnectionFailed(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValueError> for DbError {
    fn from(err: ValueError) -> Self {
        DbError::Conversion(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

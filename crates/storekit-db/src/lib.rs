//! # storekit-db: Database Layer for storekit
//!
//! Dialect-aware concurrency control, migration dispatch, guarded access
//! modes and a generic CRUD store over MySQL, PostgreSQL and SQLite.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        storekit Data Flow                               │
//! │                                                                         │
//! │  Application (handlers, jobs, seed binary)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   storekit-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Db          │    │  Store<T>     │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  (store.rs)   │    │  per dialect │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ AnyPool       │◄───│ find/create   │    │ first match  │  │   │
//! │  │   │ Guard         │    │ list/update   │    │ wins         │  │   │
//! │  │   │ view/lock/    │    │ delete/count  │    │              │  │   │
//! │  │   │ update        │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MySQL / PostgreSQL / SQLite (sqlx Any driver)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connect, liveness probe, the [`Db`] handle
//! - [`executor`] - `view` / `lock` / `update` access modes
//! - [`guard`] - Per-dialect reader/writer guard
//! - [`capability`] - Scanner, Binder, Queryer, Execer
//! - [`migrations`] - Per-dialect migration registration
//! - [`repository`] - Generic [`Store`]
//! - [`config`] - [`DbConfig`] and environment loading
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storekit_db::{Db, Dialect, Migration, Store};
//!
//! let schema = Migration::statements(Dialect::Sqlite, [
//!     "CREATE TABLE IF NOT EXISTS notes (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)",
//! ]);
//! let db = Db::connect(Dialect::Sqlite, "sqlite://notes.db?mode=rwc", &[schema]).await?;
//!
//! let notes = Store::with_row_scanner(db.clone(), note_params, scan_note);
//! let id = notes.create("INSERT INTO notes (name) VALUES (:name)", &note).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod capability;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use capability::{Binder, ExecResult, Execer, Queryer, ScanExt, Scanner};
pub use config::{ConfigError, DbConfig};
pub use error::{DbError, DbResult};
pub use guard::{ConcurrencyGuard, Permit};
pub use migrations::{Migration, Migrator};
pub use pool::Db;
pub use repository::Store;

// Core types callers need alongside the database layer
pub use storekit_core::{Dialect, Page, PageOptions, Params, Value};

//! # storekit-core: Pure Building Blocks for storekit
//!
//! Everything storekit needs that can be computed without a database:
//! dialect tags, parameter values, named-parameter compilation, pagination
//! descriptors and random identifiers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        storekit Data Flow                               │
//! │                                                                         │
//! │  Application entity (Note, User, ...)                                  │
//! │       │  to_params converter                                            │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ storekit-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   Params { "name": Text("a"), "id": Int(7) }                    │   │
//! │  │       │                                                         │   │
//! │  │       ▼  compile_named(Dialect::Postgres, sql, &params)         │   │
//! │  │   "SELECT * FROM notes WHERE id = $1", [Int(7)]                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  storekit-db (guard, executor, generic store)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`dialect`] - SQL engine families and their placeholder syntax
//! - [`value`] - Dialect-neutral [`Value`] and the [`Params`] map
//! - [`named`] - `:name` placeholder compilation
//! - [`pagination`] - Page/sort descriptor parsed from query strings
//! - [`randomid`] - Random alphanumeric strings
//! - [`error`] - Error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storekit_core::{compile_named, Dialect, Params, Value};
//!
//! let params = Params::new().with("id", 7_i64);
//! let (sql, args) =
//!     compile_named(Dialect::Postgres, "SELECT * FROM notes WHERE id = :id", &params).unwrap();
//!
//! assert_eq!(sql, "SELECT * FROM notes WHERE id = $1");
//! assert_eq!(args, vec![Value::Int(7)]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dialect;
pub mod error;
pub mod named;
pub mod pagination;
pub mod randomid;
pub mod value;

// =============================================================================
// Re-exports
// =============================================================================

pub use dialect::Dialect;
pub use error::{BindError, ValueError};
pub use named::{compile_named, rebind};
pub use pagination::{Direction, Page, PageOptions, Sort};
pub use value::{FromValue, Params, Value};

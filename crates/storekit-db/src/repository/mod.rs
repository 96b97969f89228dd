//! # Repository Module
//!
//! Generic CRUD on top of the access modes.
//!
//! ## Store Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Store per Entity Type                            │
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │  notes.create("INSERT INTO notes (name) VALUES (:name)", &note) │
//! │       ▼                                                                 │
//! │  Store<Note>                                                            │
//! │  ├── to_params(&note)        → Params { name: "milk" }                 │
//! │  ├── Binder::bind_named      → "... VALUES (?)", [Text("milk")]        │
//! │  ├── Db::lock / Db::view     → guard + statement                       │
//! │  └── scan_row / scan_rows    → Note { id: 1, name: "milk" }            │
//! │                                                                         │
//! │  SQL text and converters belong to the caller; the store only wires    │
//! │  them through the guard.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Types
//!
//! - [`Store`] - find/create/list/update/delete/count for one entity type

pub mod store;

pub use store::{ScanRowFn, ScanRowsFn, Store, ToParamsFn};

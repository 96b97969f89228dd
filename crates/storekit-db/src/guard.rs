//! # Concurrency Guard
//!
//! Serializes writers in front of engines that cannot coordinate concurrent
//! writers themselves, and stays out of the way for engines that can.
//!
//! ## Variants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Guard Selection (once, at connect)                 │
//! │                                                                         │
//! │  Dialect::Sqlite ──────────► Serializing (fair RwLock)                 │
//! │                              • many shared holders                      │
//! │                              • one exclusive holder                     │
//! │                              • exclusive excludes shared                │
//! │                                                                         │
//! │  Dialect::MySql    ─┐                                                   │
//! │  Dialect::Postgres ─┴──────► PassThrough                               │
//! │                              • every operation is a no-op               │
//! │                              • isolation is the engine's business       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Release
//! Acquiring returns a [`Permit`]. Dropping the permit releases the hold, so
//! an early `?` return, a panic unwinding through the caller or a dropped
//! future all release it. [`Permit::release`] spells the release out where
//! the call site reads better with it.

use std::sync::Arc;

use storekit_core::Dialect;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Reader/writer guard chosen by dialect.
///
/// Cloning shares the underlying lock.
#[derive(Debug, Clone)]
pub enum ConcurrencyGuard {
    /// Real shared/exclusive lock. Tokio's RwLock queues waiters in FIFO
    /// order, so a waiting writer is not starved by a stream of readers.
    Serializing(Arc<RwLock<()>>),
    /// No-op guard.
    PassThrough,
}

impl ConcurrencyGuard {
    /// Picks the variant for a dialect.
    pub fn for_dialect(dialect: Dialect) -> Self {
        if dialect.is_single_writer() {
            ConcurrencyGuard::serializing()
        } else {
            ConcurrencyGuard::PassThrough
        }
    }

    pub fn serializing() -> Self {
        ConcurrencyGuard::Serializing(Arc::new(RwLock::new(())))
    }

    pub fn is_serializing(&self) -> bool {
        matches!(self, ConcurrencyGuard::Serializing(_))
    }

    /// Acquires shared (read) access.
    pub async fn acquire_shared(&self) -> Permit {
        match self {
            ConcurrencyGuard::Serializing(lock) => Permit::Shared(lock.clone().read_owned().await),
            ConcurrencyGuard::PassThrough => Permit::Noop,
        }
    }

    /// Acquires exclusive (write) access.
    pub async fn acquire_exclusive(&self) -> Permit {
        match self {
            ConcurrencyGuard::Serializing(lock) => {
                Permit::Exclusive(lock.clone().write_owned().await)
            }
            ConcurrencyGuard::PassThrough => Permit::Noop,
        }
    }
}

/// A held guard. Released on drop.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub enum Permit {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
    Noop,
}

impl Permit {
    /// Releases the hold now.
    pub fn release(self) {
        drop(self);
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Permit::Exclusive(_))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Error Types
//!
//! Errors raised by the pure helpers in storekit-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storekit-core errors (this file)                                      │
//! │  ├── BindError   - named template references an unknown parameter      │
//! │  └── ValueError  - a Value cannot become the requested Rust type       │
//! │                                                                         │
//! │  storekit-db errors (separate crate)                                   │
//! │  └── DbError     - wraps both, plus driver/transaction failures        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Bind Error
// =============================================================================

/// Failure to turn a named-parameter template into positional SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The template names a parameter the map does not contain.
    ///
    /// ## When This Occurs
    /// - The converter forgot a field (`:email` with no `email` key)
    /// - A typo in the SQL template (`:nmae`)
    #[error("could not find name '{0}' in parameters")]
    MissingParam(String),
}

// =============================================================================
// Value Error
// =============================================================================

/// Failure to convert between [`crate::Value`] and Rust types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The stored value has a different kind than the one requested.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// An integer does not fit the requested width.
    #[error("integer {0} out of range for {1}")]
    OutOfRange(i64, &'static str),

    /// A model could not be serialized into a parameter map.
    #[error("cannot build parameters: {0}")]
    Serialize(String),

    /// A dialect name was not recognized.
    #[error("unknown dialect '{0}'")]
    UnknownDialect(String),
}

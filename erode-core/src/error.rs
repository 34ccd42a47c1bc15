//! Error types for the erode core library.
//!
//! These errors only travel between internal layers (durable backends, the
//! payload codec, config loading). The store and scheduler never return them
//! to callers: every failure at that boundary degrades to a no-op and a log
//! line.

use thiserror::Error;

/// Top-level error type for fallible erode plumbing.
#[derive(Error, Debug)]
pub enum ErodeError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The persisted payload declares a schema this build cannot read.
    #[error("Unsupported schema version: {found} (max supported: {supported})")]
    UnsupportedSchema {
        /// Version found in the payload.
        found: u32,
        /// Highest version this build understands.
        supported: u32,
    },

    /// A decoded record breaks an entity invariant.
    #[error("Invariant violation for memory {id}: {reason}")]
    InvariantViolation {
        /// Identifier of the offending record, as text.
        id: String,
        /// Which invariant failed.
        reason: String,
    },

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ErodeError>;

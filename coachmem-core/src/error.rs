//! Error types for the coachmem core library.

use thiserror::Error;

/// Top-level error type for all coachmem operations.
///
/// Absent ids are *not* errors: `get`/`update`/`remove` report them as
/// `Ok(None)` / `Ok(false)` so callers can degrade to "no prior memory".
#[derive(Error, Debug)]
pub enum CoachMemError {
    /// A typed payload failed validation before any write was attempted.
    #[error("Invalid memory payload: {reason}")]
    Validation {
        /// What was wrong with the payload.
        reason: String,
    },

    /// A cache entry could not be admitted even after a full eviction pass.
    #[error("Cache capacity exceeded for {memory_type}: entry is {entry_bytes} bytes (budget: {limit_bytes})")]
    CapacityExceeded {
        /// Which per-type cache hit the limit.
        memory_type: crate::MemoryType,
        /// Configured byte budget for the container.
        limit_bytes: usize,
        /// Size of the entry that did not fit.
        entry_bytes: usize,
    },

    /// SQLite persistence error; the enclosing transaction was rolled back.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A persistent-tier query exceeded the configured timeout.
    #[error("Query timed out after {elapsed_ms}ms (budget: {budget_ms}ms)")]
    QueryTimeout {
        /// Milliseconds elapsed before the query was abandoned.
        elapsed_ms: u64,
        /// Configured query timeout in milliseconds.
        budget_ms: u64,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoachMemError>;

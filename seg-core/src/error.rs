//! Error types for the SEG core library.

use thiserror::Error;

/// Top-level error type for all SEG operations.
///
/// Generator failures never show up here: they are absorbed by the reply
/// composer and the persona generator, which fall back to templates.
#[derive(Error, Debug)]
pub enum SegError {
    /// A memory with the given ID was not found.
    #[error("Memory not found: {0}")]
    MemoryNotFound(crate::MemoryId),

    /// An operation that needs at least one memory was handed an empty pool.
    #[error("Memory pool is empty: {operation} needs at least one memory")]
    EmptyMemoryPool {
        /// Which operation was attempted.
        operation: &'static str,
    },

    /// Imported state could not be understood. The previous state is kept.
    #[error("Invalid persisted state: {0}")]
    InvalidState(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A key/value storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reply is already being generated for this state.
    #[error("A reply is already in flight for this session")]
    ReplyInFlight,

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SegError>;

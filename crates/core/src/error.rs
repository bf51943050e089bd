//! Error types for the Engram domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Engram operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Embedding errors ---
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    // --- Index errors ---
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    /// The id has no matching entity, or the entity is soft-deleted.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A chunk record was targeted by an operation only the logical
    /// (chunk-index-0) id accepts.
    #[error("Cannot edit chunk {0} directly; edit its logical parent")]
    ChunkEditConflict(String),

    #[error("Storage error: {0}")]
    Backend(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request timed out: {0}")]
    Timeout(String),

    #[error("Embedding provider failed: {0}")]
    Upstream(String),

    #[error("Embedding response was empty")]
    EmptyResponse,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    /// The underlying search call exceeded its deadline. Recovered locally
    /// via the recency-only fallback, never surfaced to the caller.
    #[error("Search timed out after {0}ms")]
    SearchTimeout(u64),

    /// Index assembly exceeded its deadline. Recovered via the simplest
    /// recent-only rendering.
    #[error("Index assembly timed out after {0}ms")]
    AssemblyTimeout(u64),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

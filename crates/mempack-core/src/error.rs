//! Error types for mempack-core.
//!
//! Uses a hierarchical error enum so callers can pattern-match on the
//! subsystem that failed. Most variants are
//! fatal to a build; `State` and `Vector` failures are instead caught by
//! the assembler and surfaced as pack warnings (see `assembler`).

use thiserror::Error;

/// Top-level error type for all mempack-core operations.
#[derive(Debug, Error)]
pub enum OmniError {
    /// Configuration is invalid, missing, or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// No git root could be found for the requested repo path.
    #[error("repo detection error: {0}")]
    RepoDetect(String),

    /// Database open/ensure/query failure.
    #[error("store error: {0}")]
    Store(String),

    /// State-loader failure. Callers degrade to empty state and record
    /// a warning rather than propagating this variant.
    #[error("state error: {0}")]
    State(String),

    /// Embedding provider failure. Callers degrade to lexical-only
    /// ranking and record a warning rather than propagating this variant.
    #[error("vector error: {0}")]
    Vector(String),

    /// The budgeter needs a materialized token counter to cost an
    /// uncached item. Internal signal; the caller constructs a counter
    /// and retries once.
    #[error("tokenizer required")]
    TokenizerRequired,

    /// A token counter could not be constructed on retry.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// The process-wide runtime has been closed; no new store handles
    /// may be acquired.
    #[error("runtime closed")]
    RuntimeClosed,

    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Wrapped SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal error for unexpected conditions.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results in mempack-core.
pub type OmniResult<T> = Result<T, OmniError>;

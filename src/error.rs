//! Error types for the crate.
//!
//! One enum covers the whole surface. Connector and pool failures
//! propagate as `Err`; the CRUD facade additionally catches `Sql`
//! errors per call and folds them into the result envelope.

use std::path::PathBuf;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum JrmError {
    /// Unknown backend, missing descriptor fields, unresolvable
    /// connection name, bad option values.
    #[error("configuration error: {0}")]
    Config(String),

    /// Driver-reported connect failure or connect timeout.
    #[error("connection error: {0}")]
    Connect(String),

    /// Placeholder/values mismatch: unknown named parameter, positional
    /// count mismatch, or an ambiguous condition node.
    #[error("malformed binding: {0}")]
    MalformedBinding(String),

    /// Driver-reported SQL error, surfaced verbatim.
    #[error("{0}")]
    Sql(String),

    /// Spark UPDATE/DELETE/MERGE attempted against a non-Delta target.
    #[error("table {0} is not a Delta table; UPDATE/DELETE/MERGE require Delta")]
    DeltaRequired(String),

    /// Per-row error count exceeded the caller's budget.
    #[error("stream aborted after {errors} row error(s): {message}")]
    StreamAborted { errors: usize, message: String },

    /// Pool checkout timed out.
    #[error("connection pool exhausted: {0}")]
    PoolExhausted(String),

    /// The operation is not available on this backend.
    #[error("unsupported on backend {backend}: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JrmError {
    /// True for errors that the CRUD facade folds into a `status = -1`
    /// result envelope instead of propagating.
    pub fn is_statement_error(&self) -> bool {
        matches!(
            self,
            JrmError::Sql(_) | JrmError::MalformedBinding(_) | JrmError::DeltaRequired(_)
        )
    }
}

/// Convenience alias used across the crate.
pub type JrmResult<T> = Result<T, JrmError>;

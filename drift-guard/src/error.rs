//! Error types for the drift-guard validation engine.
//!
//! The taxonomy separates fatal failures (no report can be produced) from
//! local failures (absorbed into the report as `error`-status checks).
//! Constraint violations are never errors; they are report content.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DriftError>;

/// Errors produced by the validation engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriftError {
    /// The schema definition is malformed or internally inconsistent.
    ///
    /// Fatal: raised before any query executes, no report is produced.
    #[error("invalid schema definition: {0}")]
    SchemaParse(String),

    /// The adapter cannot reach the underlying source.
    ///
    /// Fatal: the run aborts, in-flight query units are cancelled and no
    /// report is produced. Maps to process exit code 2.
    #[error("connection failure for source '{source_name}': {message}")]
    Connection {
        /// Human-readable identity of the source that could not be reached.
        source_name: String,
        /// What went wrong.
        message: String,
    },

    /// A single query unit failed to execute.
    ///
    /// Local: the affected checks resolve to `error` status and the run
    /// continues for independent units.
    #[error("check execution failed: {0}")]
    CheckExecution(String),

    /// An identifier or literal failed SQL safety validation.
    #[error("security violation: {0}")]
    Security(String),

    /// The operation is not supported by the source's capability profile.
    #[error("operation not supported by this source: {0}")]
    NotSupported(String),

    /// An invariant inside the engine was broken.
    #[error("internal error: {0}")]
    Internal(String),

    /// An error surfaced by the embedded DataFusion query engine.
    #[error("query engine error: {0}")]
    QueryEngine(#[from] datafusion::error::DataFusionError),

    /// An error surfaced by Arrow while processing record batches.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An I/O error while reaching a file-backed source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriftError {
    /// Returns true when the error must abort the whole run rather than
    /// degrade a subset of checks to `error` status.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriftError::Connection { .. } | DriftError::SchemaParse(_)
        )
    }

    /// Builds a connection error for the named source.
    pub fn connection(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        DriftError::Connection {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

//! Run-level error type for filmbias-ai
//!
//! Per-film problems (provider outages, malformed responses) never surface
//! here: they are isolated inside the pipeline and reported as film failures.
//! `AnalysisError` covers what stops a whole run: unreadable manifests, bad
//! configuration, report output failures.

use thiserror::Error;

/// Run-level error
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Invalid manifest or command-line selection
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Report could not be produced
    #[error("Report error: {0}")]
    Report(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// filmbias-common error
    #[error("Common error: {0}")]
    Common(#[from] filmbias_common::Error),
}

/// Result alias for run-level operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

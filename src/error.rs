//! Error types.
//!
//! `ConditioningError` never escapes a generation call: the algorithm layer
//! folds it into a failed [`ConditioningResult`](crate::ConditioningResult).
//! `OrchestratorError` is the only error surfaced to callers as `Err`.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditioningError {
    /// Bad dimensions, glyph length, channel layout or parameter values.
    #[error("{0}")]
    Validation(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Declared in the catalog but without a working implementation.
    #[error("Method '{method}' is not available; consider '{suggestion}'")]
    Unavailable { method: String, suggestion: String },

    /// Unexpected numeric failure inside a method.
    #[error("{0}")]
    Computation(String),

    #[error("cancelled before completion")]
    Cancelled,

    #[error("timed out after {0} ms")]
    TimedOut(u64),

    #[error("glyph rendering failed: {0}")]
    Render(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ConditioningError {
    /// Only computation failures are eligible for a same-family fallback.
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::Computation(_))
    }
}

impl From<image::ImageError> for ConditioningError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no conditioning images could be generated: {0}")]
    NoConditioningImages(String),

    #[error("invalid generation request: {0}")]
    InvalidRequest(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

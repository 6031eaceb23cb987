//! Error types for the climatology crate.

use std::path::PathBuf;

use grid_store::GridError;
use thiserror::Error;

/// Errors raised while resolving, computing or loading climatologies and
/// anomalies.
#[derive(Error, Debug)]
pub enum ClimatologyError {
    /// Contradictory or malformed request.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not determine file layout under {}", .0.display())]
    LayoutUnknown(PathBuf),

    /// The requested artifact directory has not been produced yet.
    #[error(
        "Artifact directory {} does not exist; run the anomaly builder for this variable and specification first",
        .0.display()
    )]
    NotComputed(PathBuf),

    #[error("Unsupported climatology key: {0}")]
    UnsupportedKey(String),

    #[error("Smoothing kernel not implemented: {0}")]
    NotImplemented(String),

    /// An observation falls in a period the climatology does not cover.
    #[error("Period {period} of '{key}' is missing from the climatology")]
    MissingPeriod { key: String, period: i64 },

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read daily index: {0}")]
    Index(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl ClimatologyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<csv::Error> for ClimatologyError {
    fn from(err: csv::Error) -> Self {
        Self::Index(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for ClimatologyError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::WorkerPool(err.to_string())
    }
}

/// Result type for climatology operations.
pub type Result<T> = std::result::Result<T, ClimatologyError>;

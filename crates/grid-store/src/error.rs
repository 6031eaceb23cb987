//! Error types for grid storage and manipulation.

use thiserror::Error;

/// Errors that can occur while building, reshaping or persisting grids.
#[derive(Error, Debug)]
pub enum GridError {
    /// A dimension name was not found on the grid.
    #[error("unknown dimension: {0}")]
    UnknownDimension(String),

    /// A dimension name appears twice.
    #[error("duplicate dimension: {0}")]
    DuplicateDimension(String),

    /// Data shape disagrees with the coordinate lengths.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A coordinate has the wrong kind for the requested operation.
    #[error("coordinate '{dim}' is not a {expected} coordinate")]
    CoordinateKind { dim: String, expected: &'static str },

    /// Grids cannot be concatenated or combined.
    #[error("incompatible grids: {0}")]
    Incompatible(String),

    /// A requested vertical level is absent.
    #[error("level {0} not found on grid")]
    LevelNotFound(f64),

    /// Nothing to operate on.
    #[error("empty input: {0}")]
    Empty(String),

    /// Failed to open a grid store.
    #[error("failed to open grid: {0}")]
    OpenFailed(String),

    /// Failed to read data from a grid store.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),

    /// Failed to write a grid store.
    #[error("failed to write grid: {0}")]
    WriteFailed(String),

    /// Invalid metadata in the grid store.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl GridError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a WriteFailed error.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

impl From<ndarray::ShapeError> for GridError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::ShapeMismatch(err.to_string())
    }
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

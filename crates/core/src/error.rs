//! Error types for PeldGis

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for PeldGis operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open raster {}: {reason}", path.display())]
    RasterOpen { path: PathBuf, reason: String },

    #[error("cannot load boundary {}: {reason}", path.display())]
    BoundaryLoad { path: PathBuf, reason: String },

    #[error("cannot reproject from {from} to {to}: {reason}")]
    Reprojection {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn raster_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::RasterOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn boundary_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::BoundaryLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for PeldGis operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for partition decoding.

use thiserror::Error;

/// Errors that can occur while decoding a partition.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to decode GRIB2 data: {0}")]
    Grib2(String),

    #[error("Failed to decode NetCDF data: {0}")]
    Netcdf(String),

    #[error("No variables left after filtering ({0})")]
    Empty(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Invalid filter_by_keys: {0}")]
    InvalidFilter(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

impl From<ndarray::ShapeError> for DecodeError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Shape(err.to_string())
    }
}

/// Result type for decode operations.
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

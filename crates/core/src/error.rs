//! Error types for geodelta

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geodelta operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot set up mapped storage at {path}: {source}")]
    Mapping {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid raster dimensions: {lines} lines x {columns} columns x {channels} channels")]
    InvalidDimensions {
        lines: usize,
        columns: usize,
        channels: usize,
    },

    #[error("Band {band} out of range (raster has {channels} channels)")]
    BandOutOfRange { band: usize, channels: usize },

    #[error("Bands are not allocated")]
    BandsNotAllocated,

    #[error(
        "Window rows {row_start}..{row_end}, columns {col_start}..{col_end} \
         does not fit a raster of {lines} x {columns}"
    )]
    WindowOutOfBounds {
        row_start: usize,
        col_start: usize,
        row_end: usize,
        col_end: usize,
        lines: usize,
        columns: usize,
    },

    #[error("Aligned windows differ: ({el}, {ec}) vs ({al}, {ac})")]
    WindowMismatch { el: usize, ec: usize, al: usize, ac: usize },

    #[error("Raster has no geolocation metadata")]
    NoGeolocation,

    #[error("Pixel size mismatch: {0} vs {1}")]
    PixelSizeMismatch(f64, f64),

    #[error("Projection mismatch: {0} vs {1}")]
    ProjectionMismatch(String, String),

    #[error("Pixel type mismatch: {0} vs {1}")]
    PixelTypeMismatch(String, String),

    #[error("Raster has no external store attached")]
    NoSource,

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("No driver registered for {0}")]
    UnknownDriver(String),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for geodelta operations
pub type Result<T> = std::result::Result<T, Error>;

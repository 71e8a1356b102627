//! # GeoDelta Core
//!
//! Geolocated multi-channel rasters, their storage, and change analysis.
//!
//! This crate provides:
//! - `Raster<T>`: raster over `u8`, `u16` or `f32` pixels, with an
//!   `AnyRaster` wrapper when the type is only known at run time
//! - `RasterMetadata`: pixel size, bounding box and projection
//! - `TieredArray<T>`: pixel storage that moves to a memory-mapped
//!   temporary file above a size threshold
//! - I/O through GDAL (`gdal` feature) or a native GeoTIFF reader/writer
//! - Difference and statistics algorithms

pub mod algorithm;
pub mod error;
pub mod io;
pub mod raster;
pub mod storage;

pub use algorithm::{BandStatistics, RasterStatistics};
pub use error::{Error, Result};
pub use io::{Drivers, RasterSink, RasterSource};
pub use raster::{AnyRaster, GeoTransform, Pixel, PixelType, Raster, RasterMetadata, SampledPixel};
pub use storage::{ArrayOptions, TieredArray};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::algorithm::{BandStatistics, RasterStatistics};
    pub use crate::error::{Error, Result};
    pub use crate::io::Drivers;
    pub use crate::raster::{AnyRaster, Pixel, PixelType, Raster, RasterMetadata, SampledPixel};
    pub use crate::storage::ArrayOptions;
}

//! Raster analysis
//!
//! - **difference**: per-pixel change between two overlapping rasters
//! - **statistics**: per-channel summary over valid pixels

mod difference;
mod statistics;

pub use difference::{difference, difference_geo_transform};
pub use statistics::{statistics, BandStatistics, RasterStatistics};

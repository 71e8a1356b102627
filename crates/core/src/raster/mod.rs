//! Raster data structures and operations

mod any;
mod geotransform;
mod grid;
mod metadata;
mod pixel;
mod sample;

pub use any::AnyRaster;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use metadata::RasterMetadata;
pub use pixel::{Pixel, PixelType};
pub use sample::SampledPixel;

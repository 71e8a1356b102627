//! External raster stores
//!
//! Rasters read and write pixels through two traits: [`RasterSource`] for
//! opened datasets and [`RasterSink`] for datasets being created. Pixel
//! windows travel as [`BandBuf`]/[`BandBufMut`], which carry the store's
//! native pixel width the way GDAL's `RasterIO` takes a data type.
//!
//! Backends:
//! - [`MemoryDataset`]: in-process store, always available
//! - native GeoTIFF through the `tiff` crate, always available
//! - GDAL, with the `gdal` feature

mod drivers;
#[cfg(feature = "gdal")]
mod gdal_io;
mod memory;
mod native;

pub use drivers::Drivers;
pub use memory::MemoryDataset;
pub use native::{read_geotiff, TiffSink};

#[cfg(feature = "gdal")]
pub use gdal_io::{GdalSink, GdalSource};

use crate::error::Result;
use crate::raster::{GeoTransform, PixelType};

/// Rectangular pixel window, in GDAL's (x offset, y offset, x size, y size) order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    /// Window covering a whole raster
    pub fn full(cols: usize, rows: usize) -> Self {
        Self::new(0, 0, cols, rows)
    }

    /// Number of pixels in the window
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the window lies inside a raster of the given size
    pub fn fits(&self, cols: usize, rows: usize) -> bool {
        self.col_off + self.cols <= cols && self.row_off + self.rows <= rows
    }
}

/// Read-only pixel buffer handed to a store
#[derive(Debug, Clone, Copy)]
pub enum BandBuf<'a> {
    Byte(&'a [u8]),
    UInt16(&'a [u16]),
    Float32(&'a [f32]),
}

impl BandBuf<'_> {
    pub fn len(&self) -> usize {
        match self {
            BandBuf::Byte(d) => d.len(),
            BandBuf::UInt16(d) => d.len(),
            BandBuf::Float32(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`, widened to f64
    pub fn value(&self, index: usize) -> f64 {
        match self {
            BandBuf::Byte(d) => f64::from(d[index]),
            BandBuf::UInt16(d) => f64::from(d[index]),
            BandBuf::Float32(d) => f64::from(d[index]),
        }
    }
}

/// Writable pixel buffer a store fills
#[derive(Debug)]
pub enum BandBufMut<'a> {
    Byte(&'a mut [u8]),
    UInt16(&'a mut [u16]),
    Float32(&'a mut [f32]),
}

impl BandBufMut<'_> {
    pub fn len(&self) -> usize {
        match self {
            BandBufMut::Byte(d) => d.len(),
            BandBufMut::UInt16(d) => d.len(),
            BandBufMut::Float32(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` at `index`, rounding and clamping into integer ranges
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            BandBufMut::Byte(d) => d[index] = value.round().clamp(0.0, u8::MAX as f64) as u8,
            BandBufMut::UInt16(d) => {
                d[index] = value.round().clamp(0.0, u16::MAX as f64) as u16
            }
            BandBufMut::Float32(d) => d[index] = value as f32,
        }
    }
}

/// An opened dataset that rasters pull pixels from.
///
/// Channels are numbered from 1.
pub trait RasterSource {
    /// Raster width in pixels
    fn columns(&self) -> usize;

    /// Raster height in pixels
    fn lines(&self) -> usize;

    /// Number of channels (bands)
    fn channels(&self) -> usize;

    /// Declared no-data value of a channel, if any
    fn nodata(&self, channel: usize) -> Option<f64>;

    /// Georeferencing transform, if the dataset has one
    fn geo_transform(&self) -> Option<GeoTransform>;

    /// Projection identifier, if the dataset has one
    fn projection(&self) -> Option<String>;

    /// Storage type of a channel
    fn pixel_type(&self, channel: usize) -> PixelType;

    /// Read a window of one channel into `out`, converting to its pixel type
    fn read_window(&self, channel: usize, window: Window, out: BandBufMut<'_>) -> Result<()>;

    /// Storage type of the whole dataset
    fn dataset_pixel_type(&self) -> PixelType {
        PixelType::unify((1..=self.channels()).map(|k| self.pixel_type(k)))
    }
}

/// A dataset being written.
///
/// Channels are numbered from 1.
pub trait RasterSink {
    fn set_geo_transform(&mut self, gt: &GeoTransform) -> Result<()>;

    fn set_projection(&mut self, projection: &str) -> Result<()>;

    fn set_nodata(&mut self, channel: usize, value: f64) -> Result<()>;

    /// Write a window of one channel
    fn write_window(&mut self, channel: usize, window: Window, data: BandBuf<'_>) -> Result<()>;

    /// Flush everything to the target
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_fits() {
        let w = Window::new(2, 1, 2, 3);
        assert_eq!(w.len(), 6);
        assert!(w.fits(4, 4));
        assert!(!w.fits(3, 4));
        assert!(!w.fits(4, 3));
    }

    #[test]
    fn test_band_buf_mut_clamps_integers() {
        let mut bytes = [0u8; 3];
        let mut buf = BandBufMut::Byte(&mut bytes);
        buf.set(0, -4.0);
        buf.set(1, 300.0);
        buf.set(2, 41.6);
        assert_eq!(bytes, [0, 255, 42]);
    }

    #[test]
    fn test_band_buf_widens() {
        let words = [7u16, 65535];
        let buf = BandBuf::UInt16(&words);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.value(1), 65535.0);
        assert!(BandBuf::Float32(&[]).is_empty());
    }
}

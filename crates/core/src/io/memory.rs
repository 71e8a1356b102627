//! In-process raster store

use super::{BandBuf, BandBufMut, RasterSink, RasterSource, Window};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelType};

/// A dataset held entirely in memory.
///
/// Pixels are kept as f64 per channel and converted on read to the
/// requested pixel width, so one dataset can feed rasters of any type.
/// `pixel_type` is what the dataset reports to callers that detect it.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDataset {
    columns: usize,
    lines: usize,
    pixel_type: PixelType,
    bands: Vec<Vec<f64>>,
    nodata: Vec<Option<f64>>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
}

impl MemoryDataset {
    /// Zero-filled dataset
    pub fn new(columns: usize, lines: usize, channels: usize, pixel_type: PixelType) -> Self {
        Self {
            columns,
            lines,
            pixel_type,
            bands: vec![vec![0.0; columns * lines]; channels],
            nodata: vec![None; channels],
            geo_transform: None,
            projection: None,
        }
    }

    /// Replace the pixels of one channel (row-major, `columns * lines` values)
    pub fn with_band(mut self, channel: usize, values: Vec<f64>) -> Result<Self> {
        let expected = self.columns * self.lines;
        if values.len() != expected {
            return Err(Error::InvalidParameter {
                name: "values",
                value: values.len().to_string(),
                reason: format!("expected {} pixels", expected),
            });
        }
        let idx = self.channel_index(channel)?;
        self.bands[idx] = values;
        Ok(self)
    }

    pub fn with_nodata(mut self, channel: usize, value: f64) -> Result<Self> {
        let idx = self.channel_index(channel)?;
        self.nodata[idx] = Some(value);
        Ok(self)
    }

    pub fn with_geo_transform(mut self, gt: GeoTransform) -> Self {
        self.geo_transform = Some(gt);
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    /// Pixels of one channel
    pub fn band(&self, channel: usize) -> Option<&[f64]> {
        channel
            .checked_sub(1)
            .and_then(|idx| self.bands.get(idx))
            .map(|b| b.as_slice())
    }

    fn channel_index(&self, channel: usize) -> Result<usize> {
        if channel == 0 || channel > self.bands.len() {
            return Err(Error::BandOutOfRange {
                band: channel,
                channels: self.bands.len(),
            });
        }
        Ok(channel - 1)
    }

    fn check_window(&self, window: &Window, len: usize) -> Result<()> {
        if !window.fits(self.columns, self.lines) {
            return Err(Error::WindowOutOfBounds {
                row_start: window.row_off,
                col_start: window.col_off,
                row_end: window.row_off + window.rows,
                col_end: window.col_off + window.cols,
                lines: self.lines,
                columns: self.columns,
            });
        }
        if len != window.len() {
            return Err(Error::InvalidParameter {
                name: "buffer",
                value: len.to_string(),
                reason: format!("window holds {} pixels", window.len()),
            });
        }
        Ok(())
    }
}

impl RasterSource for MemoryDataset {
    fn columns(&self) -> usize {
        self.columns
    }

    fn lines(&self) -> usize {
        self.lines
    }

    fn channels(&self) -> usize {
        self.bands.len()
    }

    fn nodata(&self, channel: usize) -> Option<f64> {
        channel
            .checked_sub(1)
            .and_then(|idx| self.nodata.get(idx).copied().flatten())
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> Option<String> {
        self.projection.clone()
    }

    fn pixel_type(&self, _channel: usize) -> PixelType {
        self.pixel_type
    }

    fn read_window(&self, channel: usize, window: Window, mut out: BandBufMut<'_>) -> Result<()> {
        let idx = self.channel_index(channel)?;
        self.check_window(&window, out.len())?;

        let band = &self.bands[idx];
        for r in 0..window.rows {
            let src = (window.row_off + r) * self.columns + window.col_off;
            for c in 0..window.cols {
                out.set(r * window.cols + c, band[src + c]);
            }
        }
        Ok(())
    }
}

impl RasterSink for MemoryDataset {
    fn set_geo_transform(&mut self, gt: &GeoTransform) -> Result<()> {
        self.geo_transform = Some(*gt);
        Ok(())
    }

    fn set_projection(&mut self, projection: &str) -> Result<()> {
        self.projection = Some(projection.to_string());
        Ok(())
    }

    fn set_nodata(&mut self, channel: usize, value: f64) -> Result<()> {
        let idx = self.channel_index(channel)?;
        self.nodata[idx] = Some(value);
        Ok(())
    }

    fn write_window(&mut self, channel: usize, window: Window, data: BandBuf<'_>) -> Result<()> {
        let idx = self.channel_index(channel)?;
        self.check_window(&window, data.len())?;

        let columns = self.columns;
        let band = &mut self.bands[idx];
        for r in 0..window.rows {
            let dst = (window.row_off + r) * columns + window.col_off;
            for c in 0..window.cols {
                band[dst + c] = data.value(r * window.cols + c);
            }
        }
        Ok(())
    }
}

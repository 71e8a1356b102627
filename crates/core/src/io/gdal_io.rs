//! Raster store backed by GDAL

use super::{BandBuf, BandBufMut, RasterSink, RasterSource, Window};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelType};
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, DriverManager};
use std::path::Path;

/// A dataset opened read-only through GDAL
pub struct GdalSource {
    dataset: Dataset,
}

impl GdalSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        Ok(Self { dataset })
    }

    fn read_typed<T: GdalType + Copy>(&self, channel: usize, window: Window, out: &mut [T]) -> Result<()> {
        let band = self.dataset.rasterband(channel)?;
        let buffer = band.read_as::<T>(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            (window.cols, window.rows),
            None,
        )?;
        let data = buffer.data();
        if data.len() != out.len() {
            return Err(Error::InvalidParameter {
                name: "buffer",
                value: out.len().to_string(),
                reason: format!("window holds {} pixels", data.len()),
            });
        }
        out.copy_from_slice(data);
        Ok(())
    }
}

impl RasterSource for GdalSource {
    fn columns(&self) -> usize {
        self.dataset.raster_size().0
    }

    fn lines(&self) -> usize {
        self.dataset.raster_size().1
    }

    fn channels(&self) -> usize {
        self.dataset.raster_count()
    }

    fn nodata(&self, channel: usize) -> Option<f64> {
        self.dataset.rasterband(channel).ok()?.no_data_value()
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.dataset.geo_transform().ok().map(GeoTransform::from_gdal)
    }

    fn projection(&self) -> Option<String> {
        let projection = self.dataset.projection();
        if projection.is_empty() {
            None
        } else {
            Some(projection)
        }
    }

    fn pixel_type(&self, channel: usize) -> PixelType {
        match self.dataset.rasterband(channel).map(|b| b.band_type()) {
            Ok(GdalDataType::UInt8) => PixelType::Byte,
            Ok(GdalDataType::UInt16) => PixelType::UInt16,
            Ok(GdalDataType::Float32) => PixelType::Float32,
            _ => PixelType::Undefined,
        }
    }

    fn read_window(&self, channel: usize, window: Window, out: BandBufMut<'_>) -> Result<()> {
        match out {
            BandBufMut::Byte(d) => self.read_typed(channel, window, d),
            BandBufMut::UInt16(d) => self.read_typed(channel, window, d),
            BandBufMut::Float32(d) => self.read_typed(channel, window, d),
        }
    }
}

/// A dataset created through a named GDAL driver
pub struct GdalSink {
    dataset: Dataset,
}

impl GdalSink {
    pub fn create<P: AsRef<Path>>(
        driver: &str,
        path: P,
        columns: usize,
        lines: usize,
        channels: usize,
        pixel_type: PixelType,
    ) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name(driver)?;
        let path = path.as_ref();
        let dataset = match pixel_type {
            PixelType::Byte => driver.create_with_band_type::<u8, _>(path, columns, lines, channels)?,
            PixelType::UInt16 => {
                driver.create_with_band_type::<u16, _>(path, columns, lines, channels)?
            }
            _ => driver.create_with_band_type::<f32, _>(path, columns, lines, channels)?,
        };
        Ok(Self { dataset })
    }

    fn write_typed<T: GdalType + Copy>(&mut self, channel: usize, window: Window, data: &[T]) -> Result<()> {
        let mut band = self.dataset.rasterband(channel)?;
        let mut buffer = Buffer::new((window.cols, window.rows), data.to_vec());
        band.write(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            &mut buffer,
        )?;
        Ok(())
    }
}

impl RasterSink for GdalSink {
    fn set_geo_transform(&mut self, gt: &GeoTransform) -> Result<()> {
        self.dataset.set_geo_transform(&gt.to_gdal())?;
        Ok(())
    }

    fn set_projection(&mut self, projection: &str) -> Result<()> {
        self.dataset.set_projection(projection)?;
        Ok(())
    }

    fn set_nodata(&mut self, channel: usize, value: f64) -> Result<()> {
        let mut band = self.dataset.rasterband(channel)?;
        band.set_no_data_value(Some(value))?;
        Ok(())
    }

    fn write_window(&mut self, channel: usize, window: Window, data: BandBuf<'_>) -> Result<()> {
        match data {
            BandBuf::Byte(d) => self.write_typed(channel, window, d),
            BandBuf::UInt16(d) => self.write_typed(channel, window, d),
            BandBuf::Float32(d) => self.write_typed(channel, window, d),
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

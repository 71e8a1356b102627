//! Rasters whose pixel type is only known at run time

use crate::algorithm::RasterStatistics;
use crate::error::{Error, Result};
use crate::io::{Drivers, RasterSource};
use crate::raster::{PixelType, Raster, RasterMetadata, SampledPixel};
use crate::storage::ArrayOptions;
use geo_types::Coord;
use std::path::Path;
use std::sync::Arc;

/// A raster of any supported pixel type.
///
/// Opening a file through [`AnyRaster::open`] picks the variant from the
/// stored pixel type, so callers that do not care about the width can
/// still load, sample, summarise and difference it.
#[derive(Debug)]
pub enum AnyRaster {
    Byte(Raster<u8>),
    Word16(Raster<u16>),
    Float32(Raster<f32>),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            AnyRaster::Byte($r) => $body,
            AnyRaster::Word16($r) => $body,
            AnyRaster::Float32($r) => $body,
        }
    };
}

impl AnyRaster {
    /// Wrap a store in the variant matching its pixel type
    pub fn from_source(source: Box<dyn RasterSource>) -> Result<Self> {
        match source.dataset_pixel_type() {
            PixelType::Byte => Ok(AnyRaster::Byte(Raster::from_source(source)?)),
            PixelType::UInt16 => Ok(AnyRaster::Word16(Raster::from_source(source)?)),
            PixelType::Float32 => Ok(AnyRaster::Float32(Raster::from_source(source)?)),
            other => Err(Error::UnsupportedDataType(other.to_string())),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P, drivers: &Drivers) -> Result<Self> {
        let source = drivers.open(path)?;
        Self::from_source(source)
    }

    pub fn with_options(self, options: ArrayOptions) -> Self {
        match self {
            AnyRaster::Byte(r) => AnyRaster::Byte(r.with_options(options)),
            AnyRaster::Word16(r) => AnyRaster::Word16(r.with_options(options)),
            AnyRaster::Float32(r) => AnyRaster::Float32(r.with_options(options)),
        }
    }

    pub fn pixel_type(&self) -> PixelType {
        dispatch!(self, r => r.pixel_type())
    }

    pub fn lines(&self) -> usize {
        dispatch!(self, r => r.lines())
    }

    pub fn columns(&self) -> usize {
        dispatch!(self, r => r.columns())
    }

    pub fn channels(&self) -> usize {
        dispatch!(self, r => r.channels())
    }

    pub fn nodata(&self, channel: usize) -> Result<f64> {
        dispatch!(self, r => r.nodata(channel))
    }

    pub fn nodata_values(&self) -> &[f64] {
        dispatch!(self, r => r.nodata_values())
    }

    pub fn metadata(&self) -> Option<&Arc<RasterMetadata>> {
        dispatch!(self, r => r.metadata())
    }

    pub fn set_metadata(&mut self, metadata: Option<Arc<RasterMetadata>>) {
        dispatch!(self, r => r.set_metadata(metadata))
    }

    pub fn load(&mut self) -> Result<()> {
        dispatch!(self, r => r.load())
    }

    pub fn map_to_pixel(&self, point: impl Into<Coord<f64>>) -> Result<SampledPixel> {
        dispatch!(self, r => r.map_to_pixel(point))
    }

    pub fn contains_point(&self, point: impl Into<Coord<f64>>) -> bool {
        dispatch!(self, r => r.contains_point(point))
    }

    pub fn sample(&self, position: &SampledPixel) -> Result<SampledPixel> {
        dispatch!(self, r => r.sample(position))
    }

    pub fn sample_point(&self, point: impl Into<Coord<f64>>) -> Result<SampledPixel> {
        dispatch!(self, r => r.sample_point(point))
    }

    pub fn is_valid(&self, pixel: &SampledPixel) -> bool {
        dispatch!(self, r => r.is_valid(pixel))
    }

    pub fn statistics(&self) -> Result<RasterStatistics> {
        dispatch!(self, r => r.statistics())
    }

    pub fn write<P: AsRef<Path>>(&self, target: P, drivers: &Drivers) -> Result<()> {
        dispatch!(self, r => r.write(target, drivers))
    }

    /// Difference against a raster of the same pixel type
    pub fn compute_difference(&self, other: &AnyRaster) -> Result<Option<AnyRaster>> {
        match (self, other) {
            (AnyRaster::Byte(a), AnyRaster::Byte(b)) => {
                Ok(a.compute_difference(b)?.map(AnyRaster::Byte))
            }
            (AnyRaster::Word16(a), AnyRaster::Word16(b)) => {
                Ok(a.compute_difference(b)?.map(AnyRaster::Word16))
            }
            (AnyRaster::Float32(a), AnyRaster::Float32(b)) => {
                Ok(a.compute_difference(b)?.map(AnyRaster::Float32))
            }
            (a, b) => Err(Error::PixelTypeMismatch(
                a.pixel_type().to_string(),
                b.pixel_type().to_string(),
            )),
        }
    }
}

impl From<Raster<u8>> for AnyRaster {
    fn from(r: Raster<u8>) -> Self {
        AnyRaster::Byte(r)
    }
}

impl From<Raster<u16>> for AnyRaster {
    fn from(r: Raster<u16>) -> Self {
        AnyRaster::Word16(r)
    }
}

impl From<Raster<f32>> for AnyRaster {
    fn from(r: Raster<f32>) -> Self {
        AnyRaster::Float32(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryDataset;

    #[test]
    fn test_variant_follows_store_type() {
        for (pixel_type, expected) in [
            (PixelType::Byte, PixelType::Byte),
            (PixelType::UInt16, PixelType::UInt16),
            (PixelType::Float32, PixelType::Float32),
        ] {
            let raster =
                AnyRaster::from_source(Box::new(MemoryDataset::new(2, 2, 1, pixel_type))).unwrap();
            assert_eq!(raster.pixel_type(), expected);
            assert_eq!(raster.lines(), 2);
        }
    }

    #[test]
    fn test_unsupported_type() {
        let source = MemoryDataset::new(2, 2, 1, PixelType::Undefined);
        assert!(matches!(
            AnyRaster::from_source(Box::new(source)),
            Err(Error::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_difference_needs_same_type() {
        let a: AnyRaster = Raster::<u8>::new(2, 2, 1).unwrap().into();
        let b: AnyRaster = Raster::<f32>::new(2, 2, 1).unwrap().into();
        assert!(matches!(
            a.compute_difference(&b),
            Err(Error::PixelTypeMismatch(..))
        ));
    }
}

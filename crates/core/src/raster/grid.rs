//! Main Raster type

use crate::algorithm::{self, RasterStatistics};
use crate::error::{Error, Result};
use crate::io::{Drivers, RasterSink, RasterSource, Window};
use crate::raster::{Pixel, PixelType, RasterMetadata, SampledPixel};
use crate::storage::{ArrayOptions, TieredArray};
use geo_types::Coord;
use ndarray::{s, ArrayView2, ArrayViewMut2};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A multi-channel raster with optional geolocation.
///
/// `Raster<T>` holds one [`TieredArray`] per channel, a no-data sentinel per
/// channel, and optionally the [`RasterMetadata`] that places it on the
/// ground. Rasters opened from a store keep the store attached: pixel data
/// is pulled from it by [`load`](Raster::load),
/// [`load_region`](Raster::load_region) and [`sample`](Raster::sample).
/// Blank rasters work purely on their allocated bands.
///
/// # Type Parameters
///
/// - `T`: The cell value type, one of `u8`, `u16`, `f32`
///
/// # Example
///
/// ```ignore
/// use geodelta_core::{Drivers, Raster};
///
/// let mut scene: Raster<u16> = Raster::open("scene.tif", &Drivers::default())?;
/// scene.load()?;
/// let stats = scene.statistics()?;
/// ```
pub struct Raster<T: Pixel> {
    lines: usize,
    columns: usize,
    channels: usize,
    /// One sentinel per channel
    nodata: Vec<f64>,
    metadata: Option<Arc<RasterMetadata>>,
    bands: Vec<TieredArray<T>>,
    source: Option<Box<dyn RasterSource>>,
    options: ArrayOptions,
}

fn check_dimensions(lines: usize, columns: usize, channels: usize) -> Result<()> {
    if lines == 0 || columns == 0 || channels == 0 {
        return Err(Error::InvalidDimensions {
            lines,
            columns,
            channels,
        });
    }
    Ok(())
}

impl<T: Pixel> Raster<T> {
    /// Create a blank raster: no-data defaults to 0 and there is no geolocation
    pub fn new(lines: usize, columns: usize, channels: usize) -> Result<Self> {
        check_dimensions(lines, columns, channels)?;
        Ok(Self {
            lines,
            columns,
            channels,
            nodata: vec![0.0; channels],
            metadata: None,
            bands: Vec::with_capacity(channels),
            source: None,
            options: ArrayOptions::default(),
        })
    }

    /// Create a raster over an opened store.
    ///
    /// Dimensions and no-data come from the store; channels without a
    /// declared no-data value use 0. Geolocation is attached only when the
    /// store has both a usable transform and a projection.
    pub fn from_source(source: Box<dyn RasterSource>) -> Result<Self> {
        let lines = source.lines();
        let columns = source.columns();
        let channels = source.channels();
        check_dimensions(lines, columns, channels)?;

        let nodata = (1..=channels)
            .map(|k| {
                source.nodata(k).unwrap_or_else(|| {
                    warn!(channel = k, "no declared no-data value, using 0");
                    0.0
                })
            })
            .collect();

        let metadata = match (source.geo_transform(), source.projection()) {
            (Some(gt), Some(projection)) => {
                match RasterMetadata::from_geo_transform(&gt, columns, lines, projection) {
                    Ok(md) => Some(Arc::new(md)),
                    Err(e) => {
                        warn!(error = %e, "ignoring unusable geolocation");
                        None
                    }
                }
            }
            _ => None,
        };

        let stored = source.dataset_pixel_type();
        if stored != T::PIXEL_TYPE {
            debug!(%stored, requested = %T::PIXEL_TYPE, "store pixels will be converted");
        }

        Ok(Self {
            lines,
            columns,
            channels,
            nodata,
            metadata,
            bands: Vec::with_capacity(channels),
            source: Some(source),
            options: ArrayOptions::default(),
        })
    }

    /// Open a raster file through the driver registry
    pub fn open<P: AsRef<Path>>(path: P, drivers: &Drivers) -> Result<Self> {
        let path = path.as_ref();
        let source = drivers.open(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "unable to open raster");
            e
        })?;
        Self::from_source(source)
    }

    /// Tier policy for bands allocated from now on
    pub fn with_options(mut self, options: ArrayOptions) -> Self {
        self.options = options;
        self
    }

    // Dimensions

    /// Number of lines (rows)
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Number of columns
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of channels (bands)
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Dimensions as (lines, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.lines, self.columns)
    }

    /// Pixels per band
    pub fn len(&self) -> usize {
        self.lines * self.columns
    }

    /// Always false: rasters have at least one pixel
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_type(&self) -> PixelType {
        T::PIXEL_TYPE
    }

    pub fn options(&self) -> &ArrayOptions {
        &self.options
    }

    // Metadata

    fn channel_index(&self, channel: usize) -> Result<usize> {
        if channel == 0 || channel > self.channels {
            return Err(Error::BandOutOfRange {
                band: channel,
                channels: self.channels,
            });
        }
        Ok(channel - 1)
    }

    /// No-data sentinel of a channel (1-based)
    pub fn nodata(&self, channel: usize) -> Result<f64> {
        let idx = self.channel_index(channel)?;
        Ok(self.nodata[idx])
    }

    /// All no-data sentinels, in channel order
    pub fn nodata_values(&self) -> &[f64] {
        &self.nodata
    }

    pub fn set_nodata(&mut self, channel: usize, value: f64) -> Result<()> {
        let idx = self.channel_index(channel)?;
        self.nodata[idx] = value;
        Ok(())
    }

    pub fn metadata(&self) -> Option<&Arc<RasterMetadata>> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: Option<Arc<RasterMetadata>>) {
        self.metadata = metadata;
    }

    /// Whether an external store is attached
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    // Bands

    /// Whether one correctly sized band per channel exists
    pub fn is_allocated(&self) -> bool {
        let pixels = self.len();
        self.bands.len() == self.channels && self.bands.iter().all(|b| b.len() == pixels)
    }

    /// Make sure one band per channel exists.
    ///
    /// With `fill_zero`, newly allocated bands are explicitly set to zero.
    /// Does nothing when the bands are already in place.
    pub fn allocate(&mut self, fill_zero: bool) -> Result<()> {
        if self.is_allocated() {
            return Ok(());
        }

        self.bands.clear();
        let pixels = self.len();
        for _ in 0..self.channels {
            let mut band = TieredArray::with_options(pixels, &self.options)?;
            if fill_zero {
                band.fill(T::zero());
            }
            self.bands.push(band);
        }
        Ok(())
    }

    /// Pull every channel from the attached store into the bands
    pub fn load(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::NoSource);
        }
        self.allocate(false)?;

        let source = self.source.as_deref().ok_or(Error::NoSource)?;
        if source.columns() != self.columns || source.lines() != self.lines {
            return Err(Error::InvalidDimensions {
                lines: source.lines(),
                columns: source.columns(),
                channels: source.channels(),
            });
        }

        let window = Window::full(self.columns, self.lines);
        for (k, band) in self.bands.iter_mut().enumerate() {
            source.read_window(k + 1, window, T::as_band_buf_mut(band.as_mut_slice()))?;
        }
        Ok(())
    }

    /// Extract rows `row_start..row_end` and columns `col_start..col_end`
    /// into a new, independently owned raster.
    ///
    /// Pixels come from the store when one is attached, otherwise from the
    /// allocated bands. The region keeps this raster's no-data sentinels
    /// but carries no geolocation.
    pub fn load_region(
        &self,
        row_start: usize,
        col_start: usize,
        row_end: usize,
        col_end: usize,
    ) -> Result<Raster<T>> {
        if row_start >= row_end
            || col_start >= col_end
            || row_end > self.lines
            || col_end > self.columns
        {
            return Err(Error::WindowOutOfBounds {
                row_start,
                col_start,
                row_end,
                col_end,
                lines: self.lines,
                columns: self.columns,
            });
        }

        let rows = row_end - row_start;
        let cols = col_end - col_start;

        let mut region = Raster::new(rows, cols, self.channels)?.with_options(self.options.clone());
        region.nodata = self.nodata.clone();
        region.allocate(false)?;

        if let Some(source) = self.source.as_deref() {
            let window = Window::new(col_start, row_start, cols, rows);
            for (k, band) in region.bands.iter_mut().enumerate() {
                source.read_window(k + 1, window, T::as_band_buf_mut(band.as_mut_slice()))?;
            }
        } else {
            for k in 1..=self.channels {
                let full = self.band_view(k)?;
                let mut dst = region.band_view_mut(k)?;
                dst.assign(&full.slice(s![row_start..row_end, col_start..col_end]));
            }
        }

        Ok(region)
    }

    /// Band of a channel (1-based)
    pub fn band(&self, channel: usize) -> Result<&TieredArray<T>> {
        let idx = self.channel_index(channel)?;
        self.bands.get(idx).ok_or(Error::BandsNotAllocated)
    }

    /// Mutable band of a channel (1-based)
    pub fn band_mut(&mut self, channel: usize) -> Result<&mut TieredArray<T>> {
        let idx = self.channel_index(channel)?;
        self.bands.get_mut(idx).ok_or(Error::BandsNotAllocated)
    }

    /// Band as a (lines, columns) array view
    pub fn band_view(&self, channel: usize) -> Result<ArrayView2<'_, T>> {
        let shape = self.shape();
        let band = self.band(channel)?;
        ArrayView2::from_shape(shape, band.as_slice()).map_err(|_| Error::InvalidDimensions {
            lines: shape.0,
            columns: shape.1,
            channels: self.channels,
        })
    }

    /// Band as a mutable (lines, columns) array view
    pub fn band_view_mut(&mut self, channel: usize) -> Result<ArrayViewMut2<'_, T>> {
        let shape = self.shape();
        let channels = self.channels;
        let band = self.band_mut(channel)?;
        ArrayViewMut2::from_shape(shape, band.as_mut_slice()).map_err(|_| {
            Error::InvalidDimensions {
                lines: shape.0,
                columns: shape.1,
                channels,
            }
        })
    }

    // Coordinate conversion

    /// Fractional pixel position of a ground coordinate
    pub fn map_to_pixel(&self, point: impl Into<Coord<f64>>) -> Result<SampledPixel> {
        let md = self.metadata.as_deref().ok_or(Error::NoGeolocation)?;
        let (x, y) = md.map_to_pixel(point.into());
        Ok(SampledPixel::new(x, y))
    }

    /// Whether the ground coordinate lies in the bounding box (false without geolocation)
    pub fn contains_point(&self, point: impl Into<Coord<f64>>) -> bool {
        let point = point.into();
        self.metadata.as_deref().is_some_and(|md| md.contains(point))
    }

    /// Both rasters are geolocated, share a pixel size and their boxes overlap
    pub fn overlaps<U: Pixel>(&self, other: &Raster<U>) -> bool {
        match (self.metadata.as_deref(), other.metadata.as_deref()) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => false,
        }
    }

    // Sampling

    /// 2x2 neighbourhood with (j, i) at its upper-left
    fn neighbourhood(&self, channel: usize, j: usize, i: usize) -> Result<[T; 4]> {
        let mut corners = [T::zero(); 4];
        match self.source.as_deref() {
            Some(source) => {
                source.read_window(channel, Window::new(j, i, 2, 2), T::as_band_buf_mut(&mut corners))?;
            }
            None => {
                let band = self.band(channel)?;
                let top = i * self.columns + j;
                let bottom = top + self.columns;
                corners = [band[top], band[top + 1], band[bottom], band[bottom + 1]];
            }
        }
        Ok(corners)
    }

    /// Interpolate every channel at a fractional pixel position.
    ///
    /// Channels that cannot be interpolated (position outside the raster,
    /// or too much no-data around it) keep their no-data sentinel.
    pub fn sample(&self, position: &SampledPixel) -> Result<SampledPixel> {
        let (x, y) = (position.x, position.y);
        let mut values = self.nodata.clone();

        let j = x.floor();
        let i = y.floor();
        let inside = j >= 0.0
            && i >= 0.0
            && j + 1.0 < self.columns as f64
            && i + 1.0 < self.lines as f64;

        if inside {
            let dx = x - j;
            let dy = y - i;
            for (k, value) in values.iter_mut().enumerate() {
                let corners = self.neighbourhood(k + 1, j as usize, i as usize)?;
                let sentinel = T::sentinel(self.nodata[k]);
                if let Some(v) = T::interpolate(corners, sentinel, dx, dy) {
                    *value = v;
                }
            }
        }

        Ok(SampledPixel::with_values(x, y, values))
    }

    /// Map a ground coordinate to pixel space and sample there
    pub fn sample_point(&self, point: impl Into<Coord<f64>>) -> Result<SampledPixel> {
        let position = self.map_to_pixel(point)?;
        self.sample(&position)
    }

    /// Every channel value differs from its no-data sentinel.
    ///
    /// A position without values is never valid.
    pub fn is_valid(&self, pixel: &SampledPixel) -> bool {
        match pixel.values() {
            Some(values) if values.len() == self.channels => values
                .iter()
                .zip(&self.nodata)
                .all(|(&g, &nd)| g != nd && !(g.is_nan() && nd.is_nan())),
            _ => false,
        }
    }

    // Output

    /// Write the raster through the driver registered for the target's extension
    pub fn write<P: AsRef<Path>>(&self, target: P, drivers: &Drivers) -> Result<()> {
        if self.metadata.is_none() {
            return Err(Error::NoGeolocation);
        }
        if !self.is_allocated() {
            return Err(Error::BandsNotAllocated);
        }
        let mut sink = drivers.create(
            target,
            self.columns,
            self.lines,
            self.channels,
            PixelType::Float32,
        )?;
        self.write_to(sink.as_mut())
    }

    /// Write geotransform, projection, no-data and every band into a sink
    pub fn write_to(&self, sink: &mut dyn RasterSink) -> Result<()> {
        let md = self.metadata.as_deref().ok_or(Error::NoGeolocation)?;
        if !self.is_allocated() {
            return Err(Error::BandsNotAllocated);
        }

        sink.set_geo_transform(&md.geo_transform())?;
        sink.set_projection(md.projection())?;

        let window = Window::full(self.columns, self.lines);
        for (k, band) in self.bands.iter().enumerate() {
            sink.set_nodata(k + 1, self.nodata[k])?;
            sink.write_window(k + 1, window, T::as_band_buf(band.as_slice()))?;
        }
        sink.finish()
    }

    // Algorithms

    /// Difference against another geolocated raster over their shared extent.
    ///
    /// See [`algorithm::difference`].
    pub fn compute_difference(&self, other: &Raster<T>) -> Result<Option<Raster<T>>> {
        algorithm::difference(self, other)
    }

    /// Per-channel statistics over valid pixels.
    ///
    /// See [`algorithm::statistics`].
    pub fn statistics(&self) -> Result<RasterStatistics> {
        algorithm::statistics(self)
    }
}

impl<T: Pixel> fmt::Debug for Raster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("pixel_type", &T::PIXEL_TYPE)
            .field("lines", &self.lines)
            .field("columns", &self.columns)
            .field("channels", &self.channels)
            .field("nodata", &self.nodata)
            .field("metadata", &self.metadata)
            .field("bands", &self.bands)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryDataset;
    use crate::raster::GeoTransform;
    use approx::assert_relative_eq;

    fn ramp_source(pixel_type: PixelType) -> MemoryDataset {
        MemoryDataset::new(4, 3, 2, pixel_type)
            .with_band(1, (0..12).map(f64::from).collect())
            .unwrap()
            .with_band(2, (0..12).map(|v| f64::from(v) * 10.0).collect())
            .unwrap()
            .with_nodata(2, 255.0)
            .unwrap()
            .with_geo_transform(GeoTransform::new(100.0, 50.0, 2.0, -2.0))
            .with_projection("EPSG:32719")
    }

    #[test]
    fn test_blank_raster() {
        let raster: Raster<u16> = Raster::new(2, 3, 3).unwrap();
        assert_eq!(raster.shape(), (2, 3));
        assert_eq!(raster.channels(), 3);
        assert_eq!(raster.nodata_values(), &[0.0, 0.0, 0.0]);
        assert!(raster.metadata().is_none());
        assert!(!raster.is_allocated());
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(
            Raster::<u8>::new(2, 2, 0),
            Err(Error::InvalidDimensions { channels: 0, .. })
        ));
        assert!(Raster::<u8>::new(0, 2, 1).is_err());
    }

    #[test]
    fn test_allocate_fill_zero() {
        let mut raster: Raster<f32> = Raster::new(2, 2, 3).unwrap();
        raster.allocate(true).unwrap();
        assert!(raster.is_allocated());
        for k in 1..=3 {
            assert!(raster.band(k).unwrap().as_slice().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_allocate_twice_keeps_data() {
        let mut raster: Raster<u8> = Raster::new(2, 2, 1).unwrap();
        raster.allocate(false).unwrap();
        raster.band_mut(1).unwrap()[3] = 9;
        raster.allocate(true).unwrap();
        assert_eq!(raster.band(1).unwrap()[3], 9);
    }

    #[test]
    fn test_band_access_checks() {
        let mut raster: Raster<u8> = Raster::new(2, 2, 2).unwrap();
        assert!(matches!(raster.band(1), Err(Error::BandsNotAllocated)));
        raster.allocate(false).unwrap();
        assert!(matches!(
            raster.band(0),
            Err(Error::BandOutOfRange { band: 0, .. })
        ));
        assert!(matches!(
            raster.band(3),
            Err(Error::BandOutOfRange { band: 3, channels: 2 })
        ));
    }

    #[test]
    fn test_from_source_reads_header() {
        let raster: Raster<u8> =
            Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();
        assert_eq!(raster.shape(), (3, 4));
        assert_eq!(raster.nodata(1).unwrap(), 0.0);
        assert_eq!(raster.nodata(2).unwrap(), 255.0);

        let md = raster.metadata().unwrap();
        assert_relative_eq!(md.pixel_size(), 2.0);
        assert_relative_eq!(md.xmin(), 100.0);
        assert_relative_eq!(md.xmax(), 108.0);
        assert_relative_eq!(md.ymin(), 44.0);
        assert_relative_eq!(md.ymax(), 50.0);
        assert_eq!(md.projection(), "EPSG:32719");
    }

    #[test]
    fn test_from_source_without_projection_has_no_metadata() {
        let source = MemoryDataset::new(2, 2, 1, PixelType::Byte)
            .with_geo_transform(GeoTransform::new(0.0, 0.0, 1.0, -1.0));
        let raster: Raster<u8> = Raster::from_source(Box::new(source)).unwrap();
        assert!(raster.metadata().is_none());
        assert!(!raster.contains_point((0.5, -0.5)));
        assert!(matches!(
            raster.map_to_pixel((0.5, -0.5)),
            Err(Error::NoGeolocation)
        ));
    }

    #[test]
    fn test_load() {
        let mut raster: Raster<u16> =
            Raster::from_source(Box::new(ramp_source(PixelType::UInt16))).unwrap();
        raster.load().unwrap();
        assert_eq!(raster.band(1).unwrap()[5], 5);
        assert_eq!(raster.band(2).unwrap()[11], 110);
    }

    #[test]
    fn test_load_without_source() {
        let mut raster: Raster<u8> = Raster::new(1, 1, 1).unwrap();
        assert!(matches!(raster.load(), Err(Error::NoSource)));
    }

    #[test]
    fn test_load_region_from_source() {
        let raster: Raster<f32> =
            Raster::from_source(Box::new(ramp_source(PixelType::Float32))).unwrap();
        let region = raster.load_region(1, 1, 3, 3).unwrap();

        assert_eq!(region.shape(), (2, 2));
        assert_eq!(region.channels(), 2);
        assert_eq!(region.band(1).unwrap().as_slice(), &[5.0, 6.0, 9.0, 10.0]);
        assert_eq!(region.nodata(2).unwrap(), 255.0);
        assert!(region.metadata().is_none());
    }

    #[test]
    fn test_load_region_from_bands() {
        let mut raster: Raster<u8> = Raster::new(3, 4, 1).unwrap();
        raster.allocate(false).unwrap();
        for (n, v) in raster.band_mut(1).unwrap().as_mut_slice().iter_mut().enumerate() {
            *v = n as u8;
        }

        let region = raster.load_region(0, 2, 2, 4).unwrap();
        assert_eq!(region.band(1).unwrap().as_slice(), &[2, 3, 6, 7]);

        // the region owns its storage
        raster.band_mut(1).unwrap()[2] = 99;
        assert_eq!(region.band(1).unwrap()[0], 2);
    }

    #[test]
    fn test_load_region_bounds() {
        let raster: Raster<u8> = Raster::new(3, 4, 1).unwrap();
        assert!(matches!(
            raster.load_region(2, 0, 2, 1),
            Err(Error::WindowOutOfBounds { .. })
        ));
        assert!(matches!(
            raster.load_region(0, 0, 4, 1),
            Err(Error::WindowOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_map_to_pixel_corner() {
        let raster: Raster<u8> =
            Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();
        let px = raster.map_to_pixel((100.0, 50.0)).unwrap();
        assert_eq!((px.x, px.y), (0.0, 0.0));
        assert!(px.values.is_none());

        let px = raster.map_to_pixel((103.0, 47.0)).unwrap();
        assert_relative_eq!(px.x, 1.5);
        assert_relative_eq!(px.y, 1.5);
    }

    #[test]
    fn test_contains_point() {
        let raster: Raster<u8> =
            Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();
        assert!(raster.contains_point((108.0, 44.0)));
        assert!(!raster.contains_point((108.5, 44.0)));
    }

    #[test]
    fn test_sample_at_grid_position() {
        let raster: Raster<u16> =
            Raster::from_source(Box::new(ramp_source(PixelType::UInt16))).unwrap();
        let px = raster.sample(&SampledPixel::new(1.0, 1.0)).unwrap();
        assert_eq!(px.values().unwrap(), &[5.0, 50.0]);
        assert!(raster.is_valid(&px));
    }

    #[test]
    fn test_sample_bilinear() {
        let raster: Raster<f32> =
            Raster::from_source(Box::new(ramp_source(PixelType::Float32))).unwrap();
        let px = raster.sample_point((103.0, 47.0)).unwrap();
        // (1.5, 1.5) blends 5, 6, 9, 10
        assert_relative_eq!(px.values().unwrap()[0], 7.5);
    }

    #[test]
    fn test_sample_outside_returns_nodata() {
        let raster: Raster<u8> =
            Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();

        // last column has no right-hand neighbour
        let px = raster.sample(&SampledPixel::new(3.0, 0.0)).unwrap();
        assert_eq!(px.values().unwrap(), &[0.0, 255.0]);
        assert!(!raster.is_valid(&px));

        let px = raster.sample(&SampledPixel::new(-0.5, 0.5)).unwrap();
        assert_eq!(px.values().unwrap(), &[0.0, 255.0]);
    }

    #[test]
    fn test_sample_float_around_nodata() {
        let source = MemoryDataset::new(3, 2, 2, PixelType::Float32)
            .with_band(1, vec![1.0, 2.0, 5.0, 3.0, -9999.0, 6.0])
            .unwrap()
            .with_band(2, vec![-9999.0; 6])
            .unwrap()
            .with_nodata(1, -9999.0)
            .unwrap()
            .with_nodata(2, -9999.0)
            .unwrap();
        let raster: Raster<f32> = Raster::from_source(Box::new(source)).unwrap();
        assert!(!raster.is_allocated());

        // lower-right corner missing: the other three weigh the same
        let px = raster.sample(&SampledPixel::new(0.5, 0.5)).unwrap();
        let values = px.values().unwrap();
        assert_relative_eq!(values[0], 2.0, epsilon = 1e-12);
        assert_eq!(values[1], -9999.0);
        assert!(!raster.is_valid(&px));

        // lower-left corner missing
        let px = raster.sample(&SampledPixel::new(1.25, 0.5)).unwrap();
        let (w0, w1, w3) = (0.75 * 0.75 + 0.25, 0.25 * 0.25 + 0.25, 0.25 * 0.25 + 0.25);
        let expected = (w0 * 2.0 + w1 * 5.0 + w3 * 6.0) / (w0 + w1 + w3);
        assert_relative_eq!(px.values().unwrap()[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_from_bands() {
        let mut raster: Raster<u8> = Raster::new(2, 2, 1).unwrap();
        raster.set_nodata(1, 255.0).unwrap();
        raster.allocate(false).unwrap();
        raster
            .band_mut(1)
            .unwrap()
            .as_mut_slice()
            .copy_from_slice(&[10, 20, 30, 40]);

        let px = raster.sample(&SampledPixel::new(0.5, 0.5)).unwrap();
        assert_relative_eq!(px.values().unwrap()[0], 25.0);
    }

    #[test]
    fn test_is_valid() {
        let mut raster: Raster<u8> = Raster::new(1, 1, 2).unwrap();
        raster.set_nodata(2, 255.0).unwrap();

        assert!(raster.is_valid(&SampledPixel::with_values(0.0, 0.0, vec![1.0, 2.0])));
        assert!(!raster.is_valid(&SampledPixel::with_values(0.0, 0.0, vec![1.0, 255.0])));
        assert!(!raster.is_valid(&SampledPixel::with_values(0.0, 0.0, vec![0.0, 2.0])));
        assert!(!raster.is_valid(&SampledPixel::new(0.0, 0.0)));
    }

    #[test]
    fn test_overlaps_requires_metadata() {
        let a: Raster<u8> = Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();
        let b: Raster<u8> = Raster::from_source(Box::new(ramp_source(PixelType::Byte))).unwrap();
        let blank: Raster<u8> = Raster::new(3, 4, 2).unwrap();

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&blank));
        assert!(!blank.overlaps(&a));
    }

    #[test]
    fn test_write_to_sink() {
        let mut raster: Raster<u16> =
            Raster::from_source(Box::new(ramp_source(PixelType::UInt16))).unwrap();
        raster.load().unwrap();

        let mut sink = MemoryDataset::new(4, 3, 2, PixelType::Float32);
        raster.write_to(&mut sink).unwrap();

        assert_eq!(
            sink.geo_transform(),
            Some(GeoTransform::new(100.0, 50.0, 2.0, -2.0))
        );
        assert_eq!(sink.projection().as_deref(), Some("EPSG:32719"));
        assert_eq!(sink.nodata(1), Some(0.0));
        assert_eq!(sink.nodata(2), Some(255.0));
        assert_eq!(sink.band(2).unwrap()[4], 40.0);
    }

    #[test]
    fn test_write_requires_metadata() {
        let mut raster: Raster<u8> = Raster::new(1, 1, 1).unwrap();
        raster.allocate(true).unwrap();
        let mut sink = MemoryDataset::new(1, 1, 1, PixelType::Float32);
        assert!(matches!(raster.write_to(&mut sink), Err(Error::NoGeolocation)));
    }

    #[test]
    fn test_mapped_bands() {
        let opts = ArrayOptions {
            max_in_memory: 4,
            temp_dir: None,
        };
        let mut raster: Raster<f32> = Raster::from_source(Box::new(ramp_source(PixelType::Float32)))
            .unwrap()
            .with_options(opts);
        raster.load().unwrap();

        assert!(raster.band(1).unwrap().is_mapped());
        assert_eq!(raster.band(1).unwrap()[7], 7.0);

        let region = raster.load_region(0, 0, 2, 2).unwrap();
        assert!(!region.band(1).unwrap().is_mapped());
    }
}

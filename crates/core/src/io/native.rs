//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Supported layouts are chunky images with 1, 3 or 4
//! samples per pixel. Georeferencing is read from the pixel scale and
//! tiepoint tags, no-data from `GDAL_NODATA`, and the projection string
//! from `GeoAsciiParamsTag`. Output is always written as 32-bit float.
//! GDAL_NODATA holds one value for the whole image, so every channel written
//! here must share the same sentinel. For anything beyond that, enable the
//! `gdal` feature.
//!
//! The reader decodes the whole image at once and keeps every channel as a
//! `Vec<f64>` on the heap, 8 bytes per sample whatever the stored type, even
//! for bands that the tiered store would later map to a file. Scenes too large
//! for that should be opened through the `gdal` feature, which reads windows.

use super::{BandBuf, MemoryDataset, RasterSink, RasterSource, Window};
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, PixelType};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, Gray32Float, RGB32Float, RGBA32Float};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tiff::ColorType;

const GDAL_NODATA: u16 = 42113;

/// Read a GeoTIFF file into an in-memory dataset
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<MemoryDataset> {
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<MemoryDataset> {
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let columns = width as usize;
    let lines = height as usize;

    let samples = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(Error::UnsupportedDataType(format!(
                "TIFF color type {:?}",
                other
            )))
        }
    };

    let (pixel_type, interleaved): (PixelType, Vec<f64>) = match decoder.read_image()? {
        DecodingResult::U8(buf) => (PixelType::Byte, buf.into_iter().map(f64::from).collect()),
        DecodingResult::U16(buf) => (PixelType::UInt16, buf.into_iter().map(f64::from).collect()),
        DecodingResult::F32(buf) => (PixelType::Float32, buf.into_iter().map(f64::from).collect()),
        DecodingResult::U32(buf) => (PixelType::Undefined, buf.into_iter().map(f64::from).collect()),
        DecodingResult::I8(buf) => (PixelType::Undefined, buf.into_iter().map(f64::from).collect()),
        DecodingResult::I16(buf) => (PixelType::Undefined, buf.into_iter().map(f64::from).collect()),
        DecodingResult::I32(buf) => (PixelType::Undefined, buf.into_iter().map(f64::from).collect()),
        DecodingResult::F64(buf) => (PixelType::Undefined, buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let pixels = columns * lines;
    if interleaved.len() != pixels * samples {
        return Err(Error::InvalidDimensions {
            lines,
            columns,
            channels: samples,
        });
    }

    let mut dataset = MemoryDataset::new(columns, lines, samples, pixel_type);
    for k in 0..samples {
        let band: Vec<f64> = interleaved.iter().skip(k).step_by(samples).copied().collect();
        dataset = dataset.with_band(k + 1, band)?;
    }

    if let Some(transform) = read_geotransform(&mut decoder) {
        dataset = dataset.with_geo_transform(transform);
    }

    if let Some(projection) = decoder
        .get_tag_ascii_string(Tag::GeoAsciiParamsTag)
        .ok()
        .map(|s| s.trim_end_matches(['|', '\0']).to_string())
        .filter(|s| !s.is_empty())
    {
        dataset = dataset.with_projection(projection);
    }

    // GDAL_NODATA carries a single value for every band
    if let Some(nodata) = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
    {
        for k in 1..=samples {
            dataset = dataset.with_nodata(k, nodata)?;
        }
    }

    Ok(dataset)
}

/// Attempt to read a GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]
        // scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    None
}

/// A GeoTIFF being created.
///
/// Pixels are staged in memory and encoded by [`RasterSink::finish`].
#[derive(Debug)]
pub struct TiffSink {
    path: PathBuf,
    staged: MemoryDataset,
}

impl TiffSink {
    pub fn create<P: AsRef<Path>>(
        path: P,
        columns: usize,
        lines: usize,
        channels: usize,
    ) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(Error::UnsupportedDataType(format!(
                "native GeoTIFF writer handles 1, 3 or 4 channels, got {}",
                channels
            )));
        }

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            staged: MemoryDataset::new(columns, lines, channels, PixelType::Float32),
        })
    }
}

impl RasterSink for TiffSink {
    fn set_geo_transform(&mut self, gt: &GeoTransform) -> Result<()> {
        self.staged.set_geo_transform(gt)
    }

    fn set_projection(&mut self, projection: &str) -> Result<()> {
        self.staged.set_projection(projection)
    }

    fn set_nodata(&mut self, channel: usize, value: f64) -> Result<()> {
        self.staged.set_nodata(channel, value)
    }

    fn write_window(&mut self, channel: usize, window: Window, data: BandBuf<'_>) -> Result<()> {
        self.staged.write_window(channel, window, data)
    }

    fn finish(&mut self) -> Result<()> {
        shared_nodata(&self.staged)?;

        let file = File::create(&self.path)?;
        match self.staged.channels() {
            1 => encode_geotiff::<Gray32Float, _>(&self.staged, file),
            3 => encode_geotiff::<RGB32Float, _>(&self.staged, file),
            _ => encode_geotiff::<RGBA32Float, _>(&self.staged, file),
        }
    }
}

/// The single no-data value of a dataset, rejecting channels that disagree
fn shared_nodata(dataset: &MemoryDataset) -> Result<Option<f64>> {
    let values: Vec<Option<f64>> = (1..=dataset.channels()).map(|k| dataset.nodata(k)).collect();
    let first = values.first().copied().flatten();

    let same = |v: &Option<f64>| match (v, first) {
        (Some(a), Some(b)) => a == &b || (a.is_nan() && b.is_nan()),
        (None, None) => true,
        _ => false,
    };
    if !values.iter().all(same) {
        return Err(Error::InvalidParameter {
            name: "nodata",
            value: format!("{:?}", values),
            reason: "GeoTIFF stores one no-data value shared by all channels".to_string(),
        });
    }

    Ok(first)
}

/// Internal: encode a dataset as a float GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<C, W>(dataset: &MemoryDataset, writer: W) -> Result<()>
where
    C: colortype::ColorType<Inner = f32>,
    [f32]: TiffValue,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;

    let columns = dataset.columns();
    let lines = dataset.lines();
    let channels = dataset.channels();

    let mut data = vec![0.0f32; columns * lines * channels];
    for k in 0..channels {
        if let Some(band) = dataset.band(k + 1) {
            for (p, &v) in band.iter().enumerate() {
                data[p * channels + k] = v as f32;
            }
        }
    }

    let mut image = encoder.new_image::<C>(columns as u32, lines as u32)?;

    if let Some(gt) = dataset.geo_transform() {
        let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, scale.as_slice())?;

        let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())?;

        // Minimal key directory: GTModelTypeGeoKey = Projected,
        // GTRasterTypeGeoKey = RasterPixelIsArea
        let geokeys: Vec<u16> = vec![
            1, 1, 0, 2, //
            1024, 0, 1, 1, //
            1025, 0, 1, 1,
        ];
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())?;
    }

    if let Some(projection) = dataset.projection() {
        let text = format!("{}|", projection);
        image
            .encoder()
            .write_tag(Tag::GeoAsciiParamsTag, text.as_str())?;
    }

    if let Some(nodata) = shared_nodata(dataset)? {
        let text = nodata.to_string();
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), text.as_str())?;
    }

    image.write_data(&data)?;

    Ok(())
}

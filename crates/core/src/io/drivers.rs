//! Extension to driver-name mapping used to open and create datasets

use super::{RasterSink, RasterSource};
use crate::error::{Error, Result};
use crate::raster::PixelType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maps file extensions to store driver names (GDAL vocabulary, e.g. `GTiff`).
///
/// Extensions are matched case-insensitively, with or without a leading dot.
///
/// ```ignore
/// let mut drivers = Drivers::default();
/// drivers.insert(".img", "HFA");
/// assert_eq!(drivers.driver_for("scene.IMG")?, "HFA");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Drivers {
    extensions: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for Drivers {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut drivers = Self::empty();
        for (ext, driver) in map {
            drivers.insert(&ext, driver);
        }
        drivers
    }
}

impl From<Drivers> for BTreeMap<String, String> {
    fn from(drivers: Drivers) -> Self {
        drivers.extensions
    }
}

impl Default for Drivers {
    fn default() -> Self {
        let mut drivers = Self::empty();
        drivers.insert("tif", "GTiff");
        drivers.insert("tiff", "GTiff");
        drivers
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

impl Drivers {
    /// A mapping with no entries
    pub fn empty() -> Self {
        Self {
            extensions: BTreeMap::new(),
        }
    }

    /// Register (or replace) the driver for an extension
    pub fn insert(&mut self, ext: &str, driver: impl Into<String>) {
        self.extensions.insert(normalize(ext), driver.into());
    }

    /// Driver name registered for the extension of `path`
    pub fn driver_for<P: AsRef<Path>>(&self, path: P) -> Result<&str> {
        let path = path.as_ref();
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.extensions.get(&normalize(e)))
            .map(|d| d.as_str())
            .ok_or_else(|| Error::UnknownDriver(path.display().to_string()))
    }

    /// Open a dataset for reading
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Box<dyn RasterSource>> {
        backend_open(self, path.as_ref())
    }

    /// Create a dataset for writing, choosing the driver by extension
    pub fn create<P: AsRef<Path>>(
        &self,
        path: P,
        columns: usize,
        lines: usize,
        channels: usize,
        pixel_type: PixelType,
    ) -> Result<Box<dyn RasterSink>> {
        let driver = self.driver_for(&path)?;
        backend_create(driver, path.as_ref(), columns, lines, channels, pixel_type)
    }
}

// GDAL detects the format of existing files on its own
#[cfg(feature = "gdal")]
fn backend_open(_drivers: &Drivers, path: &Path) -> Result<Box<dyn RasterSource>> {
    Ok(Box::new(super::gdal_io::GdalSource::open(path)?))
}

#[cfg(not(feature = "gdal"))]
fn backend_open(drivers: &Drivers, path: &Path) -> Result<Box<dyn RasterSource>> {
    match drivers.driver_for(path)? {
        "GTiff" => Ok(Box::new(super::native::read_geotiff(path)?)),
        other => Err(Error::UnknownDriver(other.to_string())),
    }
}

#[cfg(feature = "gdal")]
fn backend_create(
    driver: &str,
    path: &Path,
    columns: usize,
    lines: usize,
    channels: usize,
    pixel_type: PixelType,
) -> Result<Box<dyn RasterSink>> {
    Ok(Box::new(super::gdal_io::GdalSink::create(
        driver, path, columns, lines, channels, pixel_type,
    )?))
}

// the native writer always produces Float32
#[cfg(not(feature = "gdal"))]
fn backend_create(
    driver: &str,
    path: &Path,
    columns: usize,
    lines: usize,
    channels: usize,
    _pixel_type: PixelType,
) -> Result<Box<dyn RasterSink>> {
    match driver {
        "GTiff" => Ok(Box::new(super::native::TiffSink::create(
            path, columns, lines, channels,
        )?)),
        other => Err(Error::UnknownDriver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let drivers = Drivers::default();
        assert_eq!(drivers.driver_for("a/b/scene.tif").unwrap(), "GTiff");
        assert_eq!(drivers.driver_for("SCENE.TIFF").unwrap(), "GTiff");
        assert!(matches!(
            drivers.driver_for("scene.png"),
            Err(Error::UnknownDriver(_))
        ));
        assert!(drivers.driver_for("no_extension").is_err());
    }

    #[test]
    fn test_leading_dot_is_ignored() {
        let mut drivers = Drivers::empty();
        drivers.insert(".IMG", "HFA");
        assert_eq!(drivers.driver_for("x.img").unwrap(), "HFA");
    }

    #[test]
    fn test_deserialize_from_json() {
        let drivers: Drivers = serde_json::from_str(r#"{"tif": "GTiff", ".IMG": "HFA"}"#).unwrap();
        assert_eq!(drivers.driver_for("x.img").unwrap(), "HFA");
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_unknown_driver_on_create() {
        let mut drivers = Drivers::empty();
        drivers.insert("img", "HFA");
        let result = drivers.create("out.img", 1, 1, 1, PixelType::Float32);
        assert!(matches!(result, Err(Error::UnknownDriver(_))));
    }
}

//! Geolocation descriptor shared by rasters derived from the same source

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use geo::Intersects;
use geo_types::{coord, Coord, Rect};
use serde::{Deserialize, Serialize};

/// Pixel size, ground extent and projection of a north-up raster.
///
/// Pixels are square: `pixel_size` is the ground length of one pixel edge
/// on both axes. Instances are immutable once built and are shared between
/// rasters behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pixel_size: f64,
    bbox: Rect<f64>,
    projection: String,
}

impl RasterMetadata {
    /// Build metadata from its parts; `pixel_size` must be finite and positive
    pub fn new(pixel_size: f64, bbox: Rect<f64>, projection: impl Into<String>) -> Result<Self> {
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(Error::InvalidParameter {
                name: "pixel_size",
                value: pixel_size.to_string(),
                reason: "must be finite and greater than zero".to_string(),
            });
        }

        Ok(Self {
            pixel_size,
            bbox,
            projection: projection.into(),
        })
    }

    /// Derive metadata from a store's geotransform and raster size.
    ///
    /// The pixel size is taken from the x step; rotated transforms are
    /// rejected.
    pub fn from_geo_transform(
        gt: &GeoTransform,
        columns: usize,
        lines: usize,
        projection: impl Into<String>,
    ) -> Result<Self> {
        if !gt.is_axis_aligned() {
            return Err(Error::InvalidParameter {
                name: "geo_transform",
                value: format!("{:?}", gt.to_gdal()),
                reason: "rotated transforms are not supported".to_string(),
            });
        }

        Self::new(gt.pixel_width, gt.extent(columns, lines), projection)
    }

    /// North-up geotransform anchored at the upper-left corner
    pub fn geo_transform(&self) -> GeoTransform {
        GeoTransform::new(self.xmin(), self.ymax(), self.pixel_size, -self.pixel_size)
    }

    /// Ground length of one pixel edge
    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Ground extent
    pub fn bbox(&self) -> &Rect<f64> {
        &self.bbox
    }

    /// Opaque projection identifier (usually WKT)
    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn xmin(&self) -> f64 {
        self.bbox.min().x
    }

    pub fn xmax(&self) -> f64 {
        self.bbox.max().x
    }

    pub fn ymin(&self) -> f64 {
        self.bbox.min().y
    }

    pub fn ymax(&self) -> f64 {
        self.bbox.max().y
    }

    /// Fractional (column, row) of a ground coordinate
    pub fn map_to_pixel(&self, point: Coord<f64>) -> (f64, f64) {
        (
            (point.x - self.xmin()) / self.pixel_size,
            (self.ymax() - point.y) / self.pixel_size,
        )
    }

    /// Whether the point lies inside the bounding box, edges included
    pub fn contains(&self, point: Coord<f64>) -> bool {
        point.x >= self.xmin()
            && point.x <= self.xmax()
            && point.y >= self.ymin()
            && point.y <= self.ymax()
    }

    /// Same pixel size and overlapping (or touching) boxes
    pub fn overlaps(&self, other: &RasterMetadata) -> bool {
        self.pixel_size == other.pixel_size && self.bbox.intersects(&other.bbox)
    }

    /// Shared extent of two boxes.
    ///
    /// Sorts the four x edges and the four y edges and keeps the middle pair
    /// on each axis. `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &RasterMetadata) -> Option<Rect<f64>> {
        if !self.bbox.intersects(&other.bbox) {
            return None;
        }

        let mut xs = [self.xmin(), self.xmax(), other.xmin(), other.xmax()];
        let mut ys = [self.ymin(), self.ymax(), other.ymin(), other.ymax()];
        xs.sort_by(f64::total_cmp);
        ys.sort_by(f64::total_cmp);

        Some(Rect::new(
            coord! { x: xs[1], y: ys[1] },
            coord! { x: xs[2], y: ys[2] },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> RasterMetadata {
        RasterMetadata::new(
            1.0,
            Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax }),
            "EPSG:32719",
        )
        .unwrap()
    }

    #[test]
    fn test_from_geo_transform() {
        let gt = GeoTransform::new(500.0, 1000.0, 30.0, -30.0);
        let md = RasterMetadata::from_geo_transform(&gt, 4, 2, "wkt").unwrap();

        assert_relative_eq!(md.xmin(), 500.0);
        assert_relative_eq!(md.xmax(), 620.0);
        assert_relative_eq!(md.ymin(), 940.0);
        assert_relative_eq!(md.ymax(), 1000.0);
        assert_eq!(md.geo_transform(), gt);
    }

    #[test]
    fn test_rejects_bad_pixel_size() {
        let bbox = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(RasterMetadata::new(0.0, bbox, "").is_err());
        assert!(RasterMetadata::new(f64::NAN, bbox, "").is_err());
        assert!(RasterMetadata::new(-1.0, bbox, "").is_err());
    }

    #[test]
    fn test_rejects_rotation() {
        let gt = GeoTransform::from_gdal([0.0, 1.0, 0.5, 0.0, 0.0, -1.0]);
        assert!(RasterMetadata::from_geo_transform(&gt, 2, 2, "").is_err());
    }

    #[test]
    fn test_upper_left_maps_to_origin() {
        let md = meta(10.0, 20.0, 14.0, 24.0);
        assert_eq!(md.map_to_pixel(coord! { x: 10.0, y: 24.0 }), (0.0, 0.0));
        assert_eq!(md.map_to_pixel(coord! { x: 12.5, y: 21.0 }), (2.5, 3.0));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let md = meta(0.0, 0.0, 4.0, 4.0);
        assert!(md.contains(coord! { x: 4.0, y: 0.0 }));
        assert!(!md.contains(coord! { x: 4.01, y: 1.0 }));
    }

    #[test]
    fn test_intersection_takes_middle_edges() {
        let a = meta(0.0, 0.0, 4.0, 4.0);
        let b = meta(2.0, -2.0, 6.0, 2.0);

        assert!(a.overlaps(&b));
        let i = a.intersection(&b).unwrap();
        assert_eq!(i.min(), coord! { x: 2.0, y: 0.0 });
        assert_eq!(i.max(), coord! { x: 4.0, y: 2.0 });
    }

    #[test]
    fn test_disjoint_and_mismatched() {
        let a = meta(0.0, 0.0, 4.0, 4.0);
        let far = meta(10.0, 10.0, 12.0, 12.0);
        assert!(!a.overlaps(&far));
        assert!(a.intersection(&far).is_none());

        let coarse = RasterMetadata::new(2.0, *a.bbox(), "EPSG:32719").unwrap();
        assert!(!a.overlaps(&coarse));
    }
}

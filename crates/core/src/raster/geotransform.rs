//! Affine geotransform as exchanged with raster stores

use geo_types::{coord, Rect};
use serde::{Deserialize, Serialize};

/// The six affine coefficients a raster store reports for its pixel grid.
///
/// Ground position of the upper-left corner of pixel (col, row):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative when rows run southwards
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Transform without rotation terms
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// From GDAL coefficient order `[x0, dx, rx, y0, ry, dy]`
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        let [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height] = coeffs;
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation,
            col_rotation,
        }
    }

    /// To GDAL coefficient order
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    pub fn is_axis_aligned(&self) -> bool {
        self.row_rotation.abs() < 1e-10 && self.col_rotation.abs() < 1e-10
    }

    /// Ground extent of a `columns` x `lines` grid of square pixels.
    ///
    /// The x step is used on both axes and the origin is taken as the
    /// top edge, whatever the sign of `pixel_height`.
    pub fn extent(&self, columns: usize, lines: usize) -> Rect<f64> {
        let ps = self.pixel_width;
        Rect::new(
            coord! { x: self.origin_x, y: self.origin_y - ps * lines as f64 },
            coord! { x: self.origin_x + ps * columns as f64, y: self.origin_y },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

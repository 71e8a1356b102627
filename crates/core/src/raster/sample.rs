//! Sub-pixel positions and the values sampled at them

/// A fractional pixel position, optionally carrying one value per channel.
///
/// `x` is the column and `y` the row, both measured from the upper-left
/// corner of the raster. Positions produced by
/// [`Raster::map_to_pixel`](super::Raster::map_to_pixel) carry no values;
/// [`Raster::sample`](super::Raster::sample) fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledPixel {
    pub x: f64,
    pub y: f64,
    pub values: Option<Vec<f64>>,
}

impl SampledPixel {
    /// A bare position with no values
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, values: None }
    }

    pub fn with_values(x: f64, y: f64, values: Vec<f64>) -> Self {
        Self {
            x,
            y,
            values: Some(values),
        }
    }

    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }
}

//! Pixel types a raster band can hold

use crate::io::{BandBuf, BandBufMut};
use bytemuck::Pod;
use num_traits::Zero;
use std::fmt::{self, Debug};

/// Storage type of a raster, as reported by an external store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// Unsigned 8-bit
    Byte,
    /// Unsigned 16-bit
    UInt16,
    /// 32-bit IEEE float
    Float32,
    /// Channels disagree on their storage type
    Mixed,
    /// A storage type this crate does not handle
    Undefined,
}

impl PixelType {
    /// Combine per-channel types into the type of the whole dataset.
    ///
    /// Returns `Undefined` for an empty set and `Mixed` when channels differ.
    pub fn unify<I: IntoIterator<Item = PixelType>>(types: I) -> PixelType {
        let mut iter = types.into_iter();
        match iter.next() {
            None => PixelType::Undefined,
            Some(first) => {
                if iter.all(|t| t == first) {
                    first
                } else {
                    PixelType::Mixed
                }
            }
        }
    }

    /// Short name in GDAL's vocabulary
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::Byte => "Byte",
            PixelType::UInt16 => "UInt16",
            PixelType::Float32 => "Float32",
            PixelType::Mixed => "Mixed",
            PixelType::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Trait for the cell types a [`Raster`](super::Raster) can be built over.
///
/// Implemented for `u8`, `u16` and `f32`. Besides storage conversions, each
/// type carries its own interpolation and differencing rules.
pub trait Pixel:
    sealed::Sealed
    + Pod
    + PartialEq
    + PartialOrd
    + Debug
    + num_traits::NumCast
    + Zero
    + Send
    + Sync
    + 'static
{
    /// Storage type tag
    const PIXEL_TYPE: PixelType;

    /// Wrap a slice for a store write
    fn as_band_buf(data: &[Self]) -> BandBuf<'_>;

    /// Wrap a slice for a store read
    fn as_band_buf_mut(data: &mut [Self]) -> BandBufMut<'_>;

    /// Widen to f64
    fn as_f64(self) -> f64;

    /// A no-data sentinel expressed in this type, `None` if it cannot be
    /// represented (such a sentinel never matches any pixel)
    fn sentinel(nodata: f64) -> Option<Self> {
        <Self as num_traits::NumCast>::from(nodata)
    }

    /// Whether this value is the no-data sentinel
    fn is_nodata(self, sentinel: Option<Self>) -> bool;

    /// Interpolate inside a 2x2 neighbourhood.
    ///
    /// `corners` is ordered `(j, i), (j+1, i), (j, i+1), (j+1, i+1)` and
    /// `(dx, dy)` is the offset from `(j, i)`. Returns `None` when the
    /// neighbourhood holds too much no-data to produce a value.
    fn interpolate(corners: [Self; 4], sentinel: Option<Self>, dx: f64, dy: f64) -> Option<f64>;

    /// Per-pixel difference written to a difference raster
    fn difference(a: Self, b: Self) -> Self;
}

/// Bilinear blend of a 2x2 neighbourhood
fn bilinear(c: [f64; 4], dx: f64, dy: f64) -> f64 {
    let top = dx * c[1] + (1.0 - dx) * c[0];
    let bottom = dx * c[3] + (1.0 - dx) * c[2];
    dy * bottom + (1.0 - dy) * top
}

/// Inverse-distance fallback over the valid corners only.
///
/// Each corner is weighted by the squared distance from the sample to the
/// opposite corner.
fn inverse_distance(c: [f64; 4], valid: [bool; 4], dx: f64, dy: f64) -> Option<f64> {
    let cx = 1.0 - dx;
    let cy = 1.0 - dy;
    let weights = [
        cx * cx + cy * cy,
        dx * dx + cy * cy,
        cx * cx + dy * dy,
        dx * dx + dy * dy,
    ];

    let mut sum = 0.0;
    let mut weight_sum = 0.0;
    for k in 0..4 {
        if valid[k] {
            sum += weights[k] * c[k];
            weight_sum += weights[k];
        }
    }

    if weight_sum > 0.0 {
        Some(sum / weight_sum)
    } else {
        None
    }
}

macro_rules! impl_pixel_int {
    ($t:ty, $variant:ident) => {
        impl sealed::Sealed for $t {}

        impl Pixel for $t {
            const PIXEL_TYPE: PixelType = PixelType::$variant;

            fn as_band_buf(data: &[Self]) -> BandBuf<'_> {
                BandBuf::$variant(data)
            }

            fn as_band_buf_mut(data: &mut [Self]) -> BandBufMut<'_> {
                BandBufMut::$variant(data)
            }

            fn as_f64(self) -> f64 {
                f64::from(self)
            }

            fn is_nodata(self, sentinel: Option<Self>) -> bool {
                sentinel == Some(self)
            }

            fn interpolate(
                corners: [Self; 4],
                sentinel: Option<Self>,
                dx: f64,
                dy: f64,
            ) -> Option<f64> {
                if corners.iter().any(|v| v.is_nodata(sentinel)) {
                    return None;
                }
                Some(bilinear(corners.map(f64::from), dx, dy))
            }

            fn difference(a: Self, b: Self) -> Self {
                a.abs_diff(b)
            }
        }
    };
}

impl_pixel_int!(u8, Byte);
impl_pixel_int!(u16, UInt16);

impl sealed::Sealed for f32 {}

impl Pixel for f32 {
    const PIXEL_TYPE: PixelType = PixelType::Float32;

    fn as_band_buf(data: &[Self]) -> BandBuf<'_> {
        BandBuf::Float32(data)
    }

    fn as_band_buf_mut(data: &mut [Self]) -> BandBufMut<'_> {
        BandBufMut::Float32(data)
    }

    fn as_f64(self) -> f64 {
        f64::from(self)
    }

    fn is_nodata(self, sentinel: Option<Self>) -> bool {
        match sentinel {
            Some(nd) if nd.is_nan() => self.is_nan(),
            Some(nd) => self == nd,
            None => false,
        }
    }

    fn interpolate(corners: [Self; 4], sentinel: Option<Self>, dx: f64, dy: f64) -> Option<f64> {
        let valid = corners.map(|v| !v.is_nodata(sentinel));
        let values = corners.map(f64::from);

        match valid.iter().filter(|&&v| v).count() {
            4 => Some(bilinear(values, dx, dy)),
            0 => None,
            _ => inverse_distance(values, valid, dx, dy),
        }
    }

    fn difference(a: Self, b: Self) -> Self {
        a - b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unify_pixel_types() {
        assert_eq!(PixelType::unify([PixelType::Byte; 3]), PixelType::Byte);
        assert_eq!(
            PixelType::unify([PixelType::Byte, PixelType::Float32]),
            PixelType::Mixed
        );
        assert_eq!(PixelType::unify(Vec::new()), PixelType::Undefined);
    }

    #[test]
    fn test_sentinel_conversion() {
        assert_eq!(u8::sentinel(255.0), Some(255));
        assert_eq!(u8::sentinel(-9999.0), None);
        assert_eq!(u16::sentinel(65535.0), Some(65535));
        assert_eq!(f32::sentinel(-9999.0), Some(-9999.0));

        // an unrepresentable sentinel never flags a pixel
        assert!(!0u8.is_nodata(u8::sentinel(-9999.0)));
    }

    #[test]
    fn test_widening() {
        assert_eq!(200u8.as_f64(), 200.0);
        assert_eq!(65535u16.as_f64(), 65535.0);
        assert_eq!((-0.5f32).as_f64(), -0.5);
    }

    #[test]
    fn test_nan_sentinel_matches_nan() {
        let nd = f32::sentinel(f64::NAN);
        assert!(f32::NAN.is_nodata(nd));
        assert!(!1.0f32.is_nodata(nd));
    }

    #[test]
    fn test_integer_bilinear() {
        let corners = [10u8, 20, 30, 40];
        assert_relative_eq!(u8::interpolate(corners, None, 0.0, 0.0).unwrap(), 10.0);
        assert_relative_eq!(u8::interpolate(corners, None, 0.5, 0.5).unwrap(), 25.0);
        assert_relative_eq!(u8::interpolate(corners, None, 1.0, 0.0).unwrap(), 20.0);
        assert_relative_eq!(u8::interpolate(corners, None, 0.0, 0.25).unwrap(), 15.0);
    }

    #[test]
    fn test_integer_nodata_blocks_interpolation() {
        let corners = [10u16, 0, 30, 40];
        assert!(u16::interpolate(corners, Some(0), 0.1, 0.1).is_none());
        assert!(u16::interpolate(corners, Some(7), 0.1, 0.1).is_some());
    }

    #[test]
    fn test_float_bilinear_without_nodata() {
        let corners = [1.0f32, 2.0, 3.0, 4.0];
        assert_relative_eq!(
            f32::interpolate(corners, Some(-9999.0), 0.5, 0.5).unwrap(),
            2.5
        );
    }

    #[test]
    fn test_float_inverse_distance_fallback() {
        let nd = Some(-9999.0f32);

        let centre = f32::interpolate([10.0, 20.0, 30.0, -9999.0], nd, 0.5, 0.5).unwrap();
        assert_relative_eq!(centre, 20.0, epsilon = 1e-12);

        let v = f32::interpolate([10.0, 20.0, -9999.0, -9999.0], nd, 0.25, 0.0).unwrap();
        let w0 = 0.75 * 0.75 + 1.0;
        let w1 = 0.25 * 0.25 + 1.0;
        assert_relative_eq!(v, (w0 * 10.0 + w1 * 20.0) / (w0 + w1), epsilon = 1e-12);
    }

    #[test]
    fn test_float_all_nodata() {
        let nd = Some(-1.0f32);
        assert!(f32::interpolate([-1.0; 4], nd, 0.3, 0.3).is_none());
    }

    #[test]
    fn test_difference_rules() {
        assert_eq!(u8::difference(3, 10), 7);
        assert_eq!(u16::difference(10, 3), 7);
        assert_eq!(f32::difference(3.0, 10.0), -7.0);
    }
}

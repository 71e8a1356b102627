//! Change between two co-registered rasters
//!
//! Both rasters are cut to the intersection of their bounding boxes and
//! compared pixel by pixel. A pixel that is no-data in either input keeps
//! the zero the output band was initialised with.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Pixel, Raster, RasterMetadata};
use geo_types::{coord, Coord, Rect};
use tracing::debug;

/// Pixel positions closer than this to an integer are treated as exact
const SNAP_TOLERANCE: f64 = 1e-6;

/// Round `v` to the nearest integer when it is within [`SNAP_TOLERANCE`]
pub(crate) fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_TOLERANCE {
        r
    } else {
        v
    }
}

/// Pixel window (row_start, col_start, row_end, col_end) covering the
/// ground rectangle from `ul` to `lr`
pub(crate) fn pixel_window(md: &RasterMetadata, ul: Coord<f64>, lr: Coord<f64>) -> (usize, usize, usize, usize) {
    let (c0, r0) = md.map_to_pixel(ul);
    let (c1, r1) = md.map_to_pixel(lr);
    (
        snap(r0).floor().max(0.0) as usize,
        snap(c0).floor().max(0.0) as usize,
        snap(r1).ceil().max(0.0) as usize,
        snap(c1).ceil().max(0.0) as usize,
    )
}

/// Upper-left and lower-right corners of a ground rectangle
fn corners(rect: &Rect<f64>) -> (Coord<f64>, Coord<f64>) {
    (
        coord! { x: rect.min().x, y: rect.max().y },
        coord! { x: rect.max().x, y: rect.min().y },
    )
}

/// Geotransform of the raster [`difference`] returns for inputs with this
/// geolocation.
///
/// The result sits on `a`'s pixel grid, anchored at the upper-left pixel of
/// the window cut from `a`. `None` when the boxes do not overlap.
pub fn difference_geo_transform(a: &RasterMetadata, b: &RasterMetadata) -> Option<GeoTransform> {
    let shared = a.intersection(b)?;
    let (ul, lr) = corners(&shared);
    let (row, col, _, _) = pixel_window(a, ul, lr);

    let ps = a.pixel_size();
    Some(GeoTransform::new(
        a.xmin() + col as f64 * ps,
        a.ymax() - row as f64 * ps,
        ps,
        -ps,
    ))
}

/// Compute the difference of `a` and `b` over their shared extent.
///
/// Integer pixels give `|a - b|`, float pixels the signed `a - b`.
///
/// # Returns
/// `Ok(None)` when the bounding boxes do not overlap or the intersection
/// covers no whole pixel; otherwise a raster with the intersection's
/// dimensions, `a`'s channel count, zero no-data and no geolocation.
///
/// # Errors
/// Both rasters need geolocation with the same pixel size and
/// projection, and the same number of channels.
pub fn difference<T: Pixel>(a: &Raster<T>, b: &Raster<T>) -> Result<Option<Raster<T>>> {
    let a_md = a.metadata().ok_or(Error::NoGeolocation)?;
    let b_md = b.metadata().ok_or(Error::NoGeolocation)?;

    if a_md.pixel_size() != b_md.pixel_size() {
        return Err(Error::PixelSizeMismatch(a_md.pixel_size(), b_md.pixel_size()));
    }
    if a_md.projection() != b_md.projection() {
        return Err(Error::ProjectionMismatch(
            a_md.projection().to_string(),
            b_md.projection().to_string(),
        ));
    }
    if a.channels() != b.channels() {
        return Err(Error::InvalidParameter {
            name: "channels",
            value: b.channels().to_string(),
            reason: format!("first raster has {} channels", a.channels()),
        });
    }

    let Some(shared) = a_md.intersection(b_md) else {
        debug!("bounding boxes do not overlap");
        return Ok(None);
    };
    let (ul, lr) = corners(&shared);

    let (ar0, ac0, ar1, ac1) = pixel_window(a_md, ul, lr);
    let (br0, bc0, br1, bc1) = pixel_window(b_md, ul, lr);

    let (lines, columns) = (ar1.saturating_sub(ar0), ac1.saturating_sub(ac0));
    let (b_lines, b_columns) = (br1.saturating_sub(br0), bc1.saturating_sub(bc0));
    if (lines, columns) != (b_lines, b_columns) {
        return Err(Error::WindowMismatch {
            el: lines,
            ec: columns,
            al: b_lines,
            ac: b_columns,
        });
    }
    if lines == 0 || columns == 0 {
        debug!("intersection covers no whole pixel");
        return Ok(None);
    }

    debug!(
        lines,
        columns,
        first = ?(ar0, ac0),
        second = ?(br0, bc0),
        "differencing shared window"
    );

    let first = a.load_region(ar0, ac0, ar1, ac1)?;
    let second = b.load_region(br0, bc0, br1, bc1)?;

    let mut output = Raster::new(lines, columns, a.channels())?.with_options(a.options().clone());
    output.allocate(true)?;

    for k in 1..=a.channels() {
        let s1 = T::sentinel(first.nodata(k)?);
        let s2 = T::sentinel(second.nodata(k)?);
        let v1 = first.band(k)?.as_slice();
        let v2 = second.band(k)?.as_slice();
        let out = output.band_mut(k)?.as_mut_slice();

        for ((o, &x), &y) in out.iter_mut().zip(v1).zip(v2) {
            if !x.is_nodata(s1) && !y.is_nodata(s2) {
                *o = T::difference(x, y);
            }
        }
    }

    Ok(Some(output))
}

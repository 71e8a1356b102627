//! Per-channel statistics

use crate::error::{Error, Result};
use crate::raster::{Pixel, Raster};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Statistics of one channel, over pixels that are not no-data.
///
/// Every field except `valid_count` is `None` when the channel has no valid
/// pixel. `variance` is the sample variance and needs at least two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
    pub valid_count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub variance: Option<f64>,
}

impl BandStatistics {
    pub fn has_data(&self) -> bool {
        self.valid_count > 0
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> Option<f64> {
        self.variance.map(f64::sqrt)
    }
}

/// Statistics of every channel, in channel order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterStatistics {
    pub bands: Vec<BandStatistics>,
}

impl RasterStatistics {
    /// Statistics of a channel (1-based)
    pub fn band(&self, channel: usize) -> Option<&BandStatistics> {
        channel.checked_sub(1).and_then(|idx| self.bands.get(idx))
    }
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Accumulator {
    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn finish(self) -> BandStatistics {
        if self.count == 0 {
            return BandStatistics {
                valid_count: 0,
                min: None,
                max: None,
                mean: None,
                variance: None,
            };
        }

        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = if self.count > 1 {
            Some((self.sum_sq - self.sum * mean) / (n - 1.0))
        } else {
            None
        };

        BandStatistics {
            valid_count: self.count,
            min: self.min,
            max: self.max,
            mean: Some(mean),
            variance,
        }
    }
}

/// Count, min, max, mean and sample variance of every channel.
///
/// The bands must be allocated; use [`Raster::load`] first for rasters
/// opened from a store.
pub fn statistics<T: Pixel>(raster: &Raster<T>) -> Result<RasterStatistics> {
    if !raster.is_allocated() {
        return Err(Error::BandsNotAllocated);
    }

    let mut bands = Vec::with_capacity(raster.channels());
    for k in 1..=raster.channels() {
        let sentinel = T::sentinel(raster.nodata(k)?);
        let mut acc = Accumulator::default();
        for &v in raster.band(k)?.as_slice() {
            if !v.is_nodata(sentinel) {
                acc.push(v.as_f64());
            }
        }

        let stats = acc.finish();
        if !stats.has_data() {
            debug!(channel = k, "channel has no valid pixels");
        }
        bands.push(stats);
    }

    Ok(RasterStatistics { bands })
}

//! Band storage

mod tiered;

pub use tiered::{ArrayOptions, TieredArray, MAX_IN_MEMORY};

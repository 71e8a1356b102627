//! Fixed-length pixel buffers that live on the heap or in a mapped temp file

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};
use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Element count above which arrays are backed by a mapped temp file.
pub const MAX_IN_MEMORY: u64 = 16_777_216;

/// Tier policy for [`TieredArray`] allocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayOptions {
    /// Largest element count kept on the heap
    pub max_in_memory: u64,
    /// Directory for mapped backing files (system temp dir when `None`)
    pub temp_dir: Option<PathBuf>,
}

impl Default for ArrayOptions {
    fn default() -> Self {
        Self {
            max_in_memory: MAX_IN_MEMORY,
            temp_dir: None,
        }
    }
}

impl ArrayOptions {
    /// Whether an array of `count` elements goes to the mapped tier
    pub fn is_mapped(&self, count: usize) -> bool {
        count as u64 > self.max_in_memory
    }
}

enum Backing<T> {
    Empty,
    Heap(Vec<T>),
    Mapped(MappedRegion),
}

/// A shared read/write mapping over a private temp file.
///
/// Field order matters: the mapping is dropped (unmapped) before the file
/// is closed and unlinked.
struct MappedRegion {
    map: MmapMut,
    file: NamedTempFile,
}

impl MappedRegion {
    fn create(bytes: usize, options: &ArrayOptions) -> Result<Self> {
        let dir = options.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

        let file = tempfile::Builder::new()
            .prefix("mm_")
            .tempfile_in(&dir)
            .map_err(|source| Error::Mapping {
                path: dir.clone(),
                source,
            })?;

        file.as_file()
            .set_len(bytes as u64)
            .map_err(|source| Error::Mapping {
                path: file.path().to_path_buf(),
                source,
            })?;

        // SAFETY: the backing file has a unique name, is owned by this region
        // and outlives the mapping; nothing else truncates it.
        let map = unsafe { MmapOptions::new().len(bytes).map_mut(file.as_file()) }.map_err(
            |source| Error::Mapping {
                path: file.path().to_path_buf(),
                source,
            },
        )?;

        Ok(Self { map, file })
    }
}

/// Owning, fixed-length buffer of plain-old-data elements.
///
/// Small arrays are kept on the heap. Arrays longer than
/// [`ArrayOptions::max_in_memory`] are backed by a memory-mapped temp file
/// that is unmapped and deleted when the array is released or dropped.
/// Every instance owns its storage exclusively; [`TieredArray::try_clone`]
/// produces a fresh backing store.
///
/// Newly allocated storage is zero-initialised in both tiers.
pub struct TieredArray<T: Pod> {
    count: usize,
    backing: Backing<T>,
    options: ArrayOptions,
}

impl<T: Pod> TieredArray<T> {
    /// Allocate `count` zeroed elements with the default tier policy
    pub fn new(count: usize) -> Result<Self> {
        Self::with_options(count, &ArrayOptions::default())
    }

    /// Allocate `count` zeroed elements with an explicit tier policy
    pub fn with_options(count: usize, options: &ArrayOptions) -> Result<Self> {
        let backing = if count == 0 {
            Backing::Empty
        } else if options.is_mapped(count) {
            let bytes = count
                .checked_mul(std::mem::size_of::<T>())
                .ok_or_else(|| Error::InvalidParameter {
                    name: "count",
                    value: count.to_string(),
                    reason: "byte size overflows usize".to_string(),
                })?;
            let region = MappedRegion::create(bytes, options)?;
            debug!(
                count,
                path = %region.file.path().display(),
                "allocated mapped array"
            );
            Backing::Mapped(region)
        } else {
            Backing::Heap(vec![<T as Zeroable>::zeroed(); count])
        };

        Ok(Self {
            count,
            backing,
            options: options.clone(),
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether backing storage is allocated
    pub fn is_valid(&self) -> bool {
        !matches!(self.backing, Backing::Empty)
    }

    /// Whether the array lives in the mapped tier
    pub fn is_mapped(&self) -> bool {
        matches!(self.backing, Backing::Mapped(_))
    }

    /// Size of the payload in bytes
    pub fn bytes(&self) -> usize {
        self.count * std::mem::size_of::<T>()
    }

    /// Tier policy this array was allocated with
    pub fn options(&self) -> &ArrayOptions {
        &self.options
    }

    /// Path of the backing file (mapped tier only)
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Mapped(region) => Some(region.file.path()),
            _ => None,
        }
    }

    /// View the elements as a slice
    pub fn as_slice(&self) -> &[T] {
        match &self.backing {
            Backing::Empty => &[],
            Backing::Heap(data) => data,
            Backing::Mapped(region) => bytemuck::cast_slice(&region.map[..]),
        }
    }

    /// View the elements as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.backing {
            Backing::Empty => &mut [],
            Backing::Heap(data) => data,
            Backing::Mapped(region) => bytemuck::cast_slice_mut(&mut region.map[..]),
        }
    }

    /// Element at `index`, or `None` if out of range
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Mutable element at `index`, or `None` if out of range
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Set every element to `value`
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    /// Deep copy into a newly allocated backing store of the same tier policy
    pub fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::with_options(self.count, &self.options)?;
        copy.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(copy)
    }

    /// Exchange storage, length and tier with `other`
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Replace the contents with a deep copy of `other`.
    ///
    /// The previous backing store is released only once the copy succeeded.
    pub fn assign_from(&mut self, other: &Self) -> Result<()> {
        let mut copy = other.try_clone()?;
        self.swap(&mut copy);
        Ok(())
    }

    /// Release the backing store, leaving an empty array.
    ///
    /// Calling this more than once is harmless.
    pub fn release(&mut self) {
        if let Backing::Mapped(region) = std::mem::replace(&mut self.backing, Backing::Empty) {
            debug!(path = %region.file.path().display(), "releasing mapped array");
            drop(region);
        }
        self.count = 0;
    }
}

impl<T: Pod> Drop for TieredArray<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Pod> Index<usize> for TieredArray<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Pod> IndexMut<usize> for TieredArray<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<T: Pod> fmt::Debug for TieredArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredArray")
            .field("count", &self.count)
            .field("mapped", &self.is_mapped())
            .field("path", &self.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tier() -> ArrayOptions {
        ArrayOptions {
            max_in_memory: 16,
            temp_dir: None,
        }
    }

    #[test]
    fn test_heap_tier_roundtrip() {
        let mut array: TieredArray<u16> = TieredArray::new(1000).unwrap();
        assert_eq!(array.len(), 1000);
        assert!(array.is_valid());
        assert!(!array.is_mapped());
        assert!(array.path().is_none());

        for i in 0..1000 {
            array[i] = i as u16;
        }
        assert_eq!(array[999], 999);
        assert_eq!(array.bytes(), 2000);
    }

    #[test]
    fn test_mapped_tier_roundtrip() {
        let mut array: TieredArray<f32> = TieredArray::with_options(100, &small_tier()).unwrap();
        assert_eq!(array.len(), 100);
        assert!(array.is_mapped());

        let path = array.path().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 400);

        assert!(array.as_slice().iter().all(|&v| v == 0.0));
        for i in 0..100 {
            array[i] = i as f32 * 0.5;
        }
        assert_eq!(array[42], 21.0);

        drop(array);
        assert!(!path.exists());
    }

    #[test]
    fn test_threshold_boundary() {
        let opts = small_tier();
        let at: TieredArray<u8> = TieredArray::with_options(16, &opts).unwrap();
        let above: TieredArray<u8> = TieredArray::with_options(17, &opts).unwrap();
        assert!(!at.is_mapped());
        assert!(above.is_mapped());
    }

    #[test]
    fn test_empty_array() {
        let array: TieredArray<u8> = TieredArray::new(0).unwrap();
        assert!(array.is_empty());
        assert!(!array.is_valid());
        assert!(array.as_slice().is_empty());
        assert!(array.get(0).is_none());
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range_panics() {
        let array: TieredArray<u8> = TieredArray::new(4).unwrap();
        let _ = array[4];
    }

    #[test]
    fn test_clone_is_independent() {
        for opts in [ArrayOptions::default(), small_tier()] {
            let mut original: TieredArray<u8> = TieredArray::with_options(32, &opts).unwrap();
            original.fill(7);

            let mut copy = original.try_clone().unwrap();
            assert_eq!(copy.is_mapped(), original.is_mapped());
            assert_eq!(copy.as_slice(), original.as_slice());
            if copy.is_mapped() {
                assert_ne!(copy.path(), original.path());
            }

            copy[0] = 99;
            assert_eq!(original[0], 7);
            assert_eq!(copy[0], 99);
        }
    }

    #[test]
    fn test_swap_and_assign() {
        let mut a: TieredArray<u8> = TieredArray::with_options(4, &small_tier()).unwrap();
        let mut b: TieredArray<u8> = TieredArray::with_options(64, &small_tier()).unwrap();
        a.fill(1);
        b.fill(2);

        a.swap(&mut b);
        assert_eq!(a.len(), 64);
        assert!(a.is_mapped());
        assert_eq!(b.len(), 4);
        assert_eq!(b[3], 1);

        let old_path = a.path().unwrap().to_path_buf();
        a.assign_from(&b).unwrap();
        assert_eq!(a.len(), 4);
        assert!(!a.is_mapped());
        assert!(!old_path.exists());
        assert_eq!(a.as_slice(), &[1, 1, 1, 1]);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut array: TieredArray<f32> = TieredArray::with_options(64, &small_tier()).unwrap();
        let path = array.path().unwrap().to_path_buf();

        array.release();
        assert!(!array.is_valid());
        assert!(!path.exists());

        array.release();
        assert_eq!(array.len(), 0);
    }

    #[test]
    fn test_custom_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ArrayOptions {
            max_in_memory: 0,
            temp_dir: Some(dir.path().to_path_buf()),
        };
        let array: TieredArray<u8> = TieredArray::with_options(8, &opts).unwrap();
        assert!(array.path().unwrap().starts_with(dir.path()));
    }

    #[test]
    fn test_missing_temp_dir_is_reported() {
        let opts = ArrayOptions {
            max_in_memory: 0,
            temp_dir: Some(PathBuf::from("/nonexistent/geodelta/tmp")),
        };
        let result: Result<TieredArray<u8>> = TieredArray::with_options(8, &opts);
        assert!(matches!(result, Err(Error::Mapping { .. })));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: ArrayOptions = serde_json::from_str(r#"{"max_in_memory": 10}"#).unwrap();
        assert_eq!(opts.max_in_memory, 10);
        assert!(opts.temp_dir.is_none());
    }
}

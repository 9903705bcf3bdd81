//! Light storage for chunk sections.
//!
//! Light values are stored as 4-bit values (0-15), packed as two values per byte.
//! For a 16x16x16 section, this requires 2048 bytes (4096 blocks / 2).

use std::{fmt::Debug, mem, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// The maximum light level.
pub const MAX_LIGHT_LEVEL: u8 = 15;

/// The number of bytes needed to store light data for a 16x16x16 section.
/// 16*16*16 blocks = 4096 blocks, at 4 bits per block = 2048 bytes
pub const LIGHT_ARRAY_SIZE: usize = 2048;

#[inline]
fn nibble_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < 16 && y < 16 && z < 16, "Coordinates must be 0-15");
    y * 256 + z * 16 + x
}

#[inline]
const fn pack(level: u8) -> u8 {
    (level & 0x0F) | ((level & 0x0F) << 4)
}

/// Light values for one section.
///
/// A section starts out [`NibbleArray::Uniform`]: every voxel shares one level
/// and no data is allocated. The first write of a different level materializes
/// the packed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NibbleArray {
    /// All voxels in the section have the same light level (0-15).
    Uniform(u8),
    /// Voxels have different light levels, stored as packed nibbles.
    Materialized(Box<[u8; LIGHT_ARRAY_SIZE]>),
}

impl Default for NibbleArray {
    fn default() -> Self {
        Self::Uniform(0)
    }
}

impl NibbleArray {
    /// Creates a uniform array with all voxels at the given light level.
    #[must_use]
    pub fn new_filled(light_level: u8) -> Self {
        debug_assert!(light_level <= MAX_LIGHT_LEVEL, "Light level must be 0-15");
        Self::Uniform(light_level)
    }

    /// Creates a new dark array.
    #[must_use]
    pub fn new_empty() -> Self {
        Self::Uniform(0)
    }

    /// Rebuilds an array from raw packed bytes produced by [`NibbleArray::to_raw`].
    ///
    /// Returns `None` if the slice is not exactly [`LIGHT_ARRAY_SIZE`] bytes long.
    #[must_use]
    pub fn from_raw(bytes: &[u8]) -> Option<Self> {
        let data: [u8; LIGHT_ARRAY_SIZE] = bytes.try_into().ok()?;
        let first = data[0];
        if (first & 0x0F) == (first >> 4) && data.iter().all(|&b| b == first) {
            return Some(Self::Uniform(first & 0x0F));
        }
        Some(Self::Materialized(Box::new(data)))
    }

    /// Whether the array is in the unmaterialized uniform state.
    #[must_use]
    #[inline]
    pub fn is_uniform(&self) -> bool {
        matches!(self, Self::Uniform(_))
    }

    /// The shared level if the array is uniform.
    #[must_use]
    #[inline]
    pub fn uniform_value(&self) -> Option<u8> {
        match self {
            Self::Uniform(level) => Some(*level),
            Self::Materialized(_) => None,
        }
    }

    /// Gets the light level at the given section-relative position.
    #[must_use]
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        match self {
            Self::Uniform(level) => *level,
            Self::Materialized(data) => {
                let index = nibble_index(x, y, z);
                (data[index >> 1] >> ((index & 1) << 2)) & 0x0F
            }
        }
    }

    /// Sets the light level at the given section-relative position.
    ///
    /// If currently uniform and setting a different value, materializes the array.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, light_level: u8) {
        debug_assert!(light_level <= MAX_LIGHT_LEVEL, "Light level must be 0-15");
        let index = nibble_index(x, y, z);

        if let Self::Uniform(current_level) = *self {
            if light_level == current_level {
                return;
            }
            *self = Self::Materialized(Box::new([pack(current_level); LIGHT_ARRAY_SIZE]));
        }

        if let Self::Materialized(data) = self {
            let shift = (index & 1) << 2;
            let byte = &mut data[index >> 1];
            *byte = (*byte & !(0x0F << shift)) | ((light_level & 0x0F) << shift);
        }
    }

    /// Sets every voxel to one level, dropping materialized data.
    pub fn fill(&mut self, light_level: u8) {
        debug_assert!(light_level <= MAX_LIGHT_LEVEL, "Light level must be 0-15");
        *self = Self::Uniform(light_level);
    }

    /// Returns the raw packed bytes.
    ///
    /// Uniform arrays expand to a filled buffer.
    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        match self {
            Self::Uniform(level) => vec![pack(*level); LIGHT_ARRAY_SIZE],
            Self::Materialized(data) => data.to_vec(),
        }
    }
}

/// A single-writer multi-reader nibble array.
///
/// Propagation writes into the *updating* copy, which a pass checks out for
/// its whole duration. When the pass finishes the result is published as the
/// new *visible* copy in one atomic swap, so readers see either the full
/// previous state or the full next one.
pub struct SwmrNibbleArray {
    updating: Mutex<NibbleArray>,
    visible: ArcSwap<NibbleArray>,
}

impl SwmrNibbleArray {
    /// Creates a storage slot whose updating and visible copies both hold `initial`.
    #[must_use]
    pub fn new(initial: NibbleArray) -> Self {
        Self {
            visible: ArcSwap::from_pointee(initial.clone()),
            updating: Mutex::new(initial),
        }
    }

    /// Reads a published light level.
    #[must_use]
    #[inline]
    pub fn get_visible(&self, x: usize, y: usize, z: usize) -> u8 {
        self.visible.load().get(x, y, z)
    }

    /// Returns the published array.
    #[must_use]
    pub fn visible(&self) -> Arc<NibbleArray> {
        self.visible.load_full()
    }

    /// Replaces both copies, e.g. when a chunk's saved light is loaded.
    ///
    /// Must not be called while a propagation pass holds the array.
    pub fn replace(&self, data: NibbleArray) {
        let mut updating = self.updating.lock();
        self.visible.store(Arc::new(data.clone()));
        *updating = data;
    }

    /// Takes the updating copy out for a propagation pass.
    pub(crate) fn checkout(&self) -> NibbleArray {
        mem::take(&mut *self.updating.lock())
    }

    /// Returns a checked out copy, publishing it if the pass changed it.
    pub(crate) fn commit(&self, data: NibbleArray, publish: bool) {
        let mut updating = self.updating.lock();
        if publish {
            self.visible.store(Arc::new(data.clone()));
        }
        *updating = data;
    }

    /// Drops a checked out copy and resets the updating state to the visible one.
    pub(crate) fn discard(&self) {
        let mut updating = self.updating.lock();
        *updating = NibbleArray::clone(&self.visible.load());
    }
}

impl Debug for SwmrNibbleArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwmrNibbleArray")
            .field("visible", &self.visible.load_full())
            .finish_non_exhaustive()
    }
}

impl Default for SwmrNibbleArray {
    fn default() -> Self {
        Self::new(NibbleArray::default())
    }
}
